//! ESRI ASCII grid rasters on disk.
//!
//! A category key maps to `<root>/<key>.asc`, or to every `.asc` file in
//! `<root>/<key>/` when the raster is split into tiles.

use crate::domain::model::Crs;
use crate::domain::ports::PopulationRasterSource;
use crate::domain::raster::RasterGrid;
use crate::utils::error::{Result, ZoneError};
use geo::coord;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<f64>,
    yll: Option<f64>,
    centered: bool,
    cellsize: Option<f64>,
    dx: Option<f64>,
    dy: Option<f64>,
    nodata: Option<f64>,
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> std::result::Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("invalid value '{}' for '{}'", value, key))
}

/// Parses one grid. Header keys are case-insensitive; both corner and
/// centre registration are accepted, as are separate `dx`/`dy` sizes.
pub fn parse_ascii_grid(content: &str, crs: Crs) -> std::result::Result<RasterGrid, String> {
    let mut header = Header::default();
    let mut lines = content.lines().peekable();

    while let Some(&line) = lines.peek() {
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            lines.next();
            continue;
        };
        if key.parse::<f64>().is_ok() {
            break;
        }
        let value = tokens
            .next()
            .ok_or_else(|| format!("header '{}' has no value", key))?;

        match key.to_ascii_lowercase().as_str() {
            "ncols" => header.ncols = Some(parse_number(key, value)?),
            "nrows" => header.nrows = Some(parse_number(key, value)?),
            "xllcorner" => header.xll = Some(parse_number(key, value)?),
            "yllcorner" => header.yll = Some(parse_number(key, value)?),
            "xllcenter" => {
                header.xll = Some(parse_number(key, value)?);
                header.centered = true;
            }
            "yllcenter" => {
                header.yll = Some(parse_number(key, value)?);
                header.centered = true;
            }
            "cellsize" => header.cellsize = Some(parse_number(key, value)?),
            "dx" => header.dx = Some(parse_number(key, value)?),
            "dy" => header.dy = Some(parse_number(key, value)?),
            "nodata_value" => header.nodata = Some(parse_number(key, value)?),
            other => return Err(format!("unknown header '{}'", other)),
        }
        lines.next();
    }

    let missing = |name: &str| format!("missing header '{}'", name);
    let cols = header.ncols.ok_or_else(|| missing("ncols"))?;
    let rows = header.nrows.ok_or_else(|| missing("nrows"))?;
    let xll = header.xll.ok_or_else(|| missing("xllcorner"))?;
    let yll = header.yll.ok_or_else(|| missing("yllcorner"))?;
    let cell_width = header.dx.or(header.cellsize).ok_or_else(|| missing("cellsize"))?;
    let cell_height = header.dy.or(header.cellsize).ok_or_else(|| missing("cellsize"))?;

    let (x0, y0) = if header.centered {
        (xll - cell_width / 2.0, yll - cell_height / 2.0)
    } else {
        (xll, yll)
    };

    let values = lines
        .flat_map(str::split_whitespace)
        .map(|token| parse_number::<f64>("cell", token))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(RasterGrid {
        origin: coord! { x: x0, y: y0 + rows as f64 * cell_height },
        cell_width,
        cell_height,
        cols,
        rows,
        values,
        nodata: header.nodata,
        crs,
    })
}

/// Directory of `.asc` grids, all in the same declared CRS.
#[derive(Debug, Clone)]
pub struct AsciiGridDirectory {
    root: PathBuf,
    crs: Crs,
}

impl AsciiGridDirectory {
    pub fn new<P: Into<PathBuf>>(root: P, crs: Crs) -> Self {
        Self {
            root: root.into(),
            crs,
        }
    }

    fn read_tile(&self, key: &str, path: &Path) -> Result<RasterGrid> {
        let unavailable = |reason: String| ZoneError::PopulationData {
            category: key.to_string(),
            reason: format!("{}: {}", path.display(), reason),
        };
        let content = fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
        parse_ascii_grid(&content, self.crs).map_err(unavailable)
    }

    fn tile_paths(&self, key: &str) -> Result<Vec<PathBuf>> {
        let unavailable = |reason: String| ZoneError::PopulationData {
            category: key.to_string(),
            reason,
        };

        if key.is_empty() || key.contains(['/', '\\']) || key == ".." {
            return Err(unavailable(format!("'{}' is not a valid category key", key)));
        }

        let single = self.root.join(format!("{}.asc", key));
        if single.is_file() {
            return Ok(vec![single]);
        }

        let dir = self.root.join(key);
        if dir.is_dir() {
            let mut tiles = fs::read_dir(&dir)
                .map_err(|e| unavailable(e.to_string()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("asc")))
                .collect::<Vec<_>>();
            tiles.sort();
            return Ok(tiles);
        }

        Err(unavailable(format!(
            "no raster at {} or {}",
            single.display(),
            dir.display()
        )))
    }
}

impl PopulationRasterSource for AsciiGridDirectory {
    fn load(&self, key: &str) -> Result<Vec<RasterGrid>> {
        let paths = self.tile_paths(key)?;
        tracing::debug!("Reading {} tile(s) for '{}'", paths.len(), key);
        paths.iter().map(|path| self.read_tile(key, path)).collect()
    }
}
