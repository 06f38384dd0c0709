//! Zonal population sums over resolved regions.
//!
//! Raster cells are projected into the working CRS and intersected with the
//! region, so a cell crossed by the region boundary contributes in
//! proportion to the share of its area inside the region. No-data cells
//! contribute nothing to the sum; their covered share is reported as
//! `nodata_coverage`.

use crate::domain::model::{Additivity, PopulationValue, RegionPopulationSummary, ResolvedRegion};
use crate::domain::ports::PopulationRasterSource;
use crate::domain::raster::RasterGrid;
use crate::domain::settings::PopulationSettings;
use crate::geometry::projection::{Projection, ProjectionError};
use crate::utils::error::ZoneError;
use geo::{Area, BooleanOps, BoundingRect, Contains, LineString, MultiPolygon, Polygon, Rect};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Covered-cell weights are fractions of whole cells.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZonalStats {
    pub sum: f64,
    pub covered_cells: f64,
    pub nodata_cells: f64,
}

impl ZonalStats {
    fn add(&mut self, other: ZonalStats) {
        self.sum += other.sum;
        self.covered_cells += other.covered_cells;
        self.nodata_cells += other.nodata_cells;
    }

    /// Share of the touched cell area that had no data.
    pub fn nodata_share(&self) -> f64 {
        let touched = self.covered_cells + self.nodata_cells;
        if touched > 0.0 {
            self.nodata_cells / touched
        } else {
            0.0
        }
    }
}

fn overlaps(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x && a.max().x >= b.min().x && a.min().y <= b.max().y && a.max().y >= b.min().y
}

fn tile_stats(
    region: &MultiPolygon<f64>,
    bbox: Rect<f64>,
    tile: &RasterGrid,
    projection: &Projection,
) -> Result<ZonalStats, ProjectionError> {
    let mut stats = ZonalStats::default();

    let Some((rows, cols)) = tile.window(projection.bounds_in(tile.crs, bbox)?) else {
        return Ok(stats);
    };

    for row in rows {
        for col in cols.clone() {
            let corners = tile
                .cell_corners(row, col)
                .into_iter()
                .map(|c| projection.project(tile.crs, c))
                .collect::<Result<Vec<_>, _>>()?;
            let cell = Polygon::new(LineString::from(corners), vec![]);

            let cell_area = cell.unsigned_area();
            if cell_area <= 0.0 {
                continue;
            }
            match cell.bounding_rect() {
                Some(cell_bbox) if overlaps(&cell_bbox, &bbox) => {}
                _ => continue,
            }

            // Interior cells skip the overlay; only boundary cells are clipped.
            let fraction = if region.contains(&cell) {
                1.0
            } else {
                let inside = region
                    .intersection(&MultiPolygon::new(vec![cell]))
                    .unsigned_area();
                (inside / cell_area).min(1.0)
            };
            if fraction <= 0.0 {
                continue;
            }

            match tile.value(row, col) {
                Some(value) => {
                    stats.sum += value * fraction;
                    stats.covered_cells += fraction;
                }
                None => stats.nodata_cells += fraction,
            }
        }
    }

    Ok(stats)
}

/// Sum of every tile's cells over `region`, weighted by fractional cover.
pub fn zonal_sum(
    region: &MultiPolygon<f64>,
    tiles: &[RasterGrid],
    projection: &Projection,
) -> Result<ZonalStats, ProjectionError> {
    let mut total = ZonalStats::default();
    let Some(bbox) = region.bounding_rect() else {
        return Ok(total);
    };

    for tile in tiles {
        total.add(tile_stats(region, bbox, tile, projection)?);
    }
    Ok(total)
}

fn load_key(source: &dyn PopulationRasterSource, key: &str) -> Result<Vec<RasterGrid>, ZoneError> {
    let unavailable = |reason: String| ZoneError::PopulationData {
        category: key.to_string(),
        reason,
    };

    let tiles = source.load(key).map_err(|e| match e {
        ZoneError::PopulationData { .. } => e,
        other => unavailable(other.to_string()),
    })?;

    if tiles.is_empty() {
        return Err(unavailable("no raster tiles".to_string()));
    }
    for (i, tile) in tiles.iter().enumerate() {
        tile.check().map_err(|reason| unavailable(format!("tile {}: {}", i, reason)))?;
    }
    Ok(tiles)
}

fn additivity(
    total: &PopulationValue,
    categories: &BTreeMap<String, PopulationValue>,
    tolerance: f64,
) -> Option<Additivity> {
    if categories.is_empty() {
        return None;
    }
    let total = total.value()?;
    let category_sum = categories
        .values()
        .map(PopulationValue::value)
        .sum::<Option<f64>>()?;

    let delta = category_sum - total;
    let relative_delta = if total != 0.0 { delta / total } else { 0.0 };
    Some(Additivity {
        category_sum,
        delta,
        relative_delta,
        within_tolerance: relative_delta.abs() <= tolerance,
    })
}

type LoadedRasters = BTreeMap<String, Result<Vec<RasterGrid>, String>>;

fn summarize(
    region: &ResolvedRegion,
    rasters: &LoadedRasters,
    projection: &Projection,
    settings: &PopulationSettings,
) -> (RegionPopulationSummary, Vec<ZoneError>) {
    let mut failures = Vec::new();

    let value_for = |key: &str, failures: &mut Vec<ZoneError>| -> (PopulationValue, f64) {
        match rasters.get(key) {
            Some(Ok(tiles)) => match zonal_sum(&region.geometry, tiles, projection) {
                Ok(stats) => (PopulationValue::available(stats.sum), stats.nodata_share()),
                Err(e) => {
                    let reason = format!("{} for {}", e, region.tag);
                    failures.push(ZoneError::PopulationData {
                        category: key.to_string(),
                        reason: reason.clone(),
                    });
                    (PopulationValue::Unavailable { reason }, 0.0)
                }
            },
            Some(Err(reason)) => (
                PopulationValue::Unavailable {
                    reason: reason.clone(),
                },
                0.0,
            ),
            None => (
                PopulationValue::Unavailable {
                    reason: "raster was not loaded".to_string(),
                },
                0.0,
            ),
        }
    };

    let (total, nodata_coverage) = value_for(&settings.aggregate_key, &mut failures);

    let categories: BTreeMap<String, PopulationValue> = settings
        .categories
        .iter()
        .map(|key| (key.clone(), value_for(key, &mut failures).0))
        .collect();

    let additivity = additivity(&total, &categories, settings.tolerance);
    if let Some(check) = additivity.as_ref().filter(|a| !a.within_tolerance) {
        tracing::warn!(
            "Category sum for {} differs from the total by {:.2}% ({:.1} people)",
            region.tag,
            check.relative_delta * 100.0,
            check.delta
        );
    }

    (
        RegionPopulationSummary {
            tag: region.tag.clone(),
            total,
            categories,
            additivity,
            nodata_coverage,
        },
        failures,
    )
}

/// One summary per region, in region order. Rasters are loaded once per
/// key; a key that cannot be loaded is `Unavailable` in every region and
/// reported once.
pub fn aggregate_population(
    regions: &[ResolvedRegion],
    source: &dyn PopulationRasterSource,
    projection: &Projection,
    settings: &PopulationSettings,
) -> (Vec<RegionPopulationSummary>, Vec<ZoneError>) {
    let mut failures = Vec::new();
    let mut rasters = LoadedRasters::new();

    for key in std::iter::once(&settings.aggregate_key).chain(&settings.categories) {
        if rasters.contains_key(key) {
            continue;
        }
        let loaded = match load_key(source, key) {
            Ok(tiles) => {
                tracing::debug!("Loaded {} raster tile(s) for '{}'", tiles.len(), key);
                Ok(tiles)
            }
            Err(e) => {
                let reason = match &e {
                    ZoneError::PopulationData { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                failures.push(e);
                Err(reason)
            }
        };
        rasters.insert(key.clone(), loaded);
    }

    let (summaries, region_failures): (Vec<_>, Vec<_>) = regions
        .par_iter()
        .map(|region| summarize(region, &rasters, projection, settings))
        .unzip();

    failures.extend(region_failures.into_iter().flatten());
    (summaries, failures)
}
