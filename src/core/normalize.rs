use crate::domain::model::{
    AreaOfInterest, BandSet, Crs, IsochroneRing, IsochroneSet, Poi, PoiCoverage, RawAoi, RawPoi,
};
use crate::domain::settings::ProjectionChoice;
use crate::geometry::{self, projection::Projection};
use crate::utils::error::{Result, ZoneError};
use geo::{BoundingRect, Contains, MapCoords, MultiPolygon, Point, Validation};
use std::collections::HashSet;

/// Picks the working projected CRS from the AOI's declared CRS.
pub fn choose_projection(aoi: &RawAoi, choice: ProjectionChoice) -> Result<Projection> {
    let crs = aoi
        .crs
        .ok_or_else(|| ZoneError::invalid_geometry("AOI", "missing coordinate reference"))?;

    match (choice, crs) {
        (ProjectionChoice::Auto, Crs::Wgs84) => {
            let bounds = aoi
                .geometry
                .bounding_rect()
                .ok_or_else(|| ZoneError::invalid_geometry("AOI", "empty geometry"))?;
            let centre = bounds.center();
            if !(centre.x.is_finite() && centre.y.is_finite()) {
                return Err(ZoneError::invalid_geometry("AOI", "non-finite coordinates"));
            }
            Ok(Projection::laea(centre.x, centre.y))
        }
        (ProjectionChoice::Auto | ProjectionChoice::Native, Crs::Projected(epsg)) => {
            Ok(Projection::Native { epsg })
        }
        (ProjectionChoice::Native, Crs::Wgs84) => Err(ZoneError::invalid_geometry(
            "AOI",
            "native projection requested but the AOI is geographic (EPSG:4326)",
        )),
        (ProjectionChoice::LambertAzimuthal { lon, lat }, Crs::Wgs84) => {
            Ok(Projection::laea(lon, lat))
        }
        (ProjectionChoice::LambertAzimuthal { .. }, Crs::Projected(epsg)) => {
            Err(ZoneError::invalid_geometry(
                "AOI",
                format!("cannot reproject EPSG:{} into a Lambert azimuthal projection", epsg),
            ))
        }
    }
}

/// Validates a polygonal input and maps it into the working CRS. Empty
/// input is only accepted when `allow_empty` is set.
pub fn normalize_polygons(
    subject: &str,
    crs: Option<Crs>,
    geometry: &MultiPolygon<f64>,
    projection: &Projection,
    allow_empty: bool,
) -> Result<MultiPolygon<f64>> {
    let crs = crs.ok_or_else(|| ZoneError::invalid_geometry(subject, "missing coordinate reference"))?;

    if geometry::is_empty(geometry) || geometry.0.iter().all(|p| p.exterior().0.len() < 3) {
        if allow_empty {
            return Ok(geometry::empty());
        }
        return Err(ZoneError::invalid_geometry(subject, "empty geometry"));
    }

    if !geometry::has_finite_coords(geometry) {
        return Err(ZoneError::invalid_geometry(subject, "non-finite coordinates"));
    }

    let projection = *projection;
    let projected = geometry
        .try_map_coords(|c| projection.project(crs, c))
        .map_err(|e| ZoneError::invalid_geometry(subject, e.to_string()))?;

    if projected.is_valid() {
        return Ok(projected);
    }

    tracing::debug!("Repairing invalid geometry of {}", subject);
    match geometry::repair(&projected) {
        Ok(repaired) if !geometry::is_empty(&repaired) => Ok(repaired),
        Ok(_) => Err(ZoneError::invalid_geometry(subject, "empty after repair")),
        Err(reason) => Err(ZoneError::invalid_geometry(
            subject,
            format!("self-intersecting beyond repair: {}", reason),
        )),
    }
}

/// The AOI is shared by every later stage, so any failure here is fatal.
pub fn normalize_aoi(aoi: &RawAoi, projection: &Projection) -> Result<AreaOfInterest> {
    let geometry = normalize_polygons("AOI", aoi.crs, &aoi.geometry, projection, false)?;
    Ok(AreaOfInterest { geometry })
}

pub fn normalize_poi(raw: &RawPoi, projection: &Projection) -> Result<Poi> {
    let subject = format!("POI '{}'", raw.id);
    let crs = raw
        .crs
        .ok_or_else(|| ZoneError::invalid_geometry(&subject, "missing coordinate reference"))?;

    if !(raw.location.x.is_finite() && raw.location.y.is_finite()) {
        return Err(ZoneError::invalid_geometry(&subject, "non-finite coordinates"));
    }

    let location = projection
        .project(crs, raw.location)
        .map_err(|e| ZoneError::invalid_geometry(&subject, e.to_string()))?;

    Ok(Poi {
        id: raw.id.clone(),
        location,
        source: raw.clone(),
    })
}

/// Normalizes every POI, dropping (and returning) the ones that fail.
/// Later duplicates of an id are rejected so region tags stay unique.
pub fn normalize_pois(
    raw_pois: &[RawPoi],
    projection: &Projection,
    aoi: &AreaOfInterest,
) -> (Vec<Poi>, PoiCoverage, Vec<ZoneError>) {
    let mut seen = HashSet::new();
    let mut pois = Vec::with_capacity(raw_pois.len());
    let mut coverage = PoiCoverage::default();
    let mut failures = Vec::new();

    for raw in raw_pois {
        if !seen.insert(raw.id.clone()) {
            failures.push(ZoneError::invalid_geometry(
                format!("POI '{}'", raw.id),
                "duplicate POI id",
            ));
            continue;
        }

        match normalize_poi(raw, projection) {
            Ok(poi) => {
                if aoi.geometry.contains(&Point::from(poi.location)) {
                    coverage.inside_aoi += 1;
                } else {
                    coverage.outside_aoi += 1;
                }
                pois.push(poi);
            }
            Err(e) => failures.push(e),
        }
    }

    if coverage.outside_aoi > 0 {
        tracing::warn!(
            "{} of {} POIs lie outside the AOI; they are still processed",
            coverage.outside_aoi,
            pois.len()
        );
    }

    (pois, coverage, failures)
}

/// Turns one POI's isochrone batch into rings. A band that fails validation
/// is reported and left out; the rest of the POI's bands are kept.
pub fn normalize_isochrones(
    poi: &Poi,
    set: &IsochroneSet,
    bands: &BandSet,
    projection: &Projection,
) -> (Vec<IsochroneRing>, Vec<ZoneError>) {
    if set.bands.len() != bands.len() {
        return (
            Vec::new(),
            vec![ZoneError::IsochroneUnavailable {
                poi: poi.id.to_string(),
                reason: format!(
                    "expected {} band geometries, received {}",
                    bands.len(),
                    set.bands.len()
                ),
            }],
        );
    }

    let mut rings = Vec::new();
    let mut failures = Vec::new();

    for (band, geometry) in set.bands.iter().enumerate() {
        let subject = format!("isochrone '{}' band {}", poi.id, band);
        match normalize_polygons(&subject, set.crs, geometry, projection, true) {
            Ok(geometry) if geometry::is_empty(&geometry) => {
                tracing::debug!("Band {} of '{}' is unreachable", band, poi.id);
            }
            Ok(geometry) => rings.push(IsochroneRing {
                poi: poi.id.clone(),
                band,
                geometry,
            }),
            Err(e) => failures.push(e),
        }
    }

    (rings, failures)
}
