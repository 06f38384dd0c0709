//! Polygon helpers shared by the pipeline stages. Boolean operations come
//! from `geo`; this module only adds sliver handling, repair and the plain
//! nested-array form used in scenario and report files.

pub mod projection;

use geo::{Area, BooleanOps, Coord, CoordsIter, LineString, MultiPolygon, Polygon, Validation};

/// Polygons → rings (exterior first) → `[x, y]` positions.
pub type NestedPolygons = Vec<Vec<Vec<[f64; 2]>>>;

pub fn empty() -> MultiPolygon<f64> {
    MultiPolygon::new(Vec::new())
}

pub fn is_empty(geometry: &MultiPolygon<f64>) -> bool {
    geometry.0.is_empty()
}

pub fn has_finite_coords(geometry: &MultiPolygon<f64>) -> bool {
    geometry
        .coords_iter()
        .all(|c| c.x.is_finite() && c.y.is_finite())
}

pub fn union_all<'a>(geometries: impl IntoIterator<Item = &'a MultiPolygon<f64>>) -> MultiPolygon<f64> {
    geometries
        .into_iter()
        .filter(|g| !is_empty(g))
        .fold(empty(), |acc, g| {
            if is_empty(&acc) {
                g.clone()
            } else {
                acc.union(g)
            }
        })
}

/// Drops polygon parts whose area is below `min_area`.
pub fn remove_slivers(geometry: MultiPolygon<f64>, min_area: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(
        geometry
            .0
            .into_iter()
            .filter(|p| p.unsigned_area() >= min_area && p.unsigned_area() > 0.0)
            .collect(),
    )
}

/// Rebuilds each part through the overlay engine, which untangles
/// self-intersecting rings, then unions the parts one at a time so that
/// overlapping parts merge instead of cancelling out.
///
/// The merged area can never be smaller than its largest part; a result
/// that is, or that is still invalid, is an error.
pub fn repair(geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, String> {
    let parts: Vec<MultiPolygon<f64>> = geometry
        .0
        .iter()
        .map(|part| MultiPolygon::new(vec![part.clone()]).union(&empty()))
        .collect();
    let largest_part = parts.iter().map(area).fold(0.0, f64::max);

    let repaired = union_all(&parts);
    if !repaired.is_valid() {
        return Err("geometry is still invalid after repair".to_string());
    }
    if area(&repaired) < largest_part * (1.0 - 1e-9) {
        return Err(format!(
            "repair shrank the geometry to {:.3} m², below its largest part ({:.3} m²)",
            area(&repaired),
            largest_part
        ));
    }
    Ok(repaired)
}

/// Sliver removal followed by a validity check with a single repair
/// attempt. Returns the reason when the geometry stays invalid.
pub fn settle(geometry: MultiPolygon<f64>, min_area: f64) -> Result<MultiPolygon<f64>, String> {
    let cleaned = remove_slivers(geometry, min_area);
    if cleaned.is_valid() {
        return Ok(cleaned);
    }

    tracing::debug!("Repairing invalid geometry with {} parts", cleaned.0.len());
    Ok(remove_slivers(repair(&cleaned)?, min_area))
}

pub fn area(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.unsigned_area()
}

pub fn to_nested(geometry: &MultiPolygon<f64>) -> NestedPolygons {
    let ring = |ls: &LineString<f64>| ls.coords().map(|c| [c.x, c.y]).collect::<Vec<_>>();
    geometry
        .0
        .iter()
        .map(|polygon| {
            std::iter::once(ring(polygon.exterior()))
                .chain(polygon.interiors().iter().map(ring))
                .collect()
        })
        .collect()
}

pub fn from_nested(nested: &NestedPolygons) -> MultiPolygon<f64> {
    let ring = |positions: &Vec<[f64; 2]>| {
        LineString::from(
            positions
                .iter()
                .map(|&[x, y]| Coord { x, y })
                .collect::<Vec<_>>(),
        )
    };
    MultiPolygon::new(
        nested
            .iter()
            .filter(|rings| !rings.is_empty())
            .map(|rings| Polygon::new(ring(&rings[0]), rings[1..].iter().map(ring).collect()))
            .collect(),
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use geo::{coord, MultiPolygon, Rect};

    pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![
            Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()
        ])
    }

    /// Square of side `2 * half` centred on `(cx, cy)`.
    pub fn square(cx: f64, cy: f64, half: f64) -> MultiPolygon<f64> {
        rect(cx - half, cy - half, cx + half, cy + half)
    }
}
