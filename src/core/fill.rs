use crate::domain::model::{AreaOfInterest, BandSet, RegionTag, ResolvedRegion};
use crate::geometry;
use geo::BooleanOps;

/// Clips resolved regions to the AOI and adds one `Uncovered` region for
/// whatever part of the AOI no band reaches, so the result tiles the AOI.
///
/// Clipping drops parts smaller than `min_area`. Those slivers are not
/// lost: they fall into the residual and are relabelled as uncovered.
pub fn fill_gaps(
    aoi: &AreaOfInterest,
    regions: Vec<ResolvedRegion>,
    bands: &BandSet,
    min_area: f64,
) -> Vec<ResolvedRegion> {
    let mut clipped: Vec<ResolvedRegion> = regions
        .into_iter()
        .filter_map(|region| {
            let inside = geometry::remove_slivers(region.geometry.intersection(&aoi.geometry), min_area);
            if geometry::is_empty(&inside) {
                tracing::debug!("{} lies entirely outside the AOI", region.tag);
                return None;
            }
            Some(ResolvedRegion {
                geometry: inside,
                ..region
            })
        })
        .collect();

    let covered = geometry::union_all(clipped.iter().map(|r| &r.geometry));
    let residual = if geometry::is_empty(&covered) {
        aoi.geometry.clone()
    } else {
        aoi.geometry.difference(&covered)
    };
    let residual = geometry::remove_slivers(residual, min_area);

    if geometry::is_empty(&residual) {
        tracing::debug!("Bands already cover the whole AOI");
    } else {
        tracing::debug!(
            "Uncovered part of the AOI: {:.1} km²",
            geometry::area(&residual) / 1e6
        );
        clipped.push(ResolvedRegion {
            tag: RegionTag::Uncovered,
            interval: bands.uncovered_label(),
            geometry: residual,
        });
    }

    clipped
}
