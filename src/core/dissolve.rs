use crate::domain::model::{BandRegion, BandSet, IsochroneRing, Poi, PoiId};
use crate::geometry;
use rayon::prelude::*;

/// Unions every ring of one POI band by band. Bands without rings come out
/// as empty regions.
pub fn dissolve_poi(poi: &PoiId, rings: &[&IsochroneRing], bands: &BandSet) -> Vec<BandRegion> {
    (0..bands.len())
        .map(|band| {
            let parts = rings
                .iter()
                .filter(|ring| ring.band == band)
                .map(|ring| &ring.geometry);
            BandRegion {
                poi: poi.clone(),
                band,
                geometry: geometry::union_all(parts),
            }
        })
        .collect()
}

/// Dissolves all POIs in parallel. Output is ordered by POI input order,
/// then band.
pub fn dissolve_all(pois: &[Poi], rings: &[IsochroneRing], bands: &BandSet) -> Vec<BandRegion> {
    for ring in rings.iter().filter(|r| r.band >= bands.len()) {
        tracing::warn!(
            "Ignoring ring of '{}' with band {} outside the {} configured bands",
            ring.poi,
            ring.band,
            bands.len()
        );
    }

    pois.par_iter()
        .map(|poi| {
            let own: Vec<&IsochroneRing> = rings.iter().filter(|r| r.poi == poi.id).collect();
            dissolve_poi(&poi.id, &own, bands)
        })
        .flatten()
        .collect()
}
