//! Nearest-band-first overlap removal.
//!
//! Band regions are visited band by band (shortest travel time first). Each
//! one keeps only what is not already covered by the regions accepted
//! before it, so a location goes to the fastest band that reaches it, no
//! matter which POI that band belongs to. Within one band the `TieBreak`
//! setting decides which POI claims shared ground.

use crate::domain::model::{BandRegion, BandSet, RegionTag, ResolvedRegion};
use crate::domain::settings::{AnalysisSettings, TieBreak};
use crate::geometry;
use crate::utils::error::{Result, ZoneError};
use geo::{BooleanOps, MultiPolygon};

#[derive(Debug, Default)]
pub struct ResolveOutcome {
    pub regions: Vec<ResolvedRegion>,
    pub failures: Vec<ZoneError>,
}

/// Global processing order: band ascending, then the tie-break. The sort is
/// stable so `InputOrder` keeps the order regions were given in.
pub fn precedence_order(regions: &[BandRegion], tie_break: TieBreak) -> Vec<&BandRegion> {
    let mut ordered: Vec<&BandRegion> = regions.iter().collect();
    match tie_break {
        TieBreak::InputOrder => ordered.sort_by_key(|r| r.band),
        TieBreak::PoiName => ordered.sort_by(|a, b| a.band.cmp(&b.band).then_with(|| a.poi.cmp(&b.poi))),
    }
    ordered
}

/// One subtract-and-accept step. Takes the union accepted so far and
/// returns the updated union along with this region's remainder (`None`
/// when fully subsumed).
fn accept(
    accepted: MultiPolygon<f64>,
    region: &BandRegion,
    min_area: f64,
) -> (MultiPolygon<f64>, Result<Option<MultiPolygon<f64>>>) {
    let failure = |reason: String| ZoneError::GeometryResolution {
        poi: region.poi.to_string(),
        band: region.band,
        reason,
    };

    if geometry::is_empty(&region.geometry) {
        return (accepted, Ok(None));
    }
    if !geometry::has_finite_coords(&region.geometry) {
        return (accepted, Err(failure("band region has non-finite coordinates".to_string())));
    }

    let remainder = if geometry::is_empty(&accepted) {
        region.geometry.clone()
    } else {
        region.geometry.difference(&accepted)
    };

    match geometry::settle(remainder, min_area) {
        Ok(remainder) if geometry::is_empty(&remainder) => (accepted, Ok(None)),
        Ok(remainder) => {
            let accepted = if geometry::is_empty(&accepted) {
                remainder.clone()
            } else {
                accepted.union(&remainder)
            };
            (accepted, Ok(Some(remainder)))
        }
        Err(reason) => (accepted, Err(failure(reason))),
    }
}

pub fn resolve_overlaps(regions: &[BandRegion], settings: &AnalysisSettings) -> ResolveOutcome {
    let bands: &BandSet = &settings.bands;

    let (_, outcome) = precedence_order(regions, settings.tie_break).into_iter().fold(
        (geometry::empty(), ResolveOutcome::default()),
        |(accepted, mut outcome), region| {
            let (accepted, result) = accept(accepted, region, settings.min_area_m2);
            match result {
                Ok(Some(geometry)) => outcome.regions.push(ResolvedRegion {
                    tag: RegionTag::Band {
                        poi: region.poi.clone(),
                        band: region.band,
                    },
                    interval: bands.interval_label(region.band),
                    geometry,
                }),
                Ok(None) => {
                    tracing::debug!("'{}' band {} is fully covered by faster bands", region.poi, region.band);
                }
                Err(e) => outcome.failures.push(e),
            }
            (accepted, outcome)
        },
    );

    tracing::debug!(
        "Resolved {} of {} band regions ({} failed)",
        outcome.regions.len(),
        regions.len(),
        outcome.failures.len()
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::PoiId;
    use crate::geometry::testing::{rect, square};
    use geo::{Area, BooleanOps};

    fn region(poi: &str, band: usize, geometry: MultiPolygon<f64>) -> BandRegion {
        BandRegion {
            poi: PoiId::from(poi),
            band,
            geometry,
        }
    }

    fn settings(minutes: &[u32]) -> AnalysisSettings {
        AnalysisSettings {
            bands: BandSet::from_minutes(minutes),
            ..AnalysisSettings::default()
        }
    }

    fn area_of(outcome: &ResolveOutcome, poi: &str, band: usize) -> Option<f64> {
        outcome
            .regions
            .iter()
            .find(|r| r.tag == RegionTag::Band { poi: PoiId::from(poi), band })
            .map(|r| r.geometry.unsigned_area())
    }

    fn assert_pairwise_disjoint(regions: &[ResolvedRegion]) {
        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                let overlap = a.geometry.intersection(&b.geometry).unsigned_area();
                assert!(overlap < 1e-6, "{} and {} overlap by {}", a.tag, b.tag, overlap);
            }
        }
    }

    #[test]
    fn test_nested_bands_become_rings() {
        let regions = vec![
            region("a", 0, square(0.0, 0.0, 10.0)),
            region("a", 1, square(0.0, 0.0, 20.0)),
            region("a", 2, square(0.0, 0.0, 30.0)),
        ];

        let outcome = resolve_overlaps(&regions, &settings(&[10, 20, 30]));

        assert!(outcome.failures.is_empty());
        assert!((area_of(&outcome, "a", 0).unwrap() - 400.0).abs() < 1e-6);
        assert!((area_of(&outcome, "a", 1).unwrap() - (1600.0 - 400.0)).abs() < 1e-6);
        assert!((area_of(&outcome, "a", 2).unwrap() - (3600.0 - 1600.0)).abs() < 1e-6);
        assert_pairwise_disjoint(&outcome.regions);

        let union = geometry::union_all(outcome.regions.iter().map(|r| &r.geometry));
        assert!((union.unsigned_area() - 3600.0).abs() < 1e-6);
        assert_eq!(outcome.regions[1].interval, "10 - 20");
    }

    #[test]
    fn test_contained_poi_of_same_band_is_subsumed() {
        let regions = vec![region("a", 0, square(0.0, 0.0, 20.0)), region("b", 0, square(0.0, 0.0, 5.0))];

        let outcome = resolve_overlaps(&regions, &settings(&[10]));

        assert_eq!(outcome.regions.len(), 1);
        assert!((area_of(&outcome, "a", 0).unwrap() - 1600.0).abs() < 1e-6);
        assert!(area_of(&outcome, "b", 0).is_none());
    }

    #[test]
    fn test_faster_band_wins_across_pois() {
        // b's 10-minute zone overlaps a's 20-minute zone; the overlap goes to b.
        let regions = vec![
            region("a", 0, rect(0.0, 0.0, 10.0, 10.0)),
            region("a", 1, rect(0.0, 0.0, 20.0, 10.0)),
            region("b", 0, rect(15.0, 0.0, 25.0, 10.0)),
            region("b", 1, rect(15.0, 0.0, 35.0, 10.0)),
        ];

        let outcome = resolve_overlaps(&regions, &settings(&[10, 20]));

        assert!((area_of(&outcome, "a", 0).unwrap() - 100.0).abs() < 1e-6);
        assert!((area_of(&outcome, "b", 0).unwrap() - 100.0).abs() < 1e-6);
        assert!((area_of(&outcome, "a", 1).unwrap() - 50.0).abs() < 1e-6);
        assert!((area_of(&outcome, "b", 1).unwrap() - 100.0).abs() < 1e-6);
        assert_pairwise_disjoint(&outcome.regions);
    }

    #[test]
    fn test_tie_break_by_poi_name_ignores_input_order() {
        let regions = vec![region("zeta", 0, square(0.0, 0.0, 10.0)), region("alpha", 0, square(5.0, 0.0, 10.0))];

        let by_input = resolve_overlaps(&regions, &settings(&[10]));
        assert!((area_of(&by_input, "zeta", 0).unwrap() - 400.0).abs() < 1e-6);
        assert!((area_of(&by_input, "alpha", 0).unwrap() - 100.0).abs() < 1e-6);

        let by_name = resolve_overlaps(
            &regions,
            &AnalysisSettings {
                tie_break: TieBreak::PoiName,
                ..settings(&[10])
            },
        );
        assert!((area_of(&by_name, "alpha", 0).unwrap() - 400.0).abs() < 1e-6);
        assert!((area_of(&by_name, "zeta", 0).unwrap() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_band_stays_empty() {
        let regions = vec![
            region("a", 0, geometry::empty()),
            region("a", 1, square(0.0, 0.0, 20.0)),
        ];

        let outcome = resolve_overlaps(&regions, &settings(&[10, 20]));

        assert!(area_of(&outcome, "a", 0).is_none());
        assert!((area_of(&outcome, "a", 1).unwrap() - 1600.0).abs() < 1e-6);
    }

    #[test]
    fn test_failed_pair_does_not_stop_others() {
        let regions = vec![
            region("a", 0, square(0.0, 0.0, 10.0)),
            region("b", 0, square(f64::NAN, 0.0, 10.0)),
            region("c", 1, square(0.0, 0.0, 20.0)),
        ];

        let outcome = resolve_overlaps(&regions, &settings(&[10, 20]));

        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(
            &outcome.failures[0],
            ZoneError::GeometryResolution { poi, band: 0, .. } if poi == "b"
        ));
        assert!((area_of(&outcome, "c", 1).unwrap() - 1200.0).abs() < 1e-6);
    }

    #[test]
    fn test_slivers_are_dropped() {
        let regions = vec![
            region("a", 0, rect(0.0, 0.0, 10.0, 10.0)),
            region("a", 1, rect(0.0, 0.0, 10.000_1, 10.0)),
        ];

        let outcome = resolve_overlaps(&regions, &settings(&[10, 20]));

        assert!(area_of(&outcome, "a", 1).is_none());
    }

    #[test]
    fn test_resolving_resolved_output_is_idempotent() {
        let regions = vec![
            region("a", 0, square(0.0, 0.0, 10.0)),
            region("b", 0, square(12.0, 0.0, 10.0)),
            region("a", 1, square(0.0, 0.0, 25.0)),
            region("b", 1, square(12.0, 0.0, 25.0)),
        ];
        let config = settings(&[10, 20]);
        let first = resolve_overlaps(&regions, &config);

        let again: Vec<BandRegion> = first
            .regions
            .iter()
            .filter_map(|r| match &r.tag {
                RegionTag::Band { poi, band } => Some(BandRegion {
                    poi: poi.clone(),
                    band: *band,
                    geometry: r.geometry.clone(),
                }),
                RegionTag::Uncovered => None,
            })
            .collect();
        let second = resolve_overlaps(&again, &config);

        assert_eq!(first.regions.len(), second.regions.len());
        for (a, b) in first.regions.iter().zip(&second.regions) {
            assert_eq!(a.tag, b.tag);
            assert!((a.geometry.unsigned_area() - b.geometry.unsigned_area()).abs() < 1e-6);
            assert!(a.geometry.xor(&b.geometry).unsigned_area() < 1e-6);
        }
    }
}
