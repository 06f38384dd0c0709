use crate::domain::report::ErrorReport;
use crate::geometry::projection::Projection;
use crate::utils::monitor::StageTimings;
use geo::{Coord, MultiPolygon};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Declared coordinate reference system of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crs {
    /// EPSG:4326, longitude/latitude in degrees.
    Wgs84,
    /// Any projected system with linear units, by EPSG code.
    Projected(u32),
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Wgs84 => write!(f, "EPSG:4326"),
            Crs::Projected(code) => write!(f, "EPSG:{}", code),
        }
    }
}

impl FromStr for Crs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code = trimmed
            .strip_prefix("EPSG:")
            .or_else(|| trimmed.strip_prefix("epsg:"))
            .ok_or_else(|| format!("expected 'EPSG:<code>', got '{}'", trimmed))?;
        let code: u32 = code
            .parse()
            .map_err(|_| format!("invalid EPSG code in '{}'", trimmed))?;
        Ok(match code {
            4326 => Crs::Wgs84,
            other => Crs::Projected(other),
        })
    }
}

impl Serialize for Crs {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Crs {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoiId(pub String);

impl fmt::Display for PoiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PoiId {
    fn from(value: &str) -> Self {
        PoiId(value.to_string())
    }
}

/// A POI as supplied by the loader, before normalization.
#[derive(Debug, Clone)]
pub struct RawPoi {
    pub id: PoiId,
    pub location: Coord<f64>,
    pub crs: Option<Crs>,
    pub properties: HashMap<String, serde_json::Value>,
}

/// AOI polygons as supplied by the loader, before normalization.
#[derive(Debug, Clone)]
pub struct RawAoi {
    pub crs: Option<Crs>,
    pub geometry: MultiPolygon<f64>,
}

/// One geometry per requested threshold, in the order requested.
#[derive(Debug, Clone)]
pub struct IsochroneSet {
    pub crs: Option<Crs>,
    pub bands: Vec<MultiPolygon<f64>>,
}

/// A POI in the working CRS. `source` keeps the record it came from.
#[derive(Debug, Clone)]
pub struct Poi {
    pub id: PoiId,
    pub location: Coord<f64>,
    pub source: RawPoi,
}

#[derive(Debug, Clone)]
pub struct AreaOfInterest {
    pub geometry: MultiPolygon<f64>,
}

/// Travel-time thresholds in seconds, strictly ascending. A band's index is
/// its position here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandSet {
    thresholds_seconds: Vec<u32>,
}

impl BandSet {
    pub fn from_seconds(thresholds_seconds: Vec<u32>) -> Self {
        Self { thresholds_seconds }
    }

    pub fn from_minutes(minutes: &[u32]) -> Self {
        Self {
            thresholds_seconds: minutes.iter().map(|m| m * 60).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.thresholds_seconds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds_seconds.is_empty()
    }

    pub fn thresholds_seconds(&self) -> &[u32] {
        &self.thresholds_seconds
    }

    fn minutes(&self, band: usize) -> u32 {
        self.thresholds_seconds[band] / 60
    }

    /// Interval label of a band in minutes, e.g. `"0 - 15"` or `"15 - 30"`.
    pub fn interval_label(&self, band: usize) -> String {
        if band >= self.len() {
            return format!("band {}", band);
        }
        let lower = if band == 0 { 0 } else { self.minutes(band - 1) };
        format!("{} - {}", lower, self.minutes(band))
    }

    /// Label for whatever lies beyond the outermost band, e.g. `"> 60"`.
    pub fn uncovered_label(&self) -> String {
        match self.thresholds_seconds.last() {
            Some(last) => format!("> {}", last / 60),
            None => "uncovered".to_string(),
        }
    }
}

impl Default for BandSet {
    fn default() -> Self {
        Self::from_seconds(vec![900, 1800, 2700, 3600])
    }
}

/// Raw isochrone polygon for one POI and one band, in the working CRS.
#[derive(Debug, Clone)]
pub struct IsochroneRing {
    pub poi: PoiId,
    pub band: usize,
    pub geometry: MultiPolygon<f64>,
}

/// Union of all rings of one POI and band. May be empty.
#[derive(Debug, Clone)]
pub struct BandRegion {
    pub poi: PoiId,
    pub band: usize,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionTag {
    Band { poi: PoiId, band: usize },
    Uncovered,
}

impl RegionTag {
    pub fn poi(&self) -> Option<&PoiId> {
        match self {
            RegionTag::Band { poi, .. } => Some(poi),
            RegionTag::Uncovered => None,
        }
    }

    pub fn band(&self) -> Option<usize> {
        match self {
            RegionTag::Band { band, .. } => Some(*band),
            RegionTag::Uncovered => None,
        }
    }
}

impl fmt::Display for RegionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionTag::Band { poi, band } => write!(f, "{}/band {}", poi, band),
            RegionTag::Uncovered => write!(f, "uncovered"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedRegion {
    pub tag: RegionTag,
    pub interval: String,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PopulationValue {
    Available { value: f64 },
    Unavailable { reason: String },
}

impl PopulationValue {
    pub fn available(value: f64) -> Self {
        PopulationValue::Available { value }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            PopulationValue::Available { value } => Some(*value),
            PopulationValue::Unavailable { .. } => None,
        }
    }
}

/// How far the category totals drift from the aggregate total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Additivity {
    pub category_sum: f64,
    pub delta: f64,
    pub relative_delta: f64,
    pub within_tolerance: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionPopulationSummary {
    pub tag: RegionTag,
    pub total: PopulationValue,
    pub categories: BTreeMap<String, PopulationValue>,
    pub additivity: Option<Additivity>,
    pub nodata_coverage: f64,
}

#[derive(Debug, Clone)]
pub struct ZoneRecord {
    pub region: ResolvedRegion,
    pub area_m2: f64,
    pub population: Option<RegionPopulationSummary>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoiCoverage {
    pub inside_aoi: usize,
    pub outside_aoi: usize,
}

/// Output of the extract stage.
#[derive(Debug, Clone)]
pub struct ExtractedInputs {
    pub projection: Projection,
    pub aoi: AreaOfInterest,
    pub pois: Vec<Poi>,
    pub rings: Vec<IsochroneRing>,
    pub poi_coverage: PoiCoverage,
    pub report: ErrorReport,
    pub timings: StageTimings,
}

/// The result batch handed to the result consumer.
#[derive(Debug, Clone)]
pub struct ZoneAnalysis {
    pub run_id: String,
    pub projection: Projection,
    pub bands: BandSet,
    pub zones: Vec<ZoneRecord>,
    pub poi_coverage: PoiCoverage,
    pub report: ErrorReport,
    pub timings: StageTimings,
}

impl ZoneAnalysis {
    pub fn zone(&self, tag: &RegionTag) -> Option<&ZoneRecord> {
        self.zones.iter().find(|z| &z.region.tag == tag)
    }

    pub fn uncovered(&self) -> Option<&ZoneRecord> {
        self.zone(&RegionTag::Uncovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_parse_and_display() {
        assert_eq!("EPSG:4326".parse::<Crs>().unwrap(), Crs::Wgs84);
        assert_eq!("epsg:32633".parse::<Crs>().unwrap(), Crs::Projected(32633));
        assert_eq!(Crs::Projected(3035).to_string(), "EPSG:3035");
        assert!("WGS84".parse::<Crs>().is_err());
        assert!("EPSG:abc".parse::<Crs>().is_err());
    }

    #[test]
    fn test_band_labels_follow_minutes() {
        let bands = BandSet::default();
        assert_eq!(bands.interval_label(0), "0 - 15");
        assert_eq!(bands.interval_label(1), "15 - 30");
        assert_eq!(bands.interval_label(3), "45 - 60");
        assert_eq!(bands.uncovered_label(), "> 60");
    }

    #[test]
    fn test_band_set_from_minutes() {
        let bands = BandSet::from_minutes(&[10, 20, 30]);
        assert_eq!(bands.thresholds_seconds(), &[600, 1200, 1800]);
        assert_eq!(bands.len(), 3);
    }
}
