//! JSON scenario files: an AOI, POIs and the isochrones already fetched for
//! them, in one document.
//!
//! ```json
//! {
//!   "crs": "EPSG:4326",
//!   "aoi": { "polygons": [[[[36.7, -1.4], [36.9, -1.4], [36.9, -1.2], [36.7, -1.4]]]] },
//!   "pois": [{ "id": "clinic", "location": [36.8, -1.3] }],
//!   "isochrones": [
//!     { "poi": "clinic", "thresholds_seconds": [900, 1800], "bands": [[...], [...]] }
//!   ],
//!   "failures": [{ "poi": "depot", "reason": "routing timed out" }]
//! }
//! ```
//!
//! A top-level `crs` applies to every geometry that does not declare its
//! own.

use crate::adapters::memory::MemoryScenario;
use crate::domain::model::{Crs, IsochroneSet, PoiId, RawAoi, RawPoi};
use crate::domain::ports::{GeometryLoader, IsochroneSource};
use crate::geometry::{self, NestedPolygons};
use crate::utils::error::Result;
use async_trait::async_trait;
use geo::coord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDocument {
    #[serde(default)]
    pub crs: Option<Crs>,
    pub aoi: AoiEntry,
    #[serde(default)]
    pub pois: Vec<PoiEntry>,
    #[serde(default)]
    pub isochrones: Vec<IsochroneEntry>,
    #[serde(default)]
    pub failures: Vec<FailureEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AoiEntry {
    #[serde(default)]
    pub crs: Option<Crs>,
    pub polygons: NestedPolygons,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoiEntry {
    pub id: String,
    pub location: [f64; 2],
    #[serde(default)]
    pub crs: Option<Crs>,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsochroneEntry {
    pub poi: String,
    #[serde(default)]
    pub crs: Option<Crs>,
    /// Threshold of each entry in `bands`; when absent the bands are
    /// assumed to match the configured thresholds one to one.
    #[serde(default)]
    pub thresholds_seconds: Option<Vec<u32>>,
    pub bands: Vec<NestedPolygons>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEntry {
    pub poi: String,
    pub reason: String,
}

impl ScenarioDocument {
    pub fn into_scenario(self) -> MemoryScenario {
        let default_crs = self.crs;
        let mut scenario = MemoryScenario::new(RawAoi {
            crs: self.aoi.crs.or(default_crs),
            geometry: geometry::from_nested(&self.aoi.polygons),
        });

        let mut isochrones: HashMap<String, IsochroneEntry> = HashMap::new();
        for entry in self.isochrones {
            if isochrones.contains_key(&entry.poi) {
                tracing::warn!("Scenario lists isochrones for '{}' twice; keeping the first", entry.poi);
                continue;
            }
            isochrones.insert(entry.poi.clone(), entry);
        }
        let failures: HashMap<String, String> = self
            .failures
            .into_iter()
            .map(|f| (f.poi, f.reason))
            .collect();

        let known: HashSet<&str> = self.pois.iter().map(|p| p.id.as_str()).collect();
        for orphan in isochrones.keys().filter(|id| !known.contains(id.as_str())) {
            tracing::warn!("Scenario has isochrones for unknown POI '{}'", orphan);
        }

        for entry in self.pois {
            let poi = RawPoi {
                id: PoiId(entry.id.clone()),
                location: coord! { x: entry.location[0], y: entry.location[1] },
                crs: entry.crs.or(default_crs),
                properties: entry.properties,
            };

            scenario = if let Some(reason) = failures.get(&entry.id) {
                scenario.with_failing_poi(poi, reason.clone())
            } else if let Some(cached) = isochrones.remove(&entry.id) {
                let set = IsochroneSet {
                    crs: cached.crs.or(default_crs),
                    bands: cached.bands.iter().map(geometry::from_nested).collect(),
                };
                match cached.thresholds_seconds {
                    Some(thresholds) if thresholds.len() != set.bands.len() => scenario.with_failing_poi(
                        poi,
                        format!(
                            "scenario lists {} thresholds but {} band geometries",
                            thresholds.len(),
                            set.bands.len()
                        ),
                    ),
                    Some(thresholds) => scenario.with_cached_poi(poi, thresholds, set),
                    None => scenario.with_poi(poi, set),
                }
            } else {
                scenario.with_bare_poi(poi)
            };
        }

        scenario
    }
}

/// Scenario file acting as both the AOI/POI loader and the isochrone
/// source.
#[derive(Debug, Clone)]
pub struct ScenarioFile {
    scenario: Arc<MemoryScenario>,
}

impl ScenarioFile {
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        tracing::debug!("Reading scenario from {}", path.as_ref().display());
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let document: ScenarioDocument = serde_json::from_str(content)?;
        Ok(Self::from_document(document))
    }

    pub fn from_document(document: ScenarioDocument) -> Self {
        Self {
            scenario: Arc::new(document.into_scenario()),
        }
    }

    pub fn poi_count(&self) -> usize {
        self.scenario.pois().len()
    }
}

#[async_trait]
impl GeometryLoader for ScenarioFile {
    async fn load_aoi(&self) -> Result<RawAoi> {
        self.scenario.load_aoi().await
    }

    async fn load_pois(&self) -> Result<Vec<RawPoi>> {
        self.scenario.load_pois().await
    }
}

#[async_trait]
impl IsochroneSource for ScenarioFile {
    async fn fetch(&self, poi: &RawPoi, thresholds_seconds: &[u32]) -> Result<IsochroneSet> {
        self.scenario.fetch(poi, thresholds_seconds).await
    }
}
