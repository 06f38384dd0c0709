use crate::domain::model::{IsochroneSet, PoiId, RawAoi, RawPoi};
use crate::domain::ports::{GeometryLoader, IsochroneSource, PopulationRasterSource};
use crate::domain::raster::RasterGrid;
use crate::utils::error::{Result, ZoneError};
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum CachedIsochrones {
    /// `thresholds_seconds` lists which threshold each band was computed
    /// for; without it the bands are handed out as stored.
    Available {
        thresholds_seconds: Option<Vec<u32>>,
        set: IsochroneSet,
    },
    Failed(String),
}

/// Inputs held in memory: an AOI, POIs in supply order and whatever the
/// isochrone collaborator returned for each of them.
#[derive(Debug, Clone)]
pub struct MemoryScenario {
    aoi: RawAoi,
    pois: Vec<RawPoi>,
    isochrones: HashMap<PoiId, CachedIsochrones>,
}

impl MemoryScenario {
    pub fn new(aoi: RawAoi) -> Self {
        Self {
            aoi,
            pois: Vec::new(),
            isochrones: HashMap::new(),
        }
    }

    pub fn with_poi(mut self, poi: RawPoi, isochrones: IsochroneSet) -> Self {
        self.isochrones.insert(
            poi.id.clone(),
            CachedIsochrones::Available {
                thresholds_seconds: None,
                set: isochrones,
            },
        );
        self.pois.push(poi);
        self
    }

    /// Like `with_poi`, for bands computed at known thresholds. Requests
    /// for a subset of those thresholds are answered from the cache.
    pub fn with_cached_poi(mut self, poi: RawPoi, thresholds_seconds: Vec<u32>, isochrones: IsochroneSet) -> Self {
        self.isochrones.insert(
            poi.id.clone(),
            CachedIsochrones::Available {
                thresholds_seconds: Some(thresholds_seconds),
                set: isochrones,
            },
        );
        self.pois.push(poi);
        self
    }

    pub fn with_failing_poi(mut self, poi: RawPoi, reason: impl Into<String>) -> Self {
        self.isochrones
            .insert(poi.id.clone(), CachedIsochrones::Failed(reason.into()));
        self.pois.push(poi);
        self
    }

    /// A POI the collaborator never produced anything for.
    pub fn with_bare_poi(mut self, poi: RawPoi) -> Self {
        self.pois.push(poi);
        self
    }

    pub fn pois(&self) -> &[RawPoi] {
        &self.pois
    }
}

#[async_trait]
impl GeometryLoader for MemoryScenario {
    async fn load_aoi(&self) -> Result<RawAoi> {
        Ok(self.aoi.clone())
    }

    async fn load_pois(&self) -> Result<Vec<RawPoi>> {
        Ok(self.pois.clone())
    }
}

#[async_trait]
impl IsochroneSource for MemoryScenario {
    async fn fetch(&self, poi: &RawPoi, thresholds_seconds: &[u32]) -> Result<IsochroneSet> {
        let unavailable = |reason: String| ZoneError::IsochroneUnavailable {
            poi: poi.id.to_string(),
            reason,
        };

        match self.isochrones.get(&poi.id) {
            None => Err(unavailable("no isochrones available".to_string())),
            Some(CachedIsochrones::Failed(reason)) => Err(unavailable(reason.clone())),
            Some(CachedIsochrones::Available {
                thresholds_seconds: None,
                set,
            }) => Ok(set.clone()),
            Some(CachedIsochrones::Available {
                thresholds_seconds: Some(cached),
                set,
            }) => {
                let bands = thresholds_seconds
                    .iter()
                    .map(|requested| {
                        cached
                            .iter()
                            .position(|t| t == requested)
                            .and_then(|i| set.bands.get(i).cloned())
                            .ok_or_else(|| unavailable(format!("no isochrone for {} s", requested)))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(IsochroneSet { crs: set.crs, bands })
            }
        }
    }
}

/// Population rasters held in memory, keyed by category.
#[derive(Debug, Clone, Default)]
pub struct MemoryRasterSource {
    rasters: HashMap<String, Vec<RasterGrid>>,
    failures: HashMap<String, String>,
}

impl MemoryRasterSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one tile for `key`; repeated calls add more tiles.
    pub fn with_raster(mut self, key: &str, raster: RasterGrid) -> Self {
        self.rasters.entry(key.to_string()).or_default().push(raster);
        self
    }

    pub fn with_failure(mut self, key: &str, reason: impl Into<String>) -> Self {
        self.failures.insert(key.to_string(), reason.into());
        self
    }
}

impl PopulationRasterSource for MemoryRasterSource {
    fn load(&self, key: &str) -> Result<Vec<RasterGrid>> {
        if let Some(reason) = self.failures.get(key) {
            return Err(ZoneError::PopulationData {
                category: key.to_string(),
                reason: reason.clone(),
            });
        }
        self.rasters
            .get(key)
            .cloned()
            .ok_or_else(|| ZoneError::PopulationData {
                category: key.to_string(),
                reason: "no raster for this category".to_string(),
            })
    }
}
