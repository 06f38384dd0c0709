use crate::domain::model::{Crs, ExtractedInputs, IsochroneSet, RawAoi, RawPoi, ZoneAnalysis};
use crate::domain::raster::RasterGrid;
use crate::domain::settings::AnalysisSettings;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn analysis_settings(&self) -> AnalysisSettings;
    fn scenario_path(&self) -> &str;
    /// Directory of population rasters; `None` skips aggregation.
    fn raster_dir(&self) -> Option<&str>;
    fn raster_crs(&self) -> Crs;
    fn output_path(&self) -> &str;
    fn summary_filename(&self) -> &str;
    fn report_filename(&self) -> &str;
}

/// Supplies the AOI and POIs with their declared CRS.
#[async_trait]
pub trait GeometryLoader: Send + Sync {
    async fn load_aoi(&self) -> Result<RawAoi>;
    async fn load_pois(&self) -> Result<Vec<RawPoi>>;
}

/// Produces isochrones for one POI: one geometry per threshold, in the
/// order requested, or a typed failure for that POI.
#[async_trait]
pub trait IsochroneSource: Send + Sync {
    async fn fetch(&self, poi: &RawPoi, thresholds_seconds: &[u32]) -> Result<IsochroneSet>;
}

/// Population rasters addressed by category key. A key may be split into
/// several tiles.
pub trait PopulationRasterSource: Send + Sync {
    fn load(&self, key: &str) -> Result<Vec<RasterGrid>>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<ExtractedInputs>;
    async fn transform(&self, inputs: ExtractedInputs) -> Result<ZoneAnalysis>;
    async fn load(&self, analysis: ZoneAnalysis) -> Result<String>;
}
