use crate::core::dissolve::dissolve_all;
use crate::core::fill::fill_gaps;
use crate::core::normalize::{choose_projection, normalize_aoi, normalize_isochrones, normalize_pois};
use crate::core::population::aggregate_population;
use crate::core::resolve::resolve_overlaps;
use crate::domain::model::{
    ExtractedInputs, PoiCoverage, PopulationValue, RegionPopulationSummary, RegionTag, ZoneAnalysis,
    ZoneRecord,
};
use crate::domain::ports::{
    ConfigProvider, GeometryLoader, IsochroneSource, Pipeline, PopulationRasterSource, Storage,
};
use crate::domain::raster::RasterGrid;
use crate::domain::report::{ErrorReport, Stage};
use crate::domain::settings::AnalysisSettings;
use crate::geometry::{self, NestedPolygons};
use crate::utils::error::{Result, ZoneError};
use crate::utils::monitor::StageTimings;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

/// Stands in when population is enabled without rasters, so every
/// requested key is reported unavailable instead of silently skipped.
struct NoRasterSource;

impl PopulationRasterSource for NoRasterSource {
    fn load(&self, key: &str) -> Result<Vec<RasterGrid>> {
        Err(ZoneError::PopulationData {
            category: key.to_string(),
            reason: "no population raster source is configured".to_string(),
        })
    }
}

/// Runs dissolve, resolve, fill and, when population is enabled,
/// aggregation over already-normalized inputs. Without a raster source
/// every requested key is reported as a `PopulationData` failure.
pub fn run_analysis(
    inputs: ExtractedInputs,
    rasters: Option<&dyn PopulationRasterSource>,
    settings: &AnalysisSettings,
) -> ZoneAnalysis {
    let ExtractedInputs {
        projection,
        aoi,
        pois,
        rings,
        poi_coverage,
        mut report,
        mut timings,
    } = inputs;

    let band_regions = timings.time("dissolve", || dissolve_all(&pois, &rings, &settings.bands));
    tracing::debug!("Dissolved {} rings into {} band regions", rings.len(), band_regions.len());

    let outcome = timings.time("resolve", || resolve_overlaps(&band_regions, settings));
    report.record_all(Stage::Resolve, &outcome.failures);

    let regions = timings.time("fill", || {
        fill_gaps(&aoi, outcome.regions, &settings.bands, settings.min_area_m2)
    });

    let populations: Vec<Option<RegionPopulationSummary>> = if settings.population.enabled {
        let source: &dyn PopulationRasterSource = match rasters {
            Some(source) => source,
            None => {
                tracing::warn!("⚠️ Population requested but no raster source is configured");
                &NoRasterSource
            }
        };
        let (summaries, failures) = timings.time("aggregate", || {
            aggregate_population(&regions, source, &projection, &settings.population)
        });
        report.record_all(Stage::Aggregate, &failures);
        summaries.into_iter().map(Some).collect()
    } else {
        tracing::debug!("Population aggregation disabled");
        vec![None; regions.len()]
    };

    let zones: Vec<ZoneRecord> = regions
        .into_iter()
        .zip(populations)
        .map(|(region, population)| ZoneRecord {
            area_m2: geometry::area(&region.geometry),
            region,
            population,
        })
        .collect();

    ZoneAnalysis {
        run_id: Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string(),
        projection,
        bands: settings.bands.clone(),
        zones,
        poi_coverage,
        report,
        timings,
    }
}

pub struct ZonePipeline<S: Storage, C: ConfigProvider, L: GeometryLoader, I: IsochroneSource> {
    storage: S,
    config: C,
    loader: L,
    isochrones: I,
    rasters: Option<Box<dyn PopulationRasterSource>>,
    settings: AnalysisSettings,
}

impl<S, C, L, I> ZonePipeline<S, C, L, I>
where
    S: Storage,
    C: ConfigProvider,
    L: GeometryLoader,
    I: IsochroneSource,
{
    pub fn new(storage: S, config: C, loader: L, isochrones: I) -> Self {
        let settings = config.analysis_settings();
        Self {
            storage,
            config,
            loader,
            isochrones,
            rasters: None,
            settings,
        }
    }

    pub fn with_rasters(mut self, rasters: impl PopulationRasterSource + 'static) -> Self {
        self.rasters = Some(Box::new(rasters));
        self
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    fn summary_csv(&self, analysis: &ZoneAnalysis) -> Result<Vec<u8>> {
        let categories = &self.settings.population.categories;
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec!["region", "poi", "band", "interval", "area_m2", "population"];
        header.extend(categories.iter().map(String::as_str));
        header.extend(["category_delta", "nodata_coverage"]);
        writer.write_record(&header)?;

        let cell = |value: Option<&PopulationValue>| {
            value
                .and_then(PopulationValue::value)
                .map(|v| format!("{:.3}", v))
                .unwrap_or_default()
        };

        for zone in &analysis.zones {
            let tag = &zone.region.tag;
            let population = zone.population.as_ref();

            let mut row = vec![
                tag.to_string(),
                tag.poi().map(ToString::to_string).unwrap_or_default(),
                tag.band().map(|b| b.to_string()).unwrap_or_default(),
                zone.region.interval.clone(),
                format!("{:.2}", zone.area_m2),
                cell(population.map(|p| &p.total)),
            ];
            row.extend(
                categories
                    .iter()
                    .map(|c| cell(population.and_then(|p| p.categories.get(c)))),
            );
            row.push(
                population
                    .and_then(|p| p.additivity.as_ref())
                    .map(|a| format!("{:.3}", a.delta))
                    .unwrap_or_default(),
            );
            row.push(
                population
                    .map(|p| format!("{:.4}", p.nodata_coverage))
                    .unwrap_or_default(),
            );
            writer.write_record(&row)?;
        }

        writer.into_inner().map_err(|e| ZoneError::ProcessingError {
            message: format!("Failed to finish CSV summary: {}", e),
        })
    }
}

#[derive(Serialize)]
struct RegionEntry<'a> {
    #[serde(flatten)]
    tag: &'a RegionTag,
    interval: &'a str,
    area_m2: f64,
    population: Option<&'a RegionPopulationSummary>,
    coordinates: NestedPolygons,
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    run_id: &'a str,
    generated_at: DateTime<Utc>,
    working_crs: String,
    thresholds_seconds: &'a [u32],
    poi_coverage: &'a PoiCoverage,
    regions: Vec<RegionEntry<'a>>,
    errors: &'a ErrorReport,
    timings: &'a StageTimings,
}

impl<'a> ReportDocument<'a> {
    fn new(analysis: &'a ZoneAnalysis) -> Self {
        Self {
            run_id: &analysis.run_id,
            generated_at: Utc::now(),
            working_crs: analysis.projection.label(),
            thresholds_seconds: analysis.bands.thresholds_seconds(),
            poi_coverage: &analysis.poi_coverage,
            regions: analysis
                .zones
                .iter()
                .map(|zone| RegionEntry {
                    tag: &zone.region.tag,
                    interval: &zone.region.interval,
                    area_m2: zone.area_m2,
                    population: zone.population.as_ref(),
                    coordinates: geometry::to_nested(&zone.region.geometry),
                })
                .collect(),
            errors: &analysis.report,
            timings: &analysis.timings,
        }
    }
}

#[async_trait::async_trait]
impl<S, C, L, I> Pipeline for ZonePipeline<S, C, L, I>
where
    S: Storage,
    C: ConfigProvider,
    L: GeometryLoader,
    I: IsochroneSource,
{
    async fn extract(&self) -> Result<ExtractedInputs> {
        let mut timings = StageTimings::new();
        let mut report = ErrorReport::new();

        let start = Instant::now();
        let raw_aoi = self.loader.load_aoi().await?;
        let raw_pois = self.loader.load_pois().await?;

        let projection = choose_projection(&raw_aoi, self.settings.projection)?;
        tracing::info!("Working CRS: {}", projection.label());

        let aoi = normalize_aoi(&raw_aoi, &projection)?;
        let (pois, poi_coverage, failures) = normalize_pois(&raw_pois, &projection, &aoi);
        report.record_all(Stage::Normalize, &failures);
        tracing::info!(
            "📍 {} POIs usable ({} inside the AOI, {} outside)",
            pois.len(),
            poi_coverage.inside_aoi,
            poi_coverage.outside_aoi
        );
        timings.record("normalize", start.elapsed());

        let start = Instant::now();
        let thresholds = self.settings.bands.thresholds_seconds();
        let mut rings = Vec::new();
        for poi in &pois {
            tracing::debug!("Fetching isochrones for '{}'", poi.id);
            match self.isochrones.fetch(&poi.source, thresholds).await {
                Ok(set) => {
                    let (poi_rings, failures) =
                        normalize_isochrones(poi, &set, &self.settings.bands, &projection);
                    report.record_all(Stage::Fetch, &failures);
                    rings.extend(poi_rings);
                }
                Err(e @ ZoneError::IsochroneUnavailable { .. }) => report.record(Stage::Fetch, &e),
                Err(e) => report.record(
                    Stage::Fetch,
                    &ZoneError::IsochroneUnavailable {
                        poi: poi.id.to_string(),
                        reason: e.to_string(),
                    },
                ),
            }
        }
        timings.record("fetch", start.elapsed());

        Ok(ExtractedInputs {
            projection,
            aoi,
            pois,
            rings,
            poi_coverage,
            report,
            timings,
        })
    }

    async fn transform(&self, inputs: ExtractedInputs) -> Result<ZoneAnalysis> {
        Ok(run_analysis(inputs, self.rasters.as_deref(), &self.settings))
    }

    async fn load(&self, analysis: ZoneAnalysis) -> Result<String> {
        let summary = self.summary_csv(&analysis)?;
        tracing::debug!("Writing summary ({} bytes)", summary.len());
        self.storage
            .write_file(self.config.summary_filename(), &summary)
            .await?;

        let document = serde_json::to_vec_pretty(&ReportDocument::new(&analysis))?;
        tracing::debug!("Writing report ({} bytes)", document.len());
        self.storage
            .write_file(self.config.report_filename(), &document)
            .await?;

        tracing::info!(
            "⏱️ {} zones computed in {} ms",
            analysis.zones.len(),
            analysis.timings.total_millis()
        );
        if !analysis.report.is_empty() {
            tracing::warn!(
                "⚠️ {} item(s) failed; see '{}' for details",
                analysis.report.len(),
                self.config.report_filename()
            );
        }

        Ok(self.config.output_path().to_string())
    }
}
