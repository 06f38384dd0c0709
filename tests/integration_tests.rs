use geo::{coord, Area, BooleanOps, MultiPolygon, Rect};
use proximity_zones::adapters::{AsciiGridDirectory, MemoryRasterSource, MemoryScenario, ScenarioFile};
use proximity_zones::core::{ConfigProvider, Pipeline};
use proximity_zones::domain::model::{
    Crs, IsochroneSet, PoiId, RawAoi, RawPoi, RegionTag, ZoneAnalysis,
};
use proximity_zones::domain::raster::RasterGrid;
use proximity_zones::geometry;
use proximity_zones::{LocalStorage, TomlConfig, ZoneEngine, ZonePipeline};
use std::collections::HashMap;
use tempfile::TempDir;

const UTM: Crs = Crs::Projected(32633);

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()])
}

fn square(cx: f64, cy: f64, half: f64) -> MultiPolygon<f64> {
    rect(cx - half, cy - half, cx + half, cy + half)
}

fn poi(name: &str, x: f64, y: f64, crs: Crs) -> RawPoi {
    RawPoi {
        id: PoiId::from(name),
        location: coord! { x: x, y: y },
        crs: Some(crs),
        properties: HashMap::new(),
    }
}

fn rings(crs: Crs, bands: Vec<MultiPolygon<f64>>) -> IsochroneSet {
    IsochroneSet { crs: Some(crs), bands }
}

fn config(toml: &str, output: &TempDir) -> TomlConfig {
    let mut config = TomlConfig::from_toml_str(toml).unwrap();
    config.output.path = output.path().display().to_string();
    config
}

fn band(poi: &str, band: usize) -> RegionTag {
    RegionTag::Band {
        poi: PoiId::from(poi),
        band,
    }
}

fn area_of(analysis: &ZoneAnalysis, tag: &RegionTag) -> Option<f64> {
    analysis.zone(tag).map(|z| z.area_m2)
}

fn assert_tiles(analysis: &ZoneAnalysis, aoi_area: f64, tolerance: f64) {
    let total: f64 = analysis.zones.iter().map(|z| z.area_m2).sum();
    assert!(
        (total - aoi_area).abs() <= tolerance,
        "regions cover {} of {}",
        total,
        aoi_area
    );

    for (i, a) in analysis.zones.iter().enumerate() {
        for b in &analysis.zones[i + 1..] {
            let overlap = a.region.geometry.intersection(&b.region.geometry).unsigned_area();
            assert!(
                overlap <= tolerance,
                "{} and {} overlap by {}",
                a.region.tag,
                b.region.tag,
                overlap
            );
        }
    }
}

async fn analyse(
    scenario: MemoryScenario,
    config: TomlConfig,
    output: &TempDir,
    rasters: Option<MemoryRasterSource>,
) -> ZoneAnalysis {
    let mut pipeline = ZonePipeline::new(LocalStorage::new(output.path()), config, scenario.clone(), scenario);
    if let Some(rasters) = rasters {
        pipeline = pipeline.with_rasters(rasters);
    }
    let inputs = pipeline.extract().await.unwrap();
    pipeline.transform(inputs).await.unwrap()
}

#[tokio::test]
async fn test_contained_ring_of_second_poi_is_subsumed() {
    let output = TempDir::new().unwrap();
    let scenario = MemoryScenario::new(RawAoi {
        crs: Some(UTM),
        geometry: square(0.0, 0.0, 1_000.0),
    })
    .with_poi(poi("a", 0.0, 0.0, UTM), rings(UTM, vec![square(0.0, 0.0, 300.0)]))
    .with_poi(poi("b", 50.0, 0.0, UTM), rings(UTM, vec![square(50.0, 0.0, 100.0)]));

    let analysis = analyse(
        scenario,
        config("[bands]\nthresholds_minutes = [10]\n[population]\nenabled = false\n", &output),
        &output,
        None,
    )
    .await;

    assert!(analysis.zone(&band("b", 0)).is_none());
    assert!((area_of(&analysis, &band("a", 0)).unwrap() - 360_000.0).abs() < 1e-6);
    assert!(analysis.report.is_empty());
    assert_tiles(&analysis, 4_000_000.0, 1e-3);
}

#[tokio::test]
async fn test_nested_rings_become_disjoint_annuli() {
    let output = TempDir::new().unwrap();
    let ring_10 = square(0.0, 0.0, 100.0);
    let ring_20 = square(0.0, 0.0, 200.0);
    let ring_30 = square(0.0, 0.0, 300.0);
    let scenario = MemoryScenario::new(RawAoi {
        crs: Some(UTM),
        geometry: ring_30.clone(),
    })
    .with_poi(
        poi("clinic", 0.0, 0.0, UTM),
        rings(UTM, vec![ring_10.clone(), ring_20.clone(), ring_30.clone()]),
    );

    let analysis = analyse(
        scenario,
        config("[bands]\nthresholds_minutes = [10, 20, 30]\n[population]\nenabled = false\n", &output),
        &output,
        None,
    )
    .await;

    let fast = analysis.zone(&band("clinic", 0)).unwrap();
    let middle = analysis.zone(&band("clinic", 1)).unwrap();
    let slow = analysis.zone(&band("clinic", 2)).unwrap();

    assert!((fast.area_m2 - ring_10.unsigned_area()).abs() < 1e-6);
    assert!((middle.area_m2 - ring_20.difference(&ring_10).unsigned_area()).abs() < 1e-6);
    assert!((slow.area_m2 - ring_30.difference(&ring_20).unsigned_area()).abs() < 1e-6);
    assert_eq!(fast.region.interval, "0 - 10");
    assert_eq!(slow.region.interval, "20 - 30");

    // The AOI is exactly the outer ring, so nothing is left uncovered.
    assert!(analysis.uncovered().is_none());
    assert_tiles(&analysis, ring_30.unsigned_area(), 1e-3);
}

#[tokio::test]
async fn test_aoi_beyond_isochrones_gets_one_uncovered_region() {
    let output = TempDir::new().unwrap();
    let scenario = MemoryScenario::new(RawAoi {
        crs: Some(UTM),
        geometry: square(0.0, 0.0, 1_000.0),
    })
    .with_poi(
        poi("north", 0.0, 400.0, UTM),
        rings(UTM, vec![square(0.0, 400.0, 150.0), square(0.0, 400.0, 250.0)]),
    )
    .with_poi(
        poi("south", 0.0, -300.0, UTM),
        rings(UTM, vec![square(0.0, -300.0, 150.0), square(0.0, -300.0, 250.0)]),
    );

    let analysis = analyse(
        scenario,
        config("[bands]\nthresholds_minutes = [15, 30]\n[population]\nenabled = false\n", &output),
        &output,
        None,
    )
    .await;

    let uncovered: Vec<_> = analysis
        .zones
        .iter()
        .filter(|z| z.region.tag == RegionTag::Uncovered)
        .collect();
    assert_eq!(uncovered.len(), 1);
    assert_eq!(uncovered[0].region.interval, "> 30");

    let union = geometry::union_all([&square(0.0, 400.0, 250.0), &square(0.0, -300.0, 250.0)]);
    let expected = 4_000_000.0 - union.unsigned_area();
    assert!((uncovered[0].area_m2 - expected).abs() < 1e-3);
    assert_tiles(&analysis, 4_000_000.0, 1e-3);
}

#[tokio::test]
async fn test_nodata_cells_are_left_out_of_region_sums() {
    let output = TempDir::new().unwrap();
    let scenario = MemoryScenario::new(RawAoi {
        crs: Some(UTM),
        geometry: square(0.0, 0.0, 1_000.0),
    })
    .with_poi(poi("clinic", 0.0, 0.0, UTM), rings(UTM, vec![square(0.0, 0.0, 200.0)]));

    // 100 m cells over the AOI; the western half is no-data.
    let values = (0..20)
        .flat_map(|_| (0..20).map(|col| if col < 10 { -9999.0 } else { 10.0 }))
        .collect();
    let raster = RasterGrid {
        origin: coord! { x: -1_000.0, y: 1_000.0 },
        cell_width: 100.0,
        cell_height: 100.0,
        cols: 20,
        rows: 20,
        values,
        nodata: Some(-9999.0),
        crs: UTM,
    };

    let analysis = analyse(
        scenario,
        config("[bands]\nthresholds_minutes = [10]\n", &output),
        &output,
        Some(MemoryRasterSource::new().with_raster("total", raster)),
    )
    .await;

    let clinic = analysis.zone(&band("clinic", 0)).unwrap();
    let population = clinic.population.as_ref().unwrap();
    assert!((population.total.value().unwrap() - 80.0).abs() < 1e-6);
    assert!((population.nodata_coverage - 0.5).abs() < 1e-6);

    let uncovered = analysis.uncovered().unwrap().population.as_ref().unwrap();
    assert!((uncovered.total.value().unwrap() - 1_920.0).abs() < 1e-6);
    assert_eq!(analysis.report.count_kind("PopulationDataError"), 0);
}

#[tokio::test]
async fn test_geographic_inputs_are_measured_in_square_metres() {
    let output = TempDir::new().unwrap();
    let scenario = MemoryScenario::new(RawAoi {
        crs: Some(Crs::Wgs84),
        geometry: rect(36.80, -1.30, 36.81, -1.29),
    })
    .with_poi(
        poi("clinic", 36.805, -1.295, Crs::Wgs84),
        rings(Crs::Wgs84, vec![rect(36.803, -1.297, 36.807, -1.293)]),
    );

    let analysis = analyse(
        scenario,
        config("[bands]\nthresholds_minutes = [10]\n[population]\nenabled = false\n", &output),
        &output,
        None,
    )
    .await;

    // 0.01° x 0.01° near the equator is about 1.112 km on each side.
    let total: f64 = analysis.zones.iter().map(|z| z.area_m2).sum();
    assert!((total - 1.236e6).abs() / 1.236e6 < 0.005, "total area {}", total);
    let clinic = area_of(&analysis, &band("clinic", 0)).unwrap();
    assert!((clinic / total - 0.16).abs() < 1e-3);
    assert_tiles(&analysis, total, 1.0);
}

const SCENARIO: &str = r#"
{
  "crs": "EPSG:32633",
  "aoi": { "polygons": [[[[0, 0], [1000, 0], [1000, 1000], [0, 1000], [0, 0]]]] },
  "pois": [
    { "id": "clinic", "location": [500, 500] },
    { "id": "depot", "location": [900, 900] }
  ],
  "isochrones": [
    {
      "poi": "clinic",
      "thresholds_seconds": [600, 1200],
      "bands": [
        [[[[400, 400], [600, 400], [600, 600], [400, 600], [400, 400]]]],
        [[[[300, 300], [700, 300], [700, 700], [300, 700], [300, 300]]]]
      ]
    }
  ],
  "failures": [{ "poi": "depot", "reason": "routing timed out" }]
}
"#;

fn ascii_grid(value: f64) -> String {
    let row = vec![value.to_string(); 10].join(" ");
    format!(
        "ncols 10\nnrows 10\nxllcorner 0\nyllcorner 0\ncellsize 100\nNODATA_value -9999\n{}\n",
        vec![row; 10].join("\n")
    )
}

#[tokio::test]
async fn test_engine_writes_summary_and_report_from_files() {
    let workspace = TempDir::new().unwrap();
    let scenario_path = workspace.path().join("scenario.json");
    std::fs::write(&scenario_path, SCENARIO).unwrap();

    let raster_dir = workspace.path().join("rasters");
    std::fs::create_dir(&raster_dir).unwrap();
    std::fs::write(raster_dir.join("total.asc"), ascii_grid(1.0)).unwrap();
    std::fs::write(raster_dir.join("f.asc"), ascii_grid(0.5)).unwrap();
    std::fs::write(raster_dir.join("m.asc"), ascii_grid(0.5)).unwrap();

    let output_dir = workspace.path().join("out");
    let config = TomlConfig::from_toml_str(&format!(
        r#"
[bands]
thresholds_minutes = [10, 20]

[input]
scenario = "{}"
raster_dir = "{}"
raster_crs = "EPSG:32633"

[population]
categories = ["f", "m"]

[output]
path = "{}"
"#,
        scenario_path.display(),
        raster_dir.display(),
        output_dir.display()
    ))
    .unwrap();

    let scenario = ScenarioFile::from_path(config.scenario_path()).await.unwrap();
    let rasters = AsciiGridDirectory::new(raster_dir.clone(), config.raster_crs());
    let pipeline = ZonePipeline::new(
        LocalStorage::new(config.output_path()),
        config,
        scenario.clone(),
        scenario,
    )
    .with_rasters(rasters);

    let result = ZoneEngine::new(pipeline).run().await.unwrap();
    assert_eq!(result, output_dir.display().to_string());

    let mut reader = csv::Reader::from_path(output_dir.join("zones.csv")).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["region", "poi", "band", "interval", "area_m2", "population", "f", "m", "category_delta", "nodata_coverage"]
    );

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    let population_of = |region: &str| -> f64 {
        rows.iter()
            .find(|r| &r[0] == region)
            .map(|r| r[5].parse().unwrap())
            .unwrap()
    };
    assert!((population_of("clinic/band 0") - 4.0).abs() < 1e-3);
    assert!((population_of("clinic/band 1") - 12.0).abs() < 1e-3);
    assert!((population_of("uncovered") - 84.0).abs() < 1e-3);
    let female: f64 = rows.iter().map(|r| r[6].parse::<f64>().unwrap()).sum();
    assert!((female - 50.0).abs() < 1e-3);

    let report: serde_json::Value =
        serde_json::from_slice(&std::fs::read(output_dir.join("zones_report.json")).unwrap()).unwrap();
    assert_eq!(report["working_crs"], "EPSG:32633");
    assert_eq!(report["thresholds_seconds"], serde_json::json!([600, 1200]));
    assert_eq!(report["regions"].as_array().unwrap().len(), 3);
    assert_eq!(report["regions"][2]["kind"], "uncovered");

    let errors = report["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["kind"], "IsochroneUnavailableError");
    assert_eq!(errors[0]["subject"], "depot");
    assert_eq!(errors[0]["stage"], "fetch");
}

#[tokio::test]
async fn test_missing_category_raster_degrades_without_failing_the_run() {
    let workspace = TempDir::new().unwrap();
    let raster_dir = workspace.path().join("rasters");
    std::fs::create_dir(&raster_dir).unwrap();
    std::fs::write(raster_dir.join("total.asc"), ascii_grid(1.0)).unwrap();

    let mut config = config(
        "[bands]\nthresholds_minutes = [10, 20]\n[population]\ncategories = [\"f\"]\n",
        &workspace,
    );
    config.input.raster_crs = UTM;

    let scenario = ScenarioFile::from_json_str(SCENARIO).unwrap();
    let pipeline = ZonePipeline::new(
        LocalStorage::new(workspace.path()),
        config,
        scenario.clone(),
        scenario,
    )
    .with_rasters(AsciiGridDirectory::new(raster_dir, UTM));

    let inputs = pipeline.extract().await.unwrap();
    let analysis = pipeline.transform(inputs).await.unwrap();

    assert_eq!(analysis.report.count_kind("PopulationDataError"), 1);
    for zone in &analysis.zones {
        let population = zone.population.as_ref().unwrap();
        assert!(population.total.value().is_some());
        assert!(population.categories["f"].value().is_none());
    }
}
