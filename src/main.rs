use anyhow::Context;
use clap::Parser;
use proximity_zones::adapters::{AsciiGridDirectory, ScenarioFile};
use proximity_zones::core::ConfigProvider;
use proximity_zones::utils::error::{ErrorSeverity, ZoneError};
use proximity_zones::utils::{logger, validation::Validate};
use proximity_zones::{CliConfig, LocalStorage, TomlConfig, ZoneEngine, ZonePipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    if config.json_logs() {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting proximity-zones");
    if let Some(path) = &args.config {
        tracing::info!("📁 Configuration loaded from: {}", path);
    }
    if args.verbose {
        tracing::debug!("CLI arguments: {:?}", args);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        return perform_dry_run(&config).await;
    }

    let monitor_enabled = config.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let scenario = match ScenarioFile::from_path(config.scenario_path()).await {
        Ok(scenario) => scenario,
        Err(e) => exit_with(e),
    };

    let storage = LocalStorage::new(config.output_path());
    let raster_dir = config.raster_dir().map(str::to_string);
    let raster_crs = config.raster_crs();
    let mut pipeline = ZonePipeline::new(storage, config, scenario.clone(), scenario);
    if let Some(dir) = raster_dir {
        pipeline = pipeline.with_rasters(AsciiGridDirectory::new(dir, raster_crs));
    }

    let engine = ZoneEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Zone analysis completed successfully!");
            tracing::info!("📁 Output saved to: {}", output_path);
            println!("✅ Zone analysis completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => exit_with(e),
    }

    Ok(())
}

fn exit_with(e: ZoneError) -> ! {
    tracing::error!(
        "❌ Zone analysis failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}

fn display_config_summary(config: &TomlConfig, args: &CliConfig) {
    let settings = config.analysis_settings();

    println!("📋 Configuration Summary:");
    println!("  Analysis: {}", config.analysis.name);
    if let Some(description) = &config.analysis.description {
        println!("  Description: {}", description);
    }
    println!("  Scenario: {}", config.scenario_path());
    println!(
        "  Bands (min): {}",
        config
            .bands
            .thresholds_minutes
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Projection: {:?}", settings.projection);
    println!("  Tie-break: {:?}", settings.tie_break);
    match config.raster_dir() {
        Some(dir) if settings.population.enabled => {
            println!("  Rasters: {} ({})", dir, config.raster_crs());
            println!("  Categories: {}", settings.population.categories.len());
        }
        None if settings.population.enabled => {
            println!("  Population: no raster directory, every category will be unavailable")
        }
        _ => println!("  Population: disabled"),
    }
    println!("  Output: {}", config.output_path());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
}

async fn perform_dry_run(config: &TomlConfig) -> anyhow::Result<()> {
    let scenario = ScenarioFile::from_path(config.scenario_path())
        .await
        .with_context(|| format!("reading scenario {}", config.scenario_path()))?;

    println!("🔍 Dry run:");
    println!("  POIs in scenario: {}", scenario.poi_count());
    println!(
        "  Would write: {}/{} and {}/{}",
        config.output_path(),
        config.summary_filename(),
        config.output_path(),
        config.report_filename()
    );

    if let Some(dir) = config.raster_dir() {
        let exists = std::path::Path::new(dir).is_dir();
        println!(
            "  Raster directory {}: {}",
            dir,
            if exists { "found" } else { "missing" }
        );
    }

    Ok(())
}
