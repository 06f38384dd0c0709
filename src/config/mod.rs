#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::domain::model::Crs;
#[cfg(feature = "cli")]
use crate::domain::settings::TieBreak;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use toml_config::TomlConfig;

/// Command-line flags. Anything given here overrides the configuration
/// file.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "proximity-zones")]
#[command(about = "Travel-time zones and population per zone around points of interest")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// JSON scenario with the AOI, POIs and their isochrones
    #[arg(short, long)]
    pub scenario: Option<String>,

    /// Directory of ESRI ASCII population grids
    #[arg(long)]
    pub raster_dir: Option<String>,

    /// CRS of the population grids, e.g. EPSG:4326
    #[arg(long)]
    pub raster_crs: Option<Crs>,

    #[arg(short, long)]
    pub output_path: Option<String>,

    /// Band thresholds in minutes, comma separated
    #[arg(long, value_delimiter = ',')]
    pub bands: Vec<u32>,

    /// Same-band precedence between POIs: input_order or poi_name
    #[arg(long)]
    pub tie_break: Option<TieBreak>,

    /// Skip population aggregation
    #[arg(long)]
    pub no_population: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    pub monitor: Option<bool>,

    /// Show what would be processed without executing
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Loads the configuration file (or the defaults) and applies the flags.
    pub fn resolve(&self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(scenario) = &self.scenario {
            config.input.scenario = scenario.clone();
        }
        if let Some(dir) = &self.raster_dir {
            config.input.raster_dir = Some(dir.clone());
        }
        if let Some(crs) = self.raster_crs {
            config.input.raster_crs = crs;
        }
        if let Some(path) = &self.output_path {
            config.output.path = path.clone();
        }
        if !self.bands.is_empty() {
            config.bands.thresholds_minutes = self.bands.clone();
        }
        if let Some(tie_break) = self.tie_break {
            config.resolve.tie_break = tie_break;
        }
        if self.no_population {
            config.population.enabled = false;
        }
        if let Some(monitor) = self.monitor {
            config.monitoring.enabled = monitor;
        }
        if self.json_logs {
            config.monitoring.json_logs = true;
        }
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;
    use crate::core::ConfigProvider;

    #[test]
    fn test_flags_override_file_values() {
        let cli = CliConfig::parse_from([
            "proximity-zones",
            "--scenario",
            "run.json",
            "--bands",
            "10,20",
            "--tie-break",
            "poi_name",
            "--raster-crs",
            "EPSG:3035",
            "--no-population",
        ]);
        let mut config = TomlConfig::from_toml_str("[input]\nscenario = \"file.json\"\n").unwrap();

        cli.apply_overrides(&mut config);

        assert_eq!(config.scenario_path(), "run.json");
        assert_eq!(config.raster_crs(), Crs::Projected(3035));
        let settings = config.analysis_settings();
        assert_eq!(settings.bands.thresholds_seconds(), &[600, 1200]);
        assert_eq!(settings.tie_break, TieBreak::PoiName);
        assert!(!settings.population.enabled);
    }

    #[test]
    fn test_resolve_without_file_uses_defaults() {
        let cli = CliConfig::parse_from(["proximity-zones"]);
        let config = cli.resolve().unwrap();
        assert_eq!(config.scenario_path(), "scenario.json");
        assert_eq!(config.output_path(), "./output");
    }
}
