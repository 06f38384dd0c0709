use crate::core::ConfigProvider;
use crate::domain::model::{BandSet, Crs};
use crate::domain::settings::{AnalysisSettings, PopulationSettings, ProjectionChoice, TieBreak};
use crate::utils::error::{Result, ZoneError};
use crate::utils::validation::{
    validate_file_extension, validate_non_empty_string, validate_path, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Analysis configuration file. Every section is optional; an empty file
/// gives the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub analysis: AnalysisInfo,
    pub bands: BandsConfig,
    pub projection: ProjectionChoice,
    pub resolve: ResolveConfig,
    pub input: InputConfig,
    pub population: PopulationConfig,
    pub output: OutputConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisInfo {
    pub name: String,
    pub description: Option<String>,
}

impl Default for AnalysisInfo {
    fn default() -> Self {
        Self {
            name: "proximity-zones".to_string(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BandsConfig {
    pub thresholds_minutes: Vec<u32>,
}

impl Default for BandsConfig {
    fn default() -> Self {
        Self {
            thresholds_minutes: vec![15, 30, 45, 60],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    pub min_area_m2: f64,
    pub tie_break: TieBreak,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            min_area_m2: 0.01,
            tie_break: TieBreak::InputOrder,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub scenario: String,
    pub raster_dir: Option<String>,
    pub raster_crs: Crs,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            scenario: "scenario.json".to_string(),
            raster_dir: None,
            raster_crs: Crs::Wgs84,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub enabled: bool,
    pub aggregate_key: String,
    pub categories: Vec<String>,
    pub tolerance: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        let defaults = PopulationSettings::default();
        Self {
            enabled: defaults.enabled,
            aggregate_key: defaults.aggregate_key,
            categories: defaults.categories,
            tolerance: defaults.tolerance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
    pub summary_filename: String,
    pub report_filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "./output".to_string(),
            summary_filename: "zones.csv".to_string(),
            report_filename: "zones_report.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub json_logs: bool,
}

impl TomlConfig {
    /// Reads and parses a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ZoneError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ZoneError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables are
    /// left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ZoneError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("analysis.name", &self.analysis.name)?;

        validate_path("input.scenario", &self.input.scenario)?;
        validate_file_extension("input.scenario", &self.input.scenario, &["json"])?;
        if let Some(dir) = &self.input.raster_dir {
            validate_path("input.raster_dir", dir)?;
        }

        validate_path("output.path", &self.output.path)?;
        validate_file_extension("output.summary_filename", &self.output.summary_filename, &["csv"])?;
        validate_file_extension("output.report_filename", &self.output.report_filename, &["json"])?;

        if self.thresholds_overflow() {
            return Err(ZoneError::InvalidConfigValueError {
                field: "bands.thresholds_minutes".to_string(),
                value: format!("{:?}", self.bands.thresholds_minutes),
                reason: "Threshold is too large".to_string(),
            });
        }

        self.analysis_settings().validate()
    }

    fn thresholds_overflow(&self) -> bool {
        self.bands
            .thresholds_minutes
            .iter()
            .any(|m| m.checked_mul(60).is_none())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring.json_logs
    }
}

impl ConfigProvider for TomlConfig {
    fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            bands: BandSet::from_seconds(
                self.bands
                    .thresholds_minutes
                    .iter()
                    .map(|m| m.saturating_mul(60))
                    .collect(),
            ),
            projection: self.projection,
            min_area_m2: self.resolve.min_area_m2,
            tie_break: self.resolve.tie_break,
            population: PopulationSettings {
                enabled: self.population.enabled,
                aggregate_key: self.population.aggregate_key.clone(),
                categories: self.population.categories.clone(),
                tolerance: self.population.tolerance,
            },
        }
    }

    fn scenario_path(&self) -> &str {
        &self.input.scenario
    }

    fn raster_dir(&self) -> Option<&str> {
        self.input.raster_dir.as_deref()
    }

    fn raster_crs(&self) -> Crs {
        self.input.raster_crs
    }

    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn summary_filename(&self) -> &str {
        &self.output.summary_filename
    }

    fn report_filename(&self) -> &str {
        &self.output.report_filename
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
