use crate::domain::model::BandSet;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_range, validate_strictly_ascending, Validate,
};
use serde::{Deserialize, Serialize};

/// How the working projected CRS is picked.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProjectionChoice {
    /// Equal-area projection centred on the AOI for geographic input,
    /// the input's own CRS for projected input.
    #[default]
    Auto,
    LambertAzimuthal { lon: f64, lat: f64 },
    /// Inputs already share one projected CRS.
    Native,
}

/// Precedence between different POIs' regions of the same band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The order in which POIs were supplied; the first POI wins.
    #[default]
    InputOrder,
    /// Lexicographic POI id; independent of supply order.
    PoiName,
}

impl std::str::FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "input_order" => Ok(TieBreak::InputOrder),
            "poi_name" => Ok(TieBreak::PoiName),
            other => Err(format!(
                "unknown tie-break '{}', expected 'input_order' or 'poi_name'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSettings {
    pub enabled: bool,
    pub aggregate_key: String,
    pub categories: Vec<String>,
    /// Allowed relative gap between the category sum and the aggregate.
    pub tolerance: f64,
}

impl Default for PopulationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            aggregate_key: "total".to_string(),
            categories: Vec::new(),
            tolerance: 0.01,
        }
    }
}

/// Everything the core stages need, passed explicitly into the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    pub bands: BandSet,
    pub projection: ProjectionChoice,
    /// Polygon parts below this area (m²) are dropped after each overlay.
    pub min_area_m2: f64,
    pub tie_break: TieBreak,
    pub population: PopulationSettings,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            bands: BandSet::default(),
            projection: ProjectionChoice::Auto,
            min_area_m2: 0.01,
            tie_break: TieBreak::InputOrder,
            population: PopulationSettings::default(),
        }
    }
}

impl Validate for AnalysisSettings {
    fn validate(&self) -> Result<()> {
        validate_strictly_ascending("bands.thresholds", self.bands.thresholds_seconds())?;
        validate_range("resolve.min_area_m2", self.min_area_m2, 0.0, f64::MAX)?;

        if let ProjectionChoice::LambertAzimuthal { lon, lat } = self.projection {
            validate_range("projection.lon", lon, -180.0, 180.0)?;
            validate_range("projection.lat", lat, -90.0, 90.0)?;
        }

        if self.population.enabled {
            validate_non_empty_string("population.aggregate_key", &self.population.aggregate_key)?;
            for category in &self.population.categories {
                validate_non_empty_string("population.categories", category)?;
            }
            validate_range("population.tolerance", self.population.tolerance, 0.0, 1.0)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = AnalysisSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.bands.len(), 4);
        assert_eq!(settings.tie_break, TieBreak::InputOrder);
    }

    #[test]
    fn test_invalid_projection_centre_is_rejected() {
        let settings = AnalysisSettings {
            projection: ProjectionChoice::LambertAzimuthal { lon: 200.0, lat: 0.0 },
            ..AnalysisSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_tie_break_from_str() {
        assert_eq!("poi-name".parse::<TieBreak>().unwrap(), TieBreak::PoiName);
        assert_eq!("INPUT_ORDER".parse::<TieBreak>().unwrap(), TieBreak::InputOrder);
        assert!("random".parse::<TieBreak>().is_err());
    }

    #[test]
    fn test_negative_min_area_is_rejected() {
        let settings = AnalysisSettings {
            min_area_m2: -1.0,
            ..AnalysisSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
