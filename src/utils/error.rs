use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZoneError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid geometry for {subject}: {reason}")]
    InvalidGeometry { subject: String, reason: String },

    #[error("Could not resolve overlaps for POI '{poi}' band {band}: {reason}")]
    GeometryResolution {
        poi: String,
        band: usize,
        reason: String,
    },

    #[error("Population data unavailable for category '{category}': {reason}")]
    PopulationData { category: String, reason: String },

    #[error("Isochrones unavailable for POI '{poi}': {reason}")]
    IsochroneUnavailable { poi: String, reason: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Geometry,
    Population,
    Collaborator,
    Io,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ZoneError {
    pub fn invalid_geometry(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        ZoneError::InvalidGeometry {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    /// Stable name used in the error report.
    pub fn kind(&self) -> &'static str {
        match self {
            ZoneError::InvalidGeometry { .. } => "InvalidGeometryError",
            ZoneError::GeometryResolution { .. } => "GeometryResolutionError",
            ZoneError::PopulationData { .. } => "PopulationDataError",
            ZoneError::IsochroneUnavailable { .. } => "IsochroneUnavailableError",
            ZoneError::IoError(_) => "IoError",
            ZoneError::SerializationError(_) => "SerializationError",
            ZoneError::CsvError(_) => "CsvError",
            ZoneError::ConfigError { .. }
            | ZoneError::ConfigValidationError { .. }
            | ZoneError::InvalidConfigValueError { .. }
            | ZoneError::MissingConfigError { .. } => "ConfigError",
            ZoneError::ProcessingError { .. } => "ProcessingError",
        }
    }

    /// The item a failure belongs to, if it is tied to one.
    pub fn subject(&self) -> Option<String> {
        match self {
            ZoneError::InvalidGeometry { subject, .. } => Some(subject.clone()),
            ZoneError::GeometryResolution { poi, band, .. } => Some(format!("{}/band {}", poi, band)),
            ZoneError::PopulationData { category, .. } => Some(category.clone()),
            ZoneError::IsochroneUnavailable { poi, .. } => Some(poi.clone()),
            ZoneError::ConfigValidationError { field, .. }
            | ZoneError::InvalidConfigValueError { field, .. }
            | ZoneError::MissingConfigError { field } => Some(field.clone()),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ZoneError::ConfigError { .. }
            | ZoneError::ConfigValidationError { .. }
            | ZoneError::InvalidConfigValueError { .. }
            | ZoneError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ZoneError::InvalidGeometry { .. } | ZoneError::GeometryResolution { .. } => {
                ErrorCategory::Geometry
            }
            ZoneError::PopulationData { .. } => ErrorCategory::Population,
            ZoneError::IsochroneUnavailable { .. } => ErrorCategory::Collaborator,
            ZoneError::IoError(_) | ZoneError::SerializationError(_) | ZoneError::CsvError(_) => {
                ErrorCategory::Io
            }
            ZoneError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    /// Per-item failures are recoverable for the batch, so they rank below
    /// anything that stops the run.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ZoneError::PopulationData { .. } => ErrorSeverity::Low,
            ZoneError::IsochroneUnavailable { .. } | ZoneError::GeometryResolution { .. } => {
                ErrorSeverity::Medium
            }
            ZoneError::InvalidGeometry { .. } | ZoneError::ProcessingError { .. } => {
                ErrorSeverity::High
            }
            ZoneError::ConfigError { .. }
            | ZoneError::ConfigValidationError { .. }
            | ZoneError::InvalidConfigValueError { .. }
            | ZoneError::MissingConfigError { .. }
            | ZoneError::IoError(_)
            | ZoneError::SerializationError(_)
            | ZoneError::CsvError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ZoneError::ConfigError { .. }
            | ZoneError::ConfigValidationError { .. }
            | ZoneError::InvalidConfigValueError { .. } => {
                "Check the analysis configuration file against the documented fields"
            }
            ZoneError::MissingConfigError { .. } => {
                "Add the missing field to the configuration file or pass it on the command line"
            }
            ZoneError::InvalidGeometry { .. } => {
                "Make sure every geometry declares its CRS, is non-empty and does not self-intersect"
            }
            ZoneError::GeometryResolution { .. } => {
                "Inspect the isochrone for this POI and band; simplifying it usually helps"
            }
            ZoneError::PopulationData { .. } => {
                "Check that a readable raster exists for this category in the raster directory"
            }
            ZoneError::IsochroneUnavailable { .. } => {
                "Re-fetch isochrones for this POI or remove it from the input"
            }
            ZoneError::IoError(_) => "Check that the paths exist and are readable/writable",
            ZoneError::SerializationError(_) => "Check that the scenario file is valid JSON",
            ZoneError::CsvError(_) => "Check that the output location is writable",
            ZoneError::ProcessingError { .. } => "Re-run with --verbose for more detail",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ZoneError::InvalidGeometry { subject, .. } => {
                format!("The geometry of {} could not be used: {}", subject, self)
            }
            ZoneError::IoError(e) => format!("A file could not be read or written: {}", e),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ZoneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_item_errors_are_not_critical() {
        let err = ZoneError::PopulationData {
            category: "f_0".to_string(),
            reason: "missing".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Population);
        assert_eq!(err.severity(), ErrorSeverity::Low);

        let err = ZoneError::GeometryResolution {
            poi: "clinic".to_string(),
            band: 1,
            reason: "self-intersection".to_string(),
        };
        assert!(err.severity() < ErrorSeverity::Critical);
        assert!(err.to_string().contains("clinic"));
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = ZoneError::MissingConfigError {
            field: "input.scenario".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}
