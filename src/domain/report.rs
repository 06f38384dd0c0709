use crate::utils::error::ZoneError;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    Fetch,
    Resolve,
    Aggregate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Normalize => "normalize",
            Stage::Fetch => "fetch",
            Stage::Resolve => "resolve",
            Stage::Aggregate => "aggregate",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportedError {
    pub stage: Stage,
    pub kind: &'static str,
    pub subject: Option<String>,
    pub message: String,
}

/// Per-item failures collected while the batch keeps running.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ErrorReport {
    entries: Vec<ReportedError>,
}

impl ErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: Stage, error: &ZoneError) {
        tracing::warn!("⚠️ [{}] {}", stage, error);
        self.entries.push(ReportedError {
            stage,
            kind: error.kind(),
            subject: error.subject(),
            message: error.to_string(),
        });
    }

    pub fn record_all<'a>(&mut self, stage: Stage, errors: impl IntoIterator<Item = &'a ZoneError>) {
        for error in errors {
            self.record(stage, error);
        }
    }

    pub fn entries(&self) -> &[ReportedError] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_kind(&self, kind: &str) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &ReportedError> {
        self.entries.iter().filter(move |e| e.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_kind_and_subject() {
        let mut report = ErrorReport::new();
        report.record(
            Stage::Resolve,
            &ZoneError::GeometryResolution {
                poi: "hospital".to_string(),
                band: 2,
                reason: "invalid remainder".to_string(),
            },
        );
        report.record(
            Stage::Aggregate,
            &ZoneError::PopulationData {
                category: "m_15".to_string(),
                reason: "missing".to_string(),
            },
        );

        assert_eq!(report.len(), 2);
        assert_eq!(report.count_kind("GeometryResolutionError"), 1);
        let resolve: Vec<_> = report.for_stage(Stage::Resolve).collect();
        assert_eq!(resolve[0].subject.as_deref(), Some("hospital/band 2"));
    }
}
