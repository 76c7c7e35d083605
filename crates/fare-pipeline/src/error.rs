//! Error types for the fare pipeline.
//!
//! Only structural problems are errors. Data-quality findings (negative fares,
//! inconsistent totals, empty strings) are reported through
//! [`ValidationReport`](crate::types::ValidationReport), never raised.
//!
//! Errors are serializable so a caller can forward them as `{code, message}`
//! records alongside the quality metrics.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the fare pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The dataset lacks columns every stage depends on.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingRequiredColumns(Vec<String>),

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A validation report was applied to a dataset of a different size.
    #[error("Report covers {report_rows} rows but dataset has {dataset_rows}")]
    ReportMismatch {
        report_rows: usize,
        dataset_rows: usize,
    },

    /// A single KPI table could not be computed.
    #[error("Failed to compute KPI '{kpi}': {reason}")]
    KpiFailed { kpi: String, reason: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for machine consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingRequiredColumns(_) => "MISSING_REQUIRED_COLUMNS",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::ReportMismatch { .. } => "REPORT_MISMATCH",
            Self::KpiFailed { .. } => "KPI_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// True when the dataset itself is structurally unusable.
    pub fn is_structural(&self) -> bool {
        match self {
            Self::MissingRequiredColumns(_) | Self::ColumnNotFound(_) => true,
            Self::WithContext { source, .. } => source.is_structural(),
            _ => false,
        }
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            PipelineError::MissingRequiredColumns(vec!["airline".to_string()]).error_code(),
            "MISSING_REQUIRED_COLUMNS"
        );
        assert_eq!(
            PipelineError::ColumnNotFound("test".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
    }

    #[test]
    fn test_missing_columns_message_lists_names() {
        let error = PipelineError::MissingRequiredColumns(vec![
            "base_fare".to_string(),
            "total_fare".to_string(),
        ]);
        assert_eq!(
            error.to_string(),
            "Missing required columns: base_fare, total_fare"
        );
    }

    #[test]
    fn test_is_structural() {
        assert!(PipelineError::MissingRequiredColumns(vec![]).is_structural());
        assert!(
            PipelineError::ColumnNotFound("airline".to_string())
                .with_context("During dedup")
                .is_structural()
        );
        assert!(!PipelineError::InvalidConfig("bad".to_string()).is_structural());
    }

    #[test]
    fn test_error_serialization() {
        let error = PipelineError::ColumnNotFound("airline".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("airline"));
    }

    #[test]
    fn test_with_context() {
        let error = PipelineError::KpiFailed {
            kpi: "popular_routes".to_string(),
            reason: "no source column".to_string(),
        }
        .with_context("During aggregation");
        assert!(error.to_string().contains("During aggregation"));
        assert_eq!(error.error_code(), "KPI_FAILED");
    }
}
