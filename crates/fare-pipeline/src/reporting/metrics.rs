//! Per-check quality-metric rows.

use crate::types::{CheckType, ValidationReport};
use crate::utils::timestamp_series;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One persisted row per validation check, keyed by check name and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetricRow {
    pub check_name: String,
    pub check_type: CheckType,
    pub records_processed: usize,
    pub records_valid: usize,
    pub records_invalid: usize,
    pub error_message: Option<String>,
    pub execution_timestamp: DateTime<Utc>,
}

impl ValidationReport {
    /// One [`QualityMetricRow`] per check performed.
    pub fn quality_metric_rows(&self) -> Vec<QualityMetricRow> {
        self.checks()
            .iter()
            .map(|check| QualityMetricRow {
                check_name: check.check_name.clone(),
                check_type: check.check_type,
                records_processed: self.total_records(),
                records_valid: check.records_passed,
                records_invalid: check.records_failed,
                error_message: check.error_message.clone(),
                execution_timestamp: self.validation_timestamp(),
            })
            .collect()
    }

    /// The quality-metric rows as a dataset.
    pub fn quality_metrics_frame(&self) -> PolarsResult<DataFrame> {
        let rows = self.quality_metric_rows();

        let names: Vec<&str> = rows.iter().map(|r| r.check_name.as_str()).collect();
        let types: Vec<&str> = rows.iter().map(|r| r.check_type.as_str()).collect();
        let processed: Vec<u64> = rows.iter().map(|r| r.records_processed as u64).collect();
        let valid: Vec<u64> = rows.iter().map(|r| r.records_valid as u64).collect();
        let invalid: Vec<u64> = rows.iter().map(|r| r.records_invalid as u64).collect();
        let errors: Vec<Option<&str>> = rows.iter().map(|r| r.error_message.as_deref()).collect();

        DataFrame::new(vec![
            Series::new("check_name".into(), names).into(),
            Series::new("check_type".into(), types).into(),
            Series::new("records_processed".into(), processed).into(),
            Series::new("records_valid".into(), valid).into(),
            Series::new("records_invalid".into(), invalid).into(),
            Series::new("error_message".into(), errors).into(),
            timestamp_series("execution_timestamp", self.validation_timestamp(), rows.len())?
                .into(),
        ])
    }
}
