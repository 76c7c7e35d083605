//! Dataset validation.
//!
//! The [`Validator`] runs a fixed sequence of independent checks and folds
//! their findings into a [`ValidationReport`]:
//!
//! 1. Required columns (the only check that can short-circuit)
//! 2. Data types
//! 3. Null values
//! 4. Negative values
//! 5. Valid cities (only with a whitelist)
//! 6. Fare consistency
//!
//! A check that fails internally is recorded as errored ("0 passed, all
//! failed") and the remaining checks still run. Validation never mutates or
//! filters the dataset; [`annotate_record_status`] is a separate, explicit
//! step for callers that want per-row statuses.

mod checks;

pub use checks::{
    CheckContext, CheckFindings, CheckOutcome, FARE_TOLERANCE, check_data_types,
    check_fare_consistency, check_negative_values, check_null_values, check_valid_cities,
    missing_required_columns,
};

use crate::error::{PipelineError, Result};
use crate::observer::{PipelineEvent, SharedObserver, default_observer};
use crate::types::{CheckResult, CheckStatus, CheckType, ValidationReport, columns};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::info;

type CheckFn = fn(&DataFrame, &CheckContext) -> Result<CheckOutcome>;

/// Checks after the required-columns gate, in execution order.
const CHECKS: [(&str, CheckType, CheckFn); 5] = [
    ("Data Types", CheckType::TypeCheck, check_data_types),
    ("Null Values", CheckType::Nulls, check_null_values),
    ("Negative Values", CheckType::BusinessRule, check_negative_values),
    ("Valid Cities", CheckType::BusinessRule, check_valid_cities),
    ("Fare Consistency", CheckType::BusinessRule, check_fare_consistency),
];

/// Runs the quality checks against a dataset snapshot.
pub struct Validator {
    observer: SharedObserver,
    allow_null_columns: Vec<String>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    pub fn new() -> Self {
        Self {
            observer: default_observer(),
            allow_null_columns: Vec::new(),
        }
    }

    /// Send check events to `observer` instead of `tracing`.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Exempt additional columns from the null check.
    pub fn allow_nulls_in<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_null_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Validate `df`, optionally against a city whitelist.
    pub fn validate(&self, df: &DataFrame, valid_cities: Option<&[String]>) -> ValidationReport {
        self.validate_at(df, valid_cities, Utc::now())
    }

    /// Like [`validate`](Self::validate) with an explicit report timestamp.
    pub fn validate_at(
        &self,
        df: &DataFrame,
        valid_cities: Option<&[String]>,
        timestamp: DateTime<Utc>,
    ) -> ValidationReport {
        let total = df.height();
        let mut report = ValidationReport::new(total, timestamp);

        info!("Starting validation checks for {} records...", total);

        let missing = missing_required_columns(df);
        if !missing.is_empty() {
            let error = PipelineError::MissingRequiredColumns(missing.clone());
            self.observer.on_event(&PipelineEvent::CheckErrored {
                check_name: "Required Columns".to_string(),
                reason: error.to_string(),
            });
            report.reject_structure(missing);
            report.finish();
            self.emit_finished(&report);
            return report;
        }

        let ctx = CheckContext::new(valid_cities, &self.allow_null_columns);
        for (name, check_type, check) in CHECKS {
            let (result, flagged) = self.run_check(name, check_type, total, || check(df, &ctx));
            report.record_check(result, &flagged);
        }

        report.finish();
        self.emit_finished(&report);
        report
    }

    /// Run one check and translate its outcome into a report entry.
    fn run_check<F>(
        &self,
        name: &str,
        check_type: CheckType,
        total: usize,
        check: F,
    ) -> (CheckResult, BTreeSet<usize>)
    where
        F: FnOnce() -> Result<CheckOutcome>,
    {
        let outcome = check().unwrap_or_else(|e| CheckOutcome::Errored {
            reason: e.to_string(),
        });

        match outcome {
            CheckOutcome::Completed(findings) => {
                let failed = findings.rows.len().min(total);
                self.observer.on_event(&PipelineEvent::CheckCompleted {
                    check_name: name.to_string(),
                    records_passed: total - failed,
                    records_failed: failed,
                });
                let result = CheckResult {
                    check_name: name.to_string(),
                    check_type,
                    status: if failed > 0 {
                        CheckStatus::Failed
                    } else {
                        CheckStatus::Passed
                    },
                    records_passed: total - failed,
                    records_failed: failed,
                    error_message: None,
                };
                (result, findings.rows)
            }
            CheckOutcome::Skipped { reason } => {
                self.observer.on_event(&PipelineEvent::CheckSkipped {
                    check_name: name.to_string(),
                    reason,
                });
                let result = CheckResult {
                    check_name: name.to_string(),
                    check_type,
                    status: CheckStatus::Skipped,
                    records_passed: 0,
                    records_failed: 0,
                    error_message: None,
                };
                (result, BTreeSet::new())
            }
            CheckOutcome::Errored { reason } => {
                self.observer.on_event(&PipelineEvent::CheckErrored {
                    check_name: name.to_string(),
                    reason: reason.clone(),
                });
                let result = CheckResult {
                    check_name: name.to_string(),
                    check_type,
                    status: CheckStatus::Errored,
                    records_passed: 0,
                    records_failed: total,
                    error_message: Some(reason),
                };
                (result, (0..total).collect())
            }
        }
    }

    fn emit_finished(&self, report: &ValidationReport) {
        self.observer.on_event(&PipelineEvent::ValidationFinished {
            total_records: report.total_records(),
            valid_records: report.valid_records(),
            invalid_records: report.invalid_records(),
        });
    }
}

/// Validate with default settings.
pub fn validate(df: &DataFrame, valid_cities: Option<&[String]>) -> ValidationReport {
    Validator::new().validate(df, valid_cities)
}

/// Return a copy of `df` with `record_status` and `validation_errors` set from `report`.
///
/// Flagged rows become `INVALID` and list the checks that flagged them;
/// every other row becomes `VALID` with a null `validation_errors`.
pub fn annotate_record_status(df: &DataFrame, report: &ValidationReport) -> Result<DataFrame> {
    if report.total_records() != df.height() {
        return Err(PipelineError::ReportMismatch {
            report_rows: report.total_records(),
            dataset_rows: df.height(),
        });
    }

    let structural_error = report
        .ensure_structurally_valid()
        .err()
        .map(|e| e.to_string());

    let mut statuses = Vec::with_capacity(df.height());
    let mut errors: Vec<Option<String>> = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let status = report.status_for(row);
        statuses.push(status.as_str());
        errors.push(match (&structural_error, report.findings_for(row)) {
            (Some(message), _) => Some(message.clone()),
            (None, Some(checks)) => Some(checks.join("; ")),
            (None, None) => None,
        });
    }

    let mut out = df.clone();
    out.with_column(Series::new(columns::RECORD_STATUS.into(), statuses))?;
    out.with_column(Series::new(columns::VALIDATION_ERRORS.into(), errors))?;
    Ok(out)
}
