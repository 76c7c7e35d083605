use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Column names shared by every stage.
pub mod columns {
    pub const ID: &str = "id";
    pub const AIRLINE: &str = "airline";
    pub const SOURCE: &str = "source";
    pub const DESTINATION: &str = "destination";
    pub const BASE_FARE: &str = "base_fare";
    pub const TAX_SURCHARGE: &str = "tax_surcharge";
    pub const TOTAL_FARE: &str = "total_fare";
    pub const DEPARTURE_DATE: &str = "departure_date";

    pub const SOURCE_FILE: &str = "source_file";
    pub const INGESTION_TIMESTAMP: &str = "ingestion_timestamp";
    pub const RECORD_STATUS: &str = "record_status";
    pub const VALIDATION_ERRORS: &str = "validation_errors";

    pub const FLIGHT_DATE: &str = "flight_date";
    pub const SEASON: &str = "season";
    pub const IS_VALID: &str = "is_valid";
    pub const LOADED_TIMESTAMP: &str = "loaded_timestamp";
    pub const COMPUTED_AT: &str = "computed_at";

    /// Columns whose absence makes a dataset structurally unusable.
    pub const REQUIRED: [&str; 7] = [
        AIRLINE,
        SOURCE,
        DESTINATION,
        BASE_FARE,
        TAX_SURCHARGE,
        TOTAL_FARE,
        DEPARTURE_DATE,
    ];

    /// Currency amounts.
    pub const FARES: [&str; 3] = [BASE_FARE, TAX_SURCHARGE, TOTAL_FARE];

    /// Categorical text columns that get normalized.
    pub const CATEGORICAL: [&str; 3] = [AIRLINE, SOURCE, DESTINATION];

    /// Pipeline bookkeeping columns, exempt from the null check.
    pub const METADATA: [&str; 5] = [
        ID,
        SOURCE_FILE,
        INGESTION_TIMESTAMP,
        RECORD_STATUS,
        VALIDATION_ERRORS,
    ];

    /// Default key identifying a duplicate fare observation.
    pub const DEFAULT_DEDUP_KEY: [&str; 5] =
        [AIRLINE, SOURCE, DESTINATION, BASE_FARE, TAX_SURCHARGE];

    /// Business columns a row must carry to survive the `drop` strategy.
    pub const DROP_REQUIRED: [&str; 5] =
        [AIRLINE, SOURCE, DESTINATION, BASE_FARE, TAX_SURCHARGE];
}

// ============================================================================
// Enumerations
// ============================================================================

/// Coarse fare-demand bucket derived from the calendar month of a flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Season {
    PeakEid,
    PeakWinter,
    NonPeak,
    Unknown,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PeakEid => "PEAK_EID",
            Self::PeakWinter => "PEAK_WINTER",
            Self::NonPeak => "NON_PEAK",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether the season belongs to the peak partition of the seasonal KPI.
    pub fn is_peak(&self) -> bool {
        matches!(self, Self::PeakEid | Self::PeakWinter)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a staging record.
///
/// `Flagged` is reserved: no check currently assigns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Valid,
    Invalid,
    Flagged,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Flagged => "FLAGGED",
        }
    }
}

/// Category a validation check belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckType {
    ColumnValidation,
    TypeCheck,
    Nulls,
    BusinessRule,
}

impl CheckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ColumnValidation => "COLUMN_VALIDATION",
            Self::TypeCheck => "TYPE_CHECK",
            Self::Nulls => "NULLS",
            Self::BusinessRule => "BUSINESS_RULE",
        }
    }
}

/// How a single check ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Ran and flagged no rows
    Passed,
    /// Ran and flagged at least one row
    Failed,
    /// Not applicable to this run (e.g. no whitelist supplied)
    Skipped,
    /// Could not run; every row counts as failed for this check
    Errored,
}

// ============================================================================
// Validation report
// ============================================================================

/// Result of one validation check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckResult {
    pub check_name: String,
    pub check_type: CheckType,
    pub status: CheckStatus,
    pub records_passed: usize,
    pub records_failed: usize,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Structured outcome of a validation run.
///
/// The report is built by the validator through [`record_check`](Self::record_check)
/// and [`finish`](Self::finish); afterwards it is read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    validation_timestamp: DateTime<Utc>,
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    flagged_records: usize,
    validity_percentage: f64,
    checks_performed: Vec<CheckResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    missing_columns: Vec<String>,
    /// Row index -> names of the checks that flagged it.
    #[serde(skip)]
    row_findings: BTreeMap<usize, Vec<String>>,
}

impl ValidationReport {
    pub(crate) fn new(total_records: usize, validation_timestamp: DateTime<Utc>) -> Self {
        Self {
            validation_timestamp,
            total_records,
            valid_records: total_records,
            invalid_records: 0,
            flagged_records: 0,
            validity_percentage: if total_records > 0 { 100.0 } else { 0.0 },
            checks_performed: Vec::new(),
            missing_columns: Vec::new(),
            row_findings: BTreeMap::new(),
        }
    }

    /// Append a check result and the rows it flagged.
    pub(crate) fn record_check(&mut self, result: CheckResult, flagged_rows: &BTreeSet<usize>) {
        for &row in flagged_rows {
            self.row_findings
                .entry(row)
                .or_default()
                .push(result.check_name.clone());
        }
        self.checks_performed.push(result);
    }

    /// Mark the whole dataset invalid because required columns are absent.
    pub(crate) fn reject_structure(&mut self, missing_columns: Vec<String>) {
        let message = PipelineError::MissingRequiredColumns(missing_columns.clone()).to_string();
        self.checks_performed.push(CheckResult {
            check_name: "Required Columns".to_string(),
            check_type: CheckType::ColumnValidation,
            status: CheckStatus::Errored,
            records_passed: 0,
            records_failed: self.total_records,
            error_message: Some(message),
        });
        self.missing_columns = missing_columns;
        self.invalid_records = self.total_records;
        self.valid_records = 0;
        self.validity_percentage = 0.0;
    }

    /// Derive the overall counts from the union of flagged rows.
    pub(crate) fn finish(&mut self) {
        if !self.missing_columns.is_empty() {
            return;
        }
        self.invalid_records = self.row_findings.len().min(self.total_records);
        self.valid_records = self.total_records - self.invalid_records;
        self.validity_percentage = if self.total_records > 0 {
            self.valid_records as f64 / self.total_records as f64 * 100.0
        } else {
            0.0
        };
    }

    pub fn validation_timestamp(&self) -> DateTime<Utc> {
        self.validation_timestamp
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    pub fn valid_records(&self) -> usize {
        self.valid_records
    }

    pub fn invalid_records(&self) -> usize {
        self.invalid_records
    }

    /// Always 0: FLAGGED is a reserved status.
    pub fn flagged_records(&self) -> usize {
        self.flagged_records
    }

    /// Share of rows not flagged by any check, in percent (0 for an empty dataset).
    pub fn validity_percentage(&self) -> f64 {
        self.validity_percentage
    }

    pub fn checks(&self) -> &[CheckResult] {
        &self.checks_performed
    }

    /// Look up a check by its display name.
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks_performed.iter().find(|c| c.check_name == name)
    }

    pub fn missing_columns(&self) -> &[String] {
        &self.missing_columns
    }

    pub fn is_structurally_valid(&self) -> bool {
        self.missing_columns.is_empty()
    }

    /// Surface a short-circuited validation as an error.
    pub fn ensure_structurally_valid(&self) -> Result<()> {
        if self.missing_columns.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::MissingRequiredColumns(
                self.missing_columns.clone(),
            ))
        }
    }

    /// Row indices flagged by at least one check, ascending.
    pub fn invalid_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.row_findings.keys().copied()
    }

    /// Names of the checks that flagged `row`.
    pub fn findings_for(&self, row: usize) -> Option<&[String]> {
        self.row_findings.get(&row).map(Vec::as_slice)
    }

    /// Status a row should carry after this validation.
    pub fn status_for(&self, row: usize) -> RecordStatus {
        if !self.missing_columns.is_empty() || self.row_findings.contains_key(&row) {
            RecordStatus::Invalid
        } else {
            RecordStatus::Valid
        }
    }
}
