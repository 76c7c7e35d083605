//! Individual quality checks.
//!
//! Each check inspects the dataset and returns a [`CheckOutcome`]; none of
//! them mutates its input. A check that hits an unexpected value shape returns
//! an error, which the validator turns into an errored outcome for that check
//! alone.

use crate::error::Result;
use crate::types::columns;
use crate::utils::{has_column, missing_mask, non_numeric_rows, numeric_values, string_values};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Absolute tolerance for `base_fare + tax_surcharge == total_fare`.
pub const FARE_TOLERANCE: f64 = 0.01;

/// Rows flagged by one check, with a per-column breakdown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckFindings {
    pub rows: BTreeSet<usize>,
    pub by_column: BTreeMap<String, usize>,
}

impl CheckFindings {
    fn flag(&mut self, column: &str, rows: impl IntoIterator<Item = usize>) {
        let mut count = 0;
        for row in rows {
            self.rows.insert(row);
            count += 1;
        }
        if count > 0 {
            *self.by_column.entry(column.to_string()).or_default() += count;
        }
    }
}

/// How a single check ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Completed(CheckFindings),
    Skipped { reason: String },
    Errored { reason: String },
}

/// Inputs shared by all checks of one run.
#[derive(Debug, Default)]
pub struct CheckContext {
    /// Lower-cased whitelist; `None` disables the city check. Never empty.
    pub valid_cities: Option<HashSet<String>>,
    /// Extra columns exempt from the null check.
    pub allow_null_columns: Vec<String>,
}

impl CheckContext {
    pub fn new(valid_cities: Option<&[String]>, allow_null_columns: &[String]) -> Self {
        Self {
            valid_cities: valid_cities
                .map(|cities| {
                    cities
                        .iter()
                        .map(|c| c.trim().to_lowercase())
                        .filter(|c| !c.is_empty())
                        .collect::<HashSet<_>>()
                })
                .filter(|cities| !cities.is_empty()),
            allow_null_columns: allow_null_columns.to_vec(),
        }
    }
}

/// Required columns absent from the schema, in canonical order.
pub fn missing_required_columns(df: &DataFrame) -> Vec<String> {
    columns::REQUIRED
        .iter()
        .filter(|name| !has_column(df, name))
        .map(|name| name.to_string())
        .collect()
}

/// Fares that are present but not numeric; text fields that are blank after trimming.
pub fn check_data_types(df: &DataFrame, _ctx: &CheckContext) -> Result<CheckOutcome> {
    let mut findings = CheckFindings::default();

    for name in columns::FARES {
        if let Ok(col) = df.column(name) {
            let rows = non_numeric_rows(col.as_materialized_series())?;
            if !rows.is_empty() {
                debug!("{}: {} non-numeric values found", name, rows.len());
            }
            findings.flag(name, rows);
        }
    }

    for name in columns::CATEGORICAL {
        if let Ok(col) = df.column(name) {
            let values = string_values(col.as_materialized_series())?;
            let empty = values
                .iter()
                .enumerate()
                .filter(|(_, v)| v.as_deref().is_some_and(|s| s.trim().is_empty()))
                .map(|(idx, _)| idx);
            findings.flag(name, empty);
        }
    }

    Ok(CheckOutcome::Completed(findings))
}

/// Missing values in any non-metadata column the caller did not whitelist.
pub fn check_null_values(df: &DataFrame, ctx: &CheckContext) -> Result<CheckOutcome> {
    let mut findings = CheckFindings::default();

    for col in df.get_columns() {
        let name = col.name().as_str();
        if columns::METADATA.contains(&name) || ctx.allow_null_columns.iter().any(|c| c == name)
        {
            continue;
        }

        // NaN counts as missing for float columns
        let null_rows: Vec<usize> = missing_mask(col.as_materialized_series())?
            .into_iter()
            .enumerate()
            .filter(|(_, missing)| *missing)
            .map(|(idx, _)| idx)
            .collect();

        if !null_rows.is_empty() {
            debug!("{}: {} null values found", name, null_rows.len());
        }
        findings.flag(name, null_rows);
    }

    Ok(CheckOutcome::Completed(findings))
}

/// Fares below zero.
pub fn check_negative_values(df: &DataFrame, _ctx: &CheckContext) -> Result<CheckOutcome> {
    let mut findings = CheckFindings::default();

    for name in columns::FARES {
        if let Ok(col) = df.column(name) {
            let negative = numeric_values(col.as_materialized_series())?
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_some_and(|x| x < 0.0))
                .map(|(idx, _)| idx)
                .collect::<Vec<_>>();
            findings.flag(name, negative);
        }
    }

    Ok(CheckOutcome::Completed(findings))
}

/// `source`/`destination` outside the caller's whitelist.
pub fn check_valid_cities(df: &DataFrame, ctx: &CheckContext) -> Result<CheckOutcome> {
    let Some(cities) = &ctx.valid_cities else {
        return Ok(CheckOutcome::Skipped {
            reason: "no city whitelist provided".to_string(),
        });
    };

    let mut findings = CheckFindings::default();
    for name in [columns::SOURCE, columns::DESTINATION] {
        if let Ok(col) = df.column(name) {
            let invalid = string_values(col.as_materialized_series())?
                .iter()
                .enumerate()
                .filter(|(_, v)| match v {
                    Some(city) => !cities.contains(&city.trim().to_lowercase()),
                    None => true,
                })
                .map(|(idx, _)| idx)
                .collect::<Vec<_>>();
            findings.flag(name, invalid);
        }
    }

    Ok(CheckOutcome::Completed(findings))
}

/// Rows where the three fares are numeric but do not add up.
pub fn check_fare_consistency(df: &DataFrame, _ctx: &CheckContext) -> Result<CheckOutcome> {
    let base = numeric_values(df.column(columns::BASE_FARE)?.as_materialized_series())?;
    let tax = numeric_values(df.column(columns::TAX_SURCHARGE)?.as_materialized_series())?;
    let total = numeric_values(df.column(columns::TOTAL_FARE)?.as_materialized_series())?;

    let inconsistent = base
        .iter()
        .zip(&tax)
        .zip(&total)
        .enumerate()
        .filter(|(_, ((b, t), tot))| match (b, t, tot) {
            (Some(b), Some(t), Some(tot)) => ((b + t) - tot).abs() > FARE_TOLERANCE,
            _ => false,
        })
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();

    let mut findings = CheckFindings::default();
    findings.flag(columns::TOTAL_FARE, inconsistent);
    Ok(CheckOutcome::Completed(findings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CheckContext {
        CheckContext::default()
    }

    fn flagged(outcome: CheckOutcome) -> Vec<usize> {
        match outcome {
            CheckOutcome::Completed(findings) => findings.rows.into_iter().collect(),
            other => panic!("expected a completed check, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_columns() {
        let df = df![
            "airline" => ["A"],
            "source" => ["DAC"],
            "destination" => ["CGP"],
            "base_fare" => [1.0],
        ]
        .unwrap();

        assert_eq!(
            missing_required_columns(&df),
            vec!["tax_surcharge", "total_fare", "departure_date"]
        );
    }

    #[test]
    fn test_data_types_flags_text_fares_and_blank_strings() {
        let df = df![
            "airline" => [Some("Biman"), Some("   "), None],
            "base_fare" => [Some("100"), Some("abc"), None],
        ]
        .unwrap();

        let outcome = check_data_types(&df, &ctx()).unwrap();
        let CheckOutcome::Completed(findings) = outcome else {
            panic!("type check should complete");
        };
        assert_eq!(findings.rows.into_iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(findings.by_column.get("airline"), Some(&1));
        assert_eq!(findings.by_column.get("base_fare"), Some(&1));
    }

    #[test]
    fn test_null_values_skips_metadata_and_whitelist() {
        let df = df![
            "airline" => [Some("A"), None, Some("C")],
            "stopovers" => [None, Some("Direct"), Some("1 Stop")],
            "validation_errors" => [None::<&str>, None, None],
            "base_fare" => [Some(1.0), Some(f64::NAN), Some(3.0)],
        ]
        .unwrap();

        let context = CheckContext::new(None, &["stopovers".to_string()]);
        assert_eq!(flagged(check_null_values(&df, &context).unwrap()), vec![1]);
    }

    #[test]
    fn test_negative_values() {
        let df = df![
            "base_fare" => [100.0, -5.0, 50.0],
            "tax_surcharge" => [10.0, 2.0, -0.01],
            "total_fare" => [110.0, -3.0, 49.99],
        ]
        .unwrap();

        assert_eq!(flagged(check_negative_values(&df, &ctx()).unwrap()), vec![1, 2]);
    }

    #[test]
    fn test_valid_cities_without_whitelist_is_skipped() {
        let df = df!["source" => ["DAC"], "destination" => ["XXX"]].unwrap();
        assert!(matches!(
            check_valid_cities(&df, &ctx()).unwrap(),
            CheckOutcome::Skipped { .. }
        ));
    }

    #[test]
    fn test_blank_whitelist_disables_city_check() {
        let df = df!["source" => ["DAC"], "destination" => ["XXX"]].unwrap();
        for whitelist in [vec![], vec!["".to_string(), "  ".to_string()]] {
            let context = CheckContext::new(Some(&whitelist), &[]);
            assert!(context.valid_cities.is_none());
            assert!(matches!(
                check_valid_cities(&df, &context).unwrap(),
                CheckOutcome::Skipped { .. }
            ));
        }
    }

    #[test]
    fn test_valid_cities_is_case_insensitive() {
        let df = df![
            "source" => [Some("dac"), Some("CGP"), None],
            "destination" => [Some("Cxb"), Some("LON"), Some("DAC")],
        ]
        .unwrap();
        let whitelist = vec!["DAC".to_string(), "cgp".to_string(), "CXB".to_string()];
        let context = CheckContext::new(Some(&whitelist), &[]);

        assert_eq!(flagged(check_valid_cities(&df, &context).unwrap()), vec![1, 2]);
    }

    #[test]
    fn test_fare_consistency_tolerance() {
        let df = df![
            "base_fare" => [Some("100"), Some("100"), Some("oops"), Some("100")],
            "tax_surcharge" => [Some("20"), Some("20"), Some("20"), None],
            "total_fare" => [Some("120.005"), Some("150"), Some("150"), Some("999")],
        ]
        .unwrap();

        // Non-numeric and missing operands are left to the other checks
        assert_eq!(flagged(check_fare_consistency(&df, &ctx()).unwrap()), vec![1]);
    }
}
