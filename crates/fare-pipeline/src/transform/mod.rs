//! Cleaning and enrichment of fare records.
//!
//! [`Transformer::transform`] returns a new dataset with:
//! - `total_fare` reconciled against `base_fare + tax_surcharge`
//! - `airline`, `source`, `destination` trimmed and title-cased
//! - fares coerced to `Float64` (unparseable values become null)
//! - `flight_date`, `season`, `is_valid` and `loaded_timestamp` added
//!
//! Deduplication and missing-value handling are separate operations
//! ([`remove_duplicates`], [`handle_missing_values`]) that callers opt into.

mod dedup;
mod missing;
mod season;

pub use dedup::remove_duplicates;
pub use missing::handle_missing_values;
pub use season::classify_season;

use crate::config::DEFAULT_DATE_COLUMN;
use crate::error::Result;
use crate::observer::{PipelineEvent, SharedObserver, default_observer};
use crate::types::columns;
use crate::utils::{
    date_series, date_values, has_column, non_numeric_rows, numeric_values, string_values,
    timestamp_series, title_case,
};
use crate::validation::FARE_TOLERANCE;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use tracing::{info, warn};

/// Produces enriched copies of fare datasets.
pub struct Transformer {
    observer: SharedObserver,
    date_column: Option<String>,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer {
    pub fn new() -> Self {
        Self {
            observer: default_observer(),
            date_column: Some(DEFAULT_DATE_COLUMN.to_string()),
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Column `flight_date` is derived from. `None` stamps the processing date.
    pub fn with_date_column(mut self, column: Option<String>) -> Self {
        self.date_column = column;
        self
    }

    /// Enrich `df`, stamping the current time.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.transform_at(df, Utc::now())
    }

    /// Enrich `df` as of `now`.
    pub fn transform_at(&self, df: &DataFrame, now: DateTime<Utc>) -> Result<DataFrame> {
        let mut out = df.clone();
        info!("Transforming {} records...", out.height());

        let steps: [(&str, usize); 6] = [
            ("reconcile_total_fare", reconcile_total_fare(&mut out)?),
            ("normalize_strings", normalize_strings(&mut out)?),
            ("coerce_fares", coerce_fares(&mut out)?),
            (
                "derive_flight_date",
                derive_flight_date(&mut out, self.date_column.as_deref(), now)?,
            ),
            ("classify_season", add_season(&mut out)?),
            ("default_is_valid", default_is_valid(&mut out)?),
        ];
        for (step, rows_affected) in steps {
            self.observer.on_event(&PipelineEvent::TransformStep {
                step: step.to_string(),
                rows_affected,
            });
        }

        out.with_column(timestamp_series(
            columns::LOADED_TIMESTAMP,
            now,
            out.height(),
        )?)?;

        info!("Transformation complete: {} records", out.height());
        Ok(out)
    }
}

/// Transform with default settings.
pub fn transform(df: &DataFrame) -> Result<DataFrame> {
    Transformer::new().transform(df)
}

/// Overwrite or fill `total_fare` with `base_fare + tax_surcharge`.
fn reconcile_total_fare(df: &mut DataFrame) -> Result<usize> {
    if !has_column(df, columns::BASE_FARE) || !has_column(df, columns::TAX_SURCHARGE) {
        warn!("Cannot reconcile total_fare: base_fare or tax_surcharge is missing");
        return Ok(0);
    }

    let base = numeric_values(df.column(columns::BASE_FARE)?.as_materialized_series())?;
    let tax = numeric_values(df.column(columns::TAX_SURCHARGE)?.as_materialized_series())?;
    let computed: Vec<Option<f64>> = base
        .iter()
        .zip(&tax)
        .map(|(b, t)| Some((*b)? + (*t)?))
        .collect();

    let (totals, changed) = if has_column(df, columns::TOTAL_FARE) {
        let current = numeric_values(df.column(columns::TOTAL_FARE)?.as_materialized_series())?;
        let mut changed = 0;
        let totals: Vec<Option<f64>> = current
            .iter()
            .zip(&computed)
            .map(|(current, computed)| match (current, computed) {
                (Some(c), Some(expected)) if (expected - c).abs() > FARE_TOLERANCE => {
                    changed += 1;
                    Some(*expected)
                }
                (None, Some(expected)) => {
                    changed += 1;
                    Some(*expected)
                }
                (current, _) => *current,
            })
            .collect();
        if changed > 0 {
            info!("Corrected {} total_fare values", changed);
        }
        (totals, changed)
    } else {
        info!("Created total_fare column from base_fare + tax_surcharge");
        let created = computed.len();
        (computed, created)
    };

    df.with_column(Series::new(columns::TOTAL_FARE.into(), totals))?;
    Ok(changed)
}

/// Trim and title-case the categorical text columns. Nulls stay null.
fn normalize_strings(df: &mut DataFrame) -> Result<usize> {
    let mut changed = 0;
    for name in columns::CATEGORICAL {
        let Ok(col) = df.column(name) else {
            continue;
        };
        let series = col.as_materialized_series();
        let was_string = series.dtype() == &DataType::String;
        let values = string_values(series)?;

        let normalized: Vec<Option<String>> = values
            .iter()
            .map(|v| v.as_deref().map(|s| title_case(s.trim())))
            .collect();
        changed += values
            .iter()
            .zip(&normalized)
            .filter(|(before, after)| !was_string || before != after)
            .count();

        df.replace(name, Series::new(name.into(), normalized))?;
    }
    Ok(changed)
}

/// Cast fares to `Float64`; unparseable values become null.
fn coerce_fares(df: &mut DataFrame) -> Result<usize> {
    let mut nulled = 0;
    for name in columns::FARES {
        let Ok(col) = df.column(name) else {
            continue;
        };
        let series = col.as_materialized_series();
        nulled += non_numeric_rows(series)?.len();
        let values = numeric_values(series)?;
        df.replace(name, Series::new(name.into(), values))?;
    }
    Ok(nulled)
}

/// Add `flight_date` unless present. Returns the rows without a usable date.
fn derive_flight_date(
    df: &mut DataFrame,
    date_column: Option<&str>,
    now: DateTime<Utc>,
) -> Result<usize> {
    if has_column(df, columns::FLIGHT_DATE) {
        return Ok(0);
    }

    let dates = match date_column.filter(|c| has_column(df, c)) {
        Some(source) => date_values(df.column(source)?.as_materialized_series())?,
        None => {
            let today = now.date_naive();
            vec![Some(today); df.height()]
        }
    };
    let missing = dates.iter().filter(|d| d.is_none()).count();
    if missing > 0 {
        warn!("{} rows have no parseable flight date", missing);
    }

    df.with_column(date_series(columns::FLIGHT_DATE, &dates)?)?;
    Ok(missing)
}

/// Classify every row from its `flight_date`. Returns the `UNKNOWN` count.
fn add_season(df: &mut DataFrame) -> Result<usize> {
    let dates = date_values(df.column(columns::FLIGHT_DATE)?.as_materialized_series())?;
    let seasons: Vec<&str> = dates
        .iter()
        .map(|d| classify_season(*d).as_str())
        .collect();
    let unknown = dates.iter().filter(|d| d.is_none()).count();

    df.with_column(Series::new(columns::SEASON.into(), seasons))?;
    Ok(unknown)
}

/// Set `is_valid` to true wherever it is not already set.
fn default_is_valid(df: &mut DataFrame) -> Result<usize> {
    let existing: Vec<Option<bool>> = match df.column(columns::IS_VALID) {
        Ok(col) => {
            let casted = col.as_materialized_series().cast(&DataType::Boolean)?;
            casted.bool()?.into_iter().collect()
        }
        Err(_) => vec![None; df.height()],
    };

    let defaulted = existing.iter().filter(|v| v.is_none()).count();
    let flags: Vec<bool> = existing.into_iter().map(|v| v.unwrap_or(true)).collect();
    df.with_column(Series::new(columns::IS_VALID.into(), flags))?;
    Ok(defaulted)
}
