//! Missing-value policies.

use crate::config::MissingValueStrategy;
use crate::error::Result;
use crate::types::columns;
use crate::utils::{fare_series, has_column, missing_mask};
use polars::prelude::*;
use tracing::{debug, info};

/// Apply `strategy` to a copy of `df`.
///
/// Returns the processed dataset and the number of rows changed or removed:
///
/// - `drop`: rows removed because a required business column is missing
/// - `median`: rows removed plus surviving rows that received an imputed fare
/// - `forward_fill`: rows in which at least one value was filled
/// - `skip`: always 0
pub fn handle_missing_values(
    df: &DataFrame,
    strategy: MissingValueStrategy,
) -> Result<(DataFrame, usize)> {
    match strategy {
        MissingValueStrategy::Drop => {
            let (out, removed) = drop_rows_missing(df, &columns::DROP_REQUIRED)?;
            info!("Dropped {} rows with missing required values", removed);
            Ok((out, removed))
        }
        MissingValueStrategy::Median => impute_median(df),
        MissingValueStrategy::ForwardFill => forward_fill(df),
        MissingValueStrategy::Skip => {
            debug!("Skipping missing value handling");
            Ok((df.clone(), 0))
        }
    }
}

/// Remove rows missing any of `required` (columns absent from `df` are ignored).
fn drop_rows_missing(df: &DataFrame, required: &[&str]) -> Result<(DataFrame, usize)> {
    let mut keep = vec![true; df.height()];
    for name in required.iter().filter(|name| has_column(df, name)) {
        let missing = missing_mask(df.column(name)?.as_materialized_series())?;
        for (row, is_missing) in missing.into_iter().enumerate() {
            if is_missing {
                keep[row] = false;
            }
        }
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let out = df.filter(&mask)?;
    let removed = df.height() - out.height();
    Ok((out, removed))
}

fn impute_median(df: &DataFrame) -> Result<(DataFrame, usize)> {
    let mut out = df.clone();
    let mut imputed = vec![false; df.height()];

    for name in columns::FARES {
        let Ok(col) = df.column(name) else {
            continue;
        };
        let fares = fare_series(col.as_materialized_series())?;
        let Some(median_val) = fares.median() else {
            continue;
        };

        for (row, is_null) in fares.is_null().into_iter().enumerate() {
            if is_null.unwrap_or(false) {
                imputed[row] = true;
            }
        }
        let filled = fares.f64()?.fill_null_with_values(median_val)?;
        out.replace(name, filled.into_series())?;
        debug!("Filled '{}' with median: {:.2}", name, median_val);
    }

    let mut keep = vec![true; out.height()];
    for name in columns::CATEGORICAL.iter().filter(|name| has_column(&out, name)) {
        let missing = missing_mask(out.column(name)?.as_materialized_series())?;
        for (row, is_missing) in missing.into_iter().enumerate() {
            if is_missing {
                keep[row] = false;
            }
        }
    }

    let removed = keep.iter().filter(|k| !**k).count();
    let imputed_survivors = keep
        .iter()
        .zip(&imputed)
        .filter(|(kept, was_imputed)| **kept && **was_imputed)
        .count();

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let out = out.filter(&mask)?;

    info!(
        "Imputed fare columns, dropped {} rows with missing categorical values",
        removed
    );
    Ok((out, removed + imputed_survivors))
}

fn forward_fill(df: &DataFrame) -> Result<(DataFrame, usize)> {
    let mut out = df.clone();
    let mut changed = vec![false; df.height()];

    for col in df.get_columns() {
        let series = col.as_materialized_series();
        if series.null_count() == 0 {
            continue;
        }

        let before = series.is_null();
        let filled = series.fill_null(FillNullStrategy::Forward(None))?;
        let after = filled.is_null();
        for (row, (was_null, is_null)) in before.into_iter().zip(after.into_iter()).enumerate() {
            if was_null.unwrap_or(false) && !is_null.unwrap_or(false) {
                changed[row] = true;
            }
        }
        out.replace(col.name().as_str(), filled)?;
    }

    let rows_changed = changed.into_iter().filter(|c| *c).count();
    info!("Applied forward fill to {} rows", rows_changed);
    Ok((out, rows_changed))
}
