//! Duplicate removal by key columns.

use crate::config::KeepPolicy;
use crate::error::{PipelineError, Result};
use crate::types::columns;
use crate::utils::has_column;
use polars::prelude::*;
use tracing::debug;

/// Remove rows sharing the same values in `key_columns`.
///
/// `None` uses the default fare key (`airline, source, destination,
/// base_fare, tax_surcharge`). Null key values compare equal to each other,
/// as do `0.0` and `-0.0`.
/// Surviving rows keep their input order. Returns the deduplicated dataset
/// and the number of rows removed.
pub fn remove_duplicates(
    df: &DataFrame,
    key_columns: Option<&[String]>,
    keep: KeepPolicy,
) -> Result<(DataFrame, usize)> {
    let keys: Vec<String> = match key_columns {
        Some(cols) if cols.is_empty() => {
            return Err(PipelineError::InvalidConfig(
                "dedup key set must not be empty".to_string(),
            ));
        }
        Some(cols) => cols.to_vec(),
        None => columns::DEFAULT_DEDUP_KEY
            .iter()
            .map(|c| c.to_string())
            .collect(),
    };

    if let Some(missing) = keys.iter().find(|k| !has_column(df, k)) {
        return Err(PipelineError::ColumnNotFound(missing.clone()));
    }

    let strategy = match keep {
        KeepPolicy::First => UniqueKeepStrategy::First,
        KeepPolicy::Last => UniqueKeepStrategy::Last,
        KeepPolicy::None => UniqueKeepStrategy::None,
    };
    let deduped = df.unique_stable(Some(&keys), strategy, None)?;
    let removed = df.height() - deduped.height();

    if removed > 0 {
        debug!("Removed {} duplicate rows (keep = {:?})", removed, keep);
    }

    Ok((deduped, removed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookings() -> DataFrame {
        df![
            "airline" => ["Biman", "Biman", "Novoair", "Biman"],
            "source" => ["DAC", "DAC", "CGP", "DAC"],
            "destination" => ["CGP", "CGP", "DAC", "CGP"],
            "base_fare" => [100.0, 100.0, 80.0, 100.0],
            "tax_surcharge" => [20.0, 20.0, 10.0, 20.0],
            "seat" => ["1A", "2B", "3C", "4D"],
        ]
        .unwrap()
    }

    fn seats(df: &DataFrame) -> Vec<String> {
        df.column("seat")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|s| s.unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_keep_first() {
        let (deduped, removed) = remove_duplicates(&bookings(), None, KeepPolicy::First).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(seats(&deduped), vec!["1A", "3C"]);
    }

    #[test]
    fn test_keep_last() {
        let (deduped, removed) = remove_duplicates(&bookings(), None, KeepPolicy::Last).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(seats(&deduped), vec!["3C", "4D"]);
    }

    #[test]
    fn test_keep_none_drops_every_copy() {
        let (deduped, removed) = remove_duplicates(&bookings(), None, KeepPolicy::None).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(seats(&deduped), vec!["3C"]);
    }

    #[test]
    fn test_custom_key() {
        let key = vec!["seat".to_string()];
        let (_, removed) = remove_duplicates(&bookings(), Some(&key), KeepPolicy::First).unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_unknown_key_column() {
        let key = vec!["flight_no".to_string()];
        let result = remove_duplicates(&bookings(), Some(&key), KeepPolicy::First);
        assert!(matches!(result, Err(PipelineError::ColumnNotFound(c)) if c == "flight_no"));
    }

    #[test]
    fn test_empty_key_set_rejected() {
        let key: Vec<String> = Vec::new();
        let result = remove_duplicates(&bookings(), Some(&key), KeepPolicy::First);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_signed_zero_fares_are_duplicates() {
        let df = df![
            "airline" => ["Biman", "Biman"],
            "source" => ["DAC", "DAC"],
            "destination" => ["CGP", "CGP"],
            "base_fare" => [0.0, -0.0],
            "tax_surcharge" => [20.0, 20.0],
        ]
        .unwrap();
        let (deduped, removed) = remove_duplicates(&df, None, KeepPolicy::First).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(deduped.height(), 1);
    }

    #[test]
    fn test_null_keys_compare_equal() {
        let df = df![
            "airline" => [Some("Biman"), None, None],
            "seat" => ["1A", "2B", "3C"],
        ]
        .unwrap();
        let key = vec!["airline".to_string()];
        let (deduped, removed) = remove_duplicates(&df, Some(&key), KeepPolicy::First).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(seats(&deduped), vec!["1A", "2B"]);
    }
}
