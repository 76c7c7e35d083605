//! Shared helpers for reading and building columns.
//!
//! Every stage coerces raw staging values the same way, so the coercion rules
//! live here: fares become `f64`, text becomes owned `String`s, dates become
//! [`NaiveDate`]s. Values that cannot be coerced turn into `None`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;

/// Days between 0001-01-01 (CE day 1) and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Datetime layouts accepted for string dates, most specific first.
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Date-only layouts accepted for string dates. Day-first wins when ambiguous.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d"];

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a date or datetime.
#[inline]
pub fn is_temporal_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _) | DataType::Date)
}

/// Whether `df` has a column named `name`.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Owned column names, in schema order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// =============================================================================
// Coercion
// =============================================================================

/// Parse a fare cell. Surrounding whitespace is ignored; NaN is not a number.
pub fn parse_fare(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Coerce a column to optional `f64`s.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    if is_numeric_dtype(series.dtype()) {
        let casted = series.cast(&DataType::Float64)?;
        let values = casted
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        return Ok(values);
    }

    let casted = series.cast(&DataType::String)?;
    Ok(casted.str()?.into_iter().map(|v| v.and_then(parse_fare)).collect())
}

/// Coerce a column to a `Float64` series of the same name. NaN and
/// unparseable cells become null.
pub fn fare_series(series: &Series) -> PolarsResult<Series> {
    Ok(Series::new(series.name().clone(), numeric_values(series)?))
}

/// Rows holding a value that is present but cannot be read as a number.
pub fn non_numeric_rows(series: &Series) -> PolarsResult<Vec<usize>> {
    if is_numeric_dtype(series.dtype()) {
        return Ok(Vec::new());
    }

    let casted = series.cast(&DataType::String)?;
    let rows = casted
        .str()?
        .into_iter()
        .enumerate()
        .filter_map(|(idx, v)| match v {
            Some(raw) if parse_fare(raw).is_none() => Some(idx),
            _ => None,
        })
        .collect();
    Ok(rows)
}

/// Per-row missing flags. NaN counts as missing in numeric columns.
pub fn missing_mask(series: &Series) -> PolarsResult<Vec<bool>> {
    if is_numeric_dtype(series.dtype()) {
        let mask = numeric_values(series)?.iter().map(Option::is_none).collect();
        return Ok(mask);
    }
    let nulls = series.is_null();
    let mask = nulls.into_iter().map(|v| v.unwrap_or(false)).collect();
    Ok(mask)
}

/// Coerce a column to optional owned strings.
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let casted = series.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Parse the date portion of a date or datetime string.
pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date);
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Coerce a date, datetime or string column to optional dates.
pub fn date_values(series: &Series) -> PolarsResult<Vec<Option<NaiveDate>>> {
    if is_temporal_dtype(series.dtype()) {
        let days = series.cast(&DataType::Date)?.cast(&DataType::Int32)?;
        return Ok(days
            .i32()?
            .into_iter()
            .map(|d| d.and_then(days_to_date))
            .collect());
    }

    let casted = series.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.and_then(parse_date_str))
        .collect())
}

fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

// =============================================================================
// Column builders
// =============================================================================

/// Build a `Date` column.
pub fn date_series(name: &str, dates: &[Option<NaiveDate>]) -> PolarsResult<Series> {
    let days: Vec<Option<i32>> = dates.iter().map(|d| d.map(date_to_days)).collect();
    Series::new(name.into(), days).cast(&DataType::Date)
}

/// Build a `Datetime(us)` column repeating one UTC instant.
pub fn timestamp_series(name: &str, at: DateTime<Utc>, len: usize) -> PolarsResult<Series> {
    let micros = vec![at.timestamp_micros(); len];
    Series::new(name.into(), micros).cast(&DataType::Datetime(TimeUnit::Microseconds, None))
}

// =============================================================================
// Text
// =============================================================================

/// Title-case a string: letters following a non-letter are uppercased, all
/// other letters lowercased (`"us-bangla airlines"` -> `"Us-Bangla Airlines"`).
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }
    out
}

// =============================================================================
// Tests
// =============================================================================
