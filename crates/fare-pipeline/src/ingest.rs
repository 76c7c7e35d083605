//! CSV loading into the staging shape.
//!
//! Headers are renamed through a fixed mapping. Headers without a mapping are
//! kept verbatim. Every loaded row gets the staging metadata columns.

use crate::error::{Result, ResultExt};
use crate::types::{RecordStatus, columns};
use crate::utils::{has_column, timestamp_series};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Raw CSV header -> staging column name.
pub static COLUMN_MAPPING: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Airline", columns::AIRLINE),
        ("Source", columns::SOURCE),
        ("Source Name", "source_name"),
        ("Destination", columns::DESTINATION),
        ("Destination Name", "destination_name"),
        ("Departure Date & Time", columns::DEPARTURE_DATE),
        ("Arrival Date & Time", "arrival_date"),
        ("Duration (hrs)", "duration_hours"),
        ("Stopovers", "stopovers"),
        ("Aircraft Type", "aircraft_type"),
        ("Class", "class"),
        ("Booking Source", "booking_source"),
        ("Base Fare (BDT)", columns::BASE_FARE),
        ("Tax & Surcharge (BDT)", columns::TAX_SURCHARGE),
        ("Total Fare (BDT)", columns::TOTAL_FARE),
        ("Seasonality", "seasonality"),
        ("Days Before Departure", "days_before_departure"),
    ])
});

/// Read a fare CSV and shape it for validation.
pub fn load_fare_csv(path: &Path) -> Result<DataFrame> {
    info!("Loading dataset from: {}", path.display());

    let raw = CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .context(format!("Opening {}", path.display()))?
        .finish()
        .context(format!("Reading {}", path.display()))?;

    let source_file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let staged = stage_frame(raw, &source_file, Utc::now())?;
    info!("Dataset loaded successfully: {:?}", staged.shape());
    Ok(staged)
}

/// Rename mapped headers and append `source_file`, `ingestion_timestamp`,
/// `record_status = VALID` and a null `validation_errors`.
pub fn stage_frame(
    mut df: DataFrame,
    source_file: &str,
    ingested_at: DateTime<Utc>,
) -> Result<DataFrame> {
    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    for header in &headers {
        match COLUMN_MAPPING.get(header.trim()) {
            Some(target) if header.as_str() != *target => {
                df.rename(header, (*target).into())?;
            }
            Some(_) => {}
            None => debug!("Keeping unmapped column '{}'", header),
        }
    }

    let height = df.height();
    df.with_column(Series::new(
        columns::SOURCE_FILE.into(),
        vec![source_file; height],
    ))?;
    df.with_column(timestamp_series(
        columns::INGESTION_TIMESTAMP,
        ingested_at,
        height,
    )?)?;
    df.with_column(Series::new(
        columns::RECORD_STATUS.into(),
        vec![RecordStatus::Valid.as_str(); height],
    ))?;
    if !has_column(&df, columns::VALIDATION_ERRORS) {
        df.with_column(Series::new(
            columns::VALIDATION_ERRORS.into(),
            vec![None::<&str>; height],
        ))?;
    }

    Ok(df)
}
