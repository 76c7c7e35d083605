//! The four KPI tables.
//!
//! Each builder coerces its input columns, groups with `group_by_stable` and
//! sorts with `maintain_order`, so groups appear in first-seen order and ties
//! keep that order. Rows with a null key are skipped. Counts are `UInt64`.

use crate::error::{PipelineError, Result};
use crate::types::{Season, columns};
use crate::utils::{fare_series, has_column, timestamp_series};
use chrono::{DateTime, Utc};
use polars::prelude::*;

/// Select `text` columns as `String` and `fares` as `Float64`.
fn prepare(df: &DataFrame, text: &[&str], fares: &[&str]) -> Result<LazyFrame> {
    if let Some(missing) = text.iter().chain(fares).find(|name| !has_column(df, name)) {
        return Err(PipelineError::ColumnNotFound(missing.to_string()));
    }

    let mut cols: Vec<Column> = Vec::with_capacity(text.len() + fares.len());
    for name in text {
        cols.push(df.column(name)?.cast(&DataType::String)?);
    }
    for name in fares {
        cols.push(fare_series(df.column(name)?.as_materialized_series())?.into());
    }
    Ok(DataFrame::new(cols)?.lazy())
}

/// Zero-row input carrying every column the builders read.
pub(crate) fn empty_input() -> PolarsResult<DataFrame> {
    let text = [columns::AIRLINE, columns::SOURCE, columns::DESTINATION, columns::SEASON];
    let cols = text
        .iter()
        .map(|name| Column::new_empty((*name).into(), &DataType::String))
        .chain(
            columns::FARES
                .iter()
                .map(|name| Column::new_empty((*name).into(), &DataType::Float64)),
        )
        .collect();
    DataFrame::new(cols)
}

/// Round to currency precision, halves away from zero.
fn money(expr: Expr) -> Expr {
    expr.round(2, RoundMode::HalfAwayFromZero)
}

fn count_as(expr: Expr, name: &str) -> Expr {
    expr.cast(DataType::UInt64).alias(name)
}

fn descending_nulls_last() -> SortMultipleOptions {
    SortMultipleOptions::default()
        .with_order_descending(true)
        .with_nulls_last(true)
        .with_maintain_order(true)
}

/// Rows whose season is on the given side of the peak split. `UNKNOWN` is on neither.
fn season_side(peak: bool) -> Expr {
    [Season::PeakEid, Season::PeakWinter, Season::NonPeak]
        .into_iter()
        .filter(|season| season.is_peak() == peak)
        .map(|season| col(columns::SEASON).eq(lit(season.as_str())))
        .reduce(|a, b| a.or(b))
        .unwrap_or_else(|| lit(false))
}

fn with_computed_at(mut table: DataFrame, computed_at: DateTime<Utc>) -> PolarsResult<DataFrame> {
    let height = table.height();
    table.with_column(timestamp_series(columns::COMPUTED_AT, computed_at, height)?)?;
    Ok(table)
}

/// Mean fares and row count per airline, highest average total fare first.
pub(crate) fn airline_average(df: &DataFrame, computed_at: DateTime<Utc>) -> Result<DataFrame> {
    let table = prepare(df, &[columns::AIRLINE], &columns::FARES)?
        .filter(col(columns::AIRLINE).is_not_null())
        .group_by_stable([col(columns::AIRLINE)])
        .agg([
            money(col(columns::BASE_FARE).mean()).alias("avg_base_fare"),
            money(col(columns::TAX_SURCHARGE).mean()).alias("avg_tax_surcharge"),
            money(col(columns::TOTAL_FARE).mean()).alias("avg_total_fare"),
            count_as(len(), "booking_count"),
        ])
        .sort_by_exprs([col("avg_total_fare")], descending_nulls_last())
        .collect()?;
    Ok(with_computed_at(table, computed_at)?)
}

/// Peak against non-peak fares per airline, largest increase first.
///
/// `UNKNOWN` rows belong to neither side. Booking counts are counts of
/// present `total_fare` values.
pub(crate) fn seasonal_variation(df: &DataFrame, computed_at: DateTime<Utc>) -> Result<DataFrame> {
    let peak = season_side(true);
    let non_peak = season_side(false);
    let total = || col(columns::TOTAL_FARE);

    let table = prepare(df, &[columns::AIRLINE, columns::SEASON], &[columns::TOTAL_FARE])?
        .filter(
            col(columns::AIRLINE)
                .is_not_null()
                .and(peak.clone().or(non_peak.clone())),
        )
        .group_by_stable([col(columns::AIRLINE)])
        .agg([
            money(total().filter(peak.clone()).mean()).alias("avg_fare_peak"),
            count_as(total().filter(peak).count(), "peak_booking_count"),
            money(total().filter(non_peak.clone()).mean()).alias("avg_fare_non_peak"),
            count_as(total().filter(non_peak).count(), "non_peak_booking_count"),
        ])
        .with_column(money(col("avg_fare_peak") - col("avg_fare_non_peak")).alias("fare_difference"))
        .with_column(
            when(col("avg_fare_non_peak").neq(lit(0.0)))
                .then(money(
                    col("fare_difference") / col("avg_fare_non_peak") * lit(100.0),
                ))
                .otherwise(lit(NULL))
                .alias("peak_percentage_increase"),
        )
        .sort_by_exprs([col("peak_percentage_increase")], descending_nulls_last())
        .collect()?;
    Ok(with_computed_at(table, computed_at)?)
}

/// The `limit` routes with the most fares, ranked from 1.
pub(crate) fn popular_routes(
    df: &DataFrame,
    limit: usize,
    computed_at: DateTime<Utc>,
) -> Result<DataFrame> {
    let table = prepare(
        df,
        &[columns::SOURCE, columns::DESTINATION],
        &[columns::TOTAL_FARE],
    )?
    .filter(
        col(columns::SOURCE)
            .is_not_null()
            .and(col(columns::DESTINATION).is_not_null()),
    )
    .group_by_stable([col(columns::SOURCE), col(columns::DESTINATION)])
    .agg([
        count_as(col(columns::TOTAL_FARE).count(), "booking_count"),
        money(col(columns::TOTAL_FARE).mean()).alias("avg_fare_on_route"),
    ])
    .sort_by_exprs([col("booking_count")], descending_nulls_last())
    .limit(IdxSize::try_from(limit).unwrap_or(IdxSize::MAX))
    .with_row_index("route_rank", Some(1))
    .select([
        col(columns::SOURCE),
        col(columns::DESTINATION),
        col("booking_count"),
        count_as(col("route_rank"), "route_rank"),
        col("avg_fare_on_route"),
    ])
    .collect()?;
    Ok(with_computed_at(table, computed_at)?)
}

/// Row count per airline, busiest first.
pub(crate) fn booking_count(df: &DataFrame, computed_at: DateTime<Utc>) -> Result<DataFrame> {
    let table = prepare(df, &[columns::AIRLINE], &[])?
        .filter(col(columns::AIRLINE).is_not_null())
        .group_by_stable([col(columns::AIRLINE)])
        .agg([count_as(len(), "total_bookings")])
        .sort_by_exprs([col("total_bookings")], descending_nulls_last())
        .collect()?;
    Ok(with_computed_at(table, computed_at)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enriched() -> DataFrame {
        df![
            "airline" => [Some("Biman"), Some("Novoair"), Some("Biman"), Some("Biman"), None],
            "source" => [Some("DAC"), Some("CGP"), Some("DAC"), Some("ZYL"), Some("DAC")],
            "destination" => [Some("CGP"), Some("DAC"), Some("CGP"), Some("DAC"), None],
            "base_fare" => [100.0, 50.0, 200.0, 300.0, 10.0],
            "tax_surcharge" => [10.0, 5.0, 20.0, 30.0, 1.0],
            "total_fare" => [110.0, 55.0, 220.0, 330.0, 11.0],
            "season" => ["PEAK_EID", "NON_PEAK", "NON_PEAK", "UNKNOWN", "PEAK_WINTER"],
        ]
        .unwrap()
    }

    fn texts(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        df.column(name)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name).unwrap().f64().unwrap().into_iter().collect()
    }

    fn counts(df: &DataFrame, name: &str) -> Vec<u64> {
        df.column(name)
            .unwrap()
            .u64()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect()
    }

    fn some(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_airline_average() {
        let table = airline_average(&enriched(), Utc::now()).unwrap();

        assert_eq!(texts(&table, "airline"), some(&["Biman", "Novoair"]));
        assert_eq!(floats(&table, "avg_total_fare"), vec![Some(220.0), Some(55.0)]);
        assert_eq!(floats(&table, "avg_base_fare"), vec![Some(200.0), Some(50.0)]);
        assert_eq!(counts(&table, "booking_count"), vec![3, 1]);
    }

    #[test]
    fn test_averages_round_half_away_from_zero() {
        let df = df![
            "airline" => ["Biman", "Biman"],
            "base_fare" => [0.0, 0.25],
            "tax_surcharge" => [1.0, 1.0],
            "total_fare" => [1.0, 1.25],
        ]
        .unwrap();
        let table = airline_average(&df, Utc::now()).unwrap();
        assert_eq!(floats(&table, "avg_base_fare"), vec![Some(0.13)]);
        assert_eq!(floats(&table, "avg_total_fare"), vec![Some(1.13)]);
    }

    #[test]
    fn test_seasonal_variation() {
        let table = seasonal_variation(&enriched(), Utc::now()).unwrap();

        // Nulls sort last
        assert_eq!(texts(&table, "airline"), some(&["Biman", "Novoair"]));
        assert_eq!(floats(&table, "avg_fare_peak"), vec![Some(110.0), None]);
        assert_eq!(floats(&table, "avg_fare_non_peak"), vec![Some(220.0), Some(55.0)]);
        assert_eq!(floats(&table, "fare_difference"), vec![Some(-110.0), None]);
        assert_eq!(floats(&table, "peak_percentage_increase"), vec![Some(-50.0), None]);
        assert_eq!(counts(&table, "peak_booking_count"), vec![1, 0]);
        assert_eq!(counts(&table, "non_peak_booking_count"), vec![1, 1]);
    }

    #[test]
    fn test_zero_non_peak_average_has_no_percentage() {
        let df = df![
            "airline" => ["Biman", "Biman"],
            "season" => ["PEAK_EID", "NON_PEAK"],
            "total_fare" => [100.0, 0.0],
        ]
        .unwrap();
        let table = seasonal_variation(&df, Utc::now()).unwrap();
        assert_eq!(floats(&table, "fare_difference"), vec![Some(100.0)]);
        assert_eq!(floats(&table, "peak_percentage_increase"), vec![None]);
    }

    #[test]
    fn test_seasonal_counts_skip_missing_fares() {
        let df = df![
            "airline" => ["Biman", "Biman", "Biman"],
            "season" => ["PEAK_EID", "NON_PEAK", "NON_PEAK"],
            "total_fare" => [Some(100.0), None, Some(80.0)],
        ]
        .unwrap();
        let table = seasonal_variation(&df, Utc::now()).unwrap();
        assert_eq!(counts(&table, "peak_booking_count"), vec![1]);
        assert_eq!(counts(&table, "non_peak_booking_count"), vec![1]);
        assert_eq!(floats(&table, "avg_fare_non_peak"), vec![Some(80.0)]);
    }

    #[test]
    fn test_seasonal_airline_with_only_missing_fares() {
        let df = df![
            "airline" => ["Biman"],
            "season" => ["NON_PEAK"],
            "total_fare" => [None::<f64>],
        ]
        .unwrap();
        let table = seasonal_variation(&df, Utc::now()).unwrap();
        assert_eq!(table.height(), 1);
        assert_eq!(counts(&table, "non_peak_booking_count"), vec![0]);
        assert_eq!(floats(&table, "avg_fare_non_peak"), vec![None]);
    }

    #[test]
    fn test_popular_routes_rank_and_limit() {
        let table = popular_routes(&enriched(), 2, Utc::now()).unwrap();

        // Tie between CGP-DAC and ZYL-DAC resolved by input order
        assert_eq!(texts(&table, "source"), some(&["DAC", "CGP"]));
        assert_eq!(texts(&table, "destination"), some(&["CGP", "DAC"]));
        assert_eq!(counts(&table, "booking_count"), vec![2, 1]);
        assert_eq!(counts(&table, "route_rank"), vec![1, 2]);
        assert_eq!(floats(&table, "avg_fare_on_route"), vec![Some(165.0), Some(55.0)]);
    }

    #[test]
    fn test_route_bookings_count_present_fares() {
        let df = df![
            "source" => ["DAC", "DAC", "CGP", "CGP"],
            "destination" => ["CGP", "CGP", "DAC", "DAC"],
            "total_fare" => [Some(100.0), None, Some(50.0), Some(70.0)],
        ]
        .unwrap();
        let table = popular_routes(&df, 10, Utc::now()).unwrap();

        assert_eq!(texts(&table, "source"), some(&["CGP", "DAC"]));
        assert_eq!(counts(&table, "booking_count"), vec![2, 1]);
        assert_eq!(floats(&table, "avg_fare_on_route"), vec![Some(60.0), Some(100.0)]);
    }

    #[test]
    fn test_booking_count() {
        let table = booking_count(&enriched(), Utc::now()).unwrap();
        assert_eq!(texts(&table, "airline"), some(&["Biman", "Novoair"]));
        assert_eq!(counts(&table, "total_bookings"), vec![3, 1]);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let df = df!["airline" => ["Biman"]].unwrap();
        assert!(matches!(
            popular_routes(&df, 10, Utc::now()),
            Err(PipelineError::ColumnNotFound(c)) if c == "source"
        ));
    }

    #[test]
    fn test_tables_have_fixed_schema_when_empty() {
        let table = popular_routes(&empty_input().unwrap(), 10, Utc::now()).unwrap();
        assert_eq!(table.height(), 0);
        assert_eq!(
            table.get_column_names().iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            vec!["source", "destination", "booking_count", "route_rank", "avg_fare_on_route", "computed_at"]
        );
        assert_eq!(table.column("booking_count").unwrap().dtype(), &DataType::UInt64);
    }
}
