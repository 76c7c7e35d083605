//! Run summaries for the transformation and KPI stages.

use crate::error::Result;
use crate::kpi::{KpiKind, KpiTables};
use crate::types::columns;
use crate::utils::{column_names, fare_series, has_column, string_values};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Distribution of `total_fare` after transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
}

impl FareStatistics {
    /// Statistics over the non-null values of a `Float64` series.
    fn from_series(fares: &Series) -> PolarsResult<Self> {
        Ok(Self {
            min: fares.min::<f64>()?,
            max: fares.max::<f64>()?,
            mean: fares.mean(),
            median: fares.median(),
            std_dev: fares.std(1),
        })
    }
}

/// Before/after comparison of a transformation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationSummary {
    pub original_record_count: usize,
    pub final_record_count: usize,
    pub records_removed: usize,
    /// Columns present after transformation only, in output order
    pub new_columns_added: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fare_statistics: Option<FareStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_distribution: Option<BTreeMap<String, usize>>,
    pub transformation_timestamp: DateTime<Utc>,
}

impl TransformationSummary {
    pub fn build(original: &DataFrame, transformed: &DataFrame) -> Result<Self> {
        Self::build_at(original, transformed, Utc::now())
    }

    pub fn build_at(
        original: &DataFrame,
        transformed: &DataFrame,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let new_columns_added = column_names(transformed)
            .into_iter()
            .filter(|name| !has_column(original, name))
            .collect();

        let fare_statistics = match transformed.column(columns::TOTAL_FARE) {
            Ok(col) => {
                let fares = fare_series(col.as_materialized_series())?;
                Some(FareStatistics::from_series(&fares)?)
            }
            Err(_) => None,
        };

        let season_distribution = match transformed.column(columns::SEASON) {
            Ok(col) => {
                let mut counts = BTreeMap::new();
                for season in string_values(col.as_materialized_series())?.into_iter().flatten() {
                    *counts.entry(season).or_insert(0) += 1;
                }
                Some(counts)
            }
            Err(_) => None,
        };

        info!(
            "Transformation summary: {} records -> {} records",
            original.height(),
            transformed.height()
        );

        Ok(Self {
            original_record_count: original.height(),
            final_record_count: transformed.height(),
            records_removed: original.height().saturating_sub(transformed.height()),
            new_columns_added,
            fare_statistics,
            season_distribution,
            transformation_timestamp: timestamp,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirlineAverageSummary {
    pub airlines_analyzed: usize,
    pub highest_avg_fare: Option<f64>,
    pub lowest_avg_fare: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalVariationSummary {
    pub airlines_with_peak_data: usize,
    pub max_peak_increase_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularRoutesSummary {
    pub top_routes_identified: usize,
    pub most_booked_route: Option<Route>,
    pub top_route_bookings: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCountSummary {
    pub total_airlines: usize,
    pub total_bookings: Option<u64>,
}

/// Headline numbers from the KPI tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub computation_timestamp: DateTime<Utc>,
    pub airline_average: AirlineAverageSummary,
    pub seasonal_variation: SeasonalVariationSummary,
    pub popular_routes: PopularRoutesSummary,
    pub booking_count: BookingCountSummary,
}

/// Numeric column of `df` as `Float64`, empty when absent.
fn numbers(df: &DataFrame, name: &str) -> Result<Series> {
    match df.column(name) {
        Ok(col) => Ok(fare_series(col.as_materialized_series())?),
        Err(_) => Ok(Series::new_empty(name.into(), &DataType::Float64)),
    }
}

/// Text column of `df`, empty when absent.
fn texts(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    match df.column(name) {
        Ok(col) => Ok(string_values(col.as_materialized_series())?),
        Err(_) => Ok(Vec::new()),
    }
}

impl KpiSummary {
    pub fn build(kpis: &KpiTables) -> Result<Self> {
        let empty = DataFrame::empty();
        let table = |kind| kpis.get(kind).unwrap_or(&empty);

        let averages = table(KpiKind::AirlineAverage);
        let avg_fares = numbers(averages, "avg_total_fare")?;

        let seasonal = table(KpiKind::SeasonalVariation);
        let peak_fares = numbers(seasonal, "avg_fare_peak")?;
        let airlines_with_peak_data = peak_fares.len() - peak_fares.null_count();
        let max_peak_increase_pct = numbers(seasonal, "peak_percentage_increase")?.max::<f64>()?;

        let routes = table(KpiKind::PopularRoutes);
        let sources = texts(routes, columns::SOURCE)?;
        let destinations = texts(routes, columns::DESTINATION)?;
        let most_booked_route = match (sources.first(), destinations.first()) {
            (Some(Some(source)), Some(Some(destination))) => Some(Route {
                source: source.clone(),
                destination: destination.clone(),
            }),
            _ => None,
        };
        let top_route_bookings = numbers(routes, "booking_count")?
            .f64()?
            .first()
            .map(|v| v as u64);

        let bookings = table(KpiKind::BookingCount);
        let booking_totals = numbers(bookings, "total_bookings")?;
        let total_bookings = if booking_totals.len() > booking_totals.null_count() {
            Some(booking_totals.sum::<u64>()?)
        } else {
            None
        };

        Ok(Self {
            computation_timestamp: kpis.computed_at(),
            airline_average: AirlineAverageSummary {
                airlines_analyzed: averages.height(),
                highest_avg_fare: avg_fares.max::<f64>()?,
                lowest_avg_fare: avg_fares.min::<f64>()?,
            },
            seasonal_variation: SeasonalVariationSummary {
                airlines_with_peak_data,
                max_peak_increase_pct,
            },
            popular_routes: PopularRoutesSummary {
                top_routes_identified: routes.height(),
                most_booked_route,
                top_route_bookings,
            },
            booking_count: BookingCountSummary {
                total_airlines: bookings.height(),
                total_bookings,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::compute_all_kpis;
    use crate::transform::transform;

    fn staged() -> DataFrame {
        df![
            "airline" => ["Biman", "Biman", "Novoair"],
            "source" => ["DAC", "DAC", "CGP"],
            "destination" => ["CGP", "CGP", "DAC"],
            "base_fare" => [100.0, 200.0, 50.0],
            "tax_surcharge" => [10.0, 20.0, 5.0],
            "total_fare" => [110.0, 220.0, 55.0],
            "departure_date" => ["2024-05-10", "2024-03-10", "2024-03-11"],
        ]
        .unwrap()
    }

    #[test]
    fn test_transformation_summary() {
        let original = staged();
        let transformed = transform(&original).unwrap();
        let summary = TransformationSummary::build(&original, &transformed).unwrap();

        assert_eq!(summary.original_record_count, 3);
        assert_eq!(summary.records_removed, 0);
        assert_eq!(
            summary.new_columns_added,
            vec!["flight_date", "season", "is_valid", "loaded_timestamp"]
        );

        let stats = summary.fare_statistics.unwrap();
        assert_eq!(stats.min, Some(55.0));
        assert_eq!(stats.max, Some(220.0));
        assert_eq!(stats.median, Some(110.0));
        assert_eq!(stats.mean, Some(385.0 / 3.0));
        assert_eq!(stats.std_dev.map(|v| v.round()), Some(84.0));

        let seasons = summary.season_distribution.unwrap();
        assert_eq!(seasons.get("PEAK_EID"), Some(&1));
        assert_eq!(seasons.get("NON_PEAK"), Some(&2));
    }

    #[test]
    fn test_kpi_summary() {
        let kpis = compute_all_kpis(&transform(&staged()).unwrap(), 10);
        let summary = KpiSummary::build(&kpis).unwrap();

        assert_eq!(summary.airline_average.airlines_analyzed, 2);
        assert_eq!(summary.airline_average.highest_avg_fare, Some(165.0));
        assert_eq!(summary.airline_average.lowest_avg_fare, Some(55.0));
        assert_eq!(summary.seasonal_variation.airlines_with_peak_data, 1);
        assert_eq!(
            summary.popular_routes.most_booked_route,
            Some(Route {
                source: "Dac".to_string(),
                destination: "Cgp".to_string()
            })
        );
        assert_eq!(summary.popular_routes.top_route_bookings, Some(2));
        assert_eq!(summary.booking_count.total_bookings, Some(3));
    }

    #[test]
    fn test_kpi_summary_of_empty_tables() {
        let empty = df![
            "airline" => Vec::<&str>::new(),
            "source" => Vec::<&str>::new(),
            "destination" => Vec::<&str>::new(),
            "base_fare" => Vec::<f64>::new(),
            "tax_surcharge" => Vec::<f64>::new(),
            "total_fare" => Vec::<f64>::new(),
            "season" => Vec::<&str>::new(),
        ]
        .unwrap();
        let summary = KpiSummary::build(&compute_all_kpis(&empty, 10)).unwrap();

        assert_eq!(summary.airline_average.highest_avg_fare, None);
        assert_eq!(summary.popular_routes.most_booked_route, None);
        assert_eq!(summary.booking_count.total_bookings, None);
    }
}
