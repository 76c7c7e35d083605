//! KPI aggregation over the enriched dataset.
//!
//! [`Aggregator::compute_all`] builds every table independently: a table
//! whose input is malformed is replaced by an empty table with the same
//! schema, and the others are still computed.

mod tables;

use crate::error::{PipelineError, Result};
use crate::observer::{PipelineEvent, SharedObserver, default_observer};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tables::{airline_average, booking_count, empty_input, popular_routes, seasonal_variation};
use tracing::info;

/// The KPI tables produced by every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiKind {
    AirlineAverage,
    SeasonalVariation,
    PopularRoutes,
    BookingCount,
}

impl KpiKind {
    pub const ALL: [KpiKind; 4] = [
        Self::AirlineAverage,
        Self::SeasonalVariation,
        Self::PopularRoutes,
        Self::BookingCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AirlineAverage => "airline_average",
            Self::SeasonalVariation => "seasonal_variation",
            Self::PopularRoutes => "popular_routes",
            Self::BookingCount => "booking_count",
        }
    }
}

impl fmt::Display for KpiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A KPI that could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiFailure {
    pub kpi: KpiKind,
    pub reason: String,
}

/// All KPI tables of one run, keyed by kind.
#[derive(Debug, Clone)]
pub struct KpiTables {
    computed_at: DateTime<Utc>,
    tables: BTreeMap<KpiKind, DataFrame>,
    failures: Vec<KpiFailure>,
}

impl KpiTables {
    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    pub fn get(&self, kind: KpiKind) -> Option<&DataFrame> {
        self.tables.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (KpiKind, &DataFrame)> {
        self.tables.iter().map(|(kind, df)| (*kind, df))
    }

    /// KPIs that were replaced by an empty table.
    pub fn failures(&self) -> &[KpiFailure] {
        &self.failures
    }

    /// Tables keyed by their name.
    pub fn into_named(self) -> BTreeMap<String, DataFrame> {
        self.tables
            .into_iter()
            .map(|(kind, df)| (kind.as_str().to_string(), df))
            .collect()
    }
}

/// Computes the KPI tables.
pub struct Aggregator {
    observer: SharedObserver,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            observer: default_observer(),
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn compute_all(&self, df: &DataFrame, top_routes_limit: usize) -> KpiTables {
        self.compute_all_at(df, top_routes_limit, Utc::now())
    }

    /// Compute every table, stamping `computed_at`.
    pub fn compute_all_at(
        &self,
        df: &DataFrame,
        top_routes_limit: usize,
        computed_at: DateTime<Utc>,
    ) -> KpiTables {
        info!("Computing KPIs for {} records...", df.height());

        let mut tables = BTreeMap::new();
        let mut failures = Vec::new();

        for kind in KpiKind::ALL {
            match compute_one(kind, df, top_routes_limit, computed_at) {
                Ok(table) => {
                    self.observer.on_event(&PipelineEvent::KpiComputed {
                        kpi: kind.as_str().to_string(),
                        rows: table.height(),
                    });
                    tables.insert(kind, table);
                }
                Err(e) => {
                    let reason = e.to_string();
                    self.observer.on_event(&PipelineEvent::KpiFailed {
                        kpi: kind.as_str().to_string(),
                        reason: reason.clone(),
                    });
                    let empty = empty_table(kind, top_routes_limit, computed_at)
                        .unwrap_or_else(|_| DataFrame::empty());
                    tables.insert(kind, empty);
                    failures.push(KpiFailure { kpi: kind, reason });
                }
            }
        }

        KpiTables {
            computed_at,
            tables,
            failures,
        }
    }
}

/// Compute all KPI tables with default settings.
pub fn compute_all_kpis(df: &DataFrame, top_routes_limit: usize) -> KpiTables {
    Aggregator::new().compute_all(df, top_routes_limit)
}

/// Build one table. Errors are wrapped as [`PipelineError::KpiFailed`].
fn compute_one(
    kind: KpiKind,
    df: &DataFrame,
    top_routes_limit: usize,
    computed_at: DateTime<Utc>,
) -> Result<DataFrame> {
    let table = match kind {
        KpiKind::AirlineAverage => airline_average(df, computed_at),
        KpiKind::SeasonalVariation => seasonal_variation(df, computed_at),
        KpiKind::PopularRoutes => popular_routes(df, top_routes_limit, computed_at),
        KpiKind::BookingCount => booking_count(df, computed_at),
    };
    table.map_err(|e| PipelineError::KpiFailed {
        kpi: kind.as_str().to_string(),
        reason: e.to_string(),
    })
}

/// The table `kind` computed over zero rows, so failures keep the schema.
fn empty_table(
    kind: KpiKind,
    top_routes_limit: usize,
    computed_at: DateTime<Utc>,
) -> Result<DataFrame> {
    compute_one(kind, &empty_input()?, top_routes_limit, computed_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::ClosureObserver;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_failing_kpi_is_isolated() {
        // No season or route columns: two tables fail, two succeed
        let df = df![
            "airline" => ["Biman", "Novoair"],
            "base_fare" => [100.0, 50.0],
            "tax_surcharge" => [10.0, 5.0],
            "total_fare" => [110.0, 55.0],
        ]
        .unwrap();

        let failed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failed);
        let observer = Arc::new(ClosureObserver::new(move |event: &PipelineEvent| {
            if let PipelineEvent::KpiFailed { kpi, .. } = event {
                sink.lock().unwrap().push(kpi.clone());
            }
        }));

        let kpis = Aggregator::new().with_observer(observer).compute_all(&df, 10);

        assert_eq!(kpis.get(KpiKind::AirlineAverage).unwrap().height(), 2);
        assert_eq!(kpis.get(KpiKind::BookingCount).unwrap().height(), 2);
        assert_eq!(kpis.get(KpiKind::SeasonalVariation).unwrap().height(), 0);
        assert_eq!(kpis.get(KpiKind::PopularRoutes).unwrap().height(), 0);
        assert_eq!(kpis.failures().len(), 2);
        assert_eq!(
            kpis.failures()[0].reason,
            "Failed to compute KPI 'seasonal_variation': Column 'season' not found in dataset"
        );
        assert_eq!(
            kpis.get(KpiKind::PopularRoutes).unwrap().width(),
            6,
            "failed table keeps its schema"
        );
        assert_eq!(
            *failed.lock().unwrap(),
            vec!["seasonal_variation", "popular_routes"]
        );
    }

    #[test]
    fn test_every_table_carries_computed_at() {
        let df = df![
            "airline" => ["Biman"],
            "source" => ["DAC"],
            "destination" => ["CGP"],
            "base_fare" => [100.0],
            "tax_surcharge" => [10.0],
            "total_fare" => [110.0],
            "season" => ["PEAK_WINTER"],
        ]
        .unwrap();

        let kpis = compute_all_kpis(&df, 10);
        for (kind, table) in kpis.iter() {
            assert!(table.column("computed_at").is_ok(), "{kind} lacks computed_at");
            assert_eq!(table.height(), 1, "{kind}");
        }
        assert!(kpis.failures().is_empty());
    }

    #[test]
    fn test_named_tables() {
        let df = df!["airline" => ["Biman"]].unwrap();
        let names: Vec<String> = compute_all_kpis(&df, 10).into_named().into_keys().collect();
        assert_eq!(
            names,
            vec!["airline_average", "booking_count", "popular_routes", "seasonal_variation"]
        );
    }
}
