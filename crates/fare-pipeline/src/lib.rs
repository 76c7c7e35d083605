//! Flight Fare Pipeline Library
//!
//! Batch data-quality checks, enrichment and KPI aggregation for flight-fare
//! records, built on Polars.
//!
//! # Overview
//!
//! - **Validation**: independent quality checks summarized in a [`ValidationReport`]
//! - **Transformation**: fare reconciliation, string normalization, season classification
//! - **Cleaning**: opt-in deduplication and missing-value strategies
//! - **Aggregation**: airline averages, seasonal variation, popular routes, booking counts
//! - **Observability**: structured [`PipelineEvent`]s delivered to an injectable observer
//!
//! Every stage takes a dataset snapshot and returns a new value; none of them
//! keeps state between calls.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fare_pipeline::{Pipeline, PipelineConfig, load_fare_csv};
//! use std::path::Path;
//!
//! let df = load_fare_csv(Path::new("data/flight_fares.csv"))?;
//!
//! let config = PipelineConfig::builder()
//!     .top_routes_limit(10)
//!     .valid_cities(["DAC", "CGP", "ZYL", "CXB"])
//!     .build()?;
//!
//! let output = Pipeline::builder().config(config).build()?.run(&df)?;
//!
//! println!("{:.2}% valid", output.report.validity_percentage());
//! for (kind, table) in output.kpis.iter() {
//!     println!("{kind}: {} rows", table.height());
//! }
//! ```
//!
//! # Individual stages
//!
//! The stages can also be called on their own:
//!
//! ```rust,ignore
//! use fare_pipeline::{compute_all_kpis, transform, validate};
//!
//! let report = validate(&df, None);
//! let enriched = transform(&df)?;
//! let kpis = compute_all_kpis(&enriched, 10);
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod kpi;
pub mod observer;
pub mod pipeline;
pub mod reporting;
pub mod transform;
pub mod types;
pub mod utils;
pub mod validation;

// Re-exports for convenient access
pub use config::{
    ConfigValidationError, KeepPolicy, MissingValueStrategy, PipelineConfig, PipelineConfigBuilder,
};
pub use error::{PipelineError, Result as PipelineResult, ResultExt};
pub use ingest::{load_fare_csv, stage_frame};
pub use kpi::{Aggregator, KpiFailure, KpiKind, KpiTables, compute_all_kpis};
pub use observer::{
    ClosureObserver, NoopObserver, PipelineEvent, PipelineObserver, SharedObserver,
    TracingObserver,
};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineOutput};
pub use reporting::{KpiSummary, PipelineReport, QualityMetricRow, ReportGenerator, TransformationSummary};
pub use transform::{Transformer, classify_season, handle_missing_values, remove_duplicates, transform};
pub use types::{CheckResult, CheckStatus, CheckType, RecordStatus, Season, ValidationReport};
pub use validation::{Validator, annotate_record_status, validate};
