//! Report generation.
//!
//! - [`QualityMetricRow`]: one row per validation check, ready to persist
//! - [`TransformationSummary`] and [`KpiSummary`]: headline numbers per stage
//! - [`PipelineReport`] and [`ReportGenerator`]: the JSON report and KPI CSVs
//!   written by the command-line tool
//!
//! # Example
//!
//! ```rust,ignore
//! use fare_pipeline::reporting::{PipelineReport, ReportGenerator};
//!
//! let report = PipelineReport::from_output("data/fares.csv", &output);
//! println!("{}", serde_json::to_string_pretty(&report)?);
//!
//! let generator = ReportGenerator::new(PathBuf::from("outputs"));
//! generator.write_report_to_file(&report, "fares")?;
//! generator.write_kpi_tables(&output.kpis, "fares")?;
//! ```

mod generator;
mod metrics;
mod summary;

pub use generator::{PipelineReport, ReportGenerator};
pub use metrics::QualityMetricRow;
pub use summary::{
    AirlineAverageSummary, BookingCountSummary, FareStatistics, KpiSummary, PopularRoutesSummary,
    Route, SeasonalVariationSummary, TransformationSummary,
};
