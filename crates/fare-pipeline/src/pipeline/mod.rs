//! End-to-end pipeline runner.
//!
//! Validation, optional cleaning, enrichment and aggregation are wired
//! together here. The validation report is a side product: it never filters
//! rows or stops the later stages.

mod builder;

pub use builder::{Pipeline, PipelineBuilder, PipelineOutput};
