//! Structured pipeline events and the observers that receive them.
//!
//! Stages never log counts through a global side channel; they hand a
//! [`PipelineEvent`] to whichever [`PipelineObserver`] the caller injected.
//! [`TracingObserver`] is the default and forwards events to `tracing`.
//!
//! # Example
//!
//! ```rust,ignore
//! use fare_pipeline::{ClosureObserver, PipelineEvent, Validator};
//! use std::sync::Arc;
//!
//! let observer = Arc::new(ClosureObserver::new(|event: &PipelineEvent| {
//!     if let PipelineEvent::CheckCompleted { check_name, records_failed, .. } = event {
//!         println!("{check_name}: {records_failed} rows flagged");
//!     }
//! }));
//!
//! let report = Validator::new().with_observer(observer).validate(&df, None);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Something a stage wants the outside world to know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A validation check ran to completion.
    CheckCompleted {
        check_name: String,
        records_passed: usize,
        records_failed: usize,
    },
    /// A validation check could not run; its rows count as failed.
    CheckErrored { check_name: String, reason: String },
    /// A validation check did not apply to this run.
    CheckSkipped { check_name: String, reason: String },
    /// Validation finished.
    ValidationFinished {
        total_records: usize,
        valid_records: usize,
        invalid_records: usize,
    },
    /// A transformation step touched some rows.
    TransformStep { step: String, rows_affected: usize },
    /// A KPI table was computed.
    KpiComputed { kpi: String, rows: usize },
    /// A KPI table could not be computed and was replaced by an empty table.
    KpiFailed { kpi: String, reason: String },
}

/// Receiver of [`PipelineEvent`]s.
///
/// Implementations must be `Send + Sync` so one observer can be shared by
/// pipelines running on different datasets at the same time.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Forwards every event to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::CheckCompleted {
                check_name,
                records_passed,
                records_failed,
            } => {
                if *records_failed > 0 {
                    warn!(check = %check_name, passed = records_passed, failed = records_failed, "validation check flagged rows");
                } else {
                    debug!(check = %check_name, passed = records_passed, "validation check passed");
                }
            }
            PipelineEvent::CheckErrored { check_name, reason } => {
                warn!(check = %check_name, %reason, "validation check errored");
            }
            PipelineEvent::CheckSkipped { check_name, reason } => {
                debug!(check = %check_name, %reason, "validation check skipped");
            }
            PipelineEvent::ValidationFinished {
                total_records,
                valid_records,
                invalid_records,
            } => {
                info!(total = total_records, valid = valid_records, invalid = invalid_records, "validation complete");
            }
            PipelineEvent::TransformStep {
                step,
                rows_affected,
            } => {
                debug!(%step, rows = rows_affected, "transformation step");
            }
            PipelineEvent::KpiComputed { kpi, rows } => {
                info!(%kpi, rows, "kpi computed");
            }
            PipelineEvent::KpiFailed { kpi, reason } => {
                warn!(%kpi, %reason, "kpi failed, emitting empty table");
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_event(&self, _event: &PipelineEvent) {}
}

/// Wrapper that implements [`PipelineObserver`] using a closure.
pub struct ClosureObserver<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureObserver<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> PipelineObserver for ClosureObserver<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    fn on_event(&self, event: &PipelineEvent) {
        (self.callback)(event);
    }
}

/// Shared handle to an observer.
pub type SharedObserver = Arc<dyn PipelineObserver>;

pub(crate) fn default_observer() -> SharedObserver {
    Arc::new(TracingObserver)
}

static_assertions::assert_impl_all!(PipelineEvent: Send, Sync);
static_assertions::assert_impl_all!(TracingObserver: Send, Sync);
