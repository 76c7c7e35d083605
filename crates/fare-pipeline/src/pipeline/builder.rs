use crate::config::{ConfigValidationError, PipelineConfig};
use crate::error::{Result, ResultExt};
use crate::kpi::{Aggregator, KpiTables};
use crate::observer::{ClosureObserver, PipelineEvent, SharedObserver, default_observer};
use crate::reporting::{KpiSummary, TransformationSummary};
use crate::transform::{Transformer, handle_missing_values, remove_duplicates};
use crate::types::ValidationReport;
use crate::validation::Validator;
use polars::prelude::*;
use std::sync::Arc;
use tracing::info;

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub report: ValidationReport,
    pub enriched: DataFrame,
    pub kpis: KpiTables,
    pub transformation_summary: TransformationSummary,
    pub kpi_summary: KpiSummary,
    pub duplicates_removed: usize,
    pub missing_rows_changed: usize,
}

/// Runs validation, cleaning, enrichment and aggregation in order.
///
/// Use [`Pipeline::builder()`] to create a pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use fare_pipeline::{Pipeline, PipelineConfig};
///
/// let output = Pipeline::builder()
///     .config(PipelineConfig::builder().top_routes_limit(5).build()?)
///     .on_event(|event| println!("{event:?}"))
///     .build()?
///     .run(&dataframe)?;
///
/// println!("{:.1}% valid", output.report.validity_percentage());
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    observer: SharedObserver,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage on `df`. The input is never modified.
    pub fn run(&self, df: &DataFrame) -> Result<PipelineOutput> {
        let config = &self.config;

        let report = Validator::new()
            .with_observer(Arc::clone(&self.observer))
            .allow_nulls_in(config.allow_null_columns.iter().cloned())
            .validate(df, config.valid_cities.as_deref());

        let mut working = df.clone();

        let mut duplicates_removed = 0;
        if config.remove_duplicates {
            let (deduped, removed) = remove_duplicates(
                &working,
                config.dedup_columns.as_deref(),
                config.dedup_keep,
            )
            .context("During duplicate removal")?;
            self.step("remove_duplicates", removed);
            working = deduped;
            duplicates_removed = removed;
        }

        let (working, missing_rows_changed) =
            handle_missing_values(&working, config.missing_value_strategy)
                .context("During missing-value handling")?;
        self.step("handle_missing_values", missing_rows_changed);

        let enriched = Transformer::new()
            .with_observer(Arc::clone(&self.observer))
            .with_date_column(config.date_column.clone())
            .transform(&working)
            .context("During transformation")?;
        let transformation_summary = TransformationSummary::build(df, &enriched)?;

        let kpis = Aggregator::new()
            .with_observer(Arc::clone(&self.observer))
            .compute_all(&enriched, config.top_routes_limit);
        let kpi_summary = KpiSummary::build(&kpis)?;

        info!(
            "Pipeline complete: {} records in, {} enriched, {} KPI tables",
            df.height(),
            enriched.height(),
            kpis.iter().count()
        );

        Ok(PipelineOutput {
            report,
            enriched,
            kpis,
            transformation_summary,
            kpi_summary,
            duplicates_removed,
            missing_rows_changed,
        })
    }

    fn step(&self, step: &str, rows_affected: usize) {
        self.observer.on_event(&PipelineEvent::TransformStep {
            step: step.to_string(),
            rows_affected,
        });
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    observer: Option<SharedObserver>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Receive structured events from every stage.
    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Convenience wrapper around [`observer`](Self::observer) for closures.
    pub fn on_event<F>(self, callback: F) -> Self
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.observer(Arc::new(ClosureObserver::new(callback)))
    }

    /// Build the pipeline, validating the configuration.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            config,
            observer: self.observer.unwrap_or_else(default_observer),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MissingValueStrategy;
    use crate::kpi::KpiKind;
    use std::sync::Mutex;

    fn staged() -> DataFrame {
        df![
            "airline" => [Some("Biman"), Some("Biman"), Some("Novoair"), None],
            "source" => ["DAC", "DAC", "CGP", "ZYL"],
            "destination" => ["CGP", "CGP", "DAC", "DAC"],
            "base_fare" => [100.0, 100.0, -5.0, 50.0],
            "tax_surcharge" => [20.0, 20.0, 5.0, 5.0],
            "total_fare" => [150.0, 120.0, 0.0, 55.0],
            "departure_date" => ["2024-05-01", "2024-05-01", "2024-08-01", "2024-12-01"],
        ]
        .unwrap()
    }

    #[test]
    fn test_run_with_defaults() {
        let output = Pipeline::builder().build().unwrap().run(&staged()).unwrap();

        // Row 0 inconsistent, row 2 negative, row 3 null airline
        assert_eq!(output.report.invalid_records(), 3);
        // Validation never filters
        assert_eq!(output.enriched.height(), 4);
        assert_eq!(output.duplicates_removed, 0);
        assert_eq!(output.missing_rows_changed, 0);
        assert_eq!(
            output.kpis.get(KpiKind::BookingCount).unwrap().height(),
            2
        );
        assert_eq!(output.kpi_summary.booking_count.total_bookings, Some(3));
    }

    #[test]
    fn test_run_with_cleaning() {
        let config = PipelineConfig::builder()
            .remove_duplicates(true)
            .missing_value_strategy(MissingValueStrategy::Drop)
            .build()
            .unwrap();

        let steps = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&steps);
        let output = Pipeline::builder()
            .config(config)
            .on_event(move |event| {
                if let PipelineEvent::TransformStep { step, .. } = event {
                    sink.lock().unwrap().push(step.clone());
                }
            })
            .build()
            .unwrap()
            .run(&staged())
            .unwrap();

        assert_eq!(output.duplicates_removed, 1);
        assert_eq!(output.missing_rows_changed, 1);
        assert_eq!(output.enriched.height(), 2);
        assert_eq!(output.transformation_summary.records_removed, 2);

        let steps = steps.lock().unwrap();
        assert_eq!(steps[0], "remove_duplicates");
        assert_eq!(steps[1], "handle_missing_values");
        assert!(steps.contains(&"classify_season".to_string()));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            top_routes_limit: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            Pipeline::builder().config(config).build(),
            Err(ConfigValidationError::InvalidTopRoutesLimit(0))
        ));
    }

    #[test]
    fn test_unknown_dedup_column_is_structural() {
        let config = PipelineConfig::builder()
            .remove_duplicates(true)
            .dedup_columns(["flight_no"])
            .build()
            .unwrap();
        let err = Pipeline::builder()
            .config(config)
            .build()
            .unwrap()
            .run(&staged())
            .unwrap_err();
        assert!(err.is_structural());
    }
}
