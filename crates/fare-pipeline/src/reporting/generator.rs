use super::{KpiSummary, QualityMetricRow, TransformationSummary};
use crate::error::{Result, ResultExt};
use crate::kpi::{KpiFailure, KpiTables};
use crate::pipeline::PipelineOutput;
use crate::types::ValidationReport;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Serializable record of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Where the input came from (file path or caller label)
    pub input: String,
    pub validation: ValidationReport,
    pub quality_metrics: Vec<QualityMetricRow>,
    pub transformation: TransformationSummary,
    pub kpis: KpiSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kpi_failures: Vec<KpiFailure>,
    pub duplicates_removed: usize,
    pub missing_rows_changed: usize,
}

impl PipelineReport {
    pub fn from_output(input: impl Into<String>, output: &PipelineOutput) -> Self {
        Self {
            input: input.into(),
            validation: output.report.clone(),
            quality_metrics: output.report.quality_metric_rows(),
            transformation: output.transformation_summary.clone(),
            kpis: output.kpi_summary.clone(),
            kpi_failures: output.kpis.failures().to_vec(),
            duplicates_removed: output.duplicates_removed,
            missing_rows_changed: output.missing_rows_changed,
        }
    }
}

/// Writes reports and KPI tables into an output directory.
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./outputs"),
        }
    }
}

impl ReportGenerator {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Write `<base_name>_report.json`.
    pub fn write_report_to_file(&self, report: &PipelineReport, base_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let report_path = self.output_dir.join(format!("{}_report.json", base_name));
        let mut file = File::create(&report_path)?;
        file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;

        info!("Report saved: {}", report_path.display());
        Ok(report_path)
    }

    /// Write one `<base_name>_<kpi>.csv` per KPI table.
    pub fn write_kpi_tables(&self, kpis: &KpiTables, base_name: &str) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.output_dir)?;

        let mut written = Vec::new();
        for (kind, table) in kpis.iter() {
            let path = self.output_dir.join(format!("{}_{}.csv", base_name, kind));
            let mut file = File::create(&path)?;
            let mut table = table.clone();
            CsvWriter::new(&mut file)
                .include_header(true)
                .with_separator(b',')
                .finish(&mut table)
                .context(format!("Writing KPI table '{}'", kind))?;

            info!("KPI table saved: {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}
