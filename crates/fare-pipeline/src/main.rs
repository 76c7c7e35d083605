//! CLI entry point for the flight fare pipeline.

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use fare_pipeline::{
    KeepPolicy, MissingValueStrategy, Pipeline, PipelineConfig, PipelineOutput, PipelineReport,
    ReportGenerator, load_fare_csv,
};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// CLI-compatible missing-value strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMissingStrategy {
    /// Remove rows missing a required business column
    Drop,
    /// Impute fares with the column median
    Median,
    /// Propagate the previous value down each column
    ForwardFill,
    /// Leave missing values untouched
    Skip,
}

impl From<CliMissingStrategy> for MissingValueStrategy {
    fn from(cli: CliMissingStrategy) -> Self {
        match cli {
            CliMissingStrategy::Drop => MissingValueStrategy::Drop,
            CliMissingStrategy::Median => MissingValueStrategy::Median,
            CliMissingStrategy::ForwardFill => MissingValueStrategy::ForwardFill,
            CliMissingStrategy::Skip => MissingValueStrategy::Skip,
        }
    }
}

/// CLI-compatible keep policy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliKeepPolicy {
    First,
    Last,
    None,
}

impl From<CliKeepPolicy> for KeepPolicy {
    fn from(cli: CliKeepPolicy) -> Self {
        match cli {
            CliKeepPolicy::First => KeepPolicy::First,
            CliKeepPolicy::Last => KeepPolicy::Last,
            CliKeepPolicy::None => KeepPolicy::None,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Flight fare validation, enrichment and KPI pipeline",
    long_about = "Validates a flight-fare CSV, enriches it and computes KPI tables.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  TOP_ROUTES_LIMIT    Rows kept in the popular_routes KPI (default 10)\n  \
                  VALID_CITIES        Comma-separated city whitelist\n\n\
                  EXAMPLES:\n  \
                  # Validate and aggregate with defaults\n  \
                  fare-pipeline -i flight_fares.csv\n\n  \
                  # Restrict cities and write the report and KPI tables\n  \
                  fare-pipeline -i flight_fares.csv --valid-cities DAC,CGP,ZYL --emit-report\n\n  \
                  # Deduplicate and impute missing fares\n  \
                  fare-pipeline -i flight_fares.csv --dedup --missing-strategy median"
)]
struct Args {
    /// Path to the CSV file to process
    #[arg(short, long)]
    input: String,

    /// Output directory for the report and KPI tables
    #[arg(short, long, default_value = "./outputs")]
    output: String,

    /// Number of routes kept in the popular_routes KPI
    #[arg(long, env = "TOP_ROUTES_LIMIT", default_value = "10")]
    top_routes: usize,

    /// City whitelist for source/destination (comma-separated)
    #[arg(long, env = "VALID_CITIES", value_delimiter = ',')]
    valid_cities: Option<Vec<String>>,

    /// Columns allowed to contain nulls (repeatable)
    #[arg(long = "allow-null")]
    allow_null: Vec<String>,

    /// Strategy for missing values before enrichment
    #[arg(long, value_enum, default_value = "skip")]
    missing_strategy: CliMissingStrategy,

    /// Remove duplicate fare observations before enrichment
    #[arg(long)]
    dedup: bool,

    /// Columns identifying a duplicate (comma-separated)
    #[arg(long, value_delimiter = ',')]
    dedup_columns: Option<Vec<String>>,

    /// Which duplicate survives
    #[arg(long, value_enum, default_value = "first")]
    dedup_keep: CliKeepPolicy,

    /// Column flight_date is derived from
    #[arg(long, default_value = "departure_date")]
    date_column: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of a human-readable summary
    ///
    /// Disables all logs; only the final JSON report is printed.
    #[arg(long)]
    json: bool,

    /// Write <input_name>_report.json and one CSV per KPI table to the output directory
    #[arg(long)]
    emit_report: bool,
}

fn init_logging(level: &str, quiet: bool, json_output: bool) {
    // Keep stdout clean for the JSON report
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    // .env must be loaded before clap reads env fallbacks
    dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);

    let input = Path::new(&args.input);
    if !input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    let data = load_fare_csv(input)?;

    let mut builder = PipelineConfig::builder()
        .top_routes_limit(args.top_routes)
        .missing_value_strategy(args.missing_strategy.into())
        .remove_duplicates(args.dedup)
        .dedup_keep(args.dedup_keep.into())
        .date_column(&args.date_column);
    if let Some(cities) = &args.valid_cities {
        builder = builder.valid_cities(cities.iter().cloned());
    }
    if let Some(columns) = &args.dedup_columns {
        builder = builder.dedup_columns(columns.iter().cloned());
    }
    for column in &args.allow_null {
        builder = builder.allow_null_column(column);
    }
    let config = builder.build()?;

    info!("{}", "=".repeat(80));
    info!("Starting fare pipeline...");
    info!("{}", "=".repeat(80));

    let output = match Pipeline::builder().config(config).build()?.run(&data) {
        Ok(output) => output,
        Err(e) => {
            error!("Pipeline failed: {}", e);
            return Err(anyhow!("Pipeline failed: {}", e));
        }
    };

    handle_pipeline_output(&output, &args)?;

    // Structurally unusable input still yields a report, but the run fails
    output.report.ensure_structurally_valid()?;
    Ok(())
}

/// Print or write the run results according to the CLI flags.
fn handle_pipeline_output(output: &PipelineOutput, args: &Args) -> Result<()> {
    let report = PipelineReport::from_output(&args.input, output);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if args.emit_report {
        let stem = extract_file_stem(&args.input);
        let generator = ReportGenerator::new(PathBuf::from(&args.output));
        let report_path = generator.write_report_to_file(&report, &stem)?;
        info!("Report written to: {}", report_path.display());
        for path in generator.write_kpi_tables(&output.kpis, &stem)? {
            info!("KPI table written to: {}", path.display());
        }
    }

    print_human_readable_summary(output);
    Ok(())
}

fn extract_file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fares".to_string())
}

fn print_human_readable_summary(output: &PipelineOutput) {
    let report = &output.report;

    println!();
    println!("{}", "=".repeat(80));
    println!("VALIDATION");
    println!("{}", "=".repeat(80));
    println!("Total records:   {}", report.total_records());
    println!("Valid records:   {}", report.valid_records());
    println!("Invalid records: {}", report.invalid_records());
    println!("Validity:        {:.2}%", report.validity_percentage());
    for check in report.checks() {
        let error = check
            .error_message
            .as_deref()
            .map(|m| format!(" ({m})"))
            .unwrap_or_default();
        println!(
            "  {:<18} {:<18} {:>8} passed {:>8} failed{}",
            check.check_name,
            check.check_type.as_str(),
            check.records_passed,
            check.records_failed,
            error
        );
    }
    if !report.is_structurally_valid() {
        warn!("Missing required columns: {}", report.missing_columns().join(", "));
    }

    let summary = &output.transformation_summary;
    println!();
    println!("TRANSFORMATION");
    println!("{}", "-".repeat(80));
    println!(
        "Records: {} -> {} ({} duplicates removed, {} rows changed by missing-value handling)",
        summary.original_record_count,
        summary.final_record_count,
        output.duplicates_removed,
        output.missing_rows_changed
    );
    if let Some(seasons) = &summary.season_distribution {
        let parts: Vec<String> = seasons.iter().map(|(s, n)| format!("{s}={n}")).collect();
        println!("Seasons: {}", parts.join(", "));
    }

    println!();
    println!("KPIS");
    println!("{}", "-".repeat(80));
    for (kind, table) in output.kpis.iter() {
        println!("{kind} ({} rows)", table.height());
        println!("{}", table.head(Some(5)));
    }
    for failure in output.kpis.failures() {
        warn!("{}", failure.reason);
    }
}
