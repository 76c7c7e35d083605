//! Configuration types for the fare pipeline.
//!
//! The core never reads configuration on its own; callers build a
//! [`PipelineConfig`] (directly, through the builder, or from JSON) and hand
//! it to the stages that need it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of rows kept in the `popular_routes` KPI.
pub const DEFAULT_TOP_ROUTES_LIMIT: usize = 10;

/// Default column holding the departure timestamp used to derive `flight_date`.
pub const DEFAULT_DATE_COLUMN: &str = "departure_date";

/// Strategy for handling missing values before enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingValueStrategy {
    /// Remove rows missing any required business column
    Drop,
    /// Impute fare columns with their median, then drop rows missing categorical columns
    Median,
    /// Propagate the previous non-missing value down each column
    ForwardFill,
    /// Leave missing values untouched
    #[default]
    Skip,
}

impl MissingValueStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Median => "median",
            Self::ForwardFill => "forward_fill",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for MissingValueStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissingValueStrategy {
    type Err = ConfigValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "median" => Ok(Self::Median),
            "forward_fill" | "ffill" => Ok(Self::ForwardFill),
            "skip" => Ok(Self::Skip),
            other => Err(ConfigValidationError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Which occurrence of a duplicate group survives deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeepPolicy {
    /// Keep the first occurrence
    #[default]
    First,
    /// Keep the last occurrence
    Last,
    /// Drop every row that has a duplicate
    None,
}

impl FromStr for KeepPolicy {
    type Err = ConfigValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            "none" | "false" => Ok(Self::None),
            other => Err(ConfigValidationError::UnknownKeepPolicy(other.to_string())),
        }
    }
}

/// Configuration for a pipeline run.
///
/// Use [`PipelineConfig::builder()`] for a fluent, validated setup.
///
/// # Example
///
/// ```rust,ignore
/// use fare_pipeline::config::{PipelineConfig, MissingValueStrategy};
///
/// let config = PipelineConfig::builder()
///     .top_routes_limit(5)
///     .valid_cities(["DAC", "CGP", "ZYL"])
///     .missing_value_strategy(MissingValueStrategy::Median)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of rows kept in the `popular_routes` KPI.
    /// Default: 10
    pub top_routes_limit: usize,

    /// Optional whitelist for `source`/`destination` (case-insensitive).
    /// When absent the city check is skipped.
    /// Default: None
    pub valid_cities: Option<Vec<String>>,

    /// Columns where nulls are tolerated by the null check.
    /// Default: empty
    pub allow_null_columns: Vec<String>,

    /// Strategy for handling missing values before enrichment.
    /// Default: Skip
    pub missing_value_strategy: MissingValueStrategy,

    /// Whether the pipeline runner removes duplicates before enrichment.
    /// Default: false
    pub remove_duplicates: bool,

    /// Key columns for deduplication. None uses the default fare key.
    /// Default: None
    pub dedup_columns: Option<Vec<String>>,

    /// Which duplicate survives deduplication.
    /// Default: First
    pub dedup_keep: KeepPolicy,

    /// Column the `flight_date` is derived from when it is not already present.
    /// Default: "departure_date"
    pub date_column: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_routes_limit: DEFAULT_TOP_ROUTES_LIMIT,
            valid_cities: None,
            allow_null_columns: Vec::new(),
            missing_value_strategy: MissingValueStrategy::default(),
            remove_duplicates: false,
            dedup_columns: None,
            dedup_keep: KeepPolicy::default(),
            date_column: Some(DEFAULT_DATE_COLUMN.to_string()),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.top_routes_limit == 0 {
            return Err(ConfigValidationError::InvalidTopRoutesLimit(
                self.top_routes_limit,
            ));
        }

        if let Some(cities) = &self.valid_cities
            && cities.iter().all(|c| c.trim().is_empty())
        {
            return Err(ConfigValidationError::EmptyCityWhitelist);
        }

        if let Some(columns) = &self.dedup_columns
            && columns.is_empty()
        {
            return Err(ConfigValidationError::EmptyDedupColumns);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid top routes limit: {0} (must be at least 1)")]
    InvalidTopRoutesLimit(usize),

    #[error("City whitelist was supplied but contains no city codes")]
    EmptyCityWhitelist,

    #[error("Deduplication key must name at least one column")]
    EmptyDedupColumns,

    #[error("Unknown missing-value strategy: '{0}'")]
    UnknownStrategy(String),

    #[error("Unknown keep policy: '{0}'")]
    UnknownKeepPolicy(String),
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    top_routes_limit: Option<usize>,
    valid_cities: Option<Vec<String>>,
    allow_null_columns: Vec<String>,
    missing_value_strategy: Option<MissingValueStrategy>,
    remove_duplicates: Option<bool>,
    dedup_columns: Option<Vec<String>>,
    dedup_keep: Option<KeepPolicy>,
    date_column: Option<Option<String>>,
}

impl PipelineConfigBuilder {
    /// Set the number of rows kept in the `popular_routes` KPI.
    pub fn top_routes_limit(mut self, limit: usize) -> Self {
        self.top_routes_limit = Some(limit);
        self
    }

    /// Enable the city check with the given whitelist.
    pub fn valid_cities<I, S>(mut self, cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_cities = Some(cities.into_iter().map(Into::into).collect());
        self
    }

    /// Tolerate nulls in an additional column.
    pub fn allow_null_column(mut self, column: impl Into<String>) -> Self {
        self.allow_null_columns.push(column.into());
        self
    }

    /// Set the missing-value strategy.
    pub fn missing_value_strategy(mut self, strategy: MissingValueStrategy) -> Self {
        self.missing_value_strategy = Some(strategy);
        self
    }

    /// Enable or disable duplicate removal in the pipeline runner.
    pub fn remove_duplicates(mut self, remove: bool) -> Self {
        self.remove_duplicates = Some(remove);
        self
    }

    /// Override the deduplication key columns.
    pub fn dedup_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dedup_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set which duplicate survives.
    pub fn dedup_keep(mut self, keep: KeepPolicy) -> Self {
        self.dedup_keep = Some(keep);
        self
    }

    /// Set the column `flight_date` is derived from.
    pub fn date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = Some(Some(column.into()));
        self
    }

    /// Derive no `flight_date` from the data; the processing date is used instead.
    pub fn no_date_column(mut self) -> Self {
        self.date_column = Some(None);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let config = PipelineConfig {
            top_routes_limit: self.top_routes_limit.unwrap_or(DEFAULT_TOP_ROUTES_LIMIT),
            valid_cities: self.valid_cities,
            allow_null_columns: self.allow_null_columns,
            missing_value_strategy: self.missing_value_strategy.unwrap_or_default(),
            remove_duplicates: self.remove_duplicates.unwrap_or(false),
            dedup_columns: self.dedup_columns,
            dedup_keep: self.dedup_keep.unwrap_or_default(),
            date_column: self
                .date_column
                .unwrap_or_else(|| Some(DEFAULT_DATE_COLUMN.to_string())),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.top_routes_limit, 10);
        assert!(config.valid_cities.is_none());
        assert_eq!(config.missing_value_strategy, MissingValueStrategy::Skip);
        assert_eq!(config.dedup_keep, KeepPolicy::First);
        assert_eq!(config.date_column.as_deref(), Some("departure_date"));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .top_routes_limit(3)
            .valid_cities(["DAC", "CGP"])
            .allow_null_column("stopovers")
            .missing_value_strategy(MissingValueStrategy::Median)
            .remove_duplicates(true)
            .dedup_keep(KeepPolicy::Last)
            .no_date_column()
            .build()
            .unwrap();

        assert_eq!(config.top_routes_limit, 3);
        assert_eq!(
            config.valid_cities,
            Some(vec!["DAC".to_string(), "CGP".to_string()])
        );
        assert_eq!(config.allow_null_columns, vec!["stopovers".to_string()]);
        assert_eq!(config.missing_value_strategy, MissingValueStrategy::Median);
        assert!(config.remove_duplicates);
        assert_eq!(config.dedup_keep, KeepPolicy::Last);
        assert!(config.date_column.is_none());
    }

    #[test]
    fn test_validation_rejects_zero_limit() {
        let result = PipelineConfig::builder().top_routes_limit(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidTopRoutesLimit(0)
        ));
    }

    #[test]
    fn test_validation_rejects_blank_whitelist() {
        let result = PipelineConfig::builder().valid_cities([" "]).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyCityWhitelist
        ));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "forward_fill".parse::<MissingValueStrategy>().unwrap(),
            MissingValueStrategy::ForwardFill
        );
        assert_eq!(
            " MEDIAN ".parse::<MissingValueStrategy>().unwrap(),
            MissingValueStrategy::Median
        );
        assert!("interpolate".parse::<MissingValueStrategy>().is_err());
        assert_eq!("none".parse::<KeepPolicy>().unwrap(), KeepPolicy::None);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "top_routes_limit": 5,
            "valid_cities": ["DAC", "CXB"],
            "missing_value_strategy": "forward_fill",
            "dedup_keep": "last"
        }"#;

        let config: PipelineConfig = serde_json::from_str(json).expect("should deserialize");

        assert_eq!(config.top_routes_limit, 5);
        assert_eq!(
            config.missing_value_strategy,
            MissingValueStrategy::ForwardFill
        );
        assert_eq!(config.dedup_keep, KeepPolicy::Last);
        // Fields not present fall back to defaults
        assert_eq!(config.date_column.as_deref(), Some("departure_date"));
        assert!(!config.remove_duplicates);
    }
}
