use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::LogConfig;
use crate::metrics::user::{UserMetric, UserMetricConfig};
use crate::metrics::{MetricContext, MetricFactory, DEFAULT_ELEVATION_HYSTERESIS_M};
use crate::models::{AthleteProfile, Units};

/// Metrics shown for each interval when none are configured
pub const DEFAULT_INTERVAL_METRICS: &str = "workout_time,total_distance,total_work,average_power,coggan_np,average_hr,average_cad,average_speed";

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application metadata
    pub metadata: ConfigMetadata,

    /// Interval summary settings
    #[serde(default)]
    pub summary: SummarySettings,

    /// Thresholds used by IF, TSS and similar metrics
    #[serde(default)]
    pub athlete: AthleteProfile,

    /// Formula metrics registered alongside the built-in ones
    #[serde(default)]
    pub user_metrics: Vec<UserMetricConfig>,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// What the interval summary shows and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarySettings {
    /// Comma-separated metric symbols, in display order
    pub interval_metrics: String,

    /// Display units (metric/imperial)
    pub units: Units,

    /// Altitude change ignored before it counts as climbing
    pub elevation_hysteresis_m: f64,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            interval_metrics: DEFAULT_INTERVAL_METRICS.to_string(),
            units: Units::Metric,
            elevation_hysteresis_m: DEFAULT_ELEVATION_HYSTERESIS_M,
        }
    }
}

impl SummarySettings {
    pub fn metric_symbols(&self) -> Vec<String> {
        parse_metric_list(&self.interval_metrics)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();

        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            summary: SummarySettings::default(),
            athlete: AthleteProfile::default(),
            user_metrics: Vec::new(),
            logging: LogConfig::default(),
        }
    }
}

/// Split a comma-separated metric list, trimming whitespace and dropping empties
pub fn parse_metric_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".intervalrs")
            .join("config.toml")
    }

    /// Load `path`, or the default location; a missing default file yields defaults.
    /// An explicitly given file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::load_or_default()),
        }
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "No config file, using defaults");
            return Self::default();
        }

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %config_path.display(), error = %e, "Ignoring unreadable config file");
                Self::default()
            }
        }
    }

    /// Save configuration to default location
    pub fn save_default(&mut self) -> Result<PathBuf> {
        let config_path = Self::default_config_path();
        self.save_to_file(&config_path)?;
        Ok(config_path)
    }

    /// Metric context for the configured athlete
    pub fn metric_context(&self) -> MetricContext {
        MetricContext {
            athlete: self.athlete.clone(),
            elevation_hysteresis_m: self.summary.elevation_hysteresis_m,
        }
    }

    /// Built-in metrics plus every configured user metric
    pub fn metric_factory(&self) -> Result<MetricFactory> {
        let mut factory = MetricFactory::with_builtin();
        for user in &self.user_metrics {
            let metric = UserMetric::compile(user.clone())
                .with_context(|| format!("Invalid user metric '{}'", user.symbol))?;
            factory
                .register(Box::new(metric))
                .with_context(|| format!("Cannot register user metric '{}'", user.symbol))?;
        }
        Ok(factory)
    }
}
