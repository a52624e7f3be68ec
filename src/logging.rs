//! Structured logging and failure diagnostics
//!
//! Console events go to stderr so a report on stdout can be piped. A JSON
//! copy can also be written to a file, rotated daily.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,

    /// JSON log file in addition to the console
    pub file_path: Option<PathBuf>,

    /// Roll `file_path` over daily
    pub rotation: bool,

    /// Emit span enter/close events
    pub include_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            file_path: None,
            rotation: true,
            include_spans: false,
        }
    }
}

impl LogConfig {
    /// One level louder per `-v`, saturating at trace
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        for _ in 0..verbosity {
            self.level = match self.level {
                LogLevel::Error => LogLevel::Warn,
                LogLevel::Warn => LogLevel::Info,
                LogLevel::Info => LogLevel::Debug,
                LogLevel::Debug | LogLevel::Trace => LogLevel::Trace,
            };
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("unknown log format '{}' (pretty, json, compact)", s)),
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `config.level`.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("intervalrs={}", config.level.directive())));

    let span_events = if config.include_spans {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let console = match config.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(config.include_spans)
            .with_span_list(config.include_spans)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_span_events(span_events)
            .boxed(),
    };

    let file = match &config.file_path {
        Some(path) => Some(file_layer(path, config.rotation)?),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;

    tracing::debug!(level = ?config.level, format = ?config.format, "Logging initialized");
    Ok(())
}

fn file_layer<S>(path: &Path, rotation: bool) -> anyhow::Result<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let layer = if rotation {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("intervalrs.log");
        fmt::layer()
            .json()
            .with_writer(tracing_appender::rolling::daily(dir, name))
            .with_current_span(true)
            .boxed()
    } else {
        let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        fmt::layer()
            .json()
            .with_writer(std::sync::Mutex::new(file))
            .with_current_span(true)
            .boxed()
    };
    Ok(layer)
}

/// What went wrong in a failed command, saved as JSON for bug reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub errors: Vec<ErrorDetail>,
    pub system_info: SystemInfo,
    pub context: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    /// Source chain below `message`, outermost first
    pub causes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub version: String,
}

impl DiagnosticReport {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.into(),
            duration: Duration::ZERO,
            errors: Vec::new(),
            system_info: SystemInfo {
                os: std::env::consts::OS.to_string(),
                arch: std::env::consts::ARCH.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            context: Vec::new(),
        }
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub fn add_error(&mut self, error: &anyhow::Error) {
        self.errors.push(ErrorDetail {
            message: error.to_string(),
            causes: error.chain().skip(1).map(|c| c.to_string()).collect(),
        });
    }

    pub fn add_context(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.context.push((key.into(), value.into()));
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(path = %path.display(), "Diagnostic report saved");
        Ok(())
    }

    /// Save as `<data dir>/intervalrs/diagnostics/<operation>_<time>.json`
    pub fn save_default(&self) -> anyhow::Result<PathBuf> {
        let dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("intervalrs")
            .join("diagnostics");
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!(
            "{}_{}.json",
            self.operation.replace(' ', "_"),
            self.timestamp.format("%Y%m%d_%H%M%S")
        ));
        self.save_to_file(&path)?;
        Ok(path)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use tempfile::tempdir;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("loud".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_verbosity_raises_level() {
        assert_eq!(LogConfig::default().with_verbosity(0).level, LogLevel::Warn);
        assert_eq!(LogConfig::default().with_verbosity(1).level, LogLevel::Info);
        assert_eq!(LogConfig::default().with_verbosity(9).level, LogLevel::Trace);
    }

    #[test]
    fn test_level_reads_from_toml() {
        let config: LogConfig = toml::from_str("level = \"debug\"\nformat = \"json\"").unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.rotation);
    }

    #[test]
    fn test_diagnostic_report_records_error_chain() {
        let mut report = DiagnosticReport::new("summary");
        let err = std::fs::read_to_string("/definitely/missing/ride.json")
            .context("Failed to load ride")
            .unwrap_err();
        report.add_error(&err);
        report.add_context("intervals", "3");

        assert_eq!(report.errors[0].message, "Failed to load ride");
        assert_eq!(report.errors[0].causes.len(), 1);

        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.save_to_file(&path).unwrap();
        let saved: DiagnosticReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.operation, "summary");
        assert_eq!(saved.context, vec![("intervals".to_string(), "3".to_string())]);
    }
}
