//! Unified error hierarchy for intervalrs
//!
//! Provides structured error information for ride import, interval
//! validation, metric calculation and report export, with severity levels
//! that map onto the tracing system.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all intervalrs operations
#[derive(Debug, Error)]
pub enum IntervalRsError {
    /// Ride or interval data failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ride file import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Metric calculation errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// User metric formula errors
    #[error("Formula error: {0}")]
    Formula(#[from] crate::metrics::user::FormulaError),

    /// Report export errors
    #[error("Export error: {0}")]
    Export(#[from] crate::export::ExportError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Ride and interval import errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// File not found at specified path
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// No importer handles this file type
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Format-specific parsing error
    #[error("Parse error in {format}: {reason}")]
    ParseError { format: String, reason: String },

    /// File parsed but held no usable samples
    #[error("No samples found in {path}")]
    NoSamples { path: PathBuf },

    /// Malformed interval argument or interval file entry
    #[error("Invalid interval '{input}': {reason}")]
    InvalidInterval { input: String, reason: String },
}

/// Metric calculation errors
#[derive(Debug, Error)]
pub enum CalculationError {
    /// Requested metric symbol is not registered
    #[error("Unknown metric: {symbol}")]
    UnknownMetric { symbol: String },

    /// A metric dependency chain loops back on itself
    #[error("Circular metric dependency at {symbol}")]
    CircularDependency { symbol: String },

    /// Metric symbol registered twice
    #[error("Duplicate metric: {symbol}")]
    DuplicateMetric { symbol: String },

    /// Missing athlete profile data
    #[error("Missing athlete profile: {field}")]
    MissingProfile { field: String },
}

/// Result type alias for intervalrs operations
pub type Result<T> = std::result::Result<T, IntervalRsError>;

impl IntervalRsError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            IntervalRsError::Import(ImportError::FileNotFound { .. }) => ErrorSeverity::Warning,
            IntervalRsError::Import(ImportError::InvalidInterval { .. }) => ErrorSeverity::Warning,
            IntervalRsError::Validation(_) => ErrorSeverity::Warning,
            IntervalRsError::Calculation(CalculationError::CircularDependency { .. }) => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            IntervalRsError::Import(ImportError::FileNotFound { path }) => {
                format!("Could not find ride file: {}", path.display())
            }
            IntervalRsError::Import(ImportError::NoSamples { path }) => {
                format!(
                    "Ride file {} has no samples, nothing to summarise.",
                    path.display()
                )
            }
            IntervalRsError::Import(ImportError::InvalidInterval { input, .. }) => {
                format!(
                    "Could not read interval '{}'. Use START..STOP[=NAME] with seconds or h:mm:ss.",
                    input
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
