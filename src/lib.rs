// Library interface for intervalrs modules
// This allows integration tests and benches to access the core functionality

pub mod config;
pub mod derived;
pub mod error;
pub mod export;
pub mod import;
pub mod intervals;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod split;
pub mod summary;

// Re-export commonly used types for convenience
pub use models::*;
pub use error::{IntervalRsError, Result};
pub use intervals::{IntervalSelection, IntervalSet};
pub use logging::{LogConfig, LogLevel, LogFormat, DiagnosticReport};
pub use metrics::{MetricContext, MetricFactory, MetricValues, RideMetric};
pub use split::{RideSplitter, SplitCache, SplitRide};
pub use summary::{IntervalSummary, SelectionSummary, SummaryBlock, SummaryRow};
