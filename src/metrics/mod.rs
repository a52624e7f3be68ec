//! Ride metric registry and dependency-ordered computation
//!
//! Every metric is a [`RideMetric`] registered in a [`MetricFactory`] under a
//! symbol such as `average_power`. Metrics may depend on other metrics
//! (`coggan_if` needs `coggan_np`); [`MetricFactory::compute_metrics`]
//! resolves dependencies depth first and computes each metric once per ride.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::CalculationError;
use crate::models::{AthleteProfile, RideFile, Units};

pub mod basic;
pub mod power;
pub mod user;

/// Default hysteresis applied to altitude changes before they count as climbing
pub const DEFAULT_ELEVATION_HYSTERESIS_M: f64 = 3.0;

/// How a metric aggregates the ride, used for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    Average,
    Total,
    Peak,
    Time,
    Ratio,
}

/// Athlete and settings the metrics are computed against
#[derive(Debug, Clone, PartialEq)]
pub struct MetricContext {
    pub athlete: AthleteProfile,
    pub elevation_hysteresis_m: f64,
}

impl Default for MetricContext {
    fn default() -> Self {
        Self {
            athlete: AthleteProfile::default(),
            elevation_hysteresis_m: DEFAULT_ELEVATION_HYSTERESIS_M,
        }
    }
}

impl MetricContext {
    pub fn new(athlete: AthleteProfile) -> Self {
        Self {
            athlete,
            ..Self::default()
        }
    }

    /// FTP if set and positive
    pub fn ftp(&self) -> Option<f64> {
        self.athlete.ftp.filter(|ftp| *ftp > 0.0)
    }
}

/// A metric computed over a whole ride
pub trait RideMetric: Send + Sync {
    /// Stable identifier used in configuration, e.g. `coggan_np`
    fn symbol(&self) -> &str;

    /// Human readable name
    fn name(&self) -> &str;

    fn kind(&self) -> MetricKind;

    /// Unit label for display; empty when unitless
    fn units(&self, _units: Units) -> &str {
        ""
    }

    /// Decimal places shown in reports
    fn precision(&self) -> usize {
        0
    }

    /// Multiplier applied to the metric value for imperial display
    fn conversion(&self) -> f64 {
        1.0
    }

    /// Offset added after conversion for imperial display
    fn conversion_offset(&self) -> f64 {
        0.0
    }

    /// Symbols whose values must be computed before this one
    fn dependencies(&self) -> &[&'static str] {
        &[]
    }

    /// Whether the ride holds the data this metric needs
    fn is_relevant(&self, _ride: &RideFile, _ctx: &MetricContext) -> bool {
        true
    }

    /// Compute the value; `deps` holds every dependency already computed
    fn compute(&self, ride: &RideFile, ctx: &MetricContext, deps: &MetricValues) -> f64;
}

/// Computed metric values keyed by symbol
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricValues {
    values: BTreeMap<String, f64>,
}

impl MetricValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.values.get(symbol).copied()
    }

    /// Value for `symbol`, 0 when not computed
    pub fn value(&self, symbol: &str) -> f64 {
        self.get(symbol).unwrap_or(0.0)
    }

    pub fn insert(&mut self, symbol: impl Into<String>, value: f64) {
        self.values.insert(symbol.into(), value);
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.values.contains_key(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Replace NaN and infinities with zero
pub fn clean_value(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Render seconds as `h:mm:ss`
pub fn format_duration(secs: f64) -> String {
    let total = clean_value(secs).max(0.0).round() as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Registry of available metrics
pub struct MetricFactory {
    metrics: Vec<Box<dyn RideMetric>>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for MetricFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricFactory")
            .field(
                "symbols",
                &self.metrics.iter().map(|m| m.symbol()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for MetricFactory {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl MetricFactory {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            metrics: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Registry holding every built-in metric
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        for metric in basic::builtin().into_iter().chain(power::builtin()) {
            // built-in symbols are unique
            let _ = factory.register(metric);
        }
        factory
    }

    pub fn register(&mut self, metric: Box<dyn RideMetric>) -> Result<(), CalculationError> {
        let symbol = metric.symbol().to_string();
        if self.index.contains_key(&symbol) {
            return Err(CalculationError::DuplicateMetric { symbol });
        }
        self.index.insert(symbol, self.metrics.len());
        self.metrics.push(metric);
        Ok(())
    }

    pub fn get(&self, symbol: &str) -> Option<&dyn RideMetric> {
        self.index.get(symbol).map(|&i| self.metrics[i].as_ref())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.index.contains_key(symbol)
    }

    /// All registered metrics in registration order
    pub fn metrics(&self) -> impl Iterator<Item = &dyn RideMetric> {
        self.metrics.iter().map(|m| m.as_ref())
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Compute the requested metrics and their dependencies over `ride`.
    ///
    /// Unknown symbols are skipped. Non-finite results are stored as 0, and a
    /// ride without samples yields 0 for every metric.
    pub fn compute_metrics<S: AsRef<str>>(
        &self,
        ride: &RideFile,
        ctx: &MetricContext,
        symbols: &[S],
    ) -> Result<MetricValues, CalculationError> {
        let mut values = MetricValues::new();
        let mut visiting = HashSet::new();

        for symbol in symbols {
            let symbol = symbol.as_ref();
            if !self.contains(symbol) {
                debug!(symbol, "Skipping unknown metric");
                continue;
            }
            self.compute_one(symbol, ride, ctx, &mut values, &mut visiting)?;
        }

        trace!(ride = %ride.id, computed = values.len(), "Metrics computed");
        Ok(values)
    }

    fn compute_one(
        &self,
        symbol: &str,
        ride: &RideFile,
        ctx: &MetricContext,
        values: &mut MetricValues,
        visiting: &mut HashSet<String>,
    ) -> Result<(), CalculationError> {
        if values.contains(symbol) {
            return Ok(());
        }
        let metric = self.get(symbol).ok_or_else(|| CalculationError::UnknownMetric {
            symbol: symbol.to_string(),
        })?;

        if !visiting.insert(symbol.to_string()) {
            return Err(CalculationError::CircularDependency {
                symbol: symbol.to_string(),
            });
        }

        for dependency in metric.dependencies() {
            self.compute_one(dependency, ride, ctx, values, visiting)?;
        }

        let value = if ride.is_empty() {
            0.0
        } else {
            clean_value(metric.compute(ride, ctx, values))
        };
        values.insert(symbol, value);
        visiting.remove(symbol);
        Ok(())
    }

    /// Format a computed value for display in the given units
    pub fn display_value(&self, symbol: &str, value: f64, units: Units) -> String {
        match self.get(symbol) {
            Some(metric) => display_metric(metric, value, units),
            None => format!("{:.1}", clean_value(value)),
        }
    }
}

/// Format `value` of `metric` for display
pub fn display_metric(metric: &dyn RideMetric, value: f64, units: Units) -> String {
    if metric.kind() == MetricKind::Time {
        return format_duration(value);
    }

    let value = clean_value(value);
    let shown = if units.is_metric() {
        value
    } else {
        value * metric.conversion() + metric.conversion_offset()
    };
    format!("{:.*}", metric.precision(), shown)
}
