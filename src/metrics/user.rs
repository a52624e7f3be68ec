//! User-defined metrics from configuration formulas
//!
//! A formula is evaluated once per sample against the sample's channels and
//! the per-sample results are aggregated. For example
//!
//! ```toml
//! [[user_metrics]]
//! symbol = "torque_effectiveness"
//! name = "Torque Effectiveness"
//! formula = "nm * cad / 9.5488"
//! aggregation = "mean"
//! ```

use evalexpr::ContextWithMutableVariables;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::metrics::{MetricContext, MetricKind, MetricValues, RideMetric};
use crate::models::{RideFile, RideSample};

/// Variables a formula may reference
pub const FORMULA_VARIABLES: &[&str] = &[
    "secs", "km", "watts", "hr", "cad", "kph", "nm", "alt", "slope", "temp", "headwind", "smo2",
    "thb", "np", "xp", "apower",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Invalid formula syntax in '{symbol}': {reason}")]
    InvalidSyntax { symbol: String, reason: String },

    #[error("Unknown variable '{variable}' in formula for '{symbol}'")]
    UnknownVariable { symbol: String, variable: String },

    #[error("Invalid metric symbol '{0}'")]
    InvalidSymbol(String),
}

/// How per-sample formula results are folded into one value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Mean,
    Max,
    Min,
    /// Sum weighted by the recording interval
    Total,
}

/// A user metric as written in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMetricConfig {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub units: String,
    pub formula: String,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub precision: usize,
}

/// A compiled user metric
pub struct UserMetric {
    config: UserMetricConfig,
    node: evalexpr::Node,
}

impl std::fmt::Debug for UserMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserMetric")
            .field("symbol", &self.config.symbol)
            .field("formula", &self.config.formula)
            .finish()
    }
}

impl UserMetric {
    /// Parse the formula once and check every variable it references
    pub fn compile(config: UserMetricConfig) -> Result<Self, FormulaError> {
        let symbol_ok = !config.symbol.is_empty()
            && config
                .symbol
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !symbol_ok {
            return Err(FormulaError::InvalidSymbol(config.symbol));
        }

        let node: evalexpr::Node =
            evalexpr::build_operator_tree(&config.formula).map_err(|e| {
                FormulaError::InvalidSyntax {
                    symbol: config.symbol.clone(),
                    reason: e.to_string(),
                }
            })?;

        if let Some(variable) = node
            .iter_variable_identifiers()
            .find(|v| !FORMULA_VARIABLES.contains(v))
        {
            return Err(FormulaError::UnknownVariable {
                symbol: config.symbol.clone(),
                variable: variable.to_string(),
            });
        }

        // Some malformed formulas parse but can never evaluate, e.g. `watts +`
        let mut trial: evalexpr::HashMapContext = evalexpr::HashMapContext::new();
        for name in FORMULA_VARIABLES {
            trial
                .set_value(name.to_string(), evalexpr::Value::Float(1.0))
                .map_err(|e| FormulaError::InvalidSyntax {
                    symbol: config.symbol.clone(),
                    reason: e.to_string(),
                })?;
        }
        node.eval_with_context(&trial)
            .map_err(|e| FormulaError::InvalidSyntax {
                symbol: config.symbol.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self { config, node })
    }

    pub fn config(&self) -> &UserMetricConfig {
        &self.config
    }

    /// Formula result for a single sample; `None` when it fails or is not finite
    fn evaluate_sample(
        &self,
        context: &mut evalexpr::HashMapContext,
        sample: &RideSample,
    ) -> Option<f64> {
        let bindings = [
            ("secs", Some(sample.secs)),
            ("km", Some(sample.km)),
            ("watts", sample.watts),
            ("hr", sample.hr),
            ("cad", sample.cad),
            ("kph", sample.kph),
            ("nm", sample.nm),
            ("alt", sample.alt),
            ("slope", sample.slope),
            ("temp", sample.temp),
            ("headwind", sample.headwind),
            ("smo2", sample.smo2),
            ("thb", sample.thb),
            ("np", sample.np),
            ("xp", sample.xp),
            ("apower", sample.apower),
        ];

        for (name, value) in bindings {
            context
                .set_value(name.to_string(), evalexpr::Value::Float(value.unwrap_or(0.0)))
                .ok()?;
        }

        let result = match self.node.eval_with_context(&*context).ok()? {
            evalexpr::Value::Float(f) => f,
            evalexpr::Value::Int(i) => i as f64,
            evalexpr::Value::Boolean(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => return None,
        };

        result.is_finite().then_some(result)
    }
}

impl RideMetric for UserMetric {
    fn symbol(&self) -> &str {
        &self.config.symbol
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> MetricKind {
        match self.config.aggregation {
            Aggregation::Mean => MetricKind::Average,
            Aggregation::Max | Aggregation::Min => MetricKind::Peak,
            Aggregation::Total => MetricKind::Total,
        }
    }

    fn units(&self, _units: crate::models::Units) -> &str {
        &self.config.units
    }

    fn precision(&self) -> usize {
        self.config.precision
    }

    fn compute(&self, ride: &RideFile, _ctx: &MetricContext, _deps: &MetricValues) -> f64 {
        let mut context = evalexpr::HashMapContext::new();
        let mut skipped = 0usize;
        let mut results = Vec::with_capacity(ride.samples.len());

        for sample in &ride.samples {
            match self.evaluate_sample(&mut context, sample) {
                Some(v) => results.push(v),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(
                symbol = %self.config.symbol,
                skipped,
                "Formula produced no value for some samples"
            );
        }

        if results.is_empty() {
            return 0.0;
        }

        match self.config.aggregation {
            Aggregation::Mean => results.iter().sum::<f64>() / results.len() as f64,
            Aggregation::Max => results.iter().copied().fold(f64::MIN, f64::max),
            Aggregation::Min => results.iter().copied().fold(f64::MAX, f64::min),
            Aggregation::Total => results.iter().sum::<f64>() * ride.recording_interval,
        }
    }
}
