//! Interval summaries: metric blocks for each selected interval, for the
//! selection as a whole and for the rest of the ride
//!
//! Intervals can overlap, so the selection totals are never aggregated from
//! per-interval values. They are computed over the synthesized included and
//! excluded rides built by [`RideSplitter`].

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::error::Result;
use crate::intervals::{IntervalSelection, IntervalSet};
use crate::metrics::{display_metric, MetricContext, MetricFactory};
use crate::models::{Interval, RideFile, Units};
use crate::split::{RideSplitter, SplitCache, SplitRide};

/// Shown when nothing is selected
pub const EMPTY_SELECTION_PLACEHOLDER: &str = "select an interval for summary info";

/// One metric line of a summary block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub symbol: String,
    pub name: String,
    pub value: f64,
    /// Value formatted for the configured units
    pub display: String,
    /// Unit label, blank for durations
    pub units: String,
}

/// A named group of metric rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryBlock {
    pub name: String,
    pub rows: Vec<SummaryRow>,
}

impl SummaryBlock {
    pub fn row(&self, symbol: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.symbol == symbol)
    }
}

/// Everything shown for the current selection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectionSummary {
    /// Over all selected intervals; only with more than one selected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined: Option<SummaryBlock>,

    /// One block per selected interval, in selection order
    pub intervals: Vec<SummaryBlock>,

    /// Over the samples outside every selected interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluding: Option<SummaryBlock>,
}

impl SelectionSummary {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.combined.is_none() && self.intervals.is_empty() && self.excluding.is_none()
    }

    /// Blocks in report order: combined, per interval, excluding
    pub fn blocks(&self) -> impl Iterator<Item = &SummaryBlock> {
        self.combined
            .iter()
            .chain(self.intervals.iter())
            .chain(self.excluding.iter())
    }

    /// Placeholder text when there is nothing to report
    pub fn placeholder(&self) -> Option<&'static str> {
        self.is_empty().then_some(EMPTY_SELECTION_PLACEHOLDER)
    }
}

/// Computes summary blocks with a fixed metric list
pub struct IntervalSummary<'a> {
    factory: &'a MetricFactory,
    ctx: MetricContext,
    metrics: Vec<String>,
    units: Units,
}

impl<'a> IntervalSummary<'a> {
    pub fn new(
        factory: &'a MetricFactory,
        ctx: MetricContext,
        metric_symbols: Vec<String>,
        units: Units,
    ) -> Self {
        for symbol in &metric_symbols {
            if !factory.contains(symbol) {
                debug!(symbol = %symbol, "Configured metric is not registered");
            }
        }
        Self {
            factory,
            ctx,
            metrics: metric_symbols,
            units,
        }
    }

    pub fn metric_symbols(&self) -> &[String] {
        &self.metrics
    }

    /// Metrics over the samples inside a single interval
    pub fn summarize_interval(&self, ride: &RideFile, interval: &Interval) -> Result<SummaryBlock> {
        interval.validate()?;
        ride.validate()?;

        let set = IntervalSet::from_intervals(std::iter::once(interval));
        let split = RideSplitter::split_with_set(ride, &set, 1);
        self.block(interval.name.clone(), &split.included)
    }

    /// Blocks for a selection, splitting the ride afresh
    pub fn summarize_selection(
        &self,
        ride: &RideFile,
        selection: &IntervalSelection,
    ) -> Result<SelectionSummary> {
        if selection.is_empty() {
            return Ok(SelectionSummary::empty());
        }
        let split = RideSplitter::split(ride, selection)?;
        self.summarize_split(ride, selection, &split)
    }

    /// Like [`Self::summarize_selection`], reusing the cached split when the
    /// selection has not changed
    pub fn summarize_selection_cached(
        &self,
        ride: &RideFile,
        selection: &IntervalSelection,
        cache: &mut SplitCache,
    ) -> Result<SelectionSummary> {
        if selection.is_empty() {
            return Ok(SelectionSummary::empty());
        }
        let split = cache.get_or_split(ride, selection)?;
        self.summarize_split(ride, selection, &split)
    }

    fn summarize_split(
        &self,
        ride: &RideFile,
        selection: &IntervalSelection,
        split: &SplitRide,
    ) -> Result<SelectionSummary> {
        let span = info_span!("summary", ride = %ride.id, intervals = selection.len());
        let _guard = span.enter();

        let count = selection.len();

        let (combined, excluding) = if count > 1 {
            let (combined, excluding) = rayon::join(
                || self.block(format!("{} selected intervals", count), &split.included),
                || {
                    if split.excluded_is_empty() {
                        Ok(None)
                    } else {
                        self.block(format!("Excluding {} selected", count), &split.excluded)
                            .map(Some)
                    }
                },
            );
            (Some(combined?), excluding?)
        } else {
            (None, None)
        };

        let intervals = selection
            .intervals()
            .par_iter()
            .map(|interval| self.summarize_interval(ride, interval))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            blocks = intervals.len() + combined.is_some() as usize + excluding.is_some() as usize,
            "Selection summarized"
        );

        Ok(SelectionSummary {
            combined,
            intervals,
            excluding,
        })
    }

    fn block(&self, name: String, ride: &RideFile) -> Result<SummaryBlock> {
        let values = self
            .factory
            .compute_metrics(ride, &self.ctx, &self.metrics)?;

        let rows = self
            .metrics
            .iter()
            .filter_map(|symbol| {
                let metric = self.factory.get(symbol)?;
                if !metric.is_relevant(ride, &self.ctx) {
                    return None;
                }
                let value = values.value(symbol);
                let units = match metric.units(self.units) {
                    "seconds" => String::new(),
                    other => other.to_string(),
                };
                Some(SummaryRow {
                    symbol: symbol.clone(),
                    name: metric.name().to_string(),
                    value,
                    display: display_metric(metric, value, self.units),
                    units,
                })
            })
            .collect();

        Ok(SummaryBlock { name, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IntervalKind, RideSample};

    fn ride(secs: usize) -> RideFile {
        let mut ride = RideFile::new("summary", 1.0);
        ride.samples = (0..secs)
            .map(|i| RideSample {
                watts: Some(if i < 50 { 100.0 } else { 300.0 }),
                hr: Some(130.0),
                kph: Some(36.0),
                ..RideSample::new(i as f64, i as f64 * 0.01)
            })
            .collect();
        ride
    }

    fn iv(name: &str, start: f64, stop: f64) -> Interval {
        Interval::new(name, start, stop, IntervalKind::User).unwrap()
    }

    fn symbols() -> Vec<String> {
        ["workout_time", "total_distance", "average_power", "average_hr", "average_cad"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_empty_selection_shows_placeholder() {
        let factory = MetricFactory::with_builtin();
        let summary = IntervalSummary::new(&factory, MetricContext::default(), symbols(), Units::Metric);
        let result = summary
            .summarize_selection(&ride(10), &IntervalSelection::default())
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.placeholder(), Some(EMPTY_SELECTION_PLACEHOLDER));
        assert_eq!(result.blocks().count(), 0);
    }

    #[test]
    fn test_single_interval_has_no_combined_block() {
        let factory = MetricFactory::with_builtin();
        let summary = IntervalSummary::new(&factory, MetricContext::default(), symbols(), Units::Metric);
        let selection = IntervalSelection::new(vec![iv("first", 0.0, 50.0)]).unwrap();
        let result = summary.summarize_selection(&ride(100), &selection).unwrap();

        assert!(result.combined.is_none());
        assert!(result.excluding.is_none());
        assert_eq!(result.intervals.len(), 1);

        let block = &result.intervals[0];
        assert_eq!(block.name, "first");
        assert_eq!(block.row("average_power").unwrap().value, 100.0);
        assert_eq!(block.row("workout_time").unwrap().value, 50.0);
    }

    #[test]
    fn test_overlapping_selection_blocks() {
        let factory = MetricFactory::with_builtin();
        let summary = IntervalSummary::new(&factory, MetricContext::default(), symbols(), Units::Metric);
        let selection =
            IntervalSelection::new(vec![iv("a", 40.0, 60.0), iv("b", 50.0, 70.0)]).unwrap();
        let result = summary.summarize_selection(&ride(100), &selection).unwrap();

        let combined = result.combined.as_ref().unwrap();
        assert_eq!(combined.name, "2 selected intervals");
        // 40..70 counted once despite the overlap
        assert_eq!(combined.row("workout_time").unwrap().value, 30.0);
        let avg = combined.row("average_power").unwrap().value;
        assert!((avg - (10.0 * 100.0 + 20.0 * 300.0) / 30.0).abs() < 1e-9);

        let excluding = result.excluding.as_ref().unwrap();
        assert_eq!(excluding.name, "Excluding 2 selected");
        assert_eq!(excluding.row("workout_time").unwrap().value, 70.0);

        let names: Vec<&str> = result.blocks().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["2 selected intervals", "a", "b", "Excluding 2 selected"]);
    }

    #[test]
    fn test_no_excluding_block_when_everything_selected() {
        let factory = MetricFactory::with_builtin();
        let summary = IntervalSummary::new(&factory, MetricContext::default(), symbols(), Units::Metric);
        let selection =
            IntervalSelection::new(vec![iv("a", 0.0, 60.0), iv("b", 50.0, 100.0)]).unwrap();
        let result = summary.summarize_selection(&ride(100), &selection).unwrap();

        assert!(result.combined.is_some());
        assert!(result.excluding.is_none());
    }

    #[test]
    fn test_rows_skip_irrelevant_and_blank_seconds() {
        let factory = MetricFactory::with_builtin();
        let summary = IntervalSummary::new(&factory, MetricContext::default(), symbols(), Units::Metric);
        let block = summary.summarize_interval(&ride(100), &iv("x", 0.0, 100.0)).unwrap();

        // no cadence recorded
        assert!(block.row("average_cad").is_none());
        let time = block.row("workout_time").unwrap();
        assert_eq!(time.units, "");
        assert_eq!(time.display, "0:01:40");

        let symbols: Vec<&str> = block.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["workout_time", "total_distance", "average_power", "average_hr"]);
    }

    #[test]
    fn test_cached_summary_matches_fresh() {
        let factory = MetricFactory::with_builtin();
        let summary = IntervalSummary::new(&factory, MetricContext::default(), symbols(), Units::Metric);
        let ride = ride(100);
        let selection =
            IntervalSelection::new(vec![iv("a", 10.0, 20.0), iv("b", 30.0, 40.0)]).unwrap();

        let mut cache = SplitCache::new();
        let cached = summary
            .summarize_selection_cached(&ride, &selection, &mut cache)
            .unwrap();
        assert!(cache.is_cached());
        let again = summary
            .summarize_selection_cached(&ride, &selection, &mut cache)
            .unwrap();
        let fresh = summary.summarize_selection(&ride, &selection).unwrap();

        assert_eq!(cached, fresh);
        assert_eq!(again, fresh);
    }
}
