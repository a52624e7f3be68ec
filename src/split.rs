//! Synthesis of "included" and "excluded" rides from an interval selection
//!
//! Intervals can overlap, so metrics over several selected intervals cannot be
//! obtained by adding up per-interval metrics: totals would be overstated and
//! averages skewed. Instead the ride is split into two synthesized rides, one
//! holding every sample inside the selection and one holding the rest, and
//! metrics are computed over each of them.
//!
//! Each synthesized ride gets its own continuous time and distance axes. Both
//! start at zero, and a stream that resumes after a run of samples went to the
//! other stream continues one original step after its own last sample, so the
//! removed samples never show up as a gap.

use std::sync::Arc;

use tracing::{debug, info_span};

use crate::error::Result;
use crate::intervals::{IntervalSelection, IntervalSet};
use crate::models::{RideFile, RideSample, XDataPoint, XDataSeries};

/// A point on a time/distance axis that can be moved onto a new axis
pub trait TimedPoint: Clone {
    fn secs(&self) -> f64;
    fn km(&self) -> f64;
    fn set_axes(&mut self, secs: f64, km: f64);
}

impl TimedPoint for RideSample {
    fn secs(&self) -> f64 {
        self.secs
    }

    fn km(&self) -> f64 {
        self.km
    }

    fn set_axes(&mut self, secs: f64, km: f64) {
        self.secs = secs;
        self.km = km;
    }
}

impl TimedPoint for XDataPoint {
    fn secs(&self) -> f64 {
        self.secs
    }

    fn km(&self) -> f64 {
        self.km
    }

    fn set_axes(&mut self, secs: f64, km: f64) {
        self.secs = secs;
        self.km = km;
    }
}

/// One output stream with the offsets dragging its axes back over removed samples
struct Stream<T> {
    points: Vec<T>,
    time_offset: f64,
    dist_offset: f64,
}

impl<T: TimedPoint> Stream<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            time_offset: 0.0,
            dist_offset: 0.0,
        }
    }

    /// Append `point`; `previous` is the point right before it in the source
    /// series and `resumed` says whether that point went to the other stream
    fn push(&mut self, point: &T, previous: Option<&T>, resumed: bool) {
        match (self.points.last(), previous) {
            (None, _) => {
                self.time_offset = point.secs();
                self.dist_offset = point.km();
            }
            (Some(last), Some(prev)) if resumed => {
                self.time_offset = prev.secs() - last.secs();
                self.dist_offset = prev.km() - last.km();
            }
            _ => {}
        }

        let mut rebased = point.clone();
        rebased.set_axes(
            point.secs() - self.time_offset,
            point.km() - self.dist_offset,
        );
        self.points.push(rebased);
    }
}

/// Split a series by per-point membership flags into (included, excluded),
/// re-basing both streams onto continuous axes starting at zero.
///
/// Panics unless `flags` has one entry per point.
pub(crate) fn partition_with_flags<T: TimedPoint>(
    points: &[T],
    flags: &[bool],
) -> (Vec<T>, Vec<T>) {
    assert_eq!(points.len(), flags.len(), "one membership flag per point");

    let included_len = flags.iter().filter(|f| **f).count();
    let mut included = Stream::with_capacity(included_len);
    let mut excluded = Stream::with_capacity(points.len() - included_len);

    for (i, (point, &inside)) in points.iter().zip(flags).enumerate() {
        let previous = i.checked_sub(1).map(|p| &points[p]);
        let resumed = i > 0 && flags[i - 1] != inside;

        if inside {
            included.push(point, previous, resumed);
        } else {
            excluded.push(point, previous, resumed);
        }
    }

    (included.points, excluded.points)
}

/// Split a series against an interval set and re-base both halves
pub fn partition_series<T: TimedPoint>(points: &[T], set: &IntervalSet) -> (Vec<T>, Vec<T>) {
    let times: Vec<f64> = points.iter().map(TimedPoint::secs).collect();
    let flags = set.membership(&times);
    partition_with_flags(points, &flags)
}

/// The pair of rides synthesized from a selection
#[derive(Debug, Clone, PartialEq)]
pub struct SplitRide {
    /// Samples inside any selected interval
    pub included: RideFile,

    /// Samples outside every selected interval
    pub excluded: RideFile,

    /// Number of intervals in the selection that produced the split
    pub interval_count: usize,
}

impl SplitRide {
    pub fn included_is_empty(&self) -> bool {
        self.included.samples.is_empty()
    }

    pub fn excluded_is_empty(&self) -> bool {
        self.excluded.samples.is_empty()
    }
}

/// Builds the included / excluded rides for a selection
pub struct RideSplitter;

impl RideSplitter {
    /// Partition samples and every xdata series of `ride` by the selection
    pub fn split(ride: &RideFile, selection: &IntervalSelection) -> Result<SplitRide> {
        let span = info_span!("split", ride = %ride.id, intervals = selection.len());
        let _guard = span.enter();

        ride.validate()?;
        let set = selection.to_set();
        Ok(Self::split_with_set(ride, &set, selection.len()))
    }

    /// Partition against an already merged set; `ride` must be valid
    pub fn split_with_set(ride: &RideFile, set: &IntervalSet, interval_count: usize) -> SplitRide {
        let mut included = ride.empty_like("included");
        let mut excluded = ride.empty_like("excluded");

        let (inside, outside) = partition_series(&ride.samples, set);
        included.samples = inside;
        excluded.samples = outside;

        included.xdata.clear();
        excluded.xdata.clear();
        for series in &ride.xdata {
            let (inside, outside) = partition_series(&series.points, set);
            included.xdata.push(XDataSeries {
                points: inside,
                ..series.empty_like()
            });
            excluded.xdata.push(XDataSeries {
                points: outside,
                ..series.empty_like()
            });
        }

        debug!(
            included = included.samples.len(),
            excluded = excluded.samples.len(),
            xdata = ride.xdata.len(),
            covered_secs = set.total_span(),
            "Ride split"
        );

        SplitRide {
            included,
            excluded,
            interval_count,
        }
    }
}

/// Keeps the last split so an unchanged selection is not re-synthesized
#[derive(Debug, Default)]
pub struct SplitCache {
    key: Option<CacheKey>,
    split: Option<Arc<SplitRide>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    ride_id: String,
    sample_count: usize,
    selection: Vec<(u64, u64)>,
}

impl SplitCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached split when ride and selection match, rebuild otherwise
    pub fn get_or_split(
        &mut self,
        ride: &RideFile,
        selection: &IntervalSelection,
    ) -> Result<Arc<SplitRide>> {
        let key = CacheKey {
            ride_id: ride.id.clone(),
            sample_count: ride.samples.len(),
            selection: selection.fingerprint(),
        };

        if let (Some(cached_key), Some(split)) = (&self.key, &self.split) {
            if *cached_key == key {
                debug!(ride = %ride.id, "Reusing cached split");
                return Ok(Arc::clone(split));
            }
        }

        let split = Arc::new(RideSplitter::split(ride, selection)?);
        self.key = Some(key);
        self.split = Some(Arc::clone(&split));
        Ok(split)
    }

    /// Drop the cached split, e.g. after the ride's samples were edited
    pub fn invalidate(&mut self) {
        self.key = None;
        self.split = None;
    }

    pub fn is_cached(&self) -> bool {
        self.split.is_some()
    }
}
