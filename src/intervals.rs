//! Interval construction, selection and overlap-safe membership
//!
//! Selected intervals may overlap or even repeat. They are folded into an
//! [`IntervalSet`] of sorted, disjoint spans so that each sample is tested
//! once and lands in the included stream at most once.

use serde::{Deserialize, Serialize};

use crate::error::{IntervalRsError, Result};
use crate::models::{Interval, IntervalKind};

impl Interval {
    /// Build an interval, rejecting non-finite bounds and `stop < start`
    pub fn new(name: impl Into<String>, start: f64, stop: f64, kind: IntervalKind) -> Result<Self> {
        let interval = Self {
            name: name.into(),
            start,
            stop,
            kind,
        };
        interval.validate()?;
        Ok(interval)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.start.is_finite() || !self.stop.is_finite() {
            return Err(IntervalRsError::Validation(format!(
                "interval '{}' has non-finite bounds [{}, {})",
                self.name, self.start, self.stop
            )));
        }
        if self.stop < self.start {
            return Err(IntervalRsError::Validation(format!(
                "interval '{}' stops at {} before it starts at {}",
                self.name, self.stop, self.start
            )));
        }
        Ok(())
    }

    /// Half-open containment: `start <= secs < stop`
    pub fn contains(&self, secs: f64) -> bool {
        self.start <= secs && secs < self.stop
    }

    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.stop <= self.start
    }
}

/// A disjoint, sorted union of half-open spans
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntervalSet {
    spans: Vec<(f64, f64)>,
}

impl IntervalSet {
    /// Merge possibly overlapping intervals into disjoint spans.
    /// Touching spans (`a.stop == b.start`) merge; empty intervals are dropped.
    pub fn from_intervals<'a, I>(intervals: I) -> Self
    where
        I: IntoIterator<Item = &'a Interval>,
    {
        let mut raw: Vec<(f64, f64)> = intervals
            .into_iter()
            .filter(|i| !i.is_empty() && i.start.is_finite() && i.stop.is_finite())
            .map(|i| (i.start, i.stop))
            .collect();

        raw.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut spans: Vec<(f64, f64)> = Vec::with_capacity(raw.len());
        for (start, stop) in raw {
            match spans.last_mut() {
                Some(last) if start <= last.1 => {
                    if stop > last.1 {
                        last.1 = stop;
                    }
                }
                _ => spans.push((start, stop)),
            }
        }

        Self { spans }
    }

    pub fn spans(&self) -> &[(f64, f64)] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Whether `secs` lies inside any span
    pub fn contains(&self, secs: f64) -> bool {
        // first span whose stop is beyond secs
        let idx = self.spans.partition_point(|&(_, stop)| stop <= secs);
        self.spans
            .get(idx)
            .is_some_and(|&(start, _)| start <= secs)
    }

    /// One flag per timestamp; `times` must be non-decreasing
    pub fn membership(&self, times: &[f64]) -> Vec<bool> {
        let mut flags = Vec::with_capacity(times.len());
        let mut span = 0;

        for &t in times {
            while span < self.spans.len() && self.spans[span].1 <= t {
                span += 1;
            }
            flags.push(span < self.spans.len() && self.spans[span].0 <= t);
        }

        flags
    }

    /// Total seconds covered by the set
    pub fn total_span(&self) -> f64 {
        self.spans.iter().map(|(start, stop)| stop - start).sum()
    }
}

/// The intervals currently selected for summary, in selection order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntervalSelection {
    intervals: Vec<Interval>,
}

impl IntervalSelection {
    pub fn new(intervals: Vec<Interval>) -> Result<Self> {
        for interval in &intervals {
            interval.validate()?;
        }
        Ok(Self { intervals })
    }

    pub fn push(&mut self, interval: Interval) -> Result<()> {
        interval.validate()?;
        self.intervals.push(interval);
        Ok(())
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn to_set(&self) -> IntervalSet {
        IntervalSet::from_intervals(&self.intervals)
    }

    /// Stable identity of the selected bounds, used to reuse a cached split
    pub fn fingerprint(&self) -> Vec<(u64, u64)> {
        self.intervals
            .iter()
            .map(|i| (i.start.to_bits(), i.stop.to_bits()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a IntervalSelection {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(start: f64, stop: f64) -> Interval {
        Interval::new(format!("{}-{}", start, stop), start, stop, IntervalKind::User).unwrap()
    }

    #[test]
    fn test_interval_new_rejects_reversed_bounds() {
        assert!(Interval::new("bad", 10.0, 5.0, IntervalKind::User).is_err());
        assert!(Interval::new("nan", f64::NAN, 5.0, IntervalKind::User).is_err());
        assert!(Interval::new("empty", 5.0, 5.0, IntervalKind::User).is_ok());
    }

    #[test]
    fn test_interval_contains_is_half_open() {
        let interval = iv(10.0, 20.0);
        assert!(interval.contains(10.0));
        assert!(interval.contains(19.999));
        assert!(!interval.contains(20.0));
        assert!(!interval.contains(9.0));
    }

    #[test]
    fn test_set_merges_overlapping_and_touching() {
        let set = IntervalSet::from_intervals(&[iv(30.0, 40.0), iv(0.0, 10.0), iv(5.0, 15.0), iv(15.0, 20.0)]);
        assert_eq!(set.spans(), &[(0.0, 20.0), (30.0, 40.0)]);
        assert_eq!(set.total_span(), 30.0);
    }

    #[test]
    fn test_set_drops_empty_and_handles_nested() {
        let set = IntervalSet::from_intervals(&[iv(0.0, 100.0), iv(10.0, 20.0), iv(50.0, 50.0)]);
        assert_eq!(set.spans(), &[(0.0, 100.0)]);

        let empty = IntervalSet::from_intervals(&[iv(5.0, 5.0)]);
        assert!(empty.is_empty());
        assert!(!empty.contains(5.0));
    }

    #[test]
    fn test_set_contains() {
        let set = IntervalSet::from_intervals(&[iv(0.0, 10.0), iv(20.0, 30.0)]);
        assert!(set.contains(0.0));
        assert!(!set.contains(10.0));
        assert!(!set.contains(15.0));
        assert!(set.contains(25.0));
        assert!(!set.contains(30.0));
        assert!(!set.contains(-1.0));
    }

    #[test]
    fn test_membership_matches_contains() {
        let set = IntervalSet::from_intervals(&[iv(2.0, 4.0), iv(3.0, 6.0), iv(8.0, 9.0)]);
        let times: Vec<f64> = (0..12).map(|t| t as f64).collect();
        let flags = set.membership(&times);

        for (t, flag) in times.iter().zip(&flags) {
            assert_eq!(*flag, set.contains(*t), "mismatch at {}", t);
        }
        assert_eq!(flags.iter().filter(|f| **f).count(), 5);
    }

    #[test]
    fn test_selection_fingerprint_tracks_bounds() {
        let a = IntervalSelection::new(vec![iv(0.0, 10.0), iv(5.0, 15.0)]).unwrap();
        let mut b = IntervalSelection::new(vec![iv(0.0, 10.0)]).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());

        b.push(iv(5.0, 15.0)).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_selection_rejects_invalid_interval() {
        let bad = Interval {
            name: "bad".to_string(),
            start: 9.0,
            stop: 1.0,
            kind: IntervalKind::User,
        };
        assert!(IntervalSelection::new(vec![bad]).is_err());
    }
}
