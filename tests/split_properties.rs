use intervalrs::models::{Interval, IntervalKind, RideFile, RideSample, XDataPoint, XDataSeries};
use intervalrs::{IntervalSelection, IntervalSet, RideSplitter};
use proptest::prelude::*;

/// Property tests for splitting a ride into included and excluded streams

fn ride_from_steps(steps: &[u8]) -> RideFile {
    let mut ride = RideFile::new("prop", 1.0);
    let mut secs = 0.0;
    let mut km = 0.0;
    for (i, step) in steps.iter().enumerate() {
        ride.samples.push(RideSample {
            watts: Some(i as f64),
            ..RideSample::new(secs, km)
        });
        secs += *step as f64;
        km += *step as f64 * 0.01;
    }
    ride.xdata.push(XDataSeries {
        points: steps
            .iter()
            .scan(0.0, |t, step| {
                let point = XDataPoint {
                    secs: *t + 0.5,
                    values: vec![*t],
                    ..XDataPoint::default()
                };
                *t += *step as f64;
                Some(point)
            })
            .collect(),
        name: "probe".to_string(),
        value_names: vec!["t".to_string()],
        unit_names: vec!["s".to_string()],
    });
    ride
}

fn selection_from(spans: &[(u16, u16)]) -> IntervalSelection {
    let intervals = spans
        .iter()
        .enumerate()
        .map(|(i, (start, len))| {
            Interval::new(
                format!("p{}", i),
                *start as f64,
                (*start + *len) as f64,
                IntervalKind::User,
            )
            .unwrap()
        })
        .collect();
    IntervalSelection::new(intervals).unwrap()
}

fn axes_start_at_zero_and_rise(samples: &[RideSample]) -> bool {
    match samples.first() {
        None => true,
        Some(first) => {
            first.secs == 0.0
                && first.km == 0.0
                && samples
                    .windows(2)
                    .all(|w| w[1].secs >= w[0].secs && w[1].km >= w[0].km)
        }
    }
}

/// Every step after the first equals the original step from the sample's
/// immediate predecessor; `watts` holds the original index
fn steps_follow_original_predecessor(stream: &[RideSample], ride: &RideFile) -> bool {
    stream.windows(2).all(|w| {
        let index = w[1].watts.unwrap_or_default() as usize;
        if index == 0 {
            return false;
        }
        let (orig, prev) = (&ride.samples[index], &ride.samples[index - 1]);
        (w[1].secs - w[0].secs - (orig.secs - prev.secs)).abs() < 1e-9
            && (w[1].km - w[0].km - (orig.km - prev.km)).abs() < 1e-9
    })
}

proptest! {
    #[test]
    fn split_partitions_every_sample(
        steps in prop::collection::vec(1u8..5, 1..200),
        spans in prop::collection::vec((0u16..600, 0u16..120), 0..6),
    ) {
        let ride = ride_from_steps(&steps);
        let selection = selection_from(&spans);
        let split = RideSplitter::split(&ride, &selection).unwrap();

        prop_assert_eq!(
            split.included.samples.len() + split.excluded.samples.len(),
            ride.samples.len()
        );
        prop_assert_eq!(split.interval_count, selection.len());
    }

    #[test]
    fn split_membership_matches_merged_set(
        steps in prop::collection::vec(1u8..5, 1..200),
        spans in prop::collection::vec((0u16..600, 0u16..120), 0..6),
    ) {
        let ride = ride_from_steps(&steps);
        let selection = selection_from(&spans);
        let set = IntervalSet::from_intervals(selection.intervals());
        let split = RideSplitter::split(&ride, &selection).unwrap();

        // watts carries the original index, so order and membership are visible
        let expect_in: Vec<f64> = ride
            .samples
            .iter()
            .filter(|s| set.contains(s.secs))
            .filter_map(|s| s.watts)
            .collect();
        let expect_out: Vec<f64> = ride
            .samples
            .iter()
            .filter(|s| !set.contains(s.secs))
            .filter_map(|s| s.watts)
            .collect();

        let got_in: Vec<f64> = split.included.samples.iter().filter_map(|s| s.watts).collect();
        let got_out: Vec<f64> = split.excluded.samples.iter().filter_map(|s| s.watts).collect();
        prop_assert_eq!(got_in, expect_in);
        prop_assert_eq!(got_out, expect_out);
    }

    #[test]
    fn split_streams_are_rebased(
        steps in prop::collection::vec(1u8..5, 1..200),
        spans in prop::collection::vec((0u16..600, 0u16..120), 0..6),
    ) {
        let ride = ride_from_steps(&steps);
        let split = RideSplitter::split(&ride, &selection_from(&spans)).unwrap();

        prop_assert!(axes_start_at_zero_and_rise(&split.included.samples));
        prop_assert!(axes_start_at_zero_and_rise(&split.excluded.samples));
        prop_assert!(steps_follow_original_predecessor(&split.included.samples, &ride));
        prop_assert!(steps_follow_original_predecessor(&split.excluded.samples, &ride));
    }

    #[test]
    fn xdata_split_on_its_own_timeline(
        steps in prop::collection::vec(1u8..5, 1..200),
        spans in prop::collection::vec((0u16..600, 0u16..120), 0..6),
    ) {
        let ride = ride_from_steps(&steps);
        let selection = selection_from(&spans);
        let set = selection.to_set();
        let split = RideSplitter::split(&ride, &selection).unwrap();

        let series = &ride.xdata[0];
        let inside = series.points.iter().filter(|p| set.contains(p.secs)).count();
        prop_assert_eq!(split.included.xdata[0].points.len(), inside);
        prop_assert_eq!(
            split.excluded.xdata[0].points.len(),
            series.points.len() - inside
        );
        prop_assert_eq!(&split.included.xdata[0].name, &series.name);
    }

    #[test]
    fn interval_order_does_not_change_split(
        steps in prop::collection::vec(1u8..5, 1..120),
        spans in prop::collection::vec((0u16..400, 1u16..80), 1..5),
    ) {
        let ride = ride_from_steps(&steps);
        let mut reversed = spans.clone();
        reversed.reverse();

        let a = RideSplitter::split(&ride, &selection_from(&spans)).unwrap();
        let b = RideSplitter::split(&ride, &selection_from(&reversed)).unwrap();
        prop_assert_eq!(a.included.samples, b.included.samples);
        prop_assert_eq!(a.excluded.samples, b.excluded.samples);
    }
}
