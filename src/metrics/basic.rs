//! Time, distance, elevation and per-channel average / peak metrics

use crate::metrics::{MetricContext, MetricKind, MetricValues, RideMetric};
use crate::models::{Channel, RideFile, Units};

const KM_TO_MILES: f64 = 0.621371;
const M_TO_FEET: f64 = 3.28084;

/// Built-in metrics defined in this module
pub fn builtin() -> Vec<Box<dyn RideMetric>> {
    vec![
        Box::new(WorkoutTime),
        Box::new(TimeRiding),
        Box::new(TotalDistance),
        Box::new(ElevationGain),
        Box::new(AverageSpeed),
        Box::new(ChannelAverage {
            symbol: "average_hr",
            name: "Average Heart Rate",
            channel: Channel::Hr,
            include_zeros: false,
            metric_units: "bpm",
            imperial_units: "bpm",
            precision: 0,
            conversion: 1.0,
            offset: 0.0,
        }),
        Box::new(ChannelAverage {
            symbol: "average_cad",
            name: "Average Cadence",
            channel: Channel::Cad,
            include_zeros: false,
            metric_units: "rpm",
            imperial_units: "rpm",
            precision: 0,
            conversion: 1.0,
            offset: 0.0,
        }),
        Box::new(ChannelAverage {
            symbol: "average_temp",
            name: "Average Temp",
            channel: Channel::Temp,
            include_zeros: true,
            metric_units: "C",
            imperial_units: "F",
            precision: 1,
            conversion: 1.8,
            offset: 32.0,
        }),
        Box::new(ChannelPeak {
            symbol: "max_heartrate",
            name: "Max Heartrate",
            channel: Channel::Hr,
            metric_units: "bpm",
            imperial_units: "bpm",
            precision: 0,
            conversion: 1.0,
        }),
        Box::new(ChannelPeak {
            symbol: "max_speed",
            name: "Max Speed",
            channel: Channel::Kph,
            metric_units: "kph",
            imperial_units: "mph",
            precision: 1,
            conversion: KM_TO_MILES,
        }),
    ]
}

/// Elapsed time covered by the samples
pub struct WorkoutTime;

impl RideMetric for WorkoutTime {
    fn symbol(&self) -> &str {
        "workout_time"
    }

    fn name(&self) -> &str {
        "Duration"
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Time
    }

    fn units(&self, _units: Units) -> &str {
        "seconds"
    }

    fn compute(&self, ride: &RideFile, _ctx: &MetricContext, _deps: &MetricValues) -> f64 {
        ride.duration()
    }
}

/// Time spent moving, or pedaling when the ride has no speed channel
pub struct TimeRiding;

impl RideMetric for TimeRiding {
    fn symbol(&self) -> &str {
        "time_riding"
    }

    fn name(&self) -> &str {
        "Time Moving"
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Time
    }

    fn units(&self, _units: Units) -> &str {
        "seconds"
    }

    fn is_relevant(&self, ride: &RideFile, _ctx: &MetricContext) -> bool {
        ride.is_data_present(Channel::Kph) || ride.is_data_present(Channel::Cad)
    }

    fn compute(&self, ride: &RideFile, _ctx: &MetricContext, _deps: &MetricValues) -> f64 {
        let has_speed = ride.is_data_present(Channel::Kph);
        let moving = ride
            .samples
            .iter()
            .filter(|s| {
                if has_speed {
                    s.kph.is_some_and(|v| v > 0.0)
                } else {
                    s.cad.is_some_and(|v| v > 0.0)
                }
            })
            .count();
        moving as f64 * ride.recording_interval
    }
}

/// Distance covered, in kilometers
pub struct TotalDistance;

impl RideMetric for TotalDistance {
    fn symbol(&self) -> &str {
        "total_distance"
    }

    fn name(&self) -> &str {
        "Distance"
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Total
    }

    fn units(&self, units: Units) -> &str {
        if units.is_metric() {
            "km"
        } else {
            "miles"
        }
    }

    fn precision(&self) -> usize {
        2
    }

    fn conversion(&self) -> f64 {
        KM_TO_MILES
    }

    fn is_relevant(&self, ride: &RideFile, _ctx: &MetricContext) -> bool {
        distance(ride) > 0.0
    }

    fn compute(&self, ride: &RideFile, _ctx: &MetricContext, _deps: &MetricValues) -> f64 {
        distance(ride)
    }
}

fn distance(ride: &RideFile) -> f64 {
    match (ride.samples.first(), ride.samples.last()) {
        (Some(first), Some(last)) => last.km - first.km,
        _ => 0.0,
    }
}

/// Climbing in meters, ignoring altitude noise below the hysteresis
pub struct ElevationGain;

impl RideMetric for ElevationGain {
    fn symbol(&self) -> &str {
        "elevation_gain"
    }

    fn name(&self) -> &str {
        "Elevation Gain"
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Total
    }

    fn units(&self, units: Units) -> &str {
        if units.is_metric() {
            "meters"
        } else {
            "feet"
        }
    }

    fn conversion(&self) -> f64 {
        M_TO_FEET
    }

    fn is_relevant(&self, ride: &RideFile, _ctx: &MetricContext) -> bool {
        ride.is_data_present(Channel::Alt)
    }

    fn compute(&self, ride: &RideFile, ctx: &MetricContext, _deps: &MetricValues) -> f64 {
        elevation_gain(
            ride.samples.iter().filter_map(|s| s.alt),
            ctx.elevation_hysteresis_m,
        )
    }
}

/// Sum of climbs larger than `hysteresis` meters
pub fn elevation_gain(altitudes: impl IntoIterator<Item = f64>, hysteresis: f64) -> f64 {
    let hysteresis = hysteresis.max(0.0);
    let mut altitudes = altitudes.into_iter();
    let Some(mut reference) = altitudes.next() else {
        return 0.0;
    };

    let mut gain = 0.0;
    for alt in altitudes {
        if alt > reference + hysteresis {
            gain += alt - reference;
            reference = alt;
        } else if alt < reference - hysteresis {
            reference = alt;
        }
    }
    gain
}

/// Distance over moving time
pub struct AverageSpeed;

impl RideMetric for AverageSpeed {
    fn symbol(&self) -> &str {
        "average_speed"
    }

    fn name(&self) -> &str {
        "Average Speed"
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Average
    }

    fn units(&self, units: Units) -> &str {
        if units.is_metric() {
            "kph"
        } else {
            "mph"
        }
    }

    fn precision(&self) -> usize {
        1
    }

    fn conversion(&self) -> f64 {
        KM_TO_MILES
    }

    fn dependencies(&self) -> &[&'static str] {
        &["total_distance", "time_riding", "workout_time"]
    }

    fn is_relevant(&self, ride: &RideFile, _ctx: &MetricContext) -> bool {
        distance(ride) > 0.0
    }

    fn compute(&self, _ride: &RideFile, _ctx: &MetricContext, deps: &MetricValues) -> f64 {
        let moving = deps.value("time_riding");
        let secs = if moving > 0.0 {
            moving
        } else {
            deps.value("workout_time")
        };
        if secs <= 0.0 {
            return 0.0;
        }
        deps.value("total_distance") / secs * 3600.0
    }
}

/// Mean of one channel over the samples that carry it
pub struct ChannelAverage {
    pub symbol: &'static str,
    pub name: &'static str,
    pub channel: Channel,
    /// Count zero readings (coasting power) in the mean
    pub include_zeros: bool,
    pub metric_units: &'static str,
    pub imperial_units: &'static str,
    pub precision: usize,
    pub conversion: f64,
    pub offset: f64,
}

impl RideMetric for ChannelAverage {
    fn symbol(&self) -> &str {
        self.symbol
    }

    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Average
    }

    fn units(&self, units: Units) -> &str {
        if units.is_metric() {
            self.metric_units
        } else {
            self.imperial_units
        }
    }

    fn precision(&self) -> usize {
        self.precision
    }

    fn conversion(&self) -> f64 {
        self.conversion
    }

    fn conversion_offset(&self) -> f64 {
        self.offset
    }

    fn is_relevant(&self, ride: &RideFile, _ctx: &MetricContext) -> bool {
        ride.is_data_present(self.channel)
    }

    fn compute(&self, ride: &RideFile, _ctx: &MetricContext, _deps: &MetricValues) -> f64 {
        let (sum, count) = ride
            .samples
            .iter()
            .filter_map(|s| s.value(self.channel))
            .filter(|v| self.include_zeros || *v > 0.0)
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}

/// Highest value of one channel
pub struct ChannelPeak {
    pub symbol: &'static str,
    pub name: &'static str,
    pub channel: Channel,
    pub metric_units: &'static str,
    pub imperial_units: &'static str,
    pub precision: usize,
    pub conversion: f64,
}

impl RideMetric for ChannelPeak {
    fn symbol(&self) -> &str {
        self.symbol
    }

    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Peak
    }

    fn units(&self, units: Units) -> &str {
        if units.is_metric() {
            self.metric_units
        } else {
            self.imperial_units
        }
    }

    fn precision(&self) -> usize {
        self.precision
    }

    fn conversion(&self) -> f64 {
        self.conversion
    }

    fn is_relevant(&self, ride: &RideFile, _ctx: &MetricContext) -> bool {
        ride.is_data_present(self.channel)
    }

    fn compute(&self, ride: &RideFile, _ctx: &MetricContext, _deps: &MetricValues) -> f64 {
        ride.samples
            .iter()
            .filter_map(|s| s.value(self.channel))
            .fold(0.0, f64::max)
    }
}
