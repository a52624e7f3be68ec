//! Power based metrics: work, normalized power, intensity and stress
//!
//! Missing power readings count as zero watts, matching how a power meter
//! reports coasting.

use crate::derived::{rolling_window_samples, NP_WINDOW_SECS, XP_TIME_CONSTANT_SECS};
use crate::metrics::basic::{ChannelAverage, ChannelPeak};
use crate::metrics::{MetricContext, MetricKind, MetricValues, RideMetric};
use crate::models::{Channel, RideFile, Units};

/// Built-in metrics defined in this module
pub fn builtin() -> Vec<Box<dyn RideMetric>> {
    vec![
        Box::new(TotalWork),
        Box::new(ChannelAverage {
            symbol: "average_power",
            name: "Average Power",
            channel: Channel::Watts,
            include_zeros: true,
            metric_units: "watts",
            imperial_units: "watts",
            precision: 0,
            conversion: 1.0,
            offset: 0.0,
        }),
        Box::new(ChannelPeak {
            symbol: "max_power",
            name: "Max Power",
            channel: Channel::Watts,
            metric_units: "watts",
            imperial_units: "watts",
            precision: 0,
            conversion: 1.0,
        }),
        Box::new(ChannelAverage {
            symbol: "average_apower",
            name: "Average Altitude Power",
            channel: Channel::APower,
            include_zeros: true,
            metric_units: "watts",
            imperial_units: "watts",
            precision: 0,
            conversion: 1.0,
            offset: 0.0,
        }),
        Box::new(NormalizedPower),
        Box::new(IntensityFactor),
        Box::new(TrainingStressScore),
        Box::new(XPower),
        Box::new(VariabilityIndex),
        Box::new(EfficiencyFactor),
    ]
}

fn watts(ride: &RideFile) -> Vec<f64> {
    ride.samples
        .iter()
        .map(|s| s.watts.unwrap_or(0.0))
        .collect()
}

/// Fourth-power mean of a 30 second rolling average; 0 when the ride is
/// shorter than one window
pub fn normalized_power(watts: &[f64], recording_interval: f64) -> f64 {
    let window = rolling_window_samples(NP_WINDOW_SECS, recording_interval);
    if watts.len() < window {
        return 0.0;
    }

    let mut rolling_sum: f64 = watts[..window - 1].iter().sum();
    let mut total = 0.0;
    let mut count = 0usize;

    for i in (window - 1)..watts.len() {
        rolling_sum += watts[i];
        if i >= window {
            rolling_sum -= watts[i - window];
        }
        let rolling = rolling_sum / window as f64;
        total += rolling.powi(4);
        count += 1;
    }

    (total / count as f64).powf(0.25)
}

/// Fourth-power mean of a 25 second exponentially weighted average
pub fn xpower(watts: &[f64], recording_interval: f64) -> f64 {
    if watts.is_empty() {
        return 0.0;
    }

    let weight = (recording_interval / XP_TIME_CONSTANT_SECS).clamp(0.0, 1.0);
    let mut ewma = 0.0;
    let mut total = 0.0;

    for &w in watts {
        ewma += (w - ewma) * weight;
        total += ewma.powi(4);
    }

    (total / watts.len() as f64).powf(0.25)
}

/// Mechanical work in kilojoules
pub struct TotalWork;

impl RideMetric for TotalWork {
    fn symbol(&self) -> &str {
        "total_work"
    }

    fn name(&self) -> &str {
        "Work"
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Total
    }

    fn units(&self, _units: Units) -> &str {
        "kJ"
    }

    fn is_relevant(&self, ride: &RideFile, _ctx: &MetricContext) -> bool {
        ride.is_data_present(Channel::Watts)
    }

    fn compute(&self, ride: &RideFile, _ctx: &MetricContext, _deps: &MetricValues) -> f64 {
        let joules: f64 = ride
            .samples
            .iter()
            .filter_map(|s| s.watts)
            .map(|w| w * ride.recording_interval)
            .sum();
        joules / 1000.0
    }
}

pub struct NormalizedPower;

impl RideMetric for NormalizedPower {
    fn symbol(&self) -> &str {
        "coggan_np"
    }

    fn name(&self) -> &str {
        "Normalized Power"
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Average
    }

    fn units(&self, _units: Units) -> &str {
        "watts"
    }

    fn is_relevant(&self, ride: &RideFile, _ctx: &MetricContext) -> bool {
        ride.is_data_present(Channel::Watts)
    }

    fn compute(&self, ride: &RideFile, _ctx: &MetricContext, _deps: &MetricValues) -> f64 {
        normalized_power(&watts(ride), ride.recording_interval)
    }
}

/// Normalized power over FTP
pub struct IntensityFactor;

impl RideMetric for IntensityFactor {
    fn symbol(&self) -> &str {
        "coggan_if"
    }

    fn name(&self) -> &str {
        "Intensity Factor"
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Ratio
    }

    fn precision(&self) -> usize {
        3
    }

    fn dependencies(&self) -> &[&'static str] {
        &["coggan_np"]
    }

    fn is_relevant(&self, ride: &RideFile, ctx: &MetricContext) -> bool {
        ctx.ftp().is_some() && ride.is_data_present(Channel::Watts)
    }

    fn compute(&self, _ride: &RideFile, ctx: &MetricContext, deps: &MetricValues) -> f64 {
        match ctx.ftp() {
            Some(ftp) => deps.value("coggan_np") / ftp,
            None => 0.0,
        }
    }
}

/// TSS = duration × NP × IF / (FTP × 3600) × 100
pub struct TrainingStressScore;

impl RideMetric for TrainingStressScore {
    fn symbol(&self) -> &str {
        "coggan_tss"
    }

    fn name(&self) -> &str {
        "TSS"
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Total
    }

    fn dependencies(&self) -> &[&'static str] {
        &["coggan_np", "coggan_if", "workout_time"]
    }

    fn is_relevant(&self, ride: &RideFile, ctx: &MetricContext) -> bool {
        ctx.ftp().is_some() && ride.is_data_present(Channel::Watts)
    }

    fn compute(&self, _ride: &RideFile, ctx: &MetricContext, deps: &MetricValues) -> f64 {
        let Some(ftp) = ctx.ftp() else {
            return 0.0;
        };
        let normalized_work = deps.value("coggan_np") * deps.value("workout_time");
        let raw_tss = normalized_work * deps.value("coggan_if");
        raw_tss / (ftp * 3600.0) * 100.0
    }
}

pub struct XPower;

impl RideMetric for XPower {
    fn symbol(&self) -> &str {
        "skiba_xpower"
    }

    fn name(&self) -> &str {
        "xPower"
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Average
    }

    fn units(&self, _units: Units) -> &str {
        "watts"
    }

    fn is_relevant(&self, ride: &RideFile, _ctx: &MetricContext) -> bool {
        ride.is_data_present(Channel::Watts)
    }

    fn compute(&self, ride: &RideFile, _ctx: &MetricContext, _deps: &MetricValues) -> f64 {
        xpower(&watts(ride), ride.recording_interval)
    }
}

/// Normalized over average power
pub struct VariabilityIndex;

impl RideMetric for VariabilityIndex {
    fn symbol(&self) -> &str {
        "coggan_variability_index"
    }

    fn name(&self) -> &str {
        "Variability Index"
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Ratio
    }

    fn precision(&self) -> usize {
        3
    }

    fn dependencies(&self) -> &[&'static str] {
        &["coggan_np", "average_power"]
    }

    fn is_relevant(&self, ride: &RideFile, _ctx: &MetricContext) -> bool {
        ride.is_data_present(Channel::Watts)
    }

    fn compute(&self, _ride: &RideFile, _ctx: &MetricContext, deps: &MetricValues) -> f64 {
        let average = deps.value("average_power");
        if average <= 0.0 {
            return 0.0;
        }
        deps.value("coggan_np") / average
    }
}

/// Normalized power per heart beat
pub struct EfficiencyFactor;

impl RideMetric for EfficiencyFactor {
    fn symbol(&self) -> &str {
        "friel_efficiency_factor"
    }

    fn name(&self) -> &str {
        "Efficiency Factor"
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Ratio
    }

    fn precision(&self) -> usize {
        3
    }

    fn dependencies(&self) -> &[&'static str] {
        &["coggan_np", "average_hr"]
    }

    fn is_relevant(&self, ride: &RideFile, _ctx: &MetricContext) -> bool {
        ride.is_data_present(Channel::Watts) && ride.is_data_present(Channel::Hr)
    }

    fn compute(&self, _ride: &RideFile, _ctx: &MetricContext, deps: &MetricValues) -> f64 {
        let hr = deps.value("average_hr");
        if hr <= 0.0 {
            return 0.0;
        }
        deps.value("coggan_np") / hr
    }
}
