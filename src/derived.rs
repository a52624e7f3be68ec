//! Per-sample derived power series
//!
//! Computed once over the whole ride, before any interval split. The split
//! copies these values into the synthesized streams untouched, so a sample's
//! rolling power still reflects the riding that preceded it in the real ride.

use crate::models::{Channel, RideFile};

/// Rolling window used for the `np` series, in seconds
pub const NP_WINDOW_SECS: f64 = 30.0;

/// Time constant of the `xp` exponential average, in seconds
pub const XP_TIME_CONSTANT_SECS: f64 = 25.0;

/// Fill `np`, `xp` and `apower` on every sample. No-op without power data.
pub fn recalculate_derived(ride: &mut RideFile) {
    if !ride.is_data_present(Channel::Watts) {
        for sample in &mut ride.samples {
            sample.np = None;
            sample.xp = None;
            sample.apower = None;
        }
        return;
    }

    let window = rolling_window_samples(NP_WINDOW_SECS, ride.recording_interval);
    let weight = (ride.recording_interval / XP_TIME_CONSTANT_SECS).min(1.0);

    let watts: Vec<f64> = ride
        .samples
        .iter()
        .map(|s| s.watts.unwrap_or(0.0))
        .collect();

    let mut rolling_sum = 0.0;
    let mut ewma = 0.0;

    for (i, sample) in ride.samples.iter_mut().enumerate() {
        rolling_sum += watts[i];
        if i >= window {
            rolling_sum -= watts[i - window];
        }
        sample.np = if i + 1 >= window {
            Some(rolling_sum / window as f64)
        } else {
            None
        };

        ewma += (watts[i] - ewma) * weight;
        sample.xp = Some(ewma);

        sample.apower = Some(match sample.alt {
            Some(alt) => watts[i] / altitude_power_fraction(alt),
            None => watts[i],
        });
    }

    tracing::debug!(
        ride = %ride.id,
        samples = ride.samples.len(),
        window,
        "Derived power series recalculated"
    );
}

/// Number of samples covering `secs` at the given recording interval, at least one
pub fn rolling_window_samples(secs: f64, recording_interval: f64) -> usize {
    if recording_interval <= 0.0 {
        return 1;
    }
    ((secs / recording_interval).round() as usize).max(1)
}

/// Fraction of sea-level aerobic power available at `altitude_m`
/// (Bassett et al., acclimatised athletes)
pub fn altitude_power_fraction(altitude_m: f64) -> f64 {
    let km = altitude_m.max(0.0) / 1000.0;
    let percent = -1.1219 * km * km - 1.8991 * km + 99.921;
    (percent / 100.0).clamp(0.5, 1.0)
}
