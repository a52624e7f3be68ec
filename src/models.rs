use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IntervalRsError, Result};

/// Sport types a ride file can be recorded for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Sport {
    #[default]
    Cycling,
    Running,
    Swimming,
    Rowing,
    Other,
}

/// Sample channels that may or may not be recorded in a ride
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Watts,
    Hr,
    Cad,
    Kph,
    Nm,
    Alt,
    Lat,
    Lon,
    Headwind,
    Slope,
    Temp,
    LrBalance,
    Smo2,
    Thb,
    Np,
    Xp,
    APower,
}

impl Channel {
    pub const ALL: [Channel; 17] = [
        Channel::Watts,
        Channel::Hr,
        Channel::Cad,
        Channel::Kph,
        Channel::Nm,
        Channel::Alt,
        Channel::Lat,
        Channel::Lon,
        Channel::Headwind,
        Channel::Slope,
        Channel::Temp,
        Channel::LrBalance,
        Channel::Smo2,
        Channel::Thb,
        Channel::Np,
        Channel::Xp,
        Channel::APower,
    ];

    /// Column / variable name used in CSV export and user formulas
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Watts => "watts",
            Channel::Hr => "hr",
            Channel::Cad => "cad",
            Channel::Kph => "kph",
            Channel::Nm => "nm",
            Channel::Alt => "alt",
            Channel::Lat => "lat",
            Channel::Lon => "lon",
            Channel::Headwind => "headwind",
            Channel::Slope => "slope",
            Channel::Temp => "temp",
            Channel::LrBalance => "lrbalance",
            Channel::Smo2 => "smo2",
            Channel::Thb => "thb",
            Channel::Np => "np",
            Channel::Xp => "xp",
            Channel::APower => "apower",
        }
    }
}

/// One recorded sample of a ride
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RideSample {
    /// Seconds from ride start
    pub secs: f64,

    /// Cumulative distance in kilometers
    pub km: f64,

    /// Power in watts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watts: Option<f64>,

    /// Heart rate in beats per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hr: Option<f64>,

    /// Cadence in revolutions per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cad: Option<f64>,

    /// Speed in km/h
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kph: Option<f64>,

    /// Torque in newton meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<f64>,

    /// Altitude in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,

    /// Headwind in km/h
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headwind: Option<f64>,

    /// Gradient in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slope: Option<f64>,

    /// Temperature in degrees Celsius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,

    /// Left/right balance, percent left
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lrbalance: Option<f64>,

    /// Muscle oxygen saturation in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smo2: Option<f64>,

    /// Total hemoglobin in g/dL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thb: Option<f64>,

    /// 30 second rolling power (derived)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub np: Option<f64>,

    /// 25 second exponentially weighted power (derived)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<f64>,

    /// Altitude adjusted power (derived)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apower: Option<f64>,
}

impl RideSample {
    pub fn new(secs: f64, km: f64) -> Self {
        Self {
            secs,
            km,
            ..Self::default()
        }
    }

    /// Value of a channel for this sample
    pub fn value(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Watts => self.watts,
            Channel::Hr => self.hr,
            Channel::Cad => self.cad,
            Channel::Kph => self.kph,
            Channel::Nm => self.nm,
            Channel::Alt => self.alt,
            Channel::Lat => self.lat,
            Channel::Lon => self.lon,
            Channel::Headwind => self.headwind,
            Channel::Slope => self.slope,
            Channel::Temp => self.temp,
            Channel::LrBalance => self.lrbalance,
            Channel::Smo2 => self.smo2,
            Channel::Thb => self.thb,
            Channel::Np => self.np,
            Channel::Xp => self.xp,
            Channel::APower => self.apower,
        }
    }
}

/// A point of an extra data series
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct XDataPoint {
    pub secs: f64,
    pub km: f64,
    #[serde(default)]
    pub values: Vec<f64>,
    #[serde(default)]
    pub strings: Vec<String>,
}

/// Extra sensor series recorded alongside the main samples at its own rate
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct XDataSeries {
    pub name: String,
    #[serde(default)]
    pub value_names: Vec<String>,
    #[serde(default)]
    pub unit_names: Vec<String>,
    #[serde(default)]
    pub points: Vec<XDataPoint>,
}

impl XDataSeries {
    /// Same name and schema, no points
    pub fn empty_like(&self) -> Self {
        Self {
            name: self.name.clone(),
            value_names: self.value_names.clone(),
            unit_names: self.unit_names.clone(),
            points: Vec::new(),
        }
    }

    /// Index of the first point at or after `secs`
    pub fn time_index(&self, secs: f64) -> usize {
        self.points.partition_point(|p| p.secs < secs)
    }
}

/// Origin of an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntervalKind {
    #[default]
    User,
    Device,
    Lap,
    Peak,
    Climb,
    Effort,
}

/// A half-open `[start, stop)` time range of a ride, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub name: String,
    pub start: f64,
    pub stop: f64,
    #[serde(default)]
    pub kind: IntervalKind,
}

/// A recorded activity: samples, extra series and intervals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideFile {
    pub id: String,

    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub sport: Sport,

    /// Nominal seconds between samples
    #[serde(default = "default_recording_interval")]
    pub recording_interval: f64,

    #[serde(default)]
    pub device: Option<String>,

    #[serde(default)]
    pub samples: Vec<RideSample>,

    #[serde(default)]
    pub xdata: Vec<XDataSeries>,

    #[serde(default)]
    pub intervals: Vec<Interval>,
}

fn default_recording_interval() -> f64 {
    1.0
}

impl RideFile {
    pub fn new(id: impl Into<String>, recording_interval: f64) -> Self {
        Self {
            id: id.into(),
            start_time: None,
            sport: Sport::default(),
            recording_interval,
            device: None,
            samples: Vec::new(),
            xdata: Vec::new(),
            intervals: Vec::new(),
        }
    }

    /// A ride carrying this ride's metadata and xdata schemas but no samples
    /// and no intervals
    pub fn empty_like(&self, suffix: &str) -> Self {
        Self {
            id: format!("{}-{}", self.id, suffix),
            start_time: self.start_time,
            sport: self.sport,
            recording_interval: self.recording_interval,
            device: self.device.clone(),
            samples: Vec::new(),
            xdata: self.xdata.iter().map(XDataSeries::empty_like).collect(),
            intervals: Vec::new(),
        }
    }

    /// Check the timeline is usable for splitting and metric computation
    pub fn validate(&self) -> Result<()> {
        if !(self.recording_interval.is_finite() && self.recording_interval > 0.0) {
            return Err(IntervalRsError::Validation(format!(
                "ride {} has invalid recording interval {}",
                self.id, self.recording_interval
            )));
        }

        check_timeline(self.samples.iter().map(|s| s.secs))
            .map_err(|(i, msg)| {
                IntervalRsError::Validation(format!("ride {} sample {}: {}", self.id, i, msg))
            })?;

        for series in &self.xdata {
            check_timeline(series.points.iter().map(|p| p.secs)).map_err(|(i, msg)| {
                IntervalRsError::Validation(format!(
                    "ride {} xdata '{}' point {}: {}",
                    self.id, series.name, i, msg
                ))
            })?;
        }

        Ok(())
    }

    /// Index of the first sample at or after `secs`, `samples.len()` when past the end
    pub fn time_index(&self, secs: f64) -> usize {
        self.samples.partition_point(|s| s.secs < secs)
    }

    /// Whether any sample carries a non-zero value for the channel
    pub fn is_data_present(&self, channel: Channel) -> bool {
        self.samples
            .iter()
            .any(|s| s.value(channel).is_some_and(|v| v != 0.0))
    }

    /// Elapsed time covered by the samples, including the last sample's period
    pub fn duration(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.secs - first.secs + self.recording_interval,
            _ => 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn xdata_series(&self, name: &str) -> Option<&XDataSeries> {
        self.xdata.iter().find(|x| x.name == name)
    }
}

fn check_timeline(secs: impl Iterator<Item = f64>) -> std::result::Result<(), (usize, String)> {
    let mut previous: Option<f64> = None;
    for (i, t) in secs.enumerate() {
        if !t.is_finite() {
            return Err((i, format!("non-finite time {}", t)));
        }
        if let Some(prev) = previous {
            if t < prev {
                return Err((i, format!("time {} goes back from {}", t, prev)));
            }
        }
        previous = Some(t);
    }
    Ok(())
}

/// Unit preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn is_metric(&self) -> bool {
        matches!(self, Units::Metric)
    }
}

impl std::str::FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "metric" | "si" => Ok(Units::Metric),
            "imperial" | "us" => Ok(Units::Imperial),
            _ => Err(format!("Invalid units: {}", s)),
        }
    }
}

/// Athlete thresholds used by threshold-relative metrics
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AthleteProfile {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Functional Threshold Power for cycling (watts)
    #[serde(default)]
    pub ftp: Option<f64>,

    /// Weight in kilograms
    #[serde(default)]
    pub weight_kg: Option<f64>,

    /// Lactate Threshold Heart Rate
    #[serde(default)]
    pub lthr: Option<f64>,

    /// Maximum Heart Rate
    #[serde(default)]
    pub max_hr: Option<f64>,
}
