use chrono::{DateTime, Utc};
use fitparser::profile::field_types::MesgNum;
use fitparser::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, trace};

use crate::error::{ImportError, Result};
use crate::import::{has_extension, ImportFormat};
use crate::models::{Interval, IntervalKind, RideFile, RideSample};

/// FIT importer: `record` messages become samples, `lap` messages become
/// device laps
pub struct FitImporter;

impl FitImporter {
    pub fn new() -> Self {
        Self
    }

    fn parse_error(reason: impl Into<String>) -> ImportError {
        ImportError::ParseError {
            format: "FIT".to_string(),
            reason: reason.into(),
        }
    }
}

impl Default for FitImporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Fields read from one `record` message
#[derive(Debug, Default, Clone, PartialEq)]
struct RecordFields {
    timestamp: Option<DateTime<Utc>>,
    distance_m: Option<f64>,
    speed_ms: Option<f64>,
    power: Option<f64>,
    heart_rate: Option<f64>,
    cadence: Option<f64>,
    altitude: Option<f64>,
    lat: Option<f64>,
    lon: Option<f64>,
    temperature: Option<f64>,
}

impl RecordFields {
    fn apply(&mut self, name: &str, value: &Value) {
        match name {
            "timestamp" => {
                if let Value::Timestamp(t) = value {
                    self.timestamp = Some(t.with_timezone(&Utc));
                }
            }
            "position_lat" => self.lat = extract_fit_i32(value).map(semicircles_to_degrees),
            "position_long" => self.lon = extract_fit_i32(value).map(semicircles_to_degrees),
            "distance" => self.distance_m = extract_fit_f64(value),
            // enhanced fields win over the 16 bit ones
            "enhanced_speed" => self.speed_ms = extract_fit_f64(value),
            "speed" => {
                if self.speed_ms.is_none() {
                    self.speed_ms = extract_fit_f64(value);
                }
            }
            "enhanced_altitude" => self.altitude = extract_fit_f64(value),
            "altitude" => {
                if self.altitude.is_none() {
                    self.altitude = extract_fit_f64(value);
                }
            }
            "power" => self.power = extract_fit_f64(value),
            "heart_rate" => self.heart_rate = extract_fit_f64(value),
            "cadence" => self.cadence = extract_fit_f64(value),
            "temperature" => self.temperature = extract_fit_f64(value),
            _ => {}
        }
    }

    fn into_sample(self, start: DateTime<Utc>, last_km: f64) -> Option<RideSample> {
        let timestamp = self.timestamp?;
        let secs = (timestamp - start).num_milliseconds() as f64 / 1000.0;
        let km = self.distance_m.map(|m| m / 1000.0).unwrap_or(last_km);

        Some(RideSample {
            watts: self.power,
            hr: self.heart_rate,
            cad: self.cadence,
            kph: self.speed_ms.map(|ms| ms * 3.6),
            alt: self.altitude,
            lat: self.lat,
            lon: self.lon,
            temp: self.temperature,
            ..RideSample::new(secs, km)
        })
    }
}

/// Lap bounds as absolute times
#[derive(Debug, Default, Clone, PartialEq)]
struct LapFields {
    start_time: Option<DateTime<Utc>>,
    elapsed_secs: Option<f64>,
}

impl LapFields {
    fn apply(&mut self, name: &str, value: &Value) {
        match name {
            "start_time" => {
                if let Value::Timestamp(t) = value {
                    self.start_time = Some(t.with_timezone(&Utc));
                }
            }
            "total_elapsed_time" => self.elapsed_secs = extract_fit_f64(value),
            _ => {}
        }
    }

    fn into_interval(self, start: DateTime<Utc>, number: usize) -> Option<Interval> {
        let lap_start = self.start_time?;
        let elapsed = self.elapsed_secs?;
        let from = (lap_start - start).num_milliseconds() as f64 / 1000.0;
        Interval::new(format!("Lap {}", number), from, from + elapsed, IntervalKind::Lap).ok()
    }
}

impl ImportFormat for FitImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "fit")
    }

    fn import_file(&self, file_path: &Path) -> Result<RideFile> {
        let mut reader = BufReader::new(File::open(file_path)?);
        let messages =
            fitparser::from_reader(&mut reader).map_err(|e| Self::parse_error(e.to_string()))?;

        let mut records = Vec::new();
        let mut laps = Vec::new();
        let mut device = None;

        for message in &messages {
            match message.kind() {
                MesgNum::Record => {
                    let mut fields = RecordFields::default();
                    for field in message.fields() {
                        fields.apply(field.name(), field.value());
                    }
                    records.push(fields);
                }
                MesgNum::Lap => {
                    let mut fields = LapFields::default();
                    for field in message.fields() {
                        fields.apply(field.name(), field.value());
                    }
                    laps.push(fields);
                }
                MesgNum::FileId => {
                    device = message
                        .fields()
                        .iter()
                        .find(|f| f.name() == "manufacturer")
                        .and_then(|f| match f.value() {
                            Value::String(s) => Some(s.clone()),
                            _ => None,
                        });
                }
                _ => {}
            }
        }

        let mut ride = RideFile::new(uuid::Uuid::new_v4().to_string(), 0.0);
        ride.device = device;

        let Some(start) = records.iter().find_map(|r| r.timestamp) else {
            return Ok(ride);
        };
        ride.start_time = Some(start);

        let mut last_km = 0.0;
        let mut untimed = 0usize;
        for fields in records {
            match fields.into_sample(start, last_km) {
                Some(sample) => {
                    last_km = sample.km;
                    ride.samples.push(sample);
                }
                None => untimed += 1,
            }
        }

        ride.intervals = laps
            .into_iter()
            .enumerate()
            .filter_map(|(i, lap)| lap.into_interval(start, i + 1))
            .collect();

        trace!(messages = messages.len(), "FIT messages decoded");
        debug!(
            samples = ride.samples.len(),
            laps = ride.intervals.len(),
            untimed,
            "FIT activity read"
        );
        Ok(ride)
    }

    fn get_format_name(&self) -> &'static str {
        "FIT"
    }
}

/// FIT stores positions as semicircles where 2^31 semicircles = 180 degrees
fn semicircles_to_degrees(semicircles: i32) -> f64 {
    (semicircles as f64) * (180.0 / 2_147_483_648.0)
}

fn extract_fit_i32(value: &Value) -> Option<i32> {
    match value {
        Value::SInt8(v) => Some(*v as i32),
        Value::UInt8(v) => Some(*v as i32),
        Value::SInt16(v) => Some(*v as i32),
        Value::UInt16(v) => Some(*v as i32),
        Value::SInt32(v) => Some(*v),
        Value::UInt32(v) => i32::try_from(*v).ok(),
        _ => None,
    }
}

fn extract_fit_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float32(v) => Some(*v as f64),
        Value::Float64(v) => Some(*v),
        Value::SInt8(v) => Some(*v as f64),
        Value::UInt8(v) => Some(*v as f64),
        Value::SInt16(v) => Some(*v as f64),
        Value::UInt16(v) => Some(*v as f64),
        Value::SInt32(v) => Some(*v as f64),
        Value::UInt32(v) => Some(*v as f64),
        _ => None,
    }
}
