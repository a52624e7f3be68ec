use chrono::{DateTime, NaiveDateTime, Utc};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{ImportError, Result};
use crate::import::{has_extension, ImportFormat};
use crate::models::{RideFile, RideSample};

/// Standard column a CSV header maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Time,
    Km,
    DistanceMeters,
    Watts,
    Hr,
    Cad,
    Kph,
    Alt,
    Lat,
    Lon,
    Temp,
    Nm,
    Slope,
    Headwind,
}

/// CSV importer with flexible column mapping
pub struct CsvImporter {
    column_mapping: HashMap<String, Column>,
}

impl CsvImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        Self::add_mapping(
            &mut column_mapping,
            Column::Time,
            &["secs", "seconds", "time", "timestamp", "elapsed", "elapsed_time"],
        );
        Self::add_mapping(&mut column_mapping, Column::Km, &["km", "distance_km"]);
        Self::add_mapping(
            &mut column_mapping,
            Column::DistanceMeters,
            &["distance", "dist", "distance_m", "meters"],
        );
        Self::add_mapping(&mut column_mapping, Column::Watts, &["watts", "power", "power_watts"]);
        Self::add_mapping(&mut column_mapping, Column::Hr, &["hr", "heart_rate", "heartrate", "bpm"]);
        Self::add_mapping(&mut column_mapping, Column::Cad, &["cad", "cadence", "rpm"]);
        Self::add_mapping(&mut column_mapping, Column::Kph, &["kph", "speed", "speed_kmh"]);
        Self::add_mapping(
            &mut column_mapping,
            Column::Alt,
            &["alt", "altitude", "elevation", "elev"],
        );
        Self::add_mapping(&mut column_mapping, Column::Lat, &["lat", "latitude", "position_lat"]);
        Self::add_mapping(
            &mut column_mapping,
            Column::Lon,
            &["lon", "lng", "longitude", "position_long"],
        );
        Self::add_mapping(&mut column_mapping, Column::Temp, &["temp", "temperature"]);
        Self::add_mapping(&mut column_mapping, Column::Nm, &["nm", "torque"]);
        Self::add_mapping(&mut column_mapping, Column::Slope, &["slope", "grade"]);
        Self::add_mapping(&mut column_mapping, Column::Headwind, &["headwind"]);

        Self { column_mapping }
    }

    fn add_mapping(mapping: &mut HashMap<String, Column>, column: Column, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), column);
        }
    }

    fn parse_datetime(date_str: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
            return Some(dt.with_timezone(&Utc));
        }

        let formats = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S%.f",
        ];

        formats.iter().find_map(|format| {
            NaiveDateTime::parse_from_str(date_str, format)
                .ok()
                .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        })
    }

    fn normalize_column_name(&self, name: &str) -> Option<Column> {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");
        self.column_mapping.get(&normalized).copied()
    }

    fn parse_error(reason: impl Into<String>) -> ImportError {
        ImportError::ParseError {
            format: "CSV".to_string(),
            reason: reason.into(),
        }
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "csv")
    }

    fn import_file(&self, file_path: &Path) -> Result<RideFile> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(file_path)
            .map_err(|e| Self::parse_error(e.to_string()))?;

        let headers = reader
            .headers()
            .map_err(|e| Self::parse_error(e.to_string()))?
            .clone();

        let header_mapping: Vec<Option<Column>> = headers
            .iter()
            .map(|header| self.normalize_column_name(header))
            .collect();

        let has = |column: Column| header_mapping.contains(&Some(column));
        let has_time = has(Column::Time);
        let has_distance = has(Column::Km) || has(Column::DistanceMeters);

        debug!(
            columns = headers.len(),
            mapped = header_mapping.iter().flatten().count(),
            has_time,
            has_distance,
            "CSV header mapped"
        );

        let mut ride = RideFile::new(uuid::Uuid::new_v4().to_string(), 0.0);
        let mut skipped = 0usize;

        for (row, result) in reader.records().enumerate() {
            let record = result.map_err(|e| Self::parse_error(format!("row {}: {}", row + 1, e)))?;
            let mut sample = RideSample::new(row as f64, 0.0);
            let mut time_ok = !has_time;

            for (i, value) in record.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let Some(column) = header_mapping.get(i).copied().flatten() else {
                    continue;
                };

                if column == Column::Time {
                    if let Ok(secs) = value.parse::<f64>() {
                        sample.secs = secs;
                        time_ok = true;
                    } else if let Some(dt) = Self::parse_datetime(value) {
                        let start = *ride.start_time.get_or_insert(dt);
                        sample.secs = (dt - start).num_milliseconds() as f64 / 1000.0;
                        time_ok = true;
                    }
                    continue;
                }

                let Ok(number) = value.parse::<f64>() else {
                    continue;
                };
                match column {
                    Column::Km => sample.km = number,
                    Column::DistanceMeters => sample.km = number / 1000.0,
                    Column::Watts => sample.watts = Some(number),
                    Column::Hr => sample.hr = Some(number),
                    Column::Cad => sample.cad = Some(number),
                    Column::Kph => sample.kph = Some(number),
                    Column::Alt => sample.alt = Some(number),
                    Column::Lat => sample.lat = Some(number),
                    Column::Lon => sample.lon = Some(number),
                    Column::Temp => sample.temp = Some(number),
                    Column::Nm => sample.nm = Some(number),
                    Column::Slope => sample.slope = Some(number),
                    Column::Headwind => sample.headwind = Some(number),
                    Column::Time => {}
                }
            }

            if !time_ok {
                skipped += 1;
                continue;
            }
            ride.samples.push(sample);
        }

        if skipped > 0 {
            warn!(skipped, "CSV rows without a readable time were skipped");
        }

        if !has_distance {
            integrate_distance(&mut ride.samples);
        }

        Ok(ride)
    }

    fn get_format_name(&self) -> &'static str {
        "CSV"
    }
}

/// Fill `km` from speed when the file has no distance column
fn integrate_distance(samples: &mut [RideSample]) {
    let mut km = 0.0;
    let mut previous_secs: Option<f64> = None;

    for sample in samples.iter_mut() {
        if let Some(prev) = previous_secs {
            let dt = (sample.secs - prev).max(0.0);
            km += sample.kph.unwrap_or(0.0) * dt / 3600.0;
        }
        sample.km = km;
        previous_secs = Some(sample.secs);
    }
}
