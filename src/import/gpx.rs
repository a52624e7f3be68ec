use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

use crate::error::{ImportError, Result};
use crate::import::{has_extension, ImportFormat};
use crate::models::{RideFile, RideSample};

const EARTH_RADIUS_KM: f64 = 6371.0088;

/// GPX importer for GPS tracks. Points without a timestamp are skipped.
pub struct GpxImporter;

impl GpxImporter {
    pub fn new() -> Self {
        Self
    }

    fn parse_error(reason: impl Into<String>) -> ImportError {
        ImportError::ParseError {
            format: "GPX".to_string(),
            reason: reason.into(),
        }
    }
}

impl Default for GpxImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for GpxImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "gpx")
    }

    fn import_file(&self, file_path: &Path) -> Result<RideFile> {
        let file = File::open(file_path)?;
        let gpx = gpx::read(BufReader::new(file)).map_err(|e| Self::parse_error(e.to_string()))?;

        let mut ride = RideFile::new(uuid::Uuid::new_v4().to_string(), 0.0);
        ride.device = gpx.creator.clone();

        let mut previous: Option<(f64, f64, f64)> = None;
        let mut km = 0.0;
        let mut untimed = 0usize;

        for track in &gpx.tracks {
            for segment in &track.segments {
                for pt in &segment.points {
                    let lon = pt.point().x();
                    let lat = pt.point().y();

                    let Some(time) = pt
                        .time
                        .as_ref()
                        .and_then(|t| t.format().ok())
                        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                        .map(|t| t.with_timezone(&Utc))
                    else {
                        untimed += 1;
                        continue;
                    };

                    let start = *ride.start_time.get_or_insert(time);
                    let secs = (time - start).num_milliseconds() as f64 / 1000.0;

                    let mut kph = None;
                    if let Some((prev_secs, prev_lat, prev_lon)) = previous {
                        let step = haversine_km(prev_lat, prev_lon, lat, lon);
                        km += step;
                        let dt = secs - prev_secs;
                        if dt > 0.0 {
                            kph = Some(step / dt * 3600.0);
                        }
                    }
                    previous = Some((secs, lat, lon));

                    ride.samples.push(RideSample {
                        kph,
                        alt: pt.elevation,
                        lat: Some(lat),
                        lon: Some(lon),
                        ..RideSample::new(secs, km)
                    });
                }
            }
        }

        // first sample takes the speed of the second
        if ride.samples.len() > 1 {
            ride.samples[0].kph = ride.samples[1].kph;
        }

        debug!(
            points = ride.samples.len(),
            untimed,
            distance_km = km,
            "GPX track read"
        );
        Ok(ride)
    }

    fn get_format_name(&self) -> &'static str {
        "GPX"
    }
}

/// Great-circle distance between two positions in degrees
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}
