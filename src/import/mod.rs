use std::path::Path;

use tracing::{debug, info, info_span};

use crate::derived::recalculate_derived;
use crate::error::{ImportError, IntervalRsError, Result};
use crate::models::{Interval, IntervalKind, RideFile, RideSample};

pub mod csv;
pub mod fit;
pub mod gpx;
pub mod json;

/// Trait for importing ride data from different file formats
pub trait ImportFormat: Send + Sync {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Read the file into a ride. Validation and derived series are
    /// handled by [`ImportManager`].
    fn import_file(&self, file_path: &Path) -> Result<RideFile>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;
}

/// Picks an importer by file extension
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    /// Create a new import manager with all available importers
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(csv::CsvImporter::new()),
            Box::new(gpx::GpxImporter::new()),
            Box::new(fit::FitImporter::new()),
            Box::new(json::JsonImporter::new()),
        ];

        Self { importers }
    }

    /// Import a single ride, auto-detecting the format
    pub fn import_file(&self, file_path: &Path) -> Result<RideFile> {
        let span = info_span!("import", path = %file_path.display());
        let _guard = span.enter();

        if !file_path.exists() {
            return Err(ImportError::FileNotFound {
                path: file_path.to_path_buf(),
            }
            .into());
        }

        let importer = self
            .importers
            .iter()
            .find(|importer| importer.can_import(file_path))
            .ok_or_else(|| ImportError::UnsupportedFormat {
                format: file_path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("none")
                    .to_string(),
            })?;

        debug!(format = importer.get_format_name(), "Importer selected");
        let ride = importer.import_file(file_path)?;
        let ride = finish_import(ride, file_path)?;

        info!(
            format = importer.get_format_name(),
            samples = ride.samples.len(),
            xdata = ride.xdata.len(),
            intervals = ride.intervals.len(),
            "Ride imported"
        );
        Ok(ride)
    }

    /// Check if this manager can import a given file
    pub fn can_import_file(&self, file_path: &Path) -> bool {
        self.importers.iter().any(|importer| importer.can_import(file_path))
    }

    /// Names of every supported format
    pub fn format_names(&self) -> Vec<&'static str> {
        self.importers.iter().map(|i| i.get_format_name()).collect()
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn has_extension(file_path: &Path, wanted: &str) -> bool {
    file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// Reject empty rides, fill the recording interval when unknown, validate,
/// and compute the derived power series
fn finish_import(mut ride: RideFile, file_path: &Path) -> Result<RideFile> {
    if ride.samples.is_empty() {
        return Err(ImportError::NoSamples {
            path: file_path.to_path_buf(),
        }
        .into());
    }

    if !(ride.recording_interval.is_finite() && ride.recording_interval > 0.0) {
        ride.recording_interval = estimate_recording_interval(&ride.samples);
    }

    ride.validate()?;
    recalculate_derived(&mut ride);
    Ok(ride)
}

/// Median positive gap between samples, 1 s when there is none
pub fn estimate_recording_interval(samples: &[RideSample]) -> f64 {
    let mut gaps: Vec<f64> = samples
        .windows(2)
        .map(|w| w[1].secs - w[0].secs)
        .filter(|gap| gap.is_finite() && *gap > 0.0)
        .collect();

    if gaps.is_empty() {
        return 1.0;
    }
    gaps.sort_by(|a, b| a.total_cmp(b));
    gaps[gaps.len() / 2]
}

/// Load a JSON array of intervals
pub fn load_intervals(path: &Path) -> Result<Vec<Interval>> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => IntervalRsError::from(ImportError::FileNotFound {
            path: path.to_path_buf(),
        }),
        _ => IntervalRsError::Io(e),
    })?;

    let intervals: Vec<Interval> =
        serde_json::from_str(&content).map_err(|e| ImportError::ParseError {
            format: "interval JSON".to_string(),
            reason: e.to_string(),
        })?;

    for interval in &intervals {
        interval.validate()?;
    }
    debug!(path = %path.display(), count = intervals.len(), "Intervals loaded");
    Ok(intervals)
}

/// Parse a `START..STOP[=NAME]` interval argument. Times are seconds
/// (`90`, `90.5`), `m:ss` or `h:mm:ss`. `index` numbers unnamed intervals.
pub fn parse_interval_arg(arg: &str, index: usize) -> Result<Interval> {
    let invalid = |reason: &str| {
        IntervalRsError::from(ImportError::InvalidInterval {
            input: arg.to_string(),
            reason: reason.to_string(),
        })
    };

    let (range, name) = match arg.split_once('=') {
        Some((range, name)) if !name.trim().is_empty() => (range, name.trim().to_string()),
        Some(_) => return Err(invalid("empty interval name")),
        None => (arg, format!("Interval {}", index + 1)),
    };

    let (start, stop) = range
        .split_once("..")
        .ok_or_else(|| invalid("expected START..STOP"))?;

    let start = parse_time(start).ok_or_else(|| invalid("bad start time"))?;
    let stop = parse_time(stop).ok_or_else(|| invalid("bad stop time"))?;

    Interval::new(name, start, stop, IntervalKind::User)
        .map_err(|e| invalid(&e.to_string()))
}

/// Seconds from `s`, `m:ss` or `h:mm:ss`
pub fn parse_time(input: &str) -> Option<f64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let mut secs = 0.0;
    let parts: Vec<&str> = input.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    for (i, part) in parts.iter().enumerate() {
        let value: f64 = part.parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        // minutes and seconds fields after the first must be below 60
        if i > 0 && value >= 60.0 {
            return None;
        }
        secs = secs * 60.0 + value;
    }

    Some(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_time_forms() {
        assert_eq!(parse_time("90"), Some(90.0));
        assert_eq!(parse_time("90.5"), Some(90.5));
        assert_eq!(parse_time("1:30"), Some(90.0));
        assert_eq!(parse_time("1:02:03"), Some(3723.0));
        assert_eq!(parse_time("1:75"), None);
        assert_eq!(parse_time("-5"), None);
        assert_eq!(parse_time("a:b"), None);
        assert_eq!(parse_time("1:2:3:4"), None);
    }

    #[test]
    fn test_parse_interval_arg() {
        let interval = parse_interval_arg("0:10:00..0:20:00=tempo", 0).unwrap();
        assert_eq!(interval.name, "tempo");
        assert_eq!(interval.start, 600.0);
        assert_eq!(interval.stop, 1200.0);
        assert_eq!(interval.kind, IntervalKind::User);

        let unnamed = parse_interval_arg("60..120", 2).unwrap();
        assert_eq!(unnamed.name, "Interval 3");
        assert_eq!(unnamed.duration(), 60.0);
    }

    #[test]
    fn test_parse_interval_arg_errors() {
        for bad in ["60", "120..60", "x..60", "60..=", "60..90="] {
            let err = parse_interval_arg(bad, 0).unwrap_err();
            assert!(
                matches!(err, IntervalRsError::Import(ImportError::InvalidInterval { .. })),
                "{} gave {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_load_intervals() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name":"a","start":0,"stop":60}},{{"name":"lap 1","start":60,"stop":300,"kind":"lap"}}]"#
        )
        .unwrap();

        let intervals = load_intervals(file.path()).unwrap();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[1].kind, IntervalKind::Lap);
    }

    #[test]
    fn test_load_intervals_rejects_reversed() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"[{{"name":"bad","start":60,"stop":0}}]"#).unwrap();
        assert!(load_intervals(file.path()).is_err());
        assert!(load_intervals(Path::new("/no/such/intervals.json")).is_err());
    }

    #[test]
    fn test_estimate_recording_interval() {
        let samples: Vec<RideSample> = [0.0, 2.0, 4.0, 4.0, 10.0, 12.0]
            .iter()
            .map(|&t| RideSample::new(t, 0.0))
            .collect();
        assert_eq!(estimate_recording_interval(&samples), 2.0);
        assert_eq!(estimate_recording_interval(&samples[..1]), 1.0);
    }

    #[test]
    fn test_manager_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".xyz").tempfile().unwrap();
        let err = ImportManager::new().import_file(file.path()).unwrap_err();
        assert!(matches!(
            err,
            IntervalRsError::Import(ImportError::UnsupportedFormat { .. })
        ));
        assert!(!ImportManager::new().can_import_file(file.path()));
    }
}
