use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::models::RideFile;

pub mod csv;
pub mod json;
pub mod text;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Text,
    Json,
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" => Ok(ExportFormat::Text),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl ExportFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ExportError::UnsupportedFormat(path.display().to_string()))?;
        extension.parse()
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<::csv::Error> for ExportError {
    fn from(e: ::csv::Error) -> Self {
        ExportError::SerializationError(e.to_string())
    }
}

/// Write a synthesized ride to `path`, CSV samples or native JSON by extension
pub fn export_ride<P: AsRef<Path>>(ride: &RideFile, path: P) -> Result<ExportFormat, ExportError> {
    let path = path.as_ref();
    let format = ExportFormat::from_path(path)?;
    match format {
        ExportFormat::Csv => csv::export_ride_samples(ride, path)?,
        ExportFormat::Json => json::export_json(ride, path)?,
        ExportFormat::Text => return Err(ExportError::UnsupportedFormat("text ride".to_string())),
    }
    tracing::info!(path = %path.display(), samples = ride.samples.len(), ?format, "Ride exported");
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RideSample;
    use tempfile::tempdir;

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert!("pdf".parse::<ExportFormat>().is_err());
        assert_eq!(
            ExportFormat::from_path(Path::new("out/ride.json")).unwrap(),
            ExportFormat::Json
        );
        assert!(ExportFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_export_ride_by_extension() {
        let mut ride = RideFile::new("r", 1.0);
        ride.samples.push(RideSample::new(0.0, 0.0));
        let dir = tempdir().unwrap();

        assert_eq!(export_ride(&ride, dir.path().join("a.csv")).unwrap(), ExportFormat::Csv);
        assert_eq!(export_ride(&ride, dir.path().join("a.json")).unwrap(), ExportFormat::Json);
        assert!(export_ride(&ride, dir.path().join("a.txt")).is_err());
        assert!(export_ride(&ride, dir.path().join("a.pdf")).is_err());
    }
}
