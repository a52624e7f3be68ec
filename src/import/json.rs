use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{ImportError, Result};
use crate::import::{has_extension, ImportFormat};
use crate::models::RideFile;

/// Native JSON form of [`RideFile`], as written by `split --included ride.json`
pub struct JsonImporter;

impl JsonImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for JsonImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "json")
    }

    fn import_file(&self, file_path: &Path) -> Result<RideFile> {
        let reader = BufReader::new(File::open(file_path)?);
        let ride: RideFile = serde_json::from_reader(reader).map_err(|e| ImportError::ParseError {
            format: "JSON".to_string(),
            reason: e.to_string(),
        })?;
        Ok(ride)
    }

    fn get_format_name(&self) -> &'static str {
        "JSON"
    }
}
