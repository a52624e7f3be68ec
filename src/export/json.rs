use super::ExportError;
use std::io::Write;
use std::path::Path;

/// Write any serializable value as pretty JSON
pub fn write_json<T, W>(data: &T, writer: &mut W) -> Result<(), ExportError>
where
    T: serde::Serialize,
    W: Write,
{
    serde_json::to_writer_pretty(&mut *writer, data)
        .map_err(|e| ExportError::SerializationError(e.to_string()))?;
    writeln!(writer)?;
    Ok(())
}

/// Export any serializable data structure to JSON
pub fn export_json<T, P>(data: &T, output_path: P) -> Result<(), ExportError>
where
    T: serde::Serialize,
    P: AsRef<Path>,
{
    let mut file = std::fs::File::create(output_path)?;
    write_json(data, &mut file)
}
