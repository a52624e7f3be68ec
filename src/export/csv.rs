use super::ExportError;
use crate::models::{Channel, RideFile};
use crate::summary::SelectionSummary;
use std::io::Write;
use std::path::Path;

/// Write ride samples as CSV: `secs,km` then one column per channel.
/// Missing values are empty cells.
pub fn write_ride_samples<W: Write>(ride: &RideFile, writer: W) -> Result<(), ExportError> {
    let mut csv = ::csv::Writer::from_writer(writer);

    let mut header = vec!["secs", "km"];
    header.extend(Channel::ALL.iter().map(|c| c.name()));
    csv.write_record(&header)?;

    for sample in &ride.samples {
        let mut record = Vec::with_capacity(header.len());
        record.push(sample.secs.to_string());
        record.push(sample.km.to_string());
        for channel in Channel::ALL {
            record.push(sample.value(channel).map_or(String::new(), |v| v.to_string()));
        }
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

/// Export synthesized ride samples to a CSV file
pub fn export_ride_samples<P: AsRef<Path>>(ride: &RideFile, output_path: P) -> Result<(), ExportError> {
    let file = std::fs::File::create(output_path)?;
    write_ride_samples(ride, file)
}

/// One line per block row: `block,symbol,name,value,display,units`
pub fn write_summary<W: Write>(summary: &SelectionSummary, writer: W) -> Result<(), ExportError> {
    let mut csv = ::csv::Writer::from_writer(writer);
    csv.write_record(["block", "symbol", "name", "value", "display", "units"])?;

    for block in summary.blocks() {
        for row in &block.rows {
            csv.write_record([
                block.name.as_str(),
                row.symbol.as_str(),
                row.name.as_str(),
                &row.value.to_string(),
                row.display.as_str(),
                row.units.as_str(),
            ])?;
        }
    }

    csv.flush()?;
    Ok(())
}
