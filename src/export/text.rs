use super::ExportError;
use crate::summary::{SelectionSummary, SummaryBlock};
use std::io::Write;
use std::path::Path;

/// Write the selection report: each block's name, then its metric rows with
/// names right aligned, values and units
pub fn write_summary_report<W: Write>(
    summary: &SelectionSummary,
    writer: &mut W,
) -> Result<(), ExportError> {
    if let Some(placeholder) = summary.placeholder() {
        writeln!(writer, "{}", placeholder)?;
        return Ok(());
    }

    for (i, block) in summary.blocks().enumerate() {
        if i > 0 {
            writeln!(writer)?;
        }
        write_block(block, writer)?;
    }
    Ok(())
}

fn write_block<W: Write>(block: &SummaryBlock, writer: &mut W) -> Result<(), ExportError> {
    writeln!(writer, "{}", block.name)?;
    writeln!(writer, "{}", "-".repeat(block.name.chars().count()))?;

    let name_width = block.rows.iter().map(|r| r.name.chars().count()).max().unwrap_or(0);
    let value_width = block
        .rows
        .iter()
        .map(|r| r.display.chars().count())
        .max()
        .unwrap_or(0);

    for row in &block.rows {
        let line = format!(
            "{:>nw$}  {:>vw$} {}",
            row.name,
            row.display,
            row.units,
            nw = name_width,
            vw = value_width
        );
        writeln!(writer, "{}", line.trim_end())?;
    }
    Ok(())
}

/// Export the selection report to a text file
pub fn export_summary_report<P: AsRef<Path>>(
    summary: &SelectionSummary,
    output_path: P,
) -> Result<(), ExportError> {
    let mut file = std::fs::File::create(output_path)?;
    write_summary_report(summary, &mut file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{SummaryRow, EMPTY_SELECTION_PLACEHOLDER};
    use tempfile::NamedTempFile;

    fn row(name: &str, display: &str, units: &str) -> SummaryRow {
        SummaryRow {
            symbol: name.to_lowercase().replace(' ', "_"),
            name: name.to_string(),
            value: 0.0,
            display: display.to_string(),
            units: units.to_string(),
        }
    }

    #[test]
    fn test_empty_summary_prints_placeholder() {
        let mut out = Vec::new();
        write_summary_report(&SelectionSummary::empty(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), EMPTY_SELECTION_PLACEHOLDER);
    }

    #[test]
    fn test_rows_are_aligned() {
        let summary = SelectionSummary {
            combined: Some(SummaryBlock {
                name: "2 selected intervals".to_string(),
                rows: vec![row("Duration", "0:20:00", ""), row("Average Power", "245", "watts")],
            }),
            intervals: vec![SummaryBlock {
                name: "climb".to_string(),
                rows: vec![row("Distance", "4.20", "km")],
            }],
            excluding: None,
        };

        let mut out = Vec::new();
        write_summary_report(&summary, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "2 selected intervals");
        assert_eq!(lines[2], "     Duration  0:20:00");
        assert_eq!(lines[3], "Average Power      245 watts");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "climb");
        assert_eq!(lines[7], "Distance  4.20 km");
    }

    #[test]
    fn test_export_to_file() {
        let temp_file = NamedTempFile::new().unwrap();
        export_summary_report(&SelectionSummary::empty(), temp_file.path()).unwrap();
        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("select an interval"));
    }
}
