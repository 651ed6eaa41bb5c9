use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use log::info;
use serde::Serialize;

use crate::error::ExportError;
use crate::simulator::PotentialAssignment;

/// Result file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("invalid output format '{}'", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Csv => f.write_str("csv"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

/// One line of the CSV export
#[derive(Debug, Serialize)]
struct Record {
    quantity: String,
    value: f64,
}

/// Flatten an assignment into `V(node)` and `I(source)` records
fn records(assignment: &PotentialAssignment) -> Vec<Record> {
    let potentials = assignment.potentials.iter().map(|p| Record {
        quantity: format!("V({})", p.node),
        value: p.potential,
    });
    let references = assignment.references.iter().map(|node| Record {
        quantity: format!("V({})", node),
        value: 0.0,
    });
    let currents = assignment.source_currents.iter().map(|s| Record {
        quantity: format!("I({})", s.name),
        value: s.current,
    });

    potentials.chain(references).chain(currents).collect()
}

/// Write a solved assignment to `path`
pub fn export(
    assignment: &PotentialAssignment,
    path: impl AsRef<Path>,
    format: OutputFormat,
) -> Result<(), ExportError> {
    let path = path.as_ref();
    let file = File::create(path)?;

    match format {
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(file);
            for record in records(assignment) {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => serde_json::to_writer_pretty(file, assignment)?,
    }

    info!("Results exported to {}: {}", format, path.display());
    Ok(())
}

/// Write a human-readable summary of an assignment
pub fn write_summary<W: Write>(out: &mut W, assignment: &PotentialAssignment) -> io::Result<()> {
    writeln!(out, "\n=== Operating Point ===")?;
    writeln!(
        out,
        "Unknown nodes: {}, reference nodes: {}",
        assignment.potentials.len(),
        assignment.references.len()
    )?;

    if !assignment.potentials.is_empty() || !assignment.references.is_empty() {
        writeln!(out, "\nNode voltages:")?;
        for p in &assignment.potentials {
            writeln!(out, "  V({}): {:.6}V", p.node, p.potential)?;
        }
        for node in &assignment.references {
            writeln!(out, "  V({}): {:.6}V (ground)", node, 0.0)?;
        }
    }

    if !assignment.source_currents.is_empty() {
        writeln!(out, "\nSource currents:")?;
        for s in &assignment.source_currents {
            writeln!(out, "  I({}): {:.6}A", s.name, s.current)?;
        }
    }

    Ok(())
}

/// Print a summary to stdout
pub fn print_summary(assignment: &PotentialAssignment) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_summary(&mut out, assignment)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;
    use crate::simulator::simulate;
    use tempfile::tempdir;

    fn solved_divider() -> PotentialAssignment {
        let mut circuit = presets::voltage_divider(5.0, 10.0, 10.0).unwrap();
        simulate(&mut circuit).unwrap()
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("csv".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_csv_export() {
        let assignment = solved_divider();
        let dir = tempdir().unwrap();
        let path = dir.path().join("op.csv");

        export(&assignment, &path, OutputFormat::Csv).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["quantity", "value"]);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        // Two unknown nodes, one reference node, one source current
        assert_eq!(rows.len(), 4);
        assert_eq!(&rows[3][0], "I(V1)");
        let mid: f64 = rows[1][1].parse().unwrap();
        assert!((mid - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_json_export_reads_back() {
        let assignment = solved_divider();
        let dir = tempdir().unwrap();
        let path = dir.path().join("op.json");

        export(&assignment, &path, OutputFormat::Json).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: PotentialAssignment = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.references, assignment.references);
        assert_eq!(parsed.potentials.len(), assignment.potentials.len());
        for (a, b) in parsed.potentials.iter().zip(&assignment.potentials) {
            assert_eq!(a.node, b.node);
            assert!((a.potential - b.potential).abs() < 1e-12);
        }
        assert_eq!(parsed.source_currents[0].name, "V1");
    }

    #[test]
    fn test_export_to_missing_directory_fails() {
        let assignment = solved_divider();
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("op.csv");
        assert!(matches!(
            export(&assignment, &path, OutputFormat::Csv),
            Err(ExportError::Io(_))
        ));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_summary_reports_write_failure() {
        let assignment = solved_divider();
        let err = write_summary(&mut ClosedPipe, &assignment).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_summary_lists_every_quantity() {
        let assignment = solved_divider();
        let mut buffer = Vec::new();
        write_summary(&mut buffer, &assignment).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("2.500000V"));
        assert!(text.contains("(ground)"));
        assert!(text.contains("I(V1): -0.250000A"));
    }
}
