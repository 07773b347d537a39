//! Append-only CSV report file.

use super::{ReportSink, ScalpReport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Appends one row per closed scalp, writing the header on first use.
pub struct CsvReportWriter {
    path: PathBuf,
}

impl CsvReportWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `report`, creating the directory and header as needed.
    pub fn append(&self, report: &ScalpReport) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
        }

        let write_header = !self.path.exists();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open report file {}", self.path.display()))?;

        if write_header {
            writeln!(file, "{}", ScalpReport::csv_header())?;
        }
        writeln!(file, "{}", report.to_csv_row())?;
        Ok(())
    }
}

#[async_trait]
impl ReportSink for CsvReportWriter {
    fn name(&self) -> &str {
        "csv"
    }

    async fn record(&self, report: &ScalpReport) -> Result<()> {
        self.append(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::report::tests::sample_report;
    use rust_decimal_macros::dec;

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CsvReportWriter::new(dir.path().join("nested/report.csv"));

        writer.append(&sample_report(Some(dec!(0.1)))).unwrap();
        writer.append(&sample_report(None)).unwrap();

        let content = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], ScalpReport::csv_header());
        assert!(lines[0].starts_with("scalp-id,state,result-fact-diff"));
        assert!(lines[2].contains(",closed,,"));
    }
}
