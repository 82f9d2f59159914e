//! Results table and its renderings.
//!
//! Supports aligned plain text for terminals and JSON for CI integration.

pub mod json;
pub mod text;

use std::path::Path;

use serde::Serialize;

use crate::config::{SpeedUnit, TransferKind};
use crate::error::BenchResult;
use crate::stats::ThroughputEstimate;

/// Report format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Aligned columns for terminals.
    #[default]
    Text,
    /// Structured JSON for CI integration.
    Json,
}

/// One measured cell: (kind, size, destination memory type).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    /// 1-based position within the section.
    pub index: usize,
    pub kind: TransferKind,
    /// Human-readable size, e.g. `256.0 MB` or `4096x4096 (256.0 MB)`.
    pub size_label: String,
    /// Bytes moved per iteration.
    pub bytes: u64,
    /// Source memory type index.
    pub src_type: u32,
    /// Source memory flags, short form.
    pub src_pool: String,
    /// Destination memory type index.
    pub dst_type: u32,
    /// Destination memory flags, short form.
    pub dst_pool: String,
    /// Iterations that contributed.
    pub samples: usize,
    pub cpu: ThroughputEstimate,
    pub gpu: ThroughputEstimate,
}

/// Rows sharing a transfer kind and source tiling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSection {
    pub title: String,
    pub kind: TransferKind,
    pub rows: Vec<ResultRow>,
}

impl ResultSection {
    pub fn new(title: impl Into<String>, kind: TransferKind) -> Self {
        Self {
            title: title.into(),
            kind,
            rows: Vec::new(),
        }
    }

    /// Append a row, numbering it.
    pub fn push(&mut self, mut row: ResultRow) {
        row.index = self.rows.len() + 1;
        self.rows.push(row);
    }
}

/// All results of a matrix run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsTable {
    pub device: String,
    pub unit: SpeedUnit,
    pub sections: Vec<ResultSection>,
}

impl ResultsTable {
    pub fn new(device: impl Into<String>, unit: SpeedUnit) -> Self {
        Self {
            device: device.into(),
            unit,
            sections: Vec::new(),
        }
    }

    pub fn push_section(&mut self, section: ResultSection) {
        self.sections.push(section);
    }

    /// Every row across sections, in order.
    pub fn rows(&self) -> impl Iterator<Item = &ResultRow> {
        self.sections.iter().flat_map(|section| section.rows.iter())
    }

    pub fn row_count(&self) -> usize {
        self.sections.iter().map(|section| section.rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Render in `format`.
    pub fn render(&self, format: ReportFormat) -> BenchResult<String> {
        match format {
            ReportFormat::Text => Ok(text::generate_text(self)),
            ReportFormat::Json => json::generate_json(self),
        }
    }

    /// Render and write to `path`.
    pub fn write_to_file(&self, format: ReportFormat, path: &Path) -> std::io::Result<()> {
        let content = self
            .render(format)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
pub(crate) fn sample_table() -> ResultsTable {
    let row = |dst_pool: &str, gpu: f64, cov: f64| ResultRow {
        index: 0,
        kind: TransferKind::BufferToBuffer,
        size_label: "256.0 MB".to_string(),
        bytes: 256 * 1024 * 1024,
        src_type: 0,
        src_pool: "DL".to_string(),
        dst_type: 1,
        dst_pool: dst_pool.to_string(),
        samples: 30,
        cpu: ThroughputEstimate { median: gpu * 0.9, cov: 0.02 },
        gpu: ThroughputEstimate { median: gpu, cov },
    };
    let mut section = ResultSection::new("buffer -> buffer", TransferKind::BufferToBuffer);
    section.push(row("DL", 419.1234, 0.011));
    section.push(row("HV|HCO|HCA", 20.5, f64::INFINITY));
    let mut table = ResultsTable::new("Simulated Discrete GPU", SpeedUnit::GiB);
    table.push_section(section);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_numbered_per_section() {
        let table = sample_table();
        let indices: Vec<usize> = table.rows().map(|row| row.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(table.row_count(), 2);
        assert!(!table.is_empty());
        assert!(ResultsTable::new("x", SpeedUnit::GB).is_empty());
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        sample_table().write_to_file(ReportFormat::Json, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"rows\""));
    }
}
