//! Plain-text table rendering.

use super::{ResultSection, ResultsTable};
use crate::stats::ThroughputEstimate;

/// Pad every column to its widest cell plus two spaces.
pub fn format_table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in rows {
        let mut line = String::new();
        for (cell, width) in row.iter().zip(&widths) {
            line.push_str(&format!("{:<w$}", cell, w = width + 2));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn speed_cell(estimate: &ThroughputEstimate) -> String {
    format!("{:.3}", estimate.median)
}

fn cov_cell(estimate: &ThroughputEstimate) -> String {
    if estimate.cov.is_infinite() {
        "inf".to_string()
    } else {
        format!("{:.2}", estimate.cov_percent())
    }
}

/// `"<type index> (<flags>)"`, e.g. `1 (HV|HCO)`.
fn memory_cell(type_index: u32, pool: &str) -> String {
    format!("{} ({})", type_index, pool)
}

fn section_rows(section: &ResultSection, unit_label: &str) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "Index".to_string(),
        "Size".to_string(),
        "Src mem".to_string(),
        "Dst mem".to_string(),
        format!("CPU ({})", unit_label),
        "CPU CoV%".to_string(),
        format!("GPU ({})", unit_label),
        "GPU CoV%".to_string(),
    ]];
    rows.extend(section.rows.iter().map(|row| {
        vec![
            format!("{}:{}", row.kind.row_prefix(), row.index),
            row.size_label.trim().to_string(),
            memory_cell(row.src_type, &row.src_pool),
            memory_cell(row.dst_type, &row.dst_pool),
            speed_cell(&row.cpu),
            cov_cell(&row.cpu),
            speed_cell(&row.gpu),
            cov_cell(&row.gpu),
        ]
    }));
    rows
}

/// Render the whole table, one block per section.
pub fn generate_text(table: &ResultsTable) -> String {
    let mut out = format!("Device: {}\n", table.device);
    for section in &table.sections {
        out.push('\n');
        out.push_str(&format!("== {} ==\n", section.title));
        out.push_str(&format_table(&section_rows(section, table.unit.label())));
    }
    out
}
