//! JSON report generation for CI integration.

use serde::Serialize;

use super::ResultsTable;
use crate::error::BenchResult;

/// Report schema version.
pub const REPORT_VERSION: &str = "1";

/// Complete JSON report structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport<'a> {
    pub metadata: ReportMetadata,
    pub results: &'a ResultsTable,
}

/// Report metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Report version for schema compatibility.
    pub version: String,
    /// Timestamp of generation (RFC 3339).
    pub generated_at: String,
    /// Platform the benchmark ran on.
    pub platform: String,
}

/// Serialize `table` with metadata. Infinite CoV values become `null`.
pub fn generate_json(table: &ResultsTable) -> BenchResult<String> {
    let report = JsonReport {
        metadata: ReportMetadata {
            version: REPORT_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            platform: std::env::consts::OS.to_string(),
        },
        results: table,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::sample_table;

    #[test]
    fn test_generate_json() {
        let json = generate_json(&sample_table()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["version"], "1");
        let rows = &value["results"]["sections"][0]["rows"];
        assert_eq!(rows.as_array().unwrap().len(), 2);
        assert_eq!(rows[0]["kind"], "buf2buf");
        assert_eq!(rows[0]["dst_pool"], "DL");
        assert!(rows[1]["gpu"]["cov"].is_null());
        assert_eq!(value["results"]["unit"], "gib");
        println!("[PASS] JSON report parses back");
    }
}
