//! Export and import of the HTTP result log.

use crate::types::{Record, ScanResult};

/// Pass vs. fail-or-error counts.
pub fn tally<R: Record>(results: &[R]) -> (usize, usize) {
    let passed = results.iter().filter(|r| r.is_pass()).count();
    (passed, results.len() - passed)
}

pub fn filter_by_project<'a>(results: &'a [ScanResult], project_id: &str) -> Vec<&'a ScanResult> {
    results
        .iter()
        .filter(|r| r.project_id == project_id)
        .collect()
}

pub fn export_json(results: &[ScanResult]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(results)
}

pub fn import_json(raw: &str) -> serde_json::Result<Vec<ScanResult>> {
    serde_json::from_str(raw)
}

/// Escapes a field for CSV according to RFC 4180
fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn export_csv(results: &[ScanResult]) -> String {
    let mut out = String::from(
        "endpoint_name,url,method,status,status_code,response_time_ms,vulnerabilities,timestamp,project_id\n",
    );
    for r in results {
        let row = [
            escape_csv(&r.endpoint_name),
            escape_csv(&r.url),
            r.method.to_string(),
            r.status.to_string(),
            r.status_code.to_string(),
            r.response_time_ms.to_string(),
            escape_csv(&r.vulnerabilities.join("; ")),
            escape_csv(&r.timestamp),
            escape_csv(&r.project_id),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}
