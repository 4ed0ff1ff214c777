use endpoint_scan_rs::export::{export_csv, export_json, filter_by_project, import_json, tally};
use endpoint_scan_rs::types::{HttpMethod, ScanResult, Verdict};

fn result(id: &str, project: &str, status: Verdict) -> ScanResult {
    ScanResult {
        id: id.into(),
        endpoint_name: format!("endpoint, {id}"),
        url: format!("https://example.com/{id}?a=1"),
        method: HttpMethod::Patch,
        status,
        vulnerabilities: vec!["Missing X-Frame-Options header (clickjacking risk)".into()],
        response_time_ms: 42,
        status_code: 200,
        timestamp: "2024-05-01T12:00:00Z".into(),
        project_id: project.into(),
        response_sample: "ok".into(),
    }
}

#[test]
fn json_round_trip_preserves_identity_fields() {
    let log = vec![
        result("1", "p1", Verdict::Pass),
        result("2", "p2", Verdict::Error),
    ];
    let raw = export_json(&log).unwrap();
    assert!(raw.contains("\"endpointName\""));

    let back = import_json(&raw).unwrap();
    assert_eq!(back.len(), 2);
    for (a, b) in log.iter().zip(&back) {
        assert_eq!(a.url, b.url);
        assert_eq!(a.method, b.method);
        assert_eq!(a.status, b.status);
        assert_eq!(a.timestamp, b.timestamp);
    }
}

#[test]
fn csv_has_header_and_escaped_rows() {
    let csv = export_csv(&[result("1", "p1", Verdict::Fail)]);
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("endpoint_name,url,method,status"));
    let row = lines.next().unwrap();
    assert!(row.starts_with("\"endpoint, 1\",https://example.com/1?a=1,PATCH,fail,200,42,"));
    assert!(lines.next().is_none());
}

#[test]
fn filter_and_tally() {
    let log = vec![
        result("1", "p1", Verdict::Pass),
        result("2", "p1", Verdict::Fail),
        result("3", "p2", Verdict::Error),
    ];
    assert_eq!(filter_by_project(&log, "p1").len(), 2);
    assert_eq!(tally(&log), (1, 2));
}
