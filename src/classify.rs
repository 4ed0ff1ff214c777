//! Heuristic classification of probe outcomes.
//!
//! Status and content checks decide the verdict. Header and disclosure checks
//! only add findings, so a `pass` may still carry findings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::http_probe::HttpOutcome;
use crate::port_probe::PortOutcome;
use crate::ports;
use crate::probe::Classifier;
use crate::types::{now_iso_like, Endpoint, PortProbeResult, PortStatus, ScanResult, Verdict};

const RESPONSE_SAMPLE_CHARS: usize = 500;
const DB_ERROR_SIGNATURES: &[&str] = &["mysql_", "ORA-", "SQLException"];

/// Per-run switches for the HTTP checks.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TestConfig {
    /// Compare against `expectedStatusCode`, defaulting to 200.
    pub check_status: bool,
    pub check_content: bool,
    /// Falls back to the endpoint's own `expectedContent` when empty.
    pub expected_content: String,
    pub check_headers: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            check_status: true,
            check_content: false,
            expected_content: String::new(),
            check_headers: true,
        }
    }
}

/// Verdict plus findings for one HTTP outcome.
pub fn classify_http(
    endpoint: &Endpoint,
    outcome: &HttpOutcome,
    config: &TestConfig,
) -> (Verdict, Vec<String>) {
    let resp = match outcome {
        HttpOutcome::ConnectionError { message, .. } => {
            return (Verdict::Error, vec![format!("Connection error: {message}")]);
        }
        HttpOutcome::Response(r) => r,
    };

    let mut verdict = Verdict::Pass;
    let mut findings = Vec::new();

    let expected_status = endpoint
        .expected_status_code
        .or(config.check_status.then_some(200));
    if let Some(expected) = expected_status {
        if resp.status != expected {
            verdict = Verdict::Fail;
            findings.push(format!("Expected status {expected}, got {}", resp.status));
        }
    }

    if config.check_content {
        let expected = if config.expected_content.is_empty() {
            endpoint.expected_content.as_deref().unwrap_or("")
        } else {
            config.expected_content.as_str()
        };
        if !expected.is_empty() && !resp.body.contains(expected) {
            verdict = Verdict::Fail;
            findings.push(format!("Expected content not found: \"{expected}\""));
        }
    }

    if config.check_headers {
        if resp.header("x-content-type-options").is_none() {
            findings.push("Missing X-Content-Type-Options header".to_string());
        }
        if resp.header("x-frame-options").is_none() {
            findings.push("Missing X-Frame-Options header (clickjacking risk)".to_string());
        }
        if resp.header("x-xss-protection").is_none() {
            findings.push("Missing X-XSS-Protection header".to_string());
        }
        if is_https(&endpoint.url) && resp.header("strict-transport-security").is_none() {
            findings.push("Missing Strict-Transport-Security header".to_string());
        }
    }

    if resp.status >= 500 {
        findings.push(format!(
            "Server error {} (potential information disclosure)",
            resp.status
        ));
    }

    if let Some(sig) = DB_ERROR_SIGNATURES.iter().find(|s| resp.body.contains(*s)) {
        findings.push(format!("Database error signature in response: {sig}"));
    }

    (verdict, findings)
}

/// Scheme check on the endpoint's own URL; scheme-less URLs count as https.
fn is_https(url: &str) -> bool {
    !url.trim().to_ascii_lowercase().starts_with("http://")
}

fn response_sample(outcome: &HttpOutcome) -> String {
    match outcome {
        HttpOutcome::Response(r) => r.body.chars().take(RESPONSE_SAMPLE_CHARS).collect(),
        HttpOutcome::ConnectionError { .. } => String::new(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpClassifier {
    config: TestConfig,
}

impl HttpClassifier {
    pub fn new(config: TestConfig) -> Self {
        Self { config }
    }
}

impl Classifier for HttpClassifier {
    type Item = Endpoint;
    type Outcome = HttpOutcome;
    type Output = ScanResult;

    fn classify(&self, endpoint: &Endpoint, outcome: HttpOutcome) -> ScanResult {
        let (status, vulnerabilities) = classify_http(endpoint, &outcome, &self.config);
        let status_code = match &outcome {
            HttpOutcome::Response(r) => r.status,
            HttpOutcome::ConnectionError { .. } => 0,
        };
        ScanResult {
            id: Uuid::new_v4().to_string(),
            endpoint_name: endpoint.name.clone(),
            url: outcome.url().to_string(),
            method: endpoint.method,
            status,
            vulnerabilities,
            response_time_ms: outcome.elapsed_ms(),
            status_code,
            timestamp: now_iso_like(),
            project_id: endpoint.project_id.clone(),
            response_sample: response_sample(&outcome),
        }
    }
}

pub fn classify_port(outcome: &PortOutcome) -> PortStatus {
    match outcome {
        PortOutcome::Connected { .. } => PortStatus::Open,
        PortOutcome::Refused { .. } | PortOutcome::Failed { .. } => PortStatus::Closed,
        PortOutcome::TimedOut { .. } => PortStatus::Filtered,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PortClassifier;

impl Classifier for PortClassifier {
    type Item = u16;
    type Outcome = PortOutcome;
    type Output = PortProbeResult;

    fn classify(&self, port: &u16, outcome: PortOutcome) -> PortProbeResult {
        let status = classify_port(&outcome);
        let latency_ms = outcome.elapsed_ms();
        let banner = match outcome {
            PortOutcome::Connected { banner, .. } => banner,
            _ => None,
        };
        PortProbeResult {
            port: *port,
            status,
            service: ports::service_name(*port).to_string(),
            banner,
            latency_ms,
        }
    }
}
