use std::fmt;

use ::time::{format_description::well_known, OffsetDateTime};
use serde::{Deserialize, Serialize};

/// A named group of endpoints with an optional host/IP override.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Methods that conventionally carry a request body.
    pub fn carries_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Advisory only; the engine never looks at it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// One HTTP endpoint under test.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    /// Raw header text, expected to be a JSON object.
    #[serde(default)]
    pub headers: Option<String>,
    /// Raw body text, sent as JSON when it parses as JSON.
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: Priority,
    pub project_id: String,
    #[serde(default)]
    pub expected_status_code: Option<u16>,
    #[serde(default)]
    pub expected_content: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    Error,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "pass"),
            Verdict::Fail => write!(f, "fail"),
            Verdict::Error => write!(f, "error"),
        }
    }
}

/// Outcome of probing one endpoint. Immutable once created.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub id: String,
    pub endpoint_name: String,
    pub url: String,
    pub method: HttpMethod,
    pub status: Verdict,
    pub vulnerabilities: Vec<String>,
    pub response_time_ms: u64,
    /// 0 when no response was received.
    pub status_code: u16,
    pub timestamp: String,
    pub project_id: String,
    /// First 500 characters of the response body.
    #[serde(default)]
    pub response_sample: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    Open,
    Closed,
    Filtered,
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortStatus::Open => write!(f, "open"),
            PortStatus::Closed => write!(f, "closed"),
            PortStatus::Filtered => write!(f, "filtered"),
        }
    }
}

/// One port probe result entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortProbeResult {
    pub port: u16,
    pub status: PortStatus,
    pub service: String,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub latency_ms: u64,
}

/// Lifecycle of a scan surface. `Stopped` always decays to `Idle`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

impl ScanState {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            ScanState::Idle => 0,
            ScanState::Running => 1,
            ScanState::Paused => 2,
            ScanState::Stopped => 3,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => ScanState::Running,
            2 => ScanState::Paused,
            3 => ScanState::Stopped,
            _ => ScanState::Idle,
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanState::Idle => write!(f, "idle"),
            ScanState::Running => write!(f, "running"),
            ScanState::Paused => write!(f, "paused"),
            ScanState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Persisted view of a scan surface, restored on (re)initialization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot<R> {
    pub state: ScanState,
    pub cursor_index: usize,
    #[serde(default)]
    pub total: usize,
    pub progress: u8,
    pub results: Vec<R>,
}

impl<R> Default for SessionSnapshot<R> {
    fn default() -> Self {
        Self {
            state: ScanState::Idle,
            cursor_index: 0,
            total: 0,
            progress: 0,
            results: Vec::new(),
        }
    }
}

/// Read-only progress/state view for rendering.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    pub state: ScanState,
    pub progress: u8,
    pub cursor_index: usize,
    pub total: usize,
    pub current_item_id: Option<String>,
}

/// Counts reported when a run ends.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub passed: usize,
    pub failed: usize,
    pub stopped: bool,
}

/// A result record the controller can tally and file under a project.
pub trait Record {
    fn is_pass(&self) -> bool;

    fn project_id(&self) -> Option<&str> {
        None
    }
}

impl Record for ScanResult {
    fn is_pass(&self) -> bool {
        self.status == Verdict::Pass
    }

    fn project_id(&self) -> Option<&str> {
        Some(&self.project_id)
    }
}

impl Record for PortProbeResult {
    fn is_pass(&self) -> bool {
        self.status == PortStatus::Open
    }
}

pub(crate) fn now_iso_like() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
