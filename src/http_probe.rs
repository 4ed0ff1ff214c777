//! HTTP endpoint probe.

use std::collections::HashMap;
use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::probe::Probe;
use crate::types::Endpoint;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Response metadata captured for the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: String,
    pub elapsed_ms: u64,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpOutcome {
    Response(HttpResponse),
    /// DNS failure, refused connection, timeout or a broken body stream.
    ConnectionError {
        url: String,
        message: String,
        elapsed_ms: u64,
    },
}

impl HttpOutcome {
    pub fn url(&self) -> &str {
        match self {
            HttpOutcome::Response(r) => &r.url,
            HttpOutcome::ConnectionError { url, .. } => url,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        match self {
            HttpOutcome::Response(r) => r.elapsed_ms,
            HttpOutcome::ConnectionError { elapsed_ms, .. } => *elapsed_ms,
        }
    }
}

/// Issues one request per endpoint. Any status code is a valid response.
#[derive(Clone, Debug)]
pub struct HttpProbe {
    client: Client,
    timeout: Duration,
    host_override: Option<String>,
}

impl HttpProbe {
    pub fn new(client: Client, timeout: Duration, host_override: Option<String>) -> Self {
        let host_override = host_override
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());
        Self {
            client,
            timeout,
            host_override,
        }
    }

    /// Client shared by every probe of a surface.
    pub fn build_client(timeout: Duration, user_agent: &str) -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
    }

    fn describe(&self, e: &reqwest::Error) -> String {
        if e.is_timeout() {
            return format!("request timed out after {}s", self.timeout.as_secs());
        }
        let mut msg = e.to_string();
        let mut source = e.source();
        while let Some(inner) = source {
            msg.push_str(": ");
            msg.push_str(&inner.to_string());
            source = inner.source();
        }
        msg
    }
}

#[async_trait]
impl Probe for HttpProbe {
    type Item = Endpoint;
    type Outcome = HttpOutcome;

    async fn probe(&self, endpoint: &Endpoint) -> HttpOutcome {
        let url = resolve_target_url(&endpoint.url, self.host_override.as_deref());
        let start = Instant::now();

        let mut req = self.client.request(endpoint.method.into(), &url);
        for (name, value) in parse_headers(endpoint.headers.as_deref()) {
            req = req.header(name, value);
        }
        if endpoint.method.carries_body() {
            if let Some(body) = endpoint.body.as_deref().filter(|b| !b.trim().is_empty()) {
                req = match serde_json::from_str::<Value>(body) {
                    Ok(json) => req.json(&json),
                    Err(_) => req.body(body.to_string()),
                };
            }
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                return HttpOutcome::ConnectionError {
                    message: self.describe(&e),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    url,
                }
            }
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();

        match resp.text().await {
            Ok(body) => HttpOutcome::Response(HttpResponse {
                url,
                status,
                headers,
                body,
                elapsed_ms,
            }),
            Err(e) => HttpOutcome::ConnectionError {
                message: self.describe(&e),
                elapsed_ms: start.elapsed().as_millis() as u64,
                url,
            },
        }
    }
}

/// Prefix `https://` unless the URL already names http or https.
pub fn normalize_scheme(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}", raw.trim_start_matches('/'))
    }
}

/// Effective request URL for an endpoint, with the project's host override applied.
///
/// Scheme, port, path and query survive the substitution. Never fails: when the
/// URL cannot be parsed the host is swapped textually, and failing that the
/// normalized URL is used as is.
pub fn resolve_target_url(raw: &str, host_override: Option<&str>) -> String {
    let normalized = normalize_scheme(raw.trim());
    let Some(host) = host_override.map(str::trim).filter(|h| !h.is_empty()) else {
        return normalized;
    };

    if let Ok(mut parsed) = Url::parse(&normalized) {
        if parsed.set_host(Some(host)).is_ok() {
            return parsed.to_string();
        }
    }
    replace_authority(&normalized, host).unwrap_or(normalized)
}

fn replace_authority(url: &str, host: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let end = rest.find(&['/', '?', '#'][..]).unwrap_or(rest.len());
    let authority = &rest[..end];
    if authority.is_empty() {
        return None;
    }
    let port = authority
        .rsplit_once(':')
        .map(|(_, p)| p)
        .filter(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    let new_authority = match port {
        Some(p) if !host.contains(':') => format!("{host}:{p}"),
        _ => host.to_string(),
    };
    Some(format!("{scheme}://{new_authority}{}", &rest[end..]))
}

/// Parse header text as a JSON object. Anything unparseable is dropped.
pub fn parse_headers(raw: Option<&str>) -> Vec<(HeaderName, HeaderValue)> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Vec::new();
    };
    let map = match serde_json::from_str::<serde_json::Map<String, Value>>(raw) {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "ignoring unparseable header text");
            return Vec::new();
        }
    };

    map.into_iter()
        .filter_map(|(k, v)| {
            let value = match v {
                Value::String(s) => s,
                other => other.to_string(),
            };
            let name = HeaderName::from_bytes(k.trim().as_bytes()).ok()?;
            let value = HeaderValue::from_str(&value).ok()?;
            Some((name, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_defaults_to_https() {
        assert_eq!(normalize_scheme("example.com/a"), "https://example.com/a");
        assert_eq!(normalize_scheme("http://example.com"), "http://example.com");
        assert_eq!(normalize_scheme("HTTPS://Example.com"), "HTTPS://Example.com");
    }

    #[test]
    fn override_keeps_scheme_port_path_query() {
        let url = resolve_target_url("http://api.example.com:8080/v1/users?id=3", Some("10.0.0.7"));
        assert_eq!(url, "http://10.0.0.7:8080/v1/users?id=3");
    }

    #[test]
    fn no_override_only_normalizes() {
        assert_eq!(resolve_target_url(" example.com/x ", None), "https://example.com/x");
        assert_eq!(resolve_target_url("example.com/x", Some("  ")), "https://example.com/x");
    }

    #[test]
    fn unparseable_url_falls_back_to_text_replacement() {
        // A space in the host makes the URL parser reject it.
        let url = resolve_target_url("https://bad host:8443/path", Some("10.0.0.1"));
        assert_eq!(url, "https://10.0.0.1:8443/path");
    }

    #[test]
    fn override_with_port_replaces_whole_authority() {
        assert_eq!(
            replace_authority("https://a.example:444/p", "10.0.0.1:9000").as_deref(),
            Some("https://10.0.0.1:9000/p")
        );
        assert_eq!(replace_authority("https:///p", "h"), None);
    }

    #[test]
    fn headers_parse_json_object() {
        let h = parse_headers(Some(r#"{"Authorization": "Bearer t", "X-Retry": 3}"#));
        assert_eq!(h.len(), 2);
        assert!(h.iter().any(|(k, v)| k == "authorization" && v == "Bearer t"));
        assert!(h.iter().any(|(k, v)| k == "x-retry" && v == "3"));
    }

    #[test]
    fn bad_header_text_is_ignored() {
        assert!(parse_headers(Some("Authorization: Bearer t")).is_empty());
        assert!(parse_headers(Some("[1,2]")).is_empty());
        assert!(parse_headers(None).is_empty());
        let h = parse_headers(Some(r#"{"bad name": "x", "ok": "y"}"#));
        assert_eq!(h.len(), 1);
    }
}
