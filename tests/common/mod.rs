//! Common test fixtures

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use endpoint_scan_rs::config::Settings;
use endpoint_scan_rs::controller::{ControllerOptions, ScanController};
use endpoint_scan_rs::error::StoreError;
use endpoint_scan_rs::probe::{Classifier, Probe};
use endpoint_scan_rs::session::SessionBridge;
use endpoint_scan_rs::sink::ResultSink;
use endpoint_scan_rs::store::{
    KvStore, MemoryStore, SharedStore, PORT_RESULTS, PORT_SCANNER_STATE,
};
use endpoint_scan_rs::types::{Endpoint, HttpMethod, PortProbeResult, PortStatus, Priority, Project};
use serde_json::Value;
use tokio::sync::{mpsc, Semaphore};

pub fn stores() -> (SharedStore, SharedStore) {
    (Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
}

pub fn fast_options() -> ControllerOptions {
    ControllerOptions {
        poll_interval: Duration::from_millis(10),
        stop_settle: Duration::from_millis(20),
    }
}

pub fn test_settings() -> Settings {
    Settings {
        http_timeout_secs: 2,
        port_timeout_ms: 500,
        pause_poll_ms: 10,
        stop_settle_ms: 20,
        ..Settings::default()
    }
}

pub fn port_controller(store: SharedStore, session: SharedStore) -> ScanController<PortProbeResult> {
    ScanController::new(
        "test",
        ResultSink::open(store, PORT_RESULTS),
        SessionBridge::new(session, PORT_SCANNER_STATE),
        fast_options(),
    )
}

pub fn project(id: &str, ip_address: Option<&str>) -> Project {
    Project {
        id: id.into(),
        name: format!("project {id}"),
        ip_address: ip_address.map(str::to_string),
        category: "web".into(),
        created_at: "2024-01-01T00:00:00Z".into(),
        updated_at: "2024-01-01T00:00:00Z".into(),
    }
}

pub fn endpoint(id: &str, project_id: &str, url: &str) -> Endpoint {
    Endpoint {
        id: id.into(),
        name: format!("endpoint {id}"),
        url: url.into(),
        method: HttpMethod::Get,
        headers: None,
        body: None,
        category: "api".into(),
        priority: Priority::Medium,
        project_id: project_id.into(),
        expected_status_code: None,
        expected_content: None,
    }
}

/// Reports every item it enters, then optionally blocks until the test hands out a permit.
pub struct GatedProbe {
    entered: mpsc::UnboundedSender<u16>,
    release: Option<Arc<Semaphore>>,
}

impl GatedProbe {
    pub fn open() -> (Self, mpsc::UnboundedReceiver<u16>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                entered: tx,
                release: None,
            },
            rx,
        )
    }

    pub fn gated() -> (Self, mpsc::UnboundedReceiver<u16>, Arc<Semaphore>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let release = Arc::new(Semaphore::new(0));
        (
            Self {
                entered: tx,
                release: Some(release.clone()),
            },
            rx,
            release,
        )
    }
}

#[async_trait]
impl Probe for GatedProbe {
    type Item = u16;
    type Outcome = u16;

    async fn probe(&self, item: &u16) -> u16 {
        let _ = self.entered.send(*item);
        if let Some(release) = &self.release {
            release.acquire().await.expect("semaphore open").forget();
        }
        *item
    }
}

/// Panics on whatever item it is handed.
pub struct PanickingProbe;

#[async_trait]
impl Probe for PanickingProbe {
    type Item = u16;
    type Outcome = u16;

    async fn probe(&self, item: &u16) -> u16 {
        panic!("probe blew up on port {item}");
    }
}

/// Reads as empty and refuses every write.
pub struct BrokenStore;

impl KvStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<Value>, StoreError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: Value) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }
}

/// Even ports are open, odd ports closed.
pub struct ParityClassifier;

impl Classifier for ParityClassifier {
    type Item = u16;
    type Outcome = u16;
    type Output = PortProbeResult;

    fn classify(&self, item: &u16, _outcome: u16) -> PortProbeResult {
        PortProbeResult {
            port: *item,
            status: if item % 2 == 0 {
                PortStatus::Open
            } else {
                PortStatus::Closed
            },
            service: "Unknown".into(),
            banner: None,
            latency_ms: 0,
        }
    }
}
