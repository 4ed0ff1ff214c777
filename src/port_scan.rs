//! TCP port scan surface.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::classify::PortClassifier;
use crate::config::Settings;
use crate::controller::ScanController;
use crate::error::{Result, ScanError};
use crate::port_probe::TcpProbe;
use crate::session::SessionBridge;
use crate::sink::ResultSink;
use crate::store::{SharedStore, PORT_RESULTS, PORT_SCANNER_STATE};
use crate::types::{PortProbeResult, RunSummary};
use crate::worklist::{build_port_worklist, PortSelection};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortScanRequest {
    pub host: String,
    #[serde(default)]
    pub ports: PortSelection,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

pub struct PortScanner {
    controller: ScanController<PortProbeResult>,
    timeout: Duration,
}

impl PortScanner {
    pub fn new(store: SharedStore, session_store: SharedStore, settings: &Settings) -> Self {
        let controller = ScanController::new(
            "port",
            ResultSink::open(store, PORT_RESULTS),
            SessionBridge::new(session_store, PORT_SCANNER_STATE),
            settings.controller_options(),
        );
        Self {
            controller,
            timeout: settings.port_timeout(),
        }
    }

    pub fn controller(&self) -> &ScanController<PortProbeResult> {
        &self.controller
    }

    pub async fn start(&self, request: PortScanRequest) -> Result<JoinHandle<RunSummary>> {
        let host = request.host.trim();
        if host.is_empty() {
            return Err(ScanError::MissingHost);
        }
        let worklist = build_port_worklist(&request.ports);
        let timeout = connect_timeout(request.timeout_ms, self.timeout);

        self.controller
            .start(worklist, TcpProbe::new(host, timeout), PortClassifier)
            .await
    }

    pub async fn results(&self) -> Vec<PortProbeResult> {
        self.controller.sink().all().await
    }
}

/// A zero or absent override falls back to the configured timeout.
fn connect_timeout(requested_ms: Option<u64>, fallback: Duration) -> Duration {
    requested_ms
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(fallback)
}
