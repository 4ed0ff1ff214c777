//! HTTP endpoint scan surface.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::info;

use crate::classify::{HttpClassifier, TestConfig};
use crate::config::Settings;
use crate::controller::ScanController;
use crate::error::{Result, ScanError, StoreError};
use crate::http_probe::HttpProbe;
use crate::session::SessionBridge;
use crate::sink::ResultSink;
use crate::store::{
    KvStoreExt, SharedStore, ENDPOINTS, PROJECTS, SCANNER_STATE, SELECTED_PROJECT, TEST_RESULTS,
};
use crate::types::{Endpoint, Project, RunSummary, ScanResult};
use crate::worklist::build_http_worklist;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpScanRequest {
    /// Falls back to the session's selected project.
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub test: TestConfig,
}

pub struct HttpScanner {
    controller: ScanController<ScanResult>,
    store: SharedStore,
    session_store: SharedStore,
    client: Client,
    timeout: Duration,
}

impl HttpScanner {
    pub fn new(store: SharedStore, session_store: SharedStore, settings: &Settings) -> Result<Self> {
        let timeout = settings.http_timeout();
        let client = HttpProbe::build_client(timeout, &settings.user_agent)?;
        let controller = ScanController::new(
            "http",
            ResultSink::open(store.clone(), TEST_RESULTS),
            SessionBridge::new(session_store.clone(), SCANNER_STATE),
            settings.controller_options(),
        );
        Ok(Self {
            controller,
            store,
            session_store,
            client,
            timeout,
        })
    }

    pub fn controller(&self) -> &ScanController<ScanResult> {
        &self.controller
    }

    pub fn selected_project(&self) -> Option<String> {
        self.session_store.get_or(SELECTED_PROJECT, None)
    }

    pub fn select_project(&self, project_id: &str) -> std::result::Result<(), StoreError> {
        self.session_store.put(SELECTED_PROJECT, project_id)
    }

    pub async fn start(&self, request: HttpScanRequest) -> Result<JoinHandle<RunSummary>> {
        let project_id = request
            .project_id
            .filter(|id| !id.trim().is_empty())
            .or_else(|| self.selected_project())
            .ok_or(ScanError::NoProjectSelected)?;

        let endpoints: Vec<Endpoint> = self.store.get_or(ENDPOINTS, Vec::new());
        let worklist = build_http_worklist(&endpoints, &project_id);
        if worklist.is_empty() {
            info!(project = %project_id, "no endpoints to scan");
            return Err(ScanError::EmptyWorklist);
        }

        let projects: Vec<Project> = self.store.get_or(PROJECTS, Vec::new());
        let host_override = projects
            .into_iter()
            .find(|p| p.id == project_id)
            .and_then(|p| p.ip_address);

        let probe = HttpProbe::new(self.client.clone(), self.timeout, host_override);
        self.controller
            .start(worklist, probe, HttpClassifier::new(request.test))
            .await
    }

    /// Full result log, optionally narrowed to one project.
    pub async fn results(&self, project_id: Option<&str>) -> Vec<ScanResult> {
        match project_id {
            Some(id) => self.controller.sink().for_project(id).await,
            None => self.controller.sink().all().await,
        }
    }
}
