//! Append-only result log, flushed to the store after every item.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tokio::task;
use tracing::warn;

use crate::store::{KvStore, KvStoreExt, SharedStore};
use crate::types::Record;

/// Bounds every persisted result type satisfies.
pub trait LogRecord: Record + Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> LogRecord for T where T: Record + Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

pub struct ResultSink<R> {
    store: SharedStore,
    key: &'static str,
    log: Mutex<Vec<R>>,
}

impl<R: LogRecord> ResultSink<R> {
    /// Open the log stored under `key`, continuing whatever is already there.
    pub fn open(store: SharedStore, key: &'static str) -> Self {
        let existing: Vec<R> = store.get_or(key, Vec::new());
        Self {
            store,
            key,
            log: Mutex::new(existing),
        }
    }

    /// Append and persist the whole log. A failed write is logged and the
    /// record stays in memory.
    ///
    /// The write runs on the blocking pool; the log lock is held until it
    /// lands so flushes never reorder.
    pub async fn append(&self, record: R) {
        let mut log = self.log.lock().await;
        log.push(record);
        let value = match serde_json::to_value(&*log) {
            Ok(v) => v,
            Err(e) => {
                warn!(key = self.key, error = %e, "failed to encode result log");
                return;
            }
        };
        let store = Arc::clone(&self.store);
        let key = self.key;
        match task::spawn_blocking(move || store.set(key, value)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(key, error = %e, "failed to persist result log"),
            Err(e) => warn!(key, error = %e, "result log writer did not finish"),
        }
    }

    pub async fn all(&self) -> Vec<R> {
        self.log.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.log.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.lock().await.is_empty()
    }

    /// Records filed under `project_id`.
    pub async fn for_project(&self, project_id: &str) -> Vec<R> {
        self.log
            .lock()
            .await
            .iter()
            .filter(|r| r.project_id() == Some(project_id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, MemoryStore, PORT_RESULTS};
    use crate::types::{PortProbeResult, PortStatus};

    fn port(p: u16) -> PortProbeResult {
        PortProbeResult {
            port: p,
            status: PortStatus::Closed,
            service: "Unknown".into(),
            banner: None,
            latency_ms: 0,
        }
    }

    #[tokio::test]
    async fn append_flushes_and_reopen_continues() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let sink = ResultSink::open(store.clone(), PORT_RESULTS);
        sink.append(port(1)).await;
        sink.append(port(2)).await;

        let stored: Vec<PortProbeResult> = store.get_or(PORT_RESULTS, Vec::new());
        assert_eq!(stored.len(), 2);

        let reopened = ResultSink::<PortProbeResult>::open(store.clone(), PORT_RESULTS);
        reopened.append(port(3)).await;
        let ports: Vec<u16> = reopened.all().await.iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn file_backed_log_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::open(Arc::new(FileStore::new(dir.path())), PORT_RESULTS);
        for p in [22, 80, 443] {
            sink.append(port(p)).await;
        }

        let reopened =
            ResultSink::<PortProbeResult>::open(Arc::new(FileStore::new(dir.path())), PORT_RESULTS);
        let ports: Vec<u16> = reopened.all().await.iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![22, 80, 443]);
    }
}
