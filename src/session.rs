//! Session snapshots that survive a surface being torn down and rebuilt.
//!
//! A restored snapshot never carries a live state: there is no run loop to
//! reattach to, so `running`, `paused` and `stopped` all come back as `idle`
//! while cursor, progress and results are kept for display.

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::store::{KvStore, KvStoreExt, SharedStore};
use crate::types::{ScanState, SessionSnapshot};

pub struct SessionBridge<R> {
    store: SharedStore,
    key: &'static str,
    _record: PhantomData<fn() -> R>,
}

impl<R: Serialize + DeserializeOwned> SessionBridge<R> {
    pub fn new(store: SharedStore, key: &'static str) -> Self {
        Self {
            store,
            key,
            _record: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Load the last snapshot, normalized to `idle`, and write the normalized form back.
    pub fn init(&self) -> Option<SessionSnapshot<R>> {
        let snap = self.restore()?;
        self.save(&snap);
        Some(snap)
    }

    pub fn restore(&self) -> Option<SessionSnapshot<R>> {
        let raw = match self.store.get(self.key) {
            Ok(Some(v)) => v,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = self.key, error = %e, "session read failed");
                return None;
            }
        };
        match serde_json::from_value::<SessionSnapshot<R>>(raw) {
            Ok(snap) => {
                if snap.state != ScanState::Idle {
                    debug!(key = self.key, state = %snap.state, "coercing restored session to idle");
                }
                Some(normalize(snap))
            }
            Err(e) => {
                warn!(key = self.key, error = %e, "discarding unreadable session snapshot");
                None
            }
        }
    }

    pub fn save(&self, snapshot: &SessionSnapshot<R>) {
        if let Err(e) = self.store.put(self.key, snapshot) {
            warn!(key = self.key, error = %e, "session save failed");
        }
    }

    /// Writes are incremental, so there is nothing left to flush.
    pub fn teardown(&self) {}
}

pub fn normalize<R>(mut snapshot: SessionSnapshot<R>) -> SessionSnapshot<R> {
    snapshot.state = ScanState::Idle;
    snapshot
}
