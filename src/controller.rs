//! Resumable sequential scan engine.
//!
//! One run loop per controller walks the worklist strictly in order, one
//! in-flight probe at a time. Pause, resume and stop are writes to a shared
//! signal cell that the loop re-reads at every check point; stop also cancels
//! the run's token so a paused loop wakes immediately. An in-flight probe is
//! never interrupted.
//!
//! ```text
//! idle --start--> running --pause--> paused --resume--> running
//! running|paused --stop--> stopped --(settle)--> idle
//! running --(worklist exhausted)--> idle
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, ScanError};
use crate::probe::{Classifier, Probe};
use crate::session::SessionBridge;
use crate::sink::{LogRecord, ResultSink};
use crate::types::{RunSummary, ScanState, ScanStatus, SessionSnapshot};
use crate::worklist::WorkItem;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_STOP_SETTLE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Delay between signal checks while paused.
    pub poll_interval: Duration,
    /// How long `stopped` is held before decaying to `idle`.
    pub stop_settle: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop_settle: DEFAULT_STOP_SETTLE,
        }
    }
}

/// Rounded completion percentage after `done` of `total` items.
pub fn progress_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done as f64 * 100.0) / total as f64).round().min(100.0) as u8
}

#[derive(Debug)]
struct RunView<R> {
    cursor_index: usize,
    total: usize,
    progress: u8,
    current_item_id: Option<String>,
    results: Vec<R>,
    cancel: Option<CancellationToken>,
}

struct Inner<R> {
    surface: &'static str,
    signal: AtomicU8,
    view: Mutex<RunView<R>>,
    status_tx: watch::Sender<ScanStatus>,
    sink: ResultSink<R>,
    session: SessionBridge<R>,
    options: ControllerOptions,
}

/// Cheap-to-clone handle to one scan surface.
pub struct ScanController<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for ScanController<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: LogRecord> ScanController<R> {
    /// Build a controller, restoring the last session view (always as `idle`).
    pub fn new(
        surface: &'static str,
        sink: ResultSink<R>,
        session: SessionBridge<R>,
        options: ControllerOptions,
    ) -> Self {
        let restored = session.init().unwrap_or_default();
        let view = RunView {
            cursor_index: restored.cursor_index,
            total: restored.total,
            progress: restored.progress,
            current_item_id: None,
            results: restored.results,
            cancel: None,
        };
        let (status_tx, _) = watch::channel(ScanStatus {
            state: ScanState::Idle,
            progress: view.progress,
            cursor_index: view.cursor_index,
            total: view.total,
            current_item_id: None,
        });
        Self {
            inner: Arc::new(Inner {
                surface,
                signal: AtomicU8::new(ScanState::Idle.to_u8()),
                view: Mutex::new(view),
                status_tx,
                sink,
                session,
                options,
            }),
        }
    }

    pub fn surface(&self) -> &'static str {
        self.inner.surface
    }

    /// Live signal value.
    pub fn state(&self) -> ScanState {
        ScanState::from_u8(self.inner.signal.load(Ordering::SeqCst))
    }

    pub fn status(&self) -> ScanStatus {
        self.inner.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn sink(&self) -> &ResultSink<R> {
        &self.inner.sink
    }

    /// Results produced by the current (or last) run.
    pub async fn session_results(&self) -> Vec<R> {
        self.inner.view.lock().await.results.clone()
    }

    /// Begin a run over `worklist`. Rejected without any state change when the
    /// worklist is empty or a run is already active on this surface.
    pub async fn start<P, C>(
        &self,
        worklist: Vec<P::Item>,
        probe: P,
        classifier: C,
    ) -> Result<JoinHandle<RunSummary>>
    where
        P: Probe,
        C: Classifier<Item = P::Item, Outcome = P::Outcome, Output = R>,
    {
        if worklist.is_empty() {
            return Err(ScanError::EmptyWorklist);
        }

        let mut view = self.inner.view.lock().await;
        if self
            .cas(ScanState::Idle, ScanState::Running)
            .is_err()
        {
            return Err(ScanError::AlreadyRunning {
                surface: self.inner.surface,
            });
        }

        let cancel = CancellationToken::new();
        *view = RunView {
            cursor_index: 0,
            total: worklist.len(),
            progress: 0,
            current_item_id: None,
            results: Vec::new(),
            cancel: Some(cancel.clone()),
        };
        self.publish(&view);
        drop(view);

        info!(surface = self.inner.surface, total = worklist.len(), "scan started");
        let this = self.clone();
        Ok(tokio::spawn(async move {
            this.run_loop(worklist, probe, classifier, cancel).await
        }))
    }

    /// Takes effect before the next item; the in-flight probe finishes.
    pub async fn pause(&self) -> Result<ScanState> {
        self.transition("pause", ScanState::Running, ScanState::Paused)
            .await
    }

    pub async fn resume(&self) -> Result<ScanState> {
        self.transition("resume", ScanState::Paused, ScanState::Running)
            .await
    }

    /// Ask the loop to exit at its next check point. Results already produced stay logged.
    pub async fn stop(&self) -> Result<ScanState> {
        let view = self.inner.view.lock().await;
        let current = self.state();
        if !matches!(current, ScanState::Running | ScanState::Paused)
            || self.cas(current, ScanState::Stopped).is_err()
        {
            return Err(ScanError::InvalidTransition {
                action: "stop",
                state: self.state(),
            });
        }
        if let Some(cancel) = view.cancel.as_ref() {
            cancel.cancel();
        }
        info!(
            surface = self.inner.surface,
            cursor = view.cursor_index,
            total = view.total,
            "scan stop requested"
        );
        self.publish(&view);
        Ok(ScanState::Stopped)
    }

    /// Clear the session view. The persisted result log is left untouched.
    pub async fn clear_results(&self) -> Result<()> {
        let mut view = self.inner.view.lock().await;
        let state = self.state();
        if state != ScanState::Idle {
            return Err(ScanError::InvalidTransition {
                action: "clear results",
                state,
            });
        }
        view.results.clear();
        view.cursor_index = 0;
        view.total = 0;
        view.progress = 0;
        self.publish(&view);
        Ok(())
    }

    async fn transition(
        &self,
        action: &'static str,
        from: ScanState,
        to: ScanState,
    ) -> Result<ScanState> {
        let view = self.inner.view.lock().await;
        match self.cas(from, to) {
            Ok(()) => {
                info!(surface = self.inner.surface, cursor = view.cursor_index, "scan {to}");
                self.publish(&view);
                Ok(to)
            }
            Err(state) => Err(ScanError::InvalidTransition { action, state }),
        }
    }

    fn cas(&self, from: ScanState, to: ScanState) -> std::result::Result<(), ScanState> {
        self.inner
            .signal
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(ScanState::from_u8)
    }

    /// Push the view to watchers and persist it as the session snapshot.
    fn publish(&self, view: &MutexGuard<'_, RunView<R>>) {
        let state = self.state();
        self.inner.status_tx.send_replace(ScanStatus {
            state,
            progress: view.progress,
            cursor_index: view.cursor_index,
            total: view.total,
            current_item_id: view.current_item_id.clone(),
        });
        self.inner.session.save(&SessionSnapshot {
            state,
            cursor_index: view.cursor_index,
            total: view.total,
            progress: view.progress,
            results: view.results.clone(),
        });
    }

    async fn run_loop<P, C>(
        self,
        worklist: Vec<P::Item>,
        probe: P,
        classifier: C,
        cancel: CancellationToken,
    ) -> RunSummary
    where
        P: Probe,
        C: Classifier<Item = P::Item, Outcome = P::Outcome, Output = R>,
    {
        let mut guard = RunGuard {
            controller: self.clone(),
            cancel: cancel.clone(),
            armed: true,
        };
        let surface = self.inner.surface;
        let total = worklist.len();
        let mut summary = RunSummary {
            total,
            ..RunSummary::default()
        };

        for (i, item) in worklist.iter().enumerate() {
            if self.state() == ScanState::Stopped {
                summary.stopped = true;
                break;
            }
            while self.state() == ScanState::Paused {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = time::sleep(self.inner.options.poll_interval) => {}
                }
            }
            if self.state() == ScanState::Stopped {
                summary.stopped = true;
                break;
            }

            let item_id = item.item_id();
            {
                let mut view = self.inner.view.lock().await;
                view.current_item_id = Some(item_id.clone());
                self.inner.status_tx.send_modify(|s| {
                    s.current_item_id = Some(item_id.clone());
                });
            }
            debug!(surface, item = %item_id, index = i, "probing");

            let outcome = probe.probe(item).await;
            let record = classifier.classify(item, outcome);
            if record.is_pass() {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            self.inner.sink.append(record.clone()).await;

            let mut view = self.inner.view.lock().await;
            view.results.push(record);
            view.cursor_index = i + 1;
            view.progress = progress_percent(i + 1, total);
            self.publish(&view);
        }

        let mut view = self.inner.view.lock().await;
        view.current_item_id = None;
        view.cancel = None;
        summary.completed = view.cursor_index;

        if summary.stopped {
            self.publish(&view);
            drop(view);
            info!(
                surface,
                completed = summary.completed,
                total,
                "scan stopped"
            );
            time::sleep(self.inner.options.stop_settle).await;
            let view = self.inner.view.lock().await;
            let _ = self.cas(ScanState::Stopped, ScanState::Idle);
            self.publish(&view);
        } else {
            view.cursor_index = total;
            view.progress = 100;
            self.inner
                .signal
                .store(ScanState::Idle.to_u8(), Ordering::SeqCst);
            self.publish(&view);
            info!(
                surface,
                total,
                passed = summary.passed,
                failed = summary.failed,
                "scan complete: {} passed, {} failed or errored",
                summary.passed,
                summary.failed
            );
        }
        guard.armed = false;
        summary
    }
}

/// Returns the surface to `idle` when a run task dies before finishing,
/// whether by a panicking probe or an aborted task.
struct RunGuard<R: LogRecord> {
    controller: ScanController<R>,
    cancel: CancellationToken,
    armed: bool,
}

impl<R: LogRecord> Drop for RunGuard<R> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let inner = &self.controller.inner;
        warn!(surface = inner.surface, "scan task ended abnormally");
        self.cancel.cancel();
        inner.signal.store(ScanState::Idle.to_u8(), Ordering::SeqCst);
        match inner.view.try_lock() {
            Ok(mut view) => {
                view.current_item_id = None;
                view.cancel = None;
                self.controller.publish(&view);
            }
            Err(_) => {
                inner.status_tx.send_modify(|s| {
                    s.state = ScanState::Idle;
                    s.current_item_id = None;
                });
            }
        }
    }
}
