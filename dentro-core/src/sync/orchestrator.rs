use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::error::SyncError;
use super::status::{SyncOutcome, SyncReport, SyncStatus, Trigger};
use crate::gateway::ClinicStore;
use crate::merge::TieBreak;
use crate::models::Collection;
use crate::store::{LocalStore, RemoteStore};

/// Quiet period after the last local edit before a sync round starts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(10);

/// Deadline for each pull and push.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    pub debounce: Duration,
    pub request_timeout: Duration,
    pub tie_break: TieBreak,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            tie_break: TieBreak::default(),
        }
    }
}

struct Inner<L, R> {
    store: Arc<ClinicStore<L>>,
    remote: R,
    settings: SyncSettings,
    status: watch::Sender<SyncStatus>,
    /// Held for the duration of a round.
    round: Mutex<()>,
    shutdown: watch::Sender<bool>,
}

/// Drives pull, merge, push rounds against the remote row.
///
/// Cloning is cheap; clones share state.
pub struct SyncOrchestrator<L, R> {
    inner: Arc<Inner<L, R>>,
}

impl<L, R> Clone for SyncOrchestrator<L, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: LocalStore, R: RemoteStore> SyncOrchestrator<L, R> {
    pub fn new(store: Arc<ClinicStore<L>>, remote: R, settings: SyncSettings) -> Self {
        let (status, _) = watch::channel(SyncStatus::Synced);
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                store,
                remote,
                settings,
                status,
                round: Mutex::new(()),
                shutdown,
            }),
        }
    }

    pub fn store(&self) -> &Arc<ClinicStore<L>> {
        &self.inner.store
    }

    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    pub fn status(&self) -> SyncStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    /// Initial pull at process start.
    ///
    /// Without an identity the status stays `synced` and only local data is
    /// used.
    pub async fn start(&self) -> SyncOutcome {
        if !self.inner.remote.is_authenticated() {
            tracing::info!("no account configured, using local data only");
            return SyncOutcome::Offline;
        }
        self.sync_now(Trigger::Startup).await
    }

    /// Runs one round now.
    ///
    /// Rounds never overlap. An unforced manual request is skipped while
    /// another round runs; every other trigger waits its turn.
    pub async fn sync_now(&self, trigger: Trigger) -> SyncOutcome {
        let mut shutdown = self.inner.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            return SyncOutcome::Cancelled;
        }

        let _round = match trigger {
            Trigger::Manual { force: false } => match self.inner.round.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    tracing::debug!("sync already in progress, skipping");
                    return SyncOutcome::Skipped;
                }
            },
            _ => tokio::select! {
                guard = self.inner.round.lock() => guard,
                _ = wait_shutdown(&mut shutdown) => return SyncOutcome::Cancelled,
            },
        };

        let before = self.status();
        tokio::select! {
            outcome = self.round(trigger) => outcome,
            _ = wait_shutdown(&mut shutdown) => {
                tracing::info!("sync round cancelled by shutdown");
                self.set_status(before);
                SyncOutcome::Cancelled
            }
        }
    }

    async fn round(&self, trigger: Trigger) -> SyncOutcome {
        let inner = &self.inner;
        let started = Instant::now();

        if !inner.remote.is_authenticated() || !inner.remote.is_reachable().await {
            tracing::debug!("remote unavailable, skipping sync");
            self.set_status(SyncStatus::Offline);
            return SyncOutcome::Offline;
        }

        self.set_status(SyncStatus::Syncing);
        tracing::debug!(?trigger, "sync round started");

        let pulled = match self.deadline("pull", inner.remote.load()).await {
            Ok(Ok(pulled)) => pulled,
            Ok(Err(e)) => return self.fail(SyncError::Pull(e)),
            Err(e) => return self.fail(e),
        };
        let remote_found = pulled.is_some();

        if let Some(remote) = pulled {
            if let Err(e) = inner.store.land(&remote, inner.settings.tie_break) {
                // Don't push what could not be kept locally.
                return self.fail(SyncError::Local(e));
            }
        }

        let mut pushed = false;
        if trigger.pushes() {
            let payload = inner.store.overrides().redact_for_cloud(&inner.store.get());
            match self.deadline("push", inner.remote.save(&payload)).await {
                Ok(Ok(())) => pushed = true,
                Ok(Err(e)) => return self.fail(SyncError::Push(e)),
                Err(e) => return self.fail(e),
            }
        }

        self.set_status(SyncStatus::Synced);
        let report = SyncReport::new(
            trigger,
            remote_found,
            pushed,
            &inner.store.get(),
            started.elapsed(),
        );
        tracing::info!(
            ?trigger,
            remote_found,
            pushed,
            patients = report.count(Collection::Patients),
            "sync complete"
        );
        SyncOutcome::Synced(report)
    }

    async fn deadline<T>(
        &self,
        stage: &'static str,
        fut: impl Future<Output = T>,
    ) -> Result<T, SyncError> {
        let after = self.inner.settings.request_timeout;
        tokio::time::timeout(after, fut)
            .await
            .map_err(|_| SyncError::Timeout { stage, after })
    }

    fn fail(&self, error: SyncError) -> SyncOutcome {
        tracing::warn!("sync failed: {}", error);
        self.set_status(SyncStatus::Error);
        SyncOutcome::Failed(error)
    }

    fn set_status(&self, status: SyncStatus) {
        let previous = self.inner.status.send_replace(status);
        if previous != status {
            tracing::debug!(%previous, %status, "sync status changed");
        }
    }

    /// Spawns the debouncer: each local edit restarts the quiet period and
    /// a round runs once it elapses.
    pub fn spawn_auto_sync(&self) -> JoinHandle<()> {
        // Subscribe before spawning so edits made right away are seen.
        let edits = self.inner.store.subscribe_edits();
        let shutdown = self.inner.shutdown.subscribe();
        let this = self.clone();
        tokio::spawn(async move { this.auto_sync_loop(edits, shutdown).await })
    }

    async fn auto_sync_loop(
        self,
        mut edits: watch::Receiver<u64>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let debounce = self.inner.settings.debounce;
        tracing::debug!(?debounce, "auto-sync started");

        loop {
            tokio::select! {
                changed = edits.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = wait_shutdown(&mut shutdown) => return,
            }

            // Quiet period, restarted by every further edit.
            loop {
                tokio::select! {
                    changed = edits.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = tokio::time::sleep(debounce) => break,
                    _ = wait_shutdown(&mut shutdown) => return,
                }
            }

            if let SyncOutcome::Cancelled = self.sync_now(Trigger::Debounced).await {
                return;
            }
        }
    }

    /// Stops the debouncer and cancels any in-flight round.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }
}

/// Resolves once shutdown has been requested.
async fn wait_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
