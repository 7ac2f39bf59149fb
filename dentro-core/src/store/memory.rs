use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::remote::{RemoteError, RemoteStore};
use crate::models::ClinicSnapshot;

#[derive(Debug, Default)]
struct Shared {
    row: Mutex<Option<ClinicSnapshot>>,
    reachable: AtomicBool,
    fail_load: AtomicBool,
    fail_save: AtomicBool,
    loads: AtomicUsize,
    saves: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

/// In-process remote row.
///
/// Clones share the same row, so several devices in one process can sync
/// against it. Failures and latency can be injected.
#[derive(Debug, Clone)]
pub struct MemoryRemoteStore {
    shared: Arc<Shared>,
    authenticated: bool,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    /// An empty, reachable, authenticated row.
    pub fn new() -> Self {
        let shared = Shared::default();
        shared.reachable.store(true, Ordering::SeqCst);
        Self {
            shared: Arc::new(shared),
            authenticated: true,
        }
    }

    /// A handle on the same row without an identity.
    pub fn signed_out(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            authenticated: false,
        }
    }

    fn row(&self) -> MutexGuard<'_, Option<ClinicSnapshot>> {
        self.shared.row.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current row content.
    pub fn snapshot(&self) -> Option<ClinicSnapshot> {
        self.row().clone()
    }

    /// Overwrites the row directly, bypassing failure injection.
    pub fn put(&self, snapshot: ClinicSnapshot) {
        *self.row() = Some(snapshot);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.shared.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_fail_load(&self, fail: bool) {
        self.shared.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_save(&self, fail: bool) {
        self.shared.fail_save.store(fail, Ordering::SeqCst);
    }

    /// Latency added to every load and save.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.shared.delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    pub fn load_count(&self) -> usize {
        self.shared.loads.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.shared.saves.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *self.shared.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn is_reachable(&self) -> bool {
        self.shared.reachable.load(Ordering::SeqCst)
    }

    async fn load(&self) -> Result<Option<ClinicSnapshot>, RemoteError> {
        if !self.authenticated {
            return Ok(None);
        }
        self.pause().await;
        self.shared.loads.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_load.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("load failure injected".into()));
        }
        Ok(self.row().clone())
    }

    async fn save(&self, snapshot: &ClinicSnapshot) -> Result<(), RemoteError> {
        if !self.authenticated {
            return Ok(());
        }
        self.pause().await;
        self.shared.saves.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_save.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("save failure injected".into()));
        }
        *self.row() = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_row() {
        let a = MemoryRemoteStore::new();
        let b = a.clone();
        assert_eq!(a.load().await.unwrap(), None);

        let snapshot = ClinicSnapshot {
            clinic_name: "Shared".into(),
            ..Default::default()
        };
        a.save(&snapshot).await.unwrap();
        assert_eq!(b.load().await.unwrap(), Some(snapshot));
        assert_eq!(a.save_count(), 1);
        assert_eq!(b.load_count(), 2);
    }

    #[tokio::test]
    async fn test_signed_out_is_noop() {
        let remote = MemoryRemoteStore::new();
        remote.put(ClinicSnapshot::default());
        let anon = remote.signed_out();

        assert!(!anon.is_authenticated());
        assert_eq!(anon.load().await.unwrap(), None);
        anon.save(&ClinicSnapshot {
            clinic_name: "ignored".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(remote.snapshot().unwrap().clinic_name, "");
        assert_eq!(remote.save_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let remote = MemoryRemoteStore::new();
        remote.set_fail_load(true);
        assert!(remote.load().await.is_err());
        remote.set_fail_save(true);
        assert!(remote.save(&ClinicSnapshot::default()).await.is_err());
        assert!(remote.snapshot().is_none());

        remote.set_reachable(false);
        assert!(!remote.is_reachable().await);
    }
}
