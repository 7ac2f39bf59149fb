//! The single write path for the clinic snapshot.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::watch;

use crate::edits::EditError;
use crate::merge::{merge_with, TieBreak};
use crate::models::{now_millis, ClinicSnapshot, Millis};
use crate::overrides::DeviceOverrides;
use crate::store::{LocalStore, StorageError};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The in-memory snapshot moved on but the local write failed.
    #[error("Snapshot updated in memory but not saved: {source}")]
    NotPersisted {
        snapshot: Arc<ClinicSnapshot>,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Edit(#[from] EditError),
}

impl GatewayError {
    /// The snapshot now in memory, when the change itself went through.
    pub fn snapshot(&self) -> Option<&Arc<ClinicSnapshot>> {
        match self {
            GatewayError::NotPersisted { snapshot, .. } => Some(snapshot),
            GatewayError::Edit(_) => None,
        }
    }
}

/// Owns the current snapshot and serializes every change to it.
///
/// Readers get cheap `Arc` clones; each change replaces the snapshot whole,
/// saves it locally, then publishes it to subscribers.
pub struct ClinicStore<L> {
    local: L,
    overrides: DeviceOverrides,
    write_slot: Mutex<()>,
    current: watch::Sender<Arc<ClinicSnapshot>>,
    edits: watch::Sender<u64>,
}

impl<L: LocalStore> ClinicStore<L> {
    /// Loads the local snapshot (empty on first run) and stamps device
    /// preferences onto it.
    pub fn open(local: L, overrides: DeviceOverrides) -> Result<Self, StorageError> {
        let loaded = local.load()?.unwrap_or_default();
        let mut snapshot = loaded.clone();
        overrides.apply(&mut snapshot, &loaded);

        tracing::debug!(
            patients = snapshot.patients.len(),
            last_updated = snapshot.last_updated,
            "opened clinic store"
        );

        let (current, _) = watch::channel(Arc::new(snapshot));
        let (edits, _) = watch::channel(0);
        Ok(Self {
            local,
            overrides,
            write_slot: Mutex::new(()),
            current,
            edits,
        })
    }

    pub fn get(&self) -> Arc<ClinicSnapshot> {
        Arc::clone(&self.current.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ClinicSnapshot>> {
        self.current.subscribe()
    }

    /// Revision counter bumped on every local edit (not on merges).
    pub fn subscribe_edits(&self) -> watch::Receiver<u64> {
        self.edits.subscribe()
    }

    pub fn overrides(&self) -> &DeviceOverrides {
        &self.overrides
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    /// Applies a whole-snapshot updater and stamps `lastUpdated`.
    pub fn apply<F>(&self, updater: F) -> Result<Arc<ClinicSnapshot>, GatewayError>
    where
        F: FnOnce(ClinicSnapshot) -> ClinicSnapshot,
    {
        self.edit(|snapshot, _| {
            let next = updater(std::mem::take(snapshot));
            *snapshot = next;
            Ok(())
        })
        .map(|((), snapshot)| snapshot)
    }

    /// Runs an in-place edit with the stamp to use for touched records.
    ///
    /// A failing edit leaves the snapshot untouched.
    pub fn edit<T, F>(&self, edit: F) -> Result<(T, Arc<ClinicSnapshot>), GatewayError>
    where
        F: FnOnce(&mut ClinicSnapshot, Millis) -> Result<T, EditError>,
    {
        let _slot = self.write_slot.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.get();
        // Never step backwards, even if the wall clock does.
        let now = now_millis().max(current.last_updated);

        let mut next = ClinicSnapshot::clone(&current);
        let value = edit(&mut next, now)?;
        next.last_updated = now.max(next.newest_stamp());

        let result = self.commit(next);
        self.edits.send_modify(|rev| *rev += 1);
        result.map(|snapshot| (value, snapshot))
    }

    /// Merges a pulled remote snapshot into the current one.
    ///
    /// Runs in the write slot against the latest snapshot, so edits made
    /// while the pull was in flight are merged rather than overwritten.
    pub fn land(
        &self,
        remote: &ClinicSnapshot,
        tie_break: TieBreak,
    ) -> Result<Arc<ClinicSnapshot>, GatewayError> {
        let _slot = self.write_slot.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.get();

        let mut merged = merge_with(&current, remote, tie_break);
        self.overrides.apply(&mut merged, &current);
        // Rows written without a usable `lastUpdated` decode as 0.
        merged.last_updated = merged.last_updated.max(merged.newest_stamp());

        tracing::debug!(
            local = current.last_updated,
            remote = remote.last_updated,
            merged = merged.last_updated,
            "landed remote snapshot"
        );
        self.commit(merged)
    }

    /// Replaces the snapshot wholesale, keeping device preferences.
    pub fn replace(&self, snapshot: ClinicSnapshot) -> Result<Arc<ClinicSnapshot>, GatewayError> {
        let overrides = self.overrides.clone();
        self.apply(move |current| {
            let mut next = snapshot;
            overrides.apply(&mut next, &current);
            next
        })
    }

    /// Forgets the local snapshot and starts over empty.
    pub fn reset(&self) -> Result<Arc<ClinicSnapshot>, StorageError> {
        let _slot = self.write_slot.lock().unwrap_or_else(|e| e.into_inner());
        self.local.clear()?;

        let mut empty = ClinicSnapshot::default();
        self.overrides.apply(&mut empty, &self.get());
        let empty = Arc::new(empty);
        self.current.send_replace(Arc::clone(&empty));
        tracing::info!("local clinic data reset");
        Ok(empty)
    }

    fn commit(&self, next: ClinicSnapshot) -> Result<Arc<ClinicSnapshot>, GatewayError> {
        let saved = self.local.save(&next);
        let next = Arc::new(next);
        self.current.send_replace(Arc::clone(&next));

        match saved {
            Ok(()) => Ok(next),
            Err(source) => {
                tracing::error!("failed to save clinic data locally: {}", source);
                Err(GatewayError::NotPersisted {
                    snapshot: next,
                    source,
                })
            }
        }
    }
}
