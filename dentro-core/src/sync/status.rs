use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::SyncError;
use crate::models::{ClinicSnapshot, Collection, Millis};

/// Display-only sync state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Synced,
    Syncing,
    Error,
    Offline,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced => write!(f, "synced"),
            Self::Syncing => write!(f, "syncing"),
            Self::Error => write!(f, "error"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// What started a sync round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Process start: pull and land only, no push.
    Startup,
    /// Quiet period after a burst of local edits.
    Debounced,
    /// User request. `force` waits for an in-flight round instead of
    /// skipping.
    Manual { force: bool },
}

impl Trigger {
    pub(crate) fn pushes(&self) -> bool {
        !matches!(self, Trigger::Startup)
    }
}

/// Summary of a completed round.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub trigger: Trigger,
    /// Whether the account row existed.
    pub remote_found: bool,
    pub pushed: bool,
    pub last_updated: Millis,
    /// Live records per collection after the round.
    pub counts: Vec<(Collection, usize)>,
    pub elapsed: Duration,
}

impl SyncReport {
    pub(crate) fn new(
        trigger: Trigger,
        remote_found: bool,
        pushed: bool,
        snapshot: &ClinicSnapshot,
        elapsed: Duration,
    ) -> Self {
        Self {
            trigger,
            remote_found,
            pushed,
            last_updated: snapshot.last_updated,
            counts: Collection::ALL
                .iter()
                .map(|c| (*c, snapshot.count(*c)))
                .collect(),
            elapsed,
        }
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.counts
            .iter()
            .find(|(c, _)| *c == collection)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// How a call to [`SyncOrchestrator::sync_now`] ended.
///
/// [`SyncOrchestrator::sync_now`]: super::SyncOrchestrator::sync_now
#[derive(Debug)]
pub enum SyncOutcome {
    Synced(SyncReport),
    /// No identity or remote unreachable; nothing was attempted.
    Offline,
    /// Another round was in flight.
    Skipped,
    /// Shutdown was requested before the round finished.
    Cancelled,
    Failed(SyncError),
}

impl SyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Synced(_))
    }
}
