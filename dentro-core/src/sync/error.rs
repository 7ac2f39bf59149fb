//! Sync error types.

use std::time::Duration;

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::store::RemoteError;

/// Why a sync round failed. Always absorbed into [`SyncStatus::Error`].
///
/// [`SyncStatus::Error`]: super::SyncStatus::Error
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Pull failed: {0}")]
    Pull(#[source] RemoteError),

    #[error("Push failed: {0}")]
    Push(#[source] RemoteError),

    #[error("{stage} timed out after {}s", .after.as_secs())]
    Timeout { stage: &'static str, after: Duration },

    /// The merged snapshot could not be saved locally.
    #[error("Failed to land merged snapshot: {0}")]
    Local(#[source] GatewayError),
}
