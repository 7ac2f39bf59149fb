use std::future::Future;

use thiserror::Error;

use crate::models::ClinicSnapshot;

/// Errors returned by a remote snapshot store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    /// No account identity is configured.
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Credentials rejected by server (status {0})")]
    Unauthorized(u16),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("Malformed snapshot from server: {0}")]
    Malformed(String),

    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

/// The cloud row shared by every device of one account.
///
/// Only whole-document read and replace are offered. Without an identity
/// both operations are no-ops.
pub trait RemoteStore: Send + Sync + 'static {
    /// Whether an account identity is present.
    fn is_authenticated(&self) -> bool;

    /// Cheap connectivity probe; never errors.
    fn is_reachable(&self) -> impl Future<Output = bool> + Send;

    /// Reads the account row. `Ok(None)` means the row does not exist yet.
    fn load(&self) -> impl Future<Output = Result<Option<ClinicSnapshot>, RemoteError>> + Send;

    /// Replaces (or inserts) the account row.
    fn save(
        &self,
        snapshot: &ClinicSnapshot,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}
