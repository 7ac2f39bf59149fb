//! Offline-first sync between the clinic store and the shared remote row.

mod error;
mod orchestrator;
mod status;

pub use error::SyncError;
pub use orchestrator::{SyncOrchestrator, SyncSettings, DEFAULT_DEBOUNCE, DEFAULT_REQUEST_TIMEOUT};
pub use status::{SyncOutcome, SyncReport, SyncStatus, Trigger};
