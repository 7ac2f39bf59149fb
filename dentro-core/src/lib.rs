//! Dentro Core Library
//!
//! Clinic data model, granular merge and offline-first sync shared by the
//! Dentro CLI and server.

pub mod edits;
pub mod gateway;
pub mod merge;
pub mod models;
pub mod overrides;
pub mod store;
pub mod sync;

pub use edits::EditError;
pub use gateway::{ClinicStore, GatewayError};
pub use merge::{merge, merge_with, TieBreak};
pub use models::{
    Appointment, ClinicSnapshot, Collection, Doctor, Memo, Millis, NestedCollection, Patient,
    Payment, PaymentKind, Tombstones, Tooth, ToothPosition,
};
pub use overrides::DeviceOverrides;
pub use store::{
    FileLocalStore, HttpRemoteStore, LocalStore, MemoryLocalStore, MemoryRemoteStore,
    RemoteError, RemoteStore, StorageError,
};
pub use sync::{SyncError, SyncOrchestrator, SyncOutcome, SyncReport, SyncSettings, SyncStatus, Trigger};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
