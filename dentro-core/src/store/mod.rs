//! Local and remote snapshot stores.

mod http;
mod local;
mod memory;
mod remote;

pub use http::HttpRemoteStore;
pub use local::{FileLocalStore, LocalStore, MemoryLocalStore, StorageError, SNAPSHOT_FILE};
pub use memory::MemoryRemoteStore;
pub use remote::{RemoteError, RemoteStore};
