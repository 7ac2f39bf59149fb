//! Device-local snapshot persistence.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use thiserror::Error;

use crate::models::ClinicSnapshot;

/// Filename of the snapshot inside the data directory.
pub const SNAPSHOT_FILE: &str = "clinic_data.json";

/// Errors that can occur while reading or writing the local snapshot.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to decode snapshot {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Local store unavailable: {0}")]
    Unavailable(String),
}

/// Whole-snapshot persistence on the device.
///
/// `load` returning `Ok(None)` means first run, not an error.
pub trait LocalStore: Send + Sync + 'static {
    fn load(&self) -> Result<Option<ClinicSnapshot>, StorageError>;
    fn save(&self, snapshot: &ClinicSnapshot) -> Result<(), StorageError>;
    /// Forgets the stored snapshot.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Stores the snapshot as a single JSON file.
#[derive(Debug, Clone)]
pub struct FileLocalStore {
    data_dir: PathBuf,
}

impl FileLocalStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Full path of the snapshot file.
    pub fn path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }
}

impl LocalStore for FileLocalStore {
    fn load(&self) -> Result<Option<ClinicSnapshot>, StorageError> {
        let path = self.path();

        match fs::read_to_string(&path) {
            Ok(contents) => ClinicSnapshot::from_json_str(&contents)
                .map(Some)
                .map_err(|source| StorageError::Decode { path, source }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    /// Writes atomically: temp file, fsync, rename.
    fn save(&self, snapshot: &ClinicSnapshot) -> Result<(), StorageError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| StorageError::Io {
            path: self.data_dir.clone(),
            source,
        })?;

        let path = self.path();
        let bytes = serde_json::to_vec(snapshot).map_err(StorageError::Encode)?;
        let temp_path = path.with_extension("json.tmp");

        let mut file = File::create(&temp_path).map_err(|source| StorageError::Io {
            path: temp_path.clone(),
            source,
        })?;
        file.write_all(&bytes).map_err(|source| StorageError::Io {
            path: temp_path.clone(),
            source,
        })?;
        file.sync_all().map_err(|source| StorageError::Io {
            path: temp_path.clone(),
            source,
        })?;

        fs::rename(&temp_path, &path).map_err(|source| StorageError::Io { path, source })
    }

    fn clear(&self) -> Result<(), StorageError> {
        let path = self.path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

/// In-process store holding the serialized snapshot.
///
/// Keeps the encoded form so loads exercise the same decode path as the
/// file store.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    blob: Mutex<Option<String>>,
    fail_writes: AtomicBool,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save` fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn blob(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.blob.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LocalStore for MemoryLocalStore {
    fn load(&self) -> Result<Option<ClinicSnapshot>, StorageError> {
        match self.blob().as_deref() {
            Some(contents) => ClinicSnapshot::from_json_str(contents)
                .map(Some)
                .map_err(|source| StorageError::Decode {
                    path: PathBuf::from(":memory:"),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &ClinicSnapshot) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        let encoded = snapshot.to_json_string().map_err(StorageError::Encode)?;
        *self.blob() = Some(encoded);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.blob() = None;
        Ok(())
    }
}
