//! Wiring for the device-side stack: file store, gateway, remote and
//! orchestrator, plus the auto-sync hooks run around CLI commands.

use std::sync::Arc;

use dentro_core::models::{ClinicSnapshot, Patient};
use dentro_core::{
    ClinicStore, FileLocalStore, HttpRemoteStore, StorageError, SyncOrchestrator, SyncOutcome,
    Trigger,
};

use crate::config::Config;

pub type Clinic = SyncOrchestrator<FileLocalStore, HttpRemoteStore>;

/// Opens the local snapshot and builds the orchestrator around it.
///
/// Without a configured server the remote runs unauthenticated and every
/// round reports offline.
pub fn open(config: &Config) -> Result<Clinic, StorageError> {
    let local = FileLocalStore::new(config.data_dir.value.clone());
    let store = ClinicStore::open(local, config.device.overrides())?;

    let remote = match (&config.sync.server_url, &config.sync.api_key) {
        (Some(url), key) => HttpRemoteStore::new(url.clone(), key.clone()),
        (None, _) => HttpRemoteStore::new("", None),
    };

    Ok(SyncOrchestrator::new(
        Arc::new(store),
        remote,
        config.sync.settings(),
    ))
}

/// Pulls before a read command when auto-sync is enabled.
pub async fn sync_before_read(clinic: &Clinic, config: &Config) {
    if !config.sync.auto_sync || !config.sync.is_configured() {
        return;
    }
    report_auto_sync(clinic.start().await);
}

/// Pushes after a successful write command when auto-sync is enabled.
pub async fn sync_after_write(clinic: &Clinic, config: &Config) {
    if !config.sync.auto_sync || !config.sync.is_configured() {
        return;
    }
    report_auto_sync(clinic.sync_now(Trigger::Debounced).await);
}

fn report_auto_sync(outcome: SyncOutcome) {
    match outcome {
        SyncOutcome::Offline => eprintln!("Auto-sync: server unreachable, skipping"),
        SyncOutcome::Failed(e) => eprintln!("Auto-sync: {}", e),
        _ => {}
    }
}

#[derive(Debug)]
pub enum LookupError {
    NotFound(String),
    Ambiguous(String, usize),
}

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupError::NotFound(identifier) => write!(f, "Patient not found: {}", identifier),
            LookupError::Ambiguous(identifier, n) => write!(
                f,
                "{} patients match '{}'; use the patient id instead",
                n, identifier
            ),
        }
    }
}

impl std::error::Error for LookupError {}

/// Finds a patient by id, then by case-insensitive name.
pub fn find_patient<'a>(
    snapshot: &'a ClinicSnapshot,
    identifier: &str,
) -> Result<&'a Patient, LookupError> {
    if let Some(patient) = snapshot.patient(identifier) {
        return Ok(patient);
    }

    let wanted = identifier.trim().to_lowercase();
    let mut matches = snapshot
        .patients
        .iter()
        .filter(|p| p.name.trim().to_lowercase() == wanted);

    match (matches.next(), matches.count()) {
        (Some(patient), 0) => Ok(patient),
        (Some(_), more) => Err(LookupError::Ambiguous(identifier.to_string(), more + 1)),
        (None, _) => Err(LookupError::NotFound(identifier.to_string())),
    }
}

/// Resolves a patient identifier to its id.
pub fn patient_id(clinic: &Clinic, identifier: &str) -> Result<String, LookupError> {
    find_patient(&clinic.store().get(), identifier).map(|p| p.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(id: &str, name: &str) -> Patient {
        Patient {
            id: id.into(),
            name: name.into(),
            updated_at: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_find_patient_by_id_or_name() {
        let snapshot = ClinicSnapshot {
            patients: vec![patient("p1", "Ali Hassan"), patient("p2", "Sara")],
            ..Default::default()
        };

        assert_eq!(find_patient(&snapshot, "p2").unwrap().name, "Sara");
        assert_eq!(find_patient(&snapshot, "ali hassan").unwrap().id, "p1");
        assert!(matches!(
            find_patient(&snapshot, "Omar"),
            Err(LookupError::NotFound(_))
        ));
    }

    #[test]
    fn test_find_patient_ambiguous_name() {
        let snapshot = ClinicSnapshot {
            patients: vec![patient("p1", "Sara"), patient("p2", "sara")],
            ..Default::default()
        };

        let err = find_patient(&snapshot, "Sara").unwrap_err();
        assert!(matches!(err, LookupError::Ambiguous(_, 2)));
        assert!(err.to_string().contains("use the patient id"));
    }

    #[test]
    fn test_open_without_server_is_unauthenticated() {
        use dentro_core::RemoteStore;

        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, format!("data_dir: {}\n", temp_dir.path().display()))
            .unwrap();
        let config = Config::load(Some(config_path)).unwrap();

        let clinic = open(&config).unwrap();
        assert!(!clinic.remote().is_authenticated());
        assert!(clinic.store().get().patients.is_empty());
    }
}
