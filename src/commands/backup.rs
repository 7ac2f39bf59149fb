use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use dentro_core::models::{ClinicSnapshot, Collection};
use dentro_core::merge_with;

use crate::clinic::Clinic;

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq)]
pub enum ImportMode {
    /// Discard local data and load the backup
    Replace,
    /// Merge the backup into local data record by record
    #[default]
    Merge,
}

#[derive(Debug, Args)]
pub struct BackupCommand {
    #[command(subcommand)]
    pub command: BackupSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum BackupSubcommand {
    /// Write the local snapshot to a JSON file
    Export { file: PathBuf },

    /// Load a JSON backup into local data
    Import {
        file: PathBuf,

        #[arg(long, value_enum, default_value = "merge")]
        mode: ImportMode,
    },
}

impl BackupCommand {
    pub fn is_write(&self) -> bool {
        matches!(self.command, BackupSubcommand::Import { .. })
    }

    pub fn run(&self, clinic: &Clinic) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            BackupSubcommand::Export { file } => {
                export_to(clinic, file)?;
                println!("Exported clinic data to {}", file.display());
                Ok(())
            }
            BackupSubcommand::Import { file, mode } => {
                let snapshot = import_from(clinic, file, *mode)?;
                println!(
                    "Imported {} ({} patient(s), {} memo(s))",
                    file.display(),
                    snapshot.count(Collection::Patients),
                    snapshot.count(Collection::Memos)
                );
                Ok(())
            }
        }
    }
}

pub fn export_to(clinic: &Clinic, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = clinic.store().get();
    let json = serde_json::to_string_pretty(&*snapshot)?;
    std::fs::write(file, json)
        .map_err(|e| format!("Failed to write backup '{}': {}", file.display(), e))?;
    Ok(())
}

/// Loads a backup through the gateway; device preferences survive either way.
pub fn import_from(
    clinic: &Clinic,
    file: &Path,
    mode: ImportMode,
) -> Result<ClinicSnapshot, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read backup '{}': {}", file.display(), e))?;
    let backup = ClinicSnapshot::from_json_str(&contents)
        .map_err(|e| format!("Failed to parse backup '{}': {}", file.display(), e))?;

    let store = clinic.store();
    let snapshot = match mode {
        ImportMode::Replace => store.replace(backup)?,
        ImportMode::Merge => {
            let tie_break = clinic.settings().tie_break;
            let overrides = store.overrides().clone();
            store.apply(move |current| {
                let mut merged = merge_with(&current, &backup, tie_break);
                overrides.apply(&mut merged, &current);
                merged
            })?
        }
    };
    tracing::info!(?mode, last_updated = snapshot.last_updated, "imported backup");
    Ok(ClinicSnapshot::clone(&snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinic;
    use crate::config::Config;
    use dentro_core::edits::{self, PatientDraft};
    use tempfile::{tempdir, TempDir};

    fn open_clinic(dir: &TempDir, name: &str) -> Clinic {
        let data_dir = dir.path().join(name);
        let config_path = dir.path().join(format!("{}.yaml", name));
        std::fs::write(&config_path, format!("data_dir: {}\n", data_dir.display())).unwrap();
        clinic::open(&Config::load(Some(config_path)).unwrap()).unwrap()
    }

    fn add_patient(clinic: &Clinic, name: &str) {
        clinic
            .store()
            .edit(|s, now| {
                edits::add_patient(
                    s,
                    now,
                    PatientDraft {
                        name: name.into(),
                        ..Default::default()
                    },
                )
            })
            .unwrap();
    }

    fn names(snapshot: &ClinicSnapshot) -> Vec<String> {
        let mut names: Vec<String> = snapshot.patients.iter().map(|p| p.name.clone()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_import_merge_keeps_local_records() {
        let dir = tempdir().unwrap();
        let source = open_clinic(&dir, "source");
        add_patient(&source, "Ali");
        let file = dir.path().join("backup.json");
        export_to(&source, &file).unwrap();

        let target = open_clinic(&dir, "target");
        add_patient(&target, "Sara");
        let merged = import_from(&target, &file, ImportMode::Merge).unwrap();

        assert_eq!(names(&merged), vec!["Ali", "Sara"]);
        assert_eq!(names(&target.store().get()), vec!["Ali", "Sara"]);
    }

    #[test]
    fn test_import_replace_discards_local_records() {
        let dir = tempdir().unwrap();
        let source = open_clinic(&dir, "source");
        add_patient(&source, "Ali");
        let file = dir.path().join("backup.json");
        export_to(&source, &file).unwrap();

        let target = open_clinic(&dir, "target");
        add_patient(&target, "Sara");
        let replaced = import_from(&target, &file, ImportMode::Replace).unwrap();

        assert_eq!(names(&replaced), vec!["Ali"]);
    }

    #[test]
    fn test_import_rejects_garbage() {
        let dir = tempdir().unwrap();
        let target = open_clinic(&dir, "target");
        let file = dir.path().join("broken.json");
        std::fs::write(&file, "not json").unwrap();

        let err = import_from(&target, &file, ImportMode::Merge).unwrap_err();
        assert!(err.to_string().contains("Failed to parse backup"));
    }
}
