//! Sync CLI commands for reconciling with the server.

use clap::{Args, Subcommand};
use dentro_core::models::Collection;
use dentro_core::{RemoteStore, SyncError, SyncOutcome, Trigger};

use super::format_millis;
use crate::clinic::Clinic;
use crate::config::Config;

/// Sync with remote server
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,

    /// Wait for an in-flight round instead of skipping
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration and server status
    Status,
}

impl SyncCommand {
    pub async fn run(&self, clinic: &Clinic, config: &Config) -> Result<(), SyncCommandError> {
        match &self.command {
            None => self.sync(clinic, config).await,
            Some(SyncSubcommand::Status) => self.status(clinic, config).await,
        }
    }

    async fn sync(&self, clinic: &Clinic, config: &Config) -> Result<(), SyncCommandError> {
        if !config.sync.is_configured() {
            return Err(SyncCommandError::NotConfigured);
        }

        println!("Syncing with server...");
        println!();

        let outcome = clinic
            .sync_now(Trigger::Manual { force: self.force })
            .await;
        match outcome {
            SyncOutcome::Synced(report) => {
                if !report.remote_found {
                    println!("  ✓ created remote snapshot");
                }
                for collection in [
                    Collection::Patients,
                    Collection::GuestAppointments,
                    Collection::Memos,
                    Collection::Doctors,
                ] {
                    println!("  {:<18} {}", collection.name(), report.count(collection));
                }
                println!();
                println!(
                    "Sync complete in {} ms (last updated {}).",
                    report.elapsed.as_millis(),
                    format_millis(report.last_updated)
                );
                Ok(())
            }
            SyncOutcome::Offline => Err(SyncCommandError::Offline),
            SyncOutcome::Skipped => {
                println!("A sync is already running; use --force to wait for it.");
                Ok(())
            }
            SyncOutcome::Cancelled => Err(SyncCommandError::Cancelled),
            SyncOutcome::Failed(e) => Err(SyncCommandError::Failed(e)),
        }
    }

    async fn status(&self, clinic: &Clinic, config: &Config) -> Result<(), SyncCommandError> {
        println!("Sync Configuration");
        println!("==================");
        println!();

        let snapshot = clinic.store().get();
        println!("Local data:  {}", config.data_dir.value.display());
        println!("Last change: {}", format_millis(snapshot.last_updated));
        println!("Patients:    {}", snapshot.count(Collection::Patients));
        println!();

        let server_url = match (&config.sync.server_url, config.sync.is_configured()) {
            (Some(url), true) => url,
            _ => {
                println!("Status: Not configured");
                println!();
                println!("To enable sync, add to your config file:");
                println!();
                println!("  sync:");
                println!("    server_url: \"http://localhost:8080\"");
                println!("    api_key: \"your-api-key\"");
                println!("    auto_sync: false");
                println!();
                println!("Or set environment variables:");
                println!("  DENTRO_SYNC_URL");
                println!("  DENTRO_SYNC_API_KEY");
                return Ok(());
            }
        };

        println!("Server:    {}", server_url);
        println!(
            "Auto-sync: {}",
            if config.sync.auto_sync {
                "enabled"
            } else {
                "disabled"
            }
        );
        println!("Debounce:  {}s", config.sync.debounce_secs);
        println!();

        print!("Server status: ");
        if clinic.remote().is_reachable().await {
            println!("✓ reachable");
        } else {
            println!("✗ unreachable");
        }

        Ok(())
    }
}

/// Errors from sync commands
#[derive(Debug)]
pub enum SyncCommandError {
    NotConfigured,
    Offline,
    Cancelled,
    Failed(SyncError),
}

impl std::fmt::Display for SyncCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCommandError::NotConfigured => write!(
                f,
                "Sync not configured. Set sync.server_url and sync.api_key in the config file."
            ),
            SyncCommandError::Offline => write!(f, "Server unreachable; local data kept"),
            SyncCommandError::Cancelled => write!(f, "Sync cancelled"),
            SyncCommandError::Failed(e) => write!(f, "Sync failed: {}", e),
        }
    }
}

impl std::error::Error for SyncCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncCommandError::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dentro_core::RemoteError;

    #[test]
    fn test_error_display() {
        let err = SyncCommandError::Failed(SyncError::Pull(RemoteError::Status(500)));
        assert_eq!(err.to_string(), "Sync failed: Pull failed: Server returned status 500");
        assert!(std::error::Error::source(&err).is_some());
        assert!(SyncCommandError::NotConfigured
            .to_string()
            .contains("not configured"));
    }
}
