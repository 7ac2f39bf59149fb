use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod clinic;
mod commands;
mod config;

use commands::{
    AppointmentCommand, BackupCommand, ConfigCommand, MemoCommand, PatientCommand,
    PaymentCommand, ResetCommand, SessionCommand, SyncCommand, ToothCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "dentro")]
#[command(version)]
#[command(about = "Offline-first dental clinic records", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage patients
    Patient(PatientCommand),

    /// Edit a patient's dental chart
    Tooth(ToothCommand),

    /// Record payments and charges
    Payment(PaymentCommand),

    /// Book appointments and update their status
    Appointment(AppointmentCommand),

    /// Clinic memos
    Memo(MemoCommand),

    /// Sync with remote server
    Sync(SyncCommand),

    /// Export or import a JSON backup
    Backup(BackupCommand),

    /// Delete the local clinic data on this device
    Reset(ResetCommand),

    /// Manage configuration
    Config(ConfigCommand),

    /// Read commands from stdin with background sync
    Session(SessionCommand),
}

impl Commands {
    /// Read operations pull before running when auto-sync is on.
    fn is_read(&self) -> bool {
        match self {
            Commands::Patient(cmd) => !cmd.is_write(),
            Commands::Memo(cmd) => !cmd.is_write(),
            _ => false,
        }
    }

    /// Write operations push after succeeding when auto-sync is on.
    fn is_write(&self) -> bool {
        match self {
            Commands::Patient(cmd) => cmd.is_write(),
            Commands::Memo(cmd) => cmd.is_write(),
            Commands::Backup(cmd) => cmd.is_write(),
            Commands::Tooth(_) | Commands::Payment(_) | Commands::Appointment(_) => true,
            _ => false,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dentro=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;

    let command = match cli.command {
        Some(Commands::Config(cmd)) => return cmd.run(&config),
        Some(command) => command,
        None => {
            println!("Use --help to see available commands");
            return Ok(());
        }
    };

    let clinic = clinic::open(&config)?;

    if command.is_read() {
        clinic::sync_before_read(&clinic, &config).await;
    }

    match &command {
        Commands::Patient(cmd) => cmd.run(&clinic)?,
        Commands::Tooth(cmd) => cmd.run(&clinic)?,
        Commands::Payment(cmd) => cmd.run(&clinic)?,
        Commands::Appointment(cmd) => cmd.run(&clinic)?,
        Commands::Memo(cmd) => cmd.run(&clinic)?,
        Commands::Sync(cmd) => cmd.run(&clinic, &config).await?,
        Commands::Backup(cmd) => cmd.run(&clinic)?,
        Commands::Reset(cmd) => cmd.run(&clinic)?,
        Commands::Session(cmd) => cmd.run(&clinic, &config).await?,
        Commands::Config(cmd) => cmd.run(&config)?,
    }

    if command.is_write() {
        clinic::sync_after_write(&clinic, &config).await;
    }

    Ok(())
}
