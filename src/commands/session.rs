//! Long-running session: edits are read from stdin one command per line
//! while the debounced auto-sync runs in the background.

use clap::{Args, Parser, Subcommand};
use dentro_core::{SyncOutcome, Trigger};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{AppointmentCommand, MemoCommand, PatientCommand, PaymentCommand, SyncCommand, ToothCommand};
use crate::clinic::Clinic;
use crate::config::Config;

/// Run an interactive session (one command per line, `quit` to leave)
#[derive(Debug, Args)]
pub struct SessionCommand {}

#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct SessionLine {
    #[command(subcommand)]
    command: LineCommand,
}

#[derive(Debug, Subcommand)]
enum LineCommand {
    Patient(PatientCommand),
    Tooth(ToothCommand),
    Payment(PaymentCommand),
    Appointment(AppointmentCommand),
    Memo(MemoCommand),
    Sync(SyncCommand),
    /// Show the current sync status
    Status,
    /// Leave the session
    #[command(alias = "exit")]
    Quit,
}

impl LineCommand {
    fn is_write(&self) -> bool {
        match self {
            LineCommand::Patient(cmd) => cmd.is_write(),
            LineCommand::Memo(cmd) => cmd.is_write(),
            LineCommand::Tooth(_) | LineCommand::Payment(_) | LineCommand::Appointment(_) => true,
            LineCommand::Sync(_) | LineCommand::Status | LineCommand::Quit => false,
        }
    }
}

impl SessionCommand {
    pub async fn run(&self, clinic: &Clinic, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let syncing = config.sync.is_configured();
        let auto_sync = if syncing {
            match clinic.start().await {
                SyncOutcome::Failed(e) => eprintln!("Initial sync failed: {}", e),
                SyncOutcome::Offline => eprintln!("Server unreachable; working offline"),
                _ => {}
            }
            Some(clinic.spawn_auto_sync())
        } else {
            eprintln!("Sync not configured; changes stay on this device");
            None
        };

        let mut status = clinic.subscribe_status();
        let watcher = tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let current = *status.borrow_and_update();
                eprintln!("[sync: {}]", current);
            }
        });

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut wrote = false;

        while let Some(line) = lines.next_line().await? {
            let tokens = match split_line(&line) {
                Ok(tokens) if tokens.is_empty() => continue,
                Ok(tokens) => tokens,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    continue;
                }
            };

            let parsed = match SessionLine::try_parse_from(tokens) {
                Ok(parsed) => parsed.command,
                Err(e) => {
                    eprintln!("{}", e);
                    continue;
                }
            };

            if matches!(parsed, LineCommand::Quit) {
                break;
            }
            let is_write = parsed.is_write();

            let result = match &parsed {
                LineCommand::Patient(cmd) => cmd.run(clinic),
                LineCommand::Tooth(cmd) => cmd.run(clinic),
                LineCommand::Payment(cmd) => cmd.run(clinic),
                LineCommand::Appointment(cmd) => cmd.run(clinic),
                LineCommand::Memo(cmd) => cmd.run(clinic),
                LineCommand::Sync(cmd) => cmd.run(clinic, config).await.map_err(Into::into),
                LineCommand::Status => {
                    println!("{}", clinic.status());
                    Ok(())
                }
                LineCommand::Quit => Ok(()),
            };

            match result {
                Ok(()) => wrote |= is_write,
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        // Push whatever the debounce window still holds before shutting down.
        if syncing && wrote {
            if let SyncOutcome::Failed(e) = clinic.sync_now(Trigger::Manual { force: true }).await {
                eprintln!("Final sync failed: {}", e);
            }
        }

        clinic.shutdown();
        if let Some(handle) = auto_sync {
            handle.await?;
        }
        watcher.abort();
        Ok(())
    }
}

/// Splits a command line into words, honoring single and double quotes.
fn split_line(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => return Err("trailing backslash".to_string()),
            },
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(format!("unterminated {} quote", q));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_line_quotes() {
        assert_eq!(
            split_line(r#"patient add "Ali Hassan" --phone 0770"#).unwrap(),
            vec!["patient", "add", "Ali Hassan", "--phone", "0770"]
        );
        assert_eq!(
            split_line("memo add 'Order gloves' ''").unwrap(),
            vec!["memo", "add", "Order gloves", ""]
        );
        assert_eq!(
            split_line(r#"tooth note p1 11 "says \"ouch\"""#).unwrap(),
            vec!["tooth", "note", "p1", "11", r#"says "ouch""#]
        );
        assert!(split_line("   ").unwrap().is_empty());
        assert!(split_line("patient add \"Ali").is_err());
    }

    #[test]
    fn test_parse_session_lines() {
        let line = SessionLine::try_parse_from(split_line("patient add Sara").unwrap()).unwrap();
        assert!(line.command.is_write());

        let line = SessionLine::try_parse_from(split_line("patient list").unwrap()).unwrap();
        assert!(!line.command.is_write());

        let line = SessionLine::try_parse_from(split_line("exit").unwrap()).unwrap();
        assert!(matches!(line.command, LineCommand::Quit));

        let line =
            SessionLine::try_parse_from(split_line("tooth surface p1 36 center caries").unwrap())
                .unwrap();
        assert!(line.command.is_write());

        assert!(SessionLine::try_parse_from(split_line("reset").unwrap()).is_err());
    }
}
