mod appointment;
mod backup;
mod config_cmd;
mod memo;
mod patient;
mod payment;
mod reset;
mod session;
mod sync_cmd;
mod tooth;

pub use appointment::AppointmentCommand;
pub use backup::BackupCommand;
pub use config_cmd::ConfigCommand;
pub use memo::MemoCommand;
pub use patient::PatientCommand;
pub use payment::PaymentCommand;
pub use reset::ResetCommand;
pub use session::SessionCommand;
pub use sync_cmd::SyncCommand;
pub use tooth::ToothCommand;

use chrono::{Local, TimeZone};
use clap::ValueEnum;
use dentro_core::models::Millis;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Formats a millisecond stamp in local time for display.
pub fn format_millis(at: Millis) -> String {
    if at <= 0 {
        return "never".to_string();
    }
    Local
        .timestamp_millis_opt(at)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| at.to_string())
}

/// Truncates to `width` characters, marking the cut with "...".
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("Ali", 30), "Ali");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        // Multi-byte names must not be split inside a character
        assert_eq!(truncate("علي حسن محمد", 6), "علي...");
    }

    #[test]
    fn test_format_millis_never() {
        assert_eq!(format_millis(0), "never");
        assert!(format_millis(1_700_000_000_000).starts_with("2023-11-1"));
    }
}
