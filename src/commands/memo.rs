use clap::{Args, Subcommand};
use dentro_core::edits;
use dentro_core::models::Collection;

use super::{format_millis, truncate, OutputFormat};
use crate::clinic::Clinic;

#[derive(Debug, Args)]
pub struct MemoCommand {
    #[command(subcommand)]
    pub command: MemoSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum MemoSubcommand {
    /// Write a memo, or rewrite one with --id
    Add {
        title: String,

        #[arg(default_value = "")]
        content: String,

        /// Display color
        #[arg(long)]
        color: Option<String>,

        /// Existing memo to rewrite
        #[arg(long)]
        id: Option<String>,
    },

    /// List memos, newest first
    List {
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete a memo
    Delete {
        /// Memo ID
        id: String,
    },
}

impl MemoCommand {
    pub fn is_write(&self) -> bool {
        !matches!(self.command, MemoSubcommand::List { .. })
    }

    pub fn run(&self, clinic: &Clinic) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            MemoSubcommand::Add {
                title,
                content,
                color,
                id,
            } => {
                let (id, _) = clinic.store().edit(|s, now| {
                    edits::save_memo(s, now, id.as_deref(), title, content, color.clone())
                })?;
                println!("Saved memo {}", id);
                Ok(())
            }

            MemoSubcommand::List { format } => {
                let snapshot = clinic.store().get();
                if snapshot.memos.is_empty() {
                    println!("No memos found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&snapshot.memos)?);
                    }
                    OutputFormat::Text => {
                        println!("{:<36}  {:<19}  TITLE", "ID", "UPDATED");
                        println!("{}", "-".repeat(90));
                        for memo in &snapshot.memos {
                            println!(
                                "{:<36}  {:<19}  {}",
                                memo.id,
                                format_millis(memo.updated_at),
                                truncate(&memo.title, 30)
                            );
                        }
                    }
                }
                Ok(())
            }

            MemoSubcommand::Delete { id } => {
                clinic
                    .store()
                    .edit(|s, now| edits::delete_record(s, now, Collection::Memos, id))?;
                println!("Deleted memo {}", id);
                Ok(())
            }
        }
    }
}
