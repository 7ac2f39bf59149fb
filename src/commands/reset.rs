use std::io::{self, Write};

use clap::Args;

use crate::clinic::Clinic;

/// Wipe the local snapshot on this device
#[derive(Debug, Args)]
pub struct ResetCommand {
    /// Skip confirmation prompt
    #[arg(long, short)]
    force: bool,
}

impl ResetCommand {
    pub fn run(&self, clinic: &Clinic) -> Result<(), Box<dyn std::error::Error>> {
        if !self.force {
            print!("Delete all local clinic data on this device? [y/N] ");
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Reset cancelled.");
                return Ok(());
            }
        }

        clinic.store().reset()?;
        println!("Local clinic data deleted. The next sync will restore it from the server.");
        Ok(())
    }
}
