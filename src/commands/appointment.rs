use clap::{Args, Subcommand};
use dentro_core::edits::{self, AppointmentDraft};

use crate::clinic::{patient_id, Clinic};

#[derive(Debug, Args)]
pub struct AppointmentCommand {
    #[command(subcommand)]
    pub command: AppointmentSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum AppointmentSubcommand {
    /// Book (or reschedule with --id) an appointment
    Add {
        /// Date (YYYY-MM-DD)
        date: String,

        /// Patient ID or name; omit to book a guest
        #[arg(long, short)]
        patient: Option<String>,

        /// Guest name when no patient is given
        #[arg(long, conflicts_with = "patient")]
        guest: Option<String>,

        /// Time of day (HH:MM)
        #[arg(long, short)]
        time: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Existing appointment to reschedule
        #[arg(long)]
        id: Option<String>,
    },

    /// Change an appointment's status (scheduled, completed, cancelled)
    Status {
        /// Appointment ID
        id: String,

        status: String,
    },
}

impl AppointmentCommand {
    pub fn run(&self, clinic: &Clinic) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            AppointmentSubcommand::Add {
                date,
                patient,
                guest,
                time,
                notes,
                id,
            } => {
                chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_err(|e| format!("Invalid date '{}': {}", date, e))?;

                let owner = patient
                    .as_deref()
                    .map(|p| patient_id(clinic, p))
                    .transpose()?;
                let draft = AppointmentDraft {
                    id: id.clone(),
                    patient_id: owner,
                    guest_name: guest.clone(),
                    date: date.clone(),
                    time: time.clone(),
                    notes: notes.clone(),
                };

                let (id, _) = clinic
                    .store()
                    .edit(|s, now| edits::save_appointment(s, now, draft))?;
                println!("Saved appointment {} on {}", id, date);
                Ok(())
            }

            AppointmentSubcommand::Status { id, status } => {
                clinic
                    .store()
                    .edit(|s, now| edits::set_appointment_status(s, now, id, status))?;
                println!("Appointment {} is now {}", id, status);
                Ok(())
            }
        }
    }
}
