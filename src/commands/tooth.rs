use clap::{Args, Subcommand};
use dentro_core::edits::{self, SurfaceTarget};
use dentro_core::models::ToothPosition;

use crate::clinic::{patient_id, Clinic};

/// Dental chart edits
#[derive(Debug, Args)]
pub struct ToothCommand {
    #[command(subcommand)]
    pub command: ToothSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ToothSubcommand {
    /// Set the overall status of a tooth (e.g. healthy, filling, missing)
    Status {
        /// Patient ID or name
        patient: String,

        /// FDI tooth number (11-48, 51-85)
        tooth: u16,

        status: String,
    },

    /// Toggle a marking on one surface (top, bottom, left, right, center, all)
    Surface {
        /// Patient ID or name
        patient: String,

        /// FDI tooth number
        tooth: u16,

        surface: SurfaceTarget,

        /// Marking to toggle (e.g. caries, filling)
        marking: String,
    },

    /// Attach a note to a tooth
    Note {
        /// Patient ID or name
        patient: String,

        /// FDI tooth number
        tooth: u16,

        text: String,
    },
}

impl ToothCommand {
    pub fn run(&self, clinic: &Clinic) -> Result<(), Box<dyn std::error::Error>> {
        let (patient, tooth) = match &self.command {
            ToothSubcommand::Status { patient, tooth, .. }
            | ToothSubcommand::Surface { patient, tooth, .. }
            | ToothSubcommand::Note { patient, tooth, .. } => (patient, *tooth),
        };
        let id = patient_id(clinic, patient)?;

        let (_, snapshot) = clinic.store().edit(|s, now| match &self.command {
            ToothSubcommand::Status { status, .. } => {
                edits::set_tooth_status(s, now, &id, tooth, status)
            }
            ToothSubcommand::Surface {
                surface, marking, ..
            } => edits::toggle_tooth_surface(s, now, &id, tooth, *surface, marking),
            ToothSubcommand::Note { text, .. } => edits::set_tooth_note(s, now, &id, tooth, text),
        })?;

        let charted = snapshot
            .patient(&id)
            .and_then(|p| p.teeth.get(&ToothPosition(tooth)));
        if let Some(t) = charted {
            print!("Tooth {}: {}", t.id, t.status);
            if let Some(s) = &t.surfaces {
                print!(
                    "  [T:{} B:{} L:{} R:{} C:{}]",
                    s.top, s.bottom, s.left, s.right, s.center
                );
            }
            if let Some(note) = &t.special_note {
                print!("  \"{}\"", note.text);
            }
            println!();
        }
        Ok(())
    }
}
