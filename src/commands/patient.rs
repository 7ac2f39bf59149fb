use clap::{Args, Subcommand};
use dentro_core::edits::{self, PatientDraft, PatientPatch};
use dentro_core::models::{Patient, PaymentKind};

use super::{format_millis, truncate, OutputFormat};
use crate::clinic::{find_patient, patient_id, Clinic};

#[derive(Debug, Args)]
pub struct PatientCommand {
    #[command(subcommand)]
    pub command: PatientSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum PatientSubcommand {
    /// Register a new patient
    Add {
        /// Full name
        name: String,

        /// Phone number
        #[arg(long)]
        phone: Option<String>,

        /// Gender
        #[arg(long)]
        gender: Option<String>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// List patients
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Only patients whose name contains this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Show a patient's chart
    Show {
        /// Patient ID or name
        identifier: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Update patient details
    Update {
        /// Patient ID or name
        identifier: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New phone number
        #[arg(long)]
        phone: Option<String>,

        /// New gender
        #[arg(long)]
        gender: Option<String>,

        /// New notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a patient and everything recorded for them
    Delete {
        /// Patient ID or name
        identifier: String,
    },
}

impl PatientCommand {
    pub fn is_write(&self) -> bool {
        matches!(
            self.command,
            PatientSubcommand::Add { .. }
                | PatientSubcommand::Update { .. }
                | PatientSubcommand::Delete { .. }
        )
    }

    pub fn run(&self, clinic: &Clinic) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            PatientSubcommand::Add {
                name,
                phone,
                gender,
                notes,
            } => {
                let draft = PatientDraft {
                    name: name.clone(),
                    phone: phone.clone(),
                    gender: gender.clone(),
                    notes: notes.clone(),
                };
                let (id, snapshot) = clinic
                    .store()
                    .edit(|s, now| edits::add_patient(s, now, draft))?;

                println!("Added patient:");
                if let Some(patient) = snapshot.patient(&id) {
                    print_patient(patient);
                }
                Ok(())
            }

            PatientSubcommand::List { format, search } => {
                let snapshot = clinic.store().get();
                let patients: Vec<&Patient> = match search {
                    Some(text) => {
                        let text = text.to_lowercase();
                        snapshot
                            .patients
                            .iter()
                            .filter(|p| p.name.to_lowercase().contains(&text))
                            .collect()
                    }
                    None => snapshot.patients.iter().collect(),
                };

                if patients.is_empty() {
                    println!("No patients found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&patients)?);
                    }
                    OutputFormat::Text => {
                        println!("{:<36}  {:<30}  {:<15}  BALANCE", "ID", "NAME", "PHONE");
                        println!("{}", "-".repeat(95));
                        for patient in &patients {
                            println!(
                                "{:<36}  {:<30}  {:<15}  {:.2}",
                                patient.id,
                                truncate(&patient.name, 30),
                                patient.phone.as_deref().unwrap_or("-"),
                                patient.balance()
                            );
                        }
                        println!("\nTotal: {} patient(s)", patients.len());
                    }
                }
                Ok(())
            }

            PatientSubcommand::Show { identifier, format } => {
                let snapshot = clinic.store().get();
                let patient = find_patient(&snapshot, identifier)?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(patient)?);
                    }
                    OutputFormat::Text => print_chart(patient),
                }
                Ok(())
            }

            PatientSubcommand::Update {
                identifier,
                name,
                phone,
                gender,
                notes,
            } => {
                let has_updates =
                    name.is_some() || phone.is_some() || gender.is_some() || notes.is_some();
                if !has_updates {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                let patch = PatientPatch {
                    name: name.clone(),
                    phone: phone.clone(),
                    gender: gender.clone(),
                    notes: notes.clone(),
                };

                let id = patient_id(clinic, identifier)?;
                let (_, snapshot) = clinic
                    .store()
                    .edit(|s, now| edits::update_patient(s, now, &id, patch))?;

                println!("Updated patient:");
                if let Some(patient) = snapshot.patient(&id) {
                    print_patient(patient);
                }
                Ok(())
            }

            PatientSubcommand::Delete { identifier } => {
                let id = patient_id(clinic, identifier)?;
                clinic
                    .store()
                    .edit(|s, now| edits::delete_patient(s, now, &id))?;
                println!("Deleted patient {}", id);
                Ok(())
            }
        }
    }
}

fn print_patient(patient: &Patient) {
    println!("  ID:      {}", patient.id);
    println!("  Name:    {}", patient.name);
    if let Some(phone) = &patient.phone {
        println!("  Phone:   {}", phone);
    }
    if let Some(gender) = &patient.gender {
        println!("  Gender:  {}", gender);
    }
    if let Some(notes) = &patient.notes {
        println!("  Notes:   {}", notes);
    }
    println!("  Updated: {}", format_millis(patient.updated_at));
}

fn print_chart(patient: &Patient) {
    println!("{}", patient.name);
    println!("{}", "=".repeat(patient.name.chars().count().max(8)));
    print_patient(patient);
    println!("  Balance: {:.2}", patient.balance());

    let charted: Vec<_> = patient
        .teeth
        .values()
        .filter(|t| t.status != "healthy" || t.special_note.is_some() || t.surfaces.is_some())
        .collect();
    if !charted.is_empty() {
        println!("\nTeeth:");
        for tooth in charted {
            print!("  {:>2}  {}", tooth.id, tooth.status);
            if let Some(s) = &tooth.surfaces {
                print!(
                    "  [T:{} B:{} L:{} R:{} C:{}]",
                    s.top, s.bottom, s.left, s.right, s.center
                );
            }
            if let Some(note) = &tooth.special_note {
                print!("  \"{}\"", note.text);
            }
            println!();
        }
    }

    if !patient.appointments.is_empty() {
        println!("\nAppointments:");
        for appt in &patient.appointments {
            println!(
                "  {}  {} {}  {}",
                appt.id,
                appt.date,
                appt.time.as_deref().unwrap_or(""),
                appt.status
            );
        }
    }

    if !patient.payments.is_empty() {
        println!("\nPayments:");
        for payment in &patient.payments {
            let kind = match payment.kind {
                PaymentKind::Payment => "payment",
                PaymentKind::Charge => "charge",
            };
            println!(
                "  {}  {:<7}  {:>10.2}  {}",
                payment.date.get(..10).unwrap_or(&payment.date),
                kind,
                payment.amount,
                payment.description
            );
        }
    }
}
