use clap::{Args, Subcommand, ValueEnum};
use dentro_core::edits;
use dentro_core::models::PaymentKind;

use crate::clinic::{patient_id, Clinic};

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum KindArg {
    /// Money received from the patient
    #[default]
    Payment,
    /// Treatment cost owed by the patient
    Charge,
}

impl From<KindArg> for PaymentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Payment => PaymentKind::Payment,
            KindArg::Charge => PaymentKind::Charge,
        }
    }
}

#[derive(Debug, Args)]
pub struct PaymentCommand {
    #[command(subcommand)]
    pub command: PaymentSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum PaymentSubcommand {
    /// Record a payment or a charge
    Add {
        /// Patient ID or name
        patient: String,

        amount: f64,

        #[arg(long, value_enum, default_value = "payment")]
        kind: KindArg,

        #[arg(long, short, default_value = "")]
        description: String,
    },
}

impl PaymentCommand {
    pub fn run(&self, clinic: &Clinic) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            PaymentSubcommand::Add {
                patient,
                amount,
                kind,
                description,
            } => {
                let id = patient_id(clinic, patient)?;
                let (_, snapshot) = clinic.store().edit(|s, now| {
                    edits::add_payment(s, now, &id, *amount, (*kind).into(), description)
                })?;

                let balance = snapshot.patient(&id).map(|p| p.balance()).unwrap_or(0.0);
                let label = match kind {
                    KindArg::Payment => "payment",
                    KindArg::Charge => "charge",
                };
                println!("Recorded {} of {:.2}", label, amount);
                println!("Balance: {:.2}", balance);
                Ok(())
            }
        }
    }
}
