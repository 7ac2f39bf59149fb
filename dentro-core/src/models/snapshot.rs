use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::clinic::{
    Doctor, Expense, InventoryItem, LabOrder, Medication, Memo, Secretary, Supply,
};
use super::lenient;
use super::patient::{Appointment, Patient};
use super::record::{Collection, Millis, Timestamped, Tombstones};

/// Flat clinic configuration object.
pub type Settings = Map<String, Value>;

/// The whole clinic dataset as one serializable value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClinicSnapshot {
    #[serde(deserialize_with = "lenient::text")]
    pub clinic_name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub settings: Settings,
    #[serde(deserialize_with = "lenient::millis")]
    pub last_updated: Millis,
    #[serde(deserialize_with = "lenient::records")]
    pub patients: Vec<Patient>,
    #[serde(deserialize_with = "lenient::records")]
    pub doctors: Vec<Doctor>,
    #[serde(deserialize_with = "lenient::records")]
    pub secretaries: Vec<Secretary>,
    #[serde(deserialize_with = "lenient::records")]
    pub memos: Vec<Memo>,
    #[serde(deserialize_with = "lenient::records")]
    pub lab_orders: Vec<LabOrder>,
    #[serde(deserialize_with = "lenient::records")]
    pub inventory_items: Vec<InventoryItem>,
    #[serde(deserialize_with = "lenient::records")]
    pub expenses: Vec<Expense>,
    #[serde(deserialize_with = "lenient::records")]
    pub supplies: Vec<Supply>,
    #[serde(deserialize_with = "lenient::records")]
    pub medications: Vec<Medication>,
    #[serde(deserialize_with = "lenient::records")]
    pub guest_appointments: Vec<Appointment>,
    /// Deleted top-level records, keyed by collection name.
    #[serde(skip_serializing_if = "Tombstones::is_empty", deserialize_with = "lenient::or_default")]
    pub deleted: Tombstones,
}

impl ClinicSnapshot {
    /// Decodes a snapshot, treating `null` members as absent and wrongly
    /// typed fields as defaults.
    pub fn from_json_value(mut value: Value) -> Result<Self, serde_json::Error> {
        if !value.is_object() {
            return Err(serde::de::Error::custom("clinic snapshot must be a JSON object"));
        }
        lenient::strip_nulls(&mut value);
        serde_json::from_value(value)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        Self::from_json_value(serde_json::from_str(s)?)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn patient(&self, id: &str) -> Option<&Patient> {
        self.patients.iter().find(|p| p.id == id)
    }

    pub fn patient_mut(&mut self, id: &str) -> Option<&mut Patient> {
        self.patients.iter_mut().find(|p| p.id == id)
    }

    /// Newest `updatedAt` (or tombstone) anywhere in the snapshot.
    pub fn newest_stamp(&self) -> Millis {
        let flat = [
            newest(&self.doctors),
            newest(&self.secretaries),
            newest(&self.memos),
            newest(&self.lab_orders),
            newest(&self.inventory_items),
            newest(&self.expenses),
            newest(&self.supplies),
            newest(&self.medications),
            newest(&self.guest_appointments),
            self.patients.iter().map(Patient::newest_stamp).max(),
            self.deleted.newest(),
        ];
        flat.into_iter().flatten().max().unwrap_or(0)
    }

    /// Number of live records in a collection.
    pub fn count(&self, collection: Collection) -> usize {
        match collection {
            Collection::Patients => self.patients.len(),
            Collection::Doctors => self.doctors.len(),
            Collection::Secretaries => self.secretaries.len(),
            Collection::Memos => self.memos.len(),
            Collection::LabOrders => self.lab_orders.len(),
            Collection::InventoryItems => self.inventory_items.len(),
            Collection::Expenses => self.expenses.len(),
            Collection::Supplies => self.supplies.len(),
            Collection::Medications => self.medications.len(),
            Collection::GuestAppointments => self.guest_appointments.len(),
        }
    }

    /// Drops tombstones (top-level and per patient) older than `before`.
    pub fn prune_tombstones(&mut self, before: Millis) -> usize {
        let nested: usize = self
            .patients
            .iter_mut()
            .map(|p| p.deleted.prune(before))
            .sum();
        nested + self.deleted.prune(before)
    }
}

fn newest<T: Timestamped>(items: &[T]) -> Option<Millis> {
    items.iter().map(Timestamped::updated_at).max()
}
