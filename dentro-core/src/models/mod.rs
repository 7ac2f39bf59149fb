mod clinic;
pub mod lenient;
mod patient;
mod record;
mod snapshot;

pub use clinic::{Doctor, Expense, InventoryItem, LabOrder, Medication, Memo, Secretary, Supply};
pub use patient::{
    Appointment, Patient, PatientImage, Payment, PaymentKind, Prescription, RootCanal, Tooth,
    ToothNote, ToothPosition, ToothSurfaces,
};
pub(crate) use patient::remove_by_id;
pub use record::{
    new_id, now_millis, Collection, Millis, NestedCollection, Record, Timestamped, Tombstones,
};
pub use snapshot::{ClinicSnapshot, Settings};
