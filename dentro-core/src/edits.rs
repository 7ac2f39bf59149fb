//! Feature-level updaters run through [`ClinicStore::edit`].
//!
//! Every helper stamps the records it touches and, for nested data, the
//! owning patient. Deletions leave tombstones.
//!
//! [`ClinicStore::edit`]: crate::ClinicStore::edit

use std::str::FromStr;

use chrono::{TimeZone, Utc};
use thiserror::Error;

use crate::models::{
    new_id, remove_by_id, Appointment, ClinicSnapshot, Collection, Memo, Millis, NestedCollection,
    Patient, Payment, PaymentKind, Record, Tooth, ToothPosition, ToothSurfaces,
};

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    #[error("No {collection} record with id {id}")]
    RecordNotFound { collection: &'static str, id: String },

    #[error("Invalid tooth number: {0}")]
    InvalidTooth(u16),

    #[error("Invalid value: {0}")]
    Invalid(String),
}

/// Fields for a new patient.
#[derive(Debug, Clone, Default)]
pub struct PatientDraft {
    pub name: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub notes: Option<String>,
}

/// Profile fields to change; `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct PatientPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub notes: Option<String>,
}

/// Which tooth surface a marking applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceTarget {
    Top,
    Bottom,
    Left,
    Right,
    Center,
    All,
}

impl FromStr for SurfaceTarget {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "center" => Ok(Self::Center),
            "all" => Ok(Self::All),
            other => Err(EditError::Invalid(format!("unknown surface '{}'", other))),
        }
    }
}

/// Appointment fields; `patient_id: None` books a guest.
#[derive(Debug, Clone, Default)]
pub struct AppointmentDraft {
    /// Existing appointment to update instead of creating one.
    pub id: Option<String>,
    pub patient_id: Option<String>,
    pub guest_name: Option<String>,
    pub date: String,
    pub time: Option<String>,
    pub notes: Option<String>,
}

/// ISO-8601 rendering of a millisecond stamp, used for record `date` fields.
pub fn iso_date(at: Millis) -> String {
    Utc.timestamp_millis_opt(at)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

fn patient_mut<'a>(
    snapshot: &'a mut ClinicSnapshot,
    patient_id: &str,
) -> Result<&'a mut Patient, EditError> {
    snapshot
        .patient_mut(patient_id)
        .ok_or_else(|| EditError::PatientNotFound(patient_id.to_string()))
}

fn valid_tooth(position: u16) -> Result<ToothPosition, EditError> {
    // FDI: quadrants 1-4 permanent, 5-8 primary.
    let (quadrant, index) = (position / 10, position % 10);
    let max_index = if quadrant <= 4 { 8 } else { 5 };
    if (1..=8).contains(&quadrant) && (1..=max_index).contains(&index) {
        Ok(ToothPosition(position))
    } else {
        Err(EditError::InvalidTooth(position))
    }
}

/// Runs `update` on the tooth (created healthy if absent) and stamps it.
fn with_tooth<F>(
    snapshot: &mut ClinicSnapshot,
    now: Millis,
    patient_id: &str,
    position: u16,
    update: F,
) -> Result<(), EditError>
where
    F: FnOnce(&mut Tooth),
{
    let position = valid_tooth(position)?;
    let patient = patient_mut(snapshot, patient_id)?;
    let tooth = patient
        .teeth
        .entry(position)
        .or_insert_with(|| Tooth::healthy(position));
    update(tooth);
    tooth.updated_at = now;
    patient.updated_at = now;
    Ok(())
}

pub fn add_patient(
    snapshot: &mut ClinicSnapshot,
    now: Millis,
    draft: PatientDraft,
) -> Result<String, EditError> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(EditError::Invalid("patient name is empty".into()));
    }
    let mut patient = Patient::new(name, now);
    patient.phone = draft.phone;
    patient.gender = draft.gender;
    patient.notes = draft.notes;
    let id = patient.id.clone();
    snapshot.patients.push(patient);
    Ok(id)
}

pub fn update_patient(
    snapshot: &mut ClinicSnapshot,
    now: Millis,
    patient_id: &str,
    patch: PatientPatch,
) -> Result<(), EditError> {
    let patient = patient_mut(snapshot, patient_id)?;
    if let Some(name) = patch.name {
        patient.name = name;
        // Keep the denormalized name on appointments in step.
        for appt in &mut patient.appointments {
            appt.patient_name = patient.name.clone();
            appt.updated_at = now;
        }
    }
    if patch.phone.is_some() {
        patient.phone = patch.phone;
    }
    if patch.gender.is_some() {
        patient.gender = patch.gender;
    }
    if patch.notes.is_some() {
        patient.notes = patch.notes;
    }
    patient.updated_at = now;
    Ok(())
}

pub fn delete_patient(
    snapshot: &mut ClinicSnapshot,
    now: Millis,
    patient_id: &str,
) -> Result<(), EditError> {
    delete_record(snapshot, now, Collection::Patients, patient_id)
}

pub fn set_tooth_status(
    snapshot: &mut ClinicSnapshot,
    now: Millis,
    patient_id: &str,
    position: u16,
    status: &str,
) -> Result<(), EditError> {
    with_tooth(snapshot, now, patient_id, position, |tooth| {
        tooth.status = status.to_string();
    })
}

/// Toggles a surface marking: applying the current marking clears it.
///
/// `All` looks at the center surface to decide and sets all five at once.
pub fn toggle_tooth_surface(
    snapshot: &mut ClinicSnapshot,
    now: Millis,
    patient_id: &str,
    position: u16,
    target: SurfaceTarget,
    marking: &str,
) -> Result<(), EditError> {
    let toggle = |current: &str| {
        if current == marking {
            "none".to_string()
        } else {
            marking.to_string()
        }
    };

    with_tooth(snapshot, now, patient_id, position, |tooth| {
        let surfaces = tooth.surfaces.get_or_insert_with(ToothSurfaces::default);
        match target {
            SurfaceTarget::Top => surfaces.top = toggle(&surfaces.top),
            SurfaceTarget::Bottom => surfaces.bottom = toggle(&surfaces.bottom),
            SurfaceTarget::Left => surfaces.left = toggle(&surfaces.left),
            SurfaceTarget::Right => surfaces.right = toggle(&surfaces.right),
            SurfaceTarget::Center => surfaces.center = toggle(&surfaces.center),
            SurfaceTarget::All => {
                let value = toggle(&surfaces.center);
                *surfaces = ToothSurfaces {
                    top: value.clone(),
                    bottom: value.clone(),
                    left: value.clone(),
                    right: value.clone(),
                    center: value,
                };
            }
        }
    })
}

pub fn set_tooth_note(
    snapshot: &mut ClinicSnapshot,
    now: Millis,
    patient_id: &str,
    position: u16,
    text: &str,
) -> Result<(), EditError> {
    with_tooth(snapshot, now, patient_id, position, |tooth| {
        let mut note = tooth.special_note.take().unwrap_or_default();
        note.text = text.to_string();
        note.updated_at = now;
        tooth.special_note = Some(note);
    })
}

/// Records a payment or charge; newest first.
pub fn add_payment(
    snapshot: &mut ClinicSnapshot,
    now: Millis,
    patient_id: &str,
    amount: f64,
    kind: PaymentKind,
    description: &str,
) -> Result<String, EditError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(EditError::Invalid(format!("amount must be positive, got {}", amount)));
    }
    let patient = patient_mut(snapshot, patient_id)?;
    let payment = Payment {
        id: new_id(),
        date: iso_date(now),
        amount,
        kind,
        description: description.to_string(),
        updated_at: now,
        ..Default::default()
    };
    let id = payment.id.clone();
    patient.payments.insert(0, payment);
    patient.updated_at = now;
    Ok(id)
}

/// Creates or updates an appointment, for a patient or a guest.
pub fn save_appointment(
    snapshot: &mut ClinicSnapshot,
    now: Millis,
    draft: AppointmentDraft,
) -> Result<String, EditError> {
    let apply = |appt: &mut Appointment| {
        appt.date = draft.date.clone();
        if draft.time.is_some() {
            appt.time = draft.time.clone();
        }
        if draft.notes.is_some() {
            appt.notes = draft.notes.clone();
        }
        appt.updated_at = now;
    };

    let Some(patient_id) = draft.patient_id.as_deref() else {
        let guests = &mut snapshot.guest_appointments;
        return match draft.id.as_deref() {
            Some(id) => {
                let appt = guests.iter_mut().find(|a| a.id == id).ok_or_else(|| {
                    EditError::RecordNotFound {
                        collection: Collection::GuestAppointments.name(),
                        id: id.to_string(),
                    }
                })?;
                apply(appt);
                if let Some(name) = &draft.guest_name {
                    appt.patient_name = name.clone();
                }
                Ok(id.to_string())
            }
            None => {
                let mut appt = Appointment::scheduled(draft.date.clone(), now);
                apply(&mut appt);
                appt.patient_name = draft.guest_name.clone().unwrap_or_else(|| "Guest".into());
                let id = appt.id.clone();
                guests.push(appt);
                Ok(id)
            }
        };
    };

    let patient = patient_mut(snapshot, patient_id)?;
    let id = match draft.id.as_deref() {
        Some(id) => {
            let appt = patient
                .appointment_mut(id)
                .ok_or_else(|| EditError::RecordNotFound {
                    collection: NestedCollection::Appointments.name(),
                    id: id.to_string(),
                })?;
            apply(appt);
            id.to_string()
        }
        None => {
            let mut appt = Appointment::scheduled(draft.date.clone(), now);
            apply(&mut appt);
            appt.patient_id = patient.id.clone();
            appt.patient_name = patient.name.clone();
            let id = appt.id.clone();
            patient.appointments.push(appt);
            id
        }
    };
    patient.updated_at = now;
    Ok(id)
}

/// Sets an appointment's status, looking in patients first, then guests.
pub fn set_appointment_status(
    snapshot: &mut ClinicSnapshot,
    now: Millis,
    appointment_id: &str,
    status: &str,
) -> Result<(), EditError> {
    for patient in &mut snapshot.patients {
        if let Some(appt) = patient.appointment_mut(appointment_id) {
            appt.status = status.to_string();
            appt.updated_at = now;
            patient.updated_at = now;
            return Ok(());
        }
    }
    let appt = snapshot
        .guest_appointments
        .iter_mut()
        .find(|a| a.id == appointment_id)
        .ok_or_else(|| EditError::RecordNotFound {
            collection: "appointments",
            id: appointment_id.to_string(),
        })?;
    appt.status = status.to_string();
    appt.updated_at = now;
    Ok(())
}

/// Creates a memo (newest first) or rewrites an existing one.
pub fn save_memo(
    snapshot: &mut ClinicSnapshot,
    now: Millis,
    id: Option<&str>,
    title: &str,
    content: &str,
    color: Option<String>,
) -> Result<String, EditError> {
    match id {
        Some(id) => {
            let memo = snapshot
                .memos
                .iter_mut()
                .find(|m| m.id == id)
                .ok_or_else(|| EditError::RecordNotFound {
                    collection: Collection::Memos.name(),
                    id: id.to_string(),
                })?;
            memo.title = title.to_string();
            memo.content = content.to_string();
            if color.is_some() {
                memo.color = color;
            }
            memo.updated_at = now;
            Ok(id.to_string())
        }
        None => {
            let mut memo = Memo::new(title, content, now);
            memo.color = color;
            let id = memo.id.clone();
            snapshot.memos.insert(0, memo);
            Ok(id)
        }
    }
}

/// Removes a top-level record and records its tombstone.
pub fn delete_record(
    snapshot: &mut ClinicSnapshot,
    now: Millis,
    collection: Collection,
    id: &str,
) -> Result<(), EditError> {
    let removed = match collection {
        Collection::Patients => remove_by_id(&mut snapshot.patients, id),
        Collection::Doctors => remove_by_id(&mut snapshot.doctors, id),
        Collection::Secretaries => remove_by_id(&mut snapshot.secretaries, id),
        Collection::Memos => remove_by_id(&mut snapshot.memos, id),
        Collection::LabOrders => remove_by_id(&mut snapshot.lab_orders, id),
        Collection::InventoryItems => remove_by_id(&mut snapshot.inventory_items, id),
        Collection::Expenses => remove_by_id(&mut snapshot.expenses, id),
        Collection::Supplies => remove_by_id(&mut snapshot.supplies, id),
        Collection::Medications => remove_by_id(&mut snapshot.medications, id),
        Collection::GuestAppointments => remove_by_id(&mut snapshot.guest_appointments, id),
    };
    if !removed {
        return Err(EditError::RecordNotFound {
            collection: collection.name(),
            id: id.to_string(),
        });
    }
    snapshot.deleted.record(collection.name(), id, now);
    Ok(())
}

/// Removes a record owned by a patient and records its tombstone.
pub fn delete_nested(
    snapshot: &mut ClinicSnapshot,
    now: Millis,
    patient_id: &str,
    collection: NestedCollection,
    id: &str,
) -> Result<(), EditError> {
    let patient = patient_mut(snapshot, patient_id)?;
    if !patient.remove_nested(collection, id, now) {
        return Err(EditError::RecordNotFound {
            collection: collection.name(),
            id: id.to_string(),
        });
    }
    patient.updated_at = now;
    Ok(())
}

/// Inserts or replaces a flat record by id, stamping it.
pub fn upsert<T: Record>(items: &mut Vec<T>, now: Millis, mut record: T) {
    record.touch(now);
    match items.iter_mut().find(|r| r.id() == record.id()) {
        Some(slot) => *slot = record,
        None => items.push(record),
    }
}
