//! Patient records and everything a patient owns.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use super::lenient;
use super::record::{impl_record, new_id, Millis, NestedCollection, Record, Timestamped};
use super::Tombstones;

/// A patient and the clinical history they own.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Patient {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub notes: Option<String>,
    #[serde(deserialize_with = "lenient::keyed")]
    pub teeth: BTreeMap<ToothPosition, Tooth>,
    #[serde(deserialize_with = "lenient::records")]
    pub appointments: Vec<Appointment>,
    #[serde(deserialize_with = "lenient::records")]
    pub payments: Vec<Payment>,
    #[serde(deserialize_with = "lenient::records")]
    pub root_canals: Vec<RootCanal>,
    #[serde(deserialize_with = "lenient::records")]
    pub prescriptions: Vec<Prescription>,
    #[serde(deserialize_with = "lenient::records")]
    pub images: Vec<PatientImage>,
    #[serde(deserialize_with = "lenient::millis")]
    pub updated_at: Millis,
    /// Deleted nested records, keyed by nested collection name.
    #[serde(skip_serializing_if = "Tombstones::is_empty", deserialize_with = "lenient::or_default")]
    pub deleted: Tombstones,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Patient {
    pub fn new(name: impl Into<String>, now: Millis) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            updated_at: now,
            ..Default::default()
        }
    }

    /// Newest stamp anywhere inside this patient, including tombstones.
    pub fn newest_stamp(&self) -> Millis {
        let nested = [
            newest(&self.appointments),
            newest(&self.payments),
            newest(&self.root_canals),
            newest(&self.prescriptions),
            newest(&self.images),
            self.teeth.values().map(Timestamped::updated_at).max(),
            self.deleted.newest(),
        ];
        nested
            .into_iter()
            .flatten()
            .fold(self.updated_at, Millis::max)
    }

    /// Net balance: charges minus payments.
    pub fn balance(&self) -> f64 {
        self.payments.iter().fold(0.0, |acc, p| match p.kind {
            PaymentKind::Charge => acc + p.amount,
            PaymentKind::Payment => acc - p.amount,
        })
    }

    pub fn appointment_mut(&mut self, id: &str) -> Option<&mut Appointment> {
        self.appointments.iter_mut().find(|a| a.id == id)
    }

    /// Removes a nested record and leaves a tombstone. Returns false if absent.
    pub fn remove_nested(&mut self, collection: NestedCollection, id: &str, at: Millis) -> bool {
        let removed = match collection {
            NestedCollection::Appointments => remove_by_id(&mut self.appointments, id),
            NestedCollection::Payments => remove_by_id(&mut self.payments, id),
            NestedCollection::RootCanals => remove_by_id(&mut self.root_canals, id),
            NestedCollection::Prescriptions => remove_by_id(&mut self.prescriptions, id),
            NestedCollection::Images => remove_by_id(&mut self.images, id),
        };
        if removed {
            self.deleted.record(collection.name(), id, at);
        }
        removed
    }
}

fn newest<T: Timestamped>(items: &[T]) -> Option<Millis> {
    items.iter().map(Timestamped::updated_at).max()
}

pub(crate) fn remove_by_id<T: Record>(items: &mut Vec<T>, id: &str) -> bool {
    let len = items.len();
    items.retain(|item| item.id() != id);
    items.len() != len
}

/// FDI tooth number used as the key of [`Patient::teeth`].
///
/// Encoded as a JSON object key, so it decodes from both `"11"` and `11`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToothPosition(pub u16);

impl Serialize for ToothPosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.0)
    }
}

impl<'de> Deserialize<'de> for ToothPosition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PositionVisitor;

        impl<'de> Visitor<'de> for PositionVisitor {
            type Value = ToothPosition;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a tooth number")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ToothPosition, E> {
                u16::try_from(v)
                    .map(ToothPosition)
                    .map_err(|_| E::custom(format!("tooth number out of range: {}", v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ToothPosition, E> {
                u16::try_from(v)
                    .map(ToothPosition)
                    .map_err(|_| E::custom(format!("tooth number out of range: {}", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ToothPosition, E> {
                v.trim()
                    .parse::<u16>()
                    .map(ToothPosition)
                    .map_err(|_| E::custom(format!("invalid tooth number: {}", v)))
            }
        }

        deserializer.deserialize_any(PositionVisitor)
    }
}

impl fmt::Display for ToothPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tooth {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: u16,
    #[serde(deserialize_with = "lenient::text")]
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub surfaces: Option<ToothSurfaces>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub special_note: Option<ToothNote>,
    #[serde(deserialize_with = "lenient::millis")]
    pub updated_at: Millis,
}

impl Default for Tooth {
    fn default() -> Self {
        Self {
            id: 0,
            status: "healthy".to_string(),
            surfaces: None,
            special_note: None,
            updated_at: 0,
        }
    }
}

impl Tooth {
    pub fn healthy(position: ToothPosition) -> Self {
        Self {
            id: position.0,
            ..Default::default()
        }
    }
}

impl Timestamped for Tooth {
    fn updated_at(&self) -> Millis {
        self.updated_at
    }

    fn touch(&mut self, at: Millis) {
        self.updated_at = at;
    }
}

/// Per-surface marking; `"none"` means unmarked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToothSurfaces {
    #[serde(deserialize_with = "lenient::text")]
    pub top: String,
    #[serde(deserialize_with = "lenient::text")]
    pub bottom: String,
    #[serde(deserialize_with = "lenient::text")]
    pub left: String,
    #[serde(deserialize_with = "lenient::text")]
    pub right: String,
    #[serde(deserialize_with = "lenient::text")]
    pub center: String,
}

impl Default for ToothSurfaces {
    fn default() -> Self {
        let none = || "none".to_string();
        Self {
            top: none(),
            bottom: none(),
            left: none(),
            right: none(),
            center: none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToothNote {
    #[serde(deserialize_with = "lenient::text")]
    pub text: String,
    #[serde(deserialize_with = "lenient::millis")]
    pub updated_at: Millis,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Appointment {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    /// Back-reference to the owning patient; empty for guest appointments.
    #[serde(deserialize_with = "lenient::text")]
    pub patient_id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub patient_name: String,
    #[serde(deserialize_with = "lenient::text")]
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub time: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub notes: Option<String>,
    #[serde(deserialize_with = "lenient::millis")]
    pub updated_at: Millis,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Appointment {
    pub const SCHEDULED: &'static str = "scheduled";

    pub fn scheduled(date: impl Into<String>, now: Millis) -> Self {
        Self {
            id: new_id(),
            date: date.into(),
            status: Self::SCHEDULED.to_string(),
            updated_at: now,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    #[default]
    Payment,
    Charge,
}

/// Anything other than `"charge"` is a payment.
impl<'de> Deserialize<'de> for PaymentKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kind = match Value::deserialize(deserializer)? {
            Value::String(s) if s.trim().eq_ignore_ascii_case("charge") => PaymentKind::Charge,
            _ => PaymentKind::Payment,
        };
        Ok(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Payment {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub date: String,
    #[serde(deserialize_with = "lenient::number")]
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: PaymentKind,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::millis")]
    pub updated_at: Millis,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RootCanal {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub tooth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub notes: Option<String>,
    #[serde(deserialize_with = "lenient::millis")]
    pub updated_at: Millis,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Prescription {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub date: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub medications: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub notes: Option<String>,
    #[serde(deserialize_with = "lenient::millis")]
    pub updated_at: Millis,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientImage {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub caption: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub date: String,
    #[serde(deserialize_with = "lenient::millis")]
    pub updated_at: Millis,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_record!(
    Patient,
    Appointment,
    Payment,
    RootCanal,
    Prescription,
    PatientImage,
);
