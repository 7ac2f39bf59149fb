use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Epoch milliseconds, the unit of every `updatedAt`/`lastUpdated` field.
pub type Millis = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> Millis {
    chrono::Utc::now().timestamp_millis()
}

/// Generates a fresh, never-reused record identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Anything carrying its own last-modified stamp.
pub trait Timestamped {
    fn updated_at(&self) -> Millis;
    fn touch(&mut self, at: Millis);
}

/// One element of a named collection.
pub trait Record: Timestamped + Clone {
    fn id(&self) -> &str;
}

/// Implements [`Record`] for structs with `id: String` and `updated_at: Millis`.
macro_rules! impl_record {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::models::Timestamped for $ty {
                fn updated_at(&self) -> $crate::models::Millis {
                    self.updated_at
                }

                fn touch(&mut self, at: $crate::models::Millis) {
                    self.updated_at = at;
                }
            }

            impl $crate::models::Record for $ty {
                fn id(&self) -> &str {
                    &self.id
                }
            }
        )+
    };
}
pub(crate) use impl_record;

/// Top-level collections of a [`ClinicSnapshot`](super::ClinicSnapshot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Patients,
    Doctors,
    Secretaries,
    Memos,
    LabOrders,
    InventoryItems,
    Expenses,
    Supplies,
    Medications,
    GuestAppointments,
}

impl Collection {
    pub const ALL: [Collection; 10] = [
        Collection::Patients,
        Collection::Doctors,
        Collection::Secretaries,
        Collection::Memos,
        Collection::LabOrders,
        Collection::InventoryItems,
        Collection::Expenses,
        Collection::Supplies,
        Collection::Medications,
        Collection::GuestAppointments,
    ];

    /// Wire name, as used for the snapshot field and tombstone key.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Patients => "patients",
            Collection::Doctors => "doctors",
            Collection::Secretaries => "secretaries",
            Collection::Memos => "memos",
            Collection::LabOrders => "labOrders",
            Collection::InventoryItems => "inventoryItems",
            Collection::Expenses => "expenses",
            Collection::Supplies => "supplies",
            Collection::Medications => "medications",
            Collection::GuestAppointments => "guestAppointments",
        }
    }

    /// Parse from a wire name (case-insensitive, dashes and underscores ignored).
    pub fn parse(s: &str) -> Option<Self> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.name().to_lowercase() == wanted)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Collections owned by a single patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NestedCollection {
    Appointments,
    Payments,
    RootCanals,
    Prescriptions,
    Images,
}

impl NestedCollection {
    pub fn name(&self) -> &'static str {
        match self {
            NestedCollection::Appointments => "appointments",
            NestedCollection::Payments => "payments",
            NestedCollection::RootCanals => "rootCanals",
            NestedCollection::Prescriptions => "prescriptions",
            NestedCollection::Images => "images",
        }
    }
}

/// Deletion markers: collection name -> record id -> `deletedAt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tombstones(BTreeMap<String, BTreeMap<String, Millis>>);

impl Tombstones {
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    /// Records a deletion, keeping the latest `deletedAt` for the id.
    pub fn record(&mut self, collection: &str, id: &str, at: Millis) {
        let slot = self
            .0
            .entry(collection.to_string())
            .or_default()
            .entry(id.to_string())
            .or_insert(at);
        *slot = (*slot).max(at);
    }

    pub fn deleted_at(&self, collection: &str, id: &str) -> Option<Millis> {
        self.0.get(collection).and_then(|ids| ids.get(id)).copied()
    }

    /// All tombstones of one collection.
    pub fn of(&self, collection: &str) -> Option<&BTreeMap<String, Millis>> {
        self.0.get(collection)
    }

    /// Union of both sides, max `deletedAt` per id.
    pub fn union(&self, other: &Tombstones) -> Tombstones {
        let mut merged = self.clone();
        for (collection, ids) in &other.0 {
            for (id, at) in ids {
                merged.record(collection, id, *at);
            }
        }
        merged
    }

    /// Drops tombstones older than `before`. Returns how many were removed.
    ///
    /// Only safe once every replica has merged past `before`.
    pub fn prune(&mut self, before: Millis) -> usize {
        let mut removed = 0;
        for ids in self.0.values_mut() {
            let len = ids.len();
            ids.retain(|_, at| *at >= before);
            removed += len - ids.len();
        }
        self.0.retain(|_, ids| !ids.is_empty());
        removed
    }

    pub fn newest(&self) -> Option<Millis> {
        self.0.values().flat_map(|ids| ids.values()).copied().max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_parse() {
        assert_eq!(Collection::parse("patients"), Some(Collection::Patients));
        assert_eq!(Collection::parse("lab-orders"), Some(Collection::LabOrders));
        assert_eq!(Collection::parse("InventoryItems"), Some(Collection::InventoryItems));
        assert_eq!(Collection::parse("guest_appointments"), Some(Collection::GuestAppointments));
        assert_eq!(Collection::parse("invoices"), None);
    }

    #[test]
    fn test_tombstone_record_keeps_latest() {
        let mut t = Tombstones::default();
        t.record("patients", "p1", 200);
        t.record("patients", "p1", 100);
        assert_eq!(t.deleted_at("patients", "p1"), Some(200));
    }

    #[test]
    fn test_tombstone_union_and_prune() {
        let mut a = Tombstones::default();
        a.record("patients", "p1", 100);
        let mut b = Tombstones::default();
        b.record("patients", "p1", 300);
        b.record("memos", "m1", 50);

        let mut merged = a.union(&b);
        assert_eq!(merged.deleted_at("patients", "p1"), Some(300));
        assert_eq!(merged.deleted_at("memos", "m1"), Some(50));

        assert_eq!(merged.prune(100), 1);
        assert!(merged.of("memos").is_none());
        assert!(!merged.is_empty());
    }
}
