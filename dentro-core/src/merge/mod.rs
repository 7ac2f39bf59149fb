//! Granular merge of two clinic snapshots.
//!
//! Resolution happens per record rather than per snapshot:
//!
//! 1. `clinicName` comes from the side with the greater `lastUpdated`.
//! 2. `settings` merge as a flat map; on keys present on both sides the
//!    side with the greater `lastUpdated` wins.
//! 3. Every collection is an id-union. A record on one side only is kept;
//!    a record on both sides resolves by `updatedAt`. Patients recurse one
//!    level into their teeth and nested collections.
//! 4. `lastUpdated` becomes the max of both sides.
//!
//! Exact ties go to the local side unless [`TieBreak::ContentDigest`] is
//! selected. The merge is pure and never fails.
//!
//! A record removed on one side without a tombstone is indistinguishable
//! from one the other side has not seen yet, so the union brings it back.

mod records;

pub use records::{content_digest, merge_by_id, merge_map, newer_side, pick_newer, Side};

use serde::{Deserialize, Serialize};

use crate::models::{
    ClinicSnapshot, Collection, NestedCollection, Patient, Settings, Timestamped, Tombstones,
};
use records::settle_tie;

/// How an exact `updatedAt` tie is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The local replica's version wins.
    #[default]
    PreferLocal,
    /// The version with the greater SHA-256 content digest wins, so every
    /// device resolves the tie the same way.
    ContentDigest,
}

impl std::str::FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "prefer_local" | "local" => Ok(TieBreak::PreferLocal),
            "content_digest" | "content_hash" | "digest" => Ok(TieBreak::ContentDigest),
            other => Err(format!("unknown tie break: {}", other)),
        }
    }
}

/// Merges two snapshots with the default (local-wins) tie break.
pub fn merge(local: &ClinicSnapshot, remote: &ClinicSnapshot) -> ClinicSnapshot {
    merge_with(local, remote, TieBreak::PreferLocal)
}

/// Merges two snapshots with an explicit tie break.
pub fn merge_with(
    local: &ClinicSnapshot,
    remote: &ClinicSnapshot,
    tie_break: TieBreak,
) -> ClinicSnapshot {
    let root_winner = root_side(local, remote, tie_break);
    let (newer, older) = match root_winner {
        Side::Local => (local, remote),
        Side::Remote => (remote, local),
    };

    let deleted = local.deleted.union(&remote.deleted);

    ClinicSnapshot {
        clinic_name: newer.clinic_name.clone(),
        settings: merge_settings(&newer.settings, &older.settings),
        last_updated: local.last_updated.max(remote.last_updated),
        patients: merge_by_id(
            &local.patients,
            &remote.patients,
            deleted.of(Collection::Patients.name()),
            |l, r| merge_patient(l, r, tie_break),
        ),
        doctors: merge_by_id(
            &local.doctors,
            &remote.doctors,
            deleted.of(Collection::Doctors.name()),
            newest_wins(tie_break),
        ),
        secretaries: merge_by_id(
            &local.secretaries,
            &remote.secretaries,
            deleted.of(Collection::Secretaries.name()),
            newest_wins(tie_break),
        ),
        memos: merge_by_id(
            &local.memos,
            &remote.memos,
            deleted.of(Collection::Memos.name()),
            newest_wins(tie_break),
        ),
        lab_orders: merge_by_id(
            &local.lab_orders,
            &remote.lab_orders,
            deleted.of(Collection::LabOrders.name()),
            newest_wins(tie_break),
        ),
        inventory_items: merge_by_id(
            &local.inventory_items,
            &remote.inventory_items,
            deleted.of(Collection::InventoryItems.name()),
            newest_wins(tie_break),
        ),
        expenses: merge_by_id(
            &local.expenses,
            &remote.expenses,
            deleted.of(Collection::Expenses.name()),
            newest_wins(tie_break),
        ),
        supplies: merge_by_id(
            &local.supplies,
            &remote.supplies,
            deleted.of(Collection::Supplies.name()),
            newest_wins(tie_break),
        ),
        medications: merge_by_id(
            &local.medications,
            &remote.medications,
            deleted.of(Collection::Medications.name()),
            newest_wins(tie_break),
        ),
        guest_appointments: merge_by_id(
            &local.guest_appointments,
            &remote.guest_appointments,
            deleted.of(Collection::GuestAppointments.name()),
            newest_wins(tie_break),
        ),
        deleted,
    }
}

fn newest_wins<T>(tie_break: TieBreak) -> impl FnMut(&T, &T) -> T
where
    T: Timestamped + Serialize + Clone,
{
    move |l: &T, r: &T| pick_newer(l, r, tie_break)
}

/// Side whose root scalars (`clinicName`, contested settings) win.
fn root_side(local: &ClinicSnapshot, remote: &ClinicSnapshot, tie_break: TieBreak) -> Side {
    match local.last_updated.cmp(&remote.last_updated) {
        std::cmp::Ordering::Greater => Side::Local,
        std::cmp::Ordering::Less => Side::Remote,
        std::cmp::Ordering::Equal => settle_tie(
            &(&local.clinic_name, &local.settings),
            &(&remote.clinic_name, &remote.settings),
            tie_break,
        ),
    }
}

/// Union of keys; the newer side's value wins on shared keys.
fn merge_settings(newer: &Settings, older: &Settings) -> Settings {
    let mut merged = older.clone();
    for (key, value) in newer {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Merges two versions of the same patient.
///
/// Profile fields come from the newer version; teeth and nested
/// collections merge record by record.
pub fn merge_patient(local: &Patient, remote: &Patient, tie_break: TieBreak) -> Patient {
    let base = match newer_side(local, remote, tie_break) {
        Side::Local => local,
        Side::Remote => remote,
    };
    let deleted: Tombstones = local.deleted.union(&remote.deleted);

    Patient {
        teeth: merge_map(&local.teeth, &remote.teeth, tie_break),
        appointments: merge_by_id(
            &local.appointments,
            &remote.appointments,
            deleted.of(NestedCollection::Appointments.name()),
            newest_wins(tie_break),
        ),
        payments: merge_by_id(
            &local.payments,
            &remote.payments,
            deleted.of(NestedCollection::Payments.name()),
            newest_wins(tie_break),
        ),
        root_canals: merge_by_id(
            &local.root_canals,
            &remote.root_canals,
            deleted.of(NestedCollection::RootCanals.name()),
            newest_wins(tie_break),
        ),
        prescriptions: merge_by_id(
            &local.prescriptions,
            &remote.prescriptions,
            deleted.of(NestedCollection::Prescriptions.name()),
            newest_wins(tie_break),
        ),
        images: merge_by_id(
            &local.images,
            &remote.images,
            deleted.of(NestedCollection::Images.name()),
            newest_wins(tie_break),
        ),
        updated_at: local.updated_at.max(remote.updated_at),
        deleted,
        ..base.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Appointment, Doctor, Memo, Tooth, ToothPosition};
    use serde_json::json;

    fn patient(id: &str, name: &str, at: i64) -> Patient {
        Patient {
            id: id.into(),
            name: name.into(),
            updated_at: at,
            ..Default::default()
        }
    }

    fn snapshot(last_updated: i64, patients: Vec<Patient>) -> ClinicSnapshot {
        ClinicSnapshot {
            clinic_name: "Smile".into(),
            last_updated,
            patients,
            ..Default::default()
        }
    }

    fn appointment(id: &str, status: &str, at: i64) -> Appointment {
        Appointment {
            id: id.into(),
            patient_id: "p1".into(),
            status: status.into(),
            updated_at: at,
            ..Default::default()
        }
    }

    #[test]
    fn test_newer_remote_patient_wins() {
        let local = snapshot(100, vec![patient("p1", "Ali", 100)]);
        let remote = snapshot(200, vec![patient("p1", "Ali Hassan", 200)]);

        let merged = merge(&local, &remote);
        assert_eq!(merged.patient("p1").unwrap().name, "Ali Hassan");
    }

    #[test]
    fn test_local_only_patient_kept_unchanged() {
        let p2 = patient("p2", "Sara", 150);
        let local = snapshot(150, vec![p2.clone()]);
        let remote = snapshot(100, vec![]);

        let merged = merge(&local, &remote);
        assert_eq!(merged.patient("p2"), Some(&p2));
    }

    /// Deleting without a tombstone does not survive a merge against a
    /// stale replica: the record comes back. This pins current behaviour;
    /// deletions that must stick go through the tombstone path.
    #[test]
    fn test_untombstoned_deletion_is_resurrected() {
        let local = snapshot(300, vec![]);
        let remote = snapshot(50, vec![patient("p3", "Omar", 50)]);

        let merged = merge(&local, &remote);
        assert!(merged.patient("p3").is_some());
    }

    #[test]
    fn test_tombstoned_deletion_survives() {
        let mut local = snapshot(300, vec![]);
        local.deleted.record("patients", "p3", 300);
        let remote = snapshot(50, vec![patient("p3", "Omar", 50)]);

        let merged = merge(&local, &remote);
        assert!(merged.patient("p3").is_none());
        assert_eq!(merged.deleted.deleted_at("patients", "p3"), Some(300));

        // And the other direction, when the remote did the deleting.
        let merged = merge(&remote, &local);
        assert!(merged.patient("p3").is_none());
    }

    #[test]
    fn test_edit_after_tombstone_wins() {
        let mut local = snapshot(300, vec![]);
        local.deleted.record("patients", "p3", 300);
        let remote = snapshot(400, vec![patient("p3", "Omar", 400)]);

        let merged = merge(&local, &remote);
        assert_eq!(merged.patient("p3").unwrap().updated_at, 400);
    }

    #[test]
    fn test_nested_appointment_newer_wins() {
        let mut lp = patient("p1", "Ali", 10);
        lp.appointments.push(appointment("a1", "scheduled", 10));
        let mut rp = patient("p1", "Ali", 20);
        rp.appointments.push(appointment("a1", "completed", 20));

        let merged = merge(&snapshot(10, vec![lp]), &snapshot(20, vec![rp]));
        let p = merged.patient("p1").unwrap();
        assert_eq!(p.appointments.len(), 1);
        assert_eq!(p.appointments[0].status, "completed");
    }

    #[test]
    fn test_nested_collections_union_even_when_profile_loses() {
        // The remote profile is newer, but the local side added a payment.
        let mut lp = patient("p1", "Ali", 100);
        lp.appointments.push(appointment("a-local", "scheduled", 100));
        let mut rp = patient("p1", "Ali H", 200);
        rp.appointments.push(appointment("a-remote", "scheduled", 200));

        let merged = merge(&snapshot(100, vec![lp]), &snapshot(200, vec![rp]));
        let p = merged.patient("p1").unwrap();
        assert_eq!(p.name, "Ali H");
        assert_eq!(p.appointments.len(), 2);
        assert_eq!(p.updated_at, 200);
    }

    #[test]
    fn test_teeth_merge_per_position() {
        let mut lp = patient("p1", "Ali", 100);
        lp.teeth.insert(
            ToothPosition(11),
            Tooth {
                id: 11,
                status: "caries".into(),
                updated_at: 100,
                ..Default::default()
            },
        );
        lp.teeth.insert(
            ToothPosition(12),
            Tooth {
                id: 12,
                status: "filled".into(),
                updated_at: 30,
                ..Default::default()
            },
        );
        let mut rp = patient("p1", "Ali", 90);
        rp.teeth.insert(
            ToothPosition(12),
            Tooth {
                id: 12,
                status: "crown".into(),
                updated_at: 90,
                ..Default::default()
            },
        );

        let merged = merge(&snapshot(100, vec![lp]), &snapshot(90, vec![rp]));
        let p = merged.patient("p1").unwrap();
        assert_eq!(p.teeth[&ToothPosition(11)].status, "caries");
        assert_eq!(p.teeth[&ToothPosition(12)].status, "crown");
    }

    #[test]
    fn test_settings_flat_map_merge() {
        let mut local = snapshot(100, vec![]);
        local.settings.insert("currency".into(), json!("IQD"));
        local.settings.insert("localOnly".into(), json!(true));
        let mut remote = snapshot(200, vec![]);
        remote.settings.insert("currency".into(), json!("USD"));
        remote.settings.insert("remoteOnly".into(), json!(1));
        remote.clinic_name = "Smile Center".into();

        let merged = merge(&local, &remote);
        assert_eq!(merged.settings["currency"], json!("USD"));
        assert_eq!(merged.settings["localOnly"], json!(true));
        assert_eq!(merged.settings["remoteOnly"], json!(1));
        assert_eq!(merged.clinic_name, "Smile Center");
        assert_eq!(merged.last_updated, 200);
    }

    #[test]
    fn test_tie_prefers_local_for_every_collection() {
        let mut local = snapshot(50, vec![patient("p1", "Local", 50)]);
        local.doctors.push(Doctor {
            id: "d1".into(),
            name: "Dr Local".into(),
            updated_at: 5,
            ..Default::default()
        });
        let mut remote = snapshot(50, vec![patient("p1", "Remote", 50)]);
        remote.doctors.push(Doctor {
            id: "d1".into(),
            name: "Dr Remote".into(),
            updated_at: 5,
            ..Default::default()
        });
        remote.clinic_name = "Other".into();

        for _ in 0..3 {
            let merged = merge(&local, &remote);
            assert_eq!(merged.patient("p1").unwrap().name, "Local");
            assert_eq!(merged.doctors[0].name, "Dr Local");
            assert_eq!(merged.clinic_name, "Smile");
        }
    }

    #[test]
    fn test_content_digest_converges_from_both_devices() {
        let mut a = snapshot(50, vec![patient("p1", "Device A", 50)]);
        a.memos.push(Memo {
            id: "m1".into(),
            title: "a".into(),
            updated_at: 9,
            ..Default::default()
        });
        let mut b = snapshot(50, vec![patient("p1", "Device B", 50)]);
        b.memos.push(Memo {
            id: "m1".into(),
            title: "b".into(),
            updated_at: 9,
            ..Default::default()
        });

        let on_a = merge_with(&a, &b, TieBreak::ContentDigest);
        let on_b = merge_with(&b, &a, TieBreak::ContentDigest);
        assert_eq!(on_a.patients, on_b.patients);
        assert_eq!(on_a.memos, on_b.memos);
    }

    #[test]
    fn test_last_updated_is_max() {
        let merged = merge(&snapshot(10, vec![]), &snapshot(99, vec![]));
        assert_eq!(merged.last_updated, 99);
        let merged = merge(&snapshot(99, vec![]), &snapshot(10, vec![]));
        assert_eq!(merged.last_updated, 99);
    }

    #[test]
    fn test_merge_with_self_is_identity() {
        let mut lp = patient("p1", "Ali", 10);
        lp.appointments.push(appointment("a1", "scheduled", 10));
        let mut x = snapshot(10, vec![lp]);
        x.settings.insert("currency".into(), json!("IQD"));

        assert_eq!(merge(&x, &x), x);
    }

    #[test]
    fn test_tie_break_from_str() {
        assert_eq!("local".parse::<TieBreak>(), Ok(TieBreak::PreferLocal));
        assert_eq!(
            "content-digest".parse::<TieBreak>(),
            Ok(TieBreak::ContentDigest)
        );
        assert!("random".parse::<TieBreak>().is_err());
    }
}
