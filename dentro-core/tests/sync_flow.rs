use std::sync::Arc;
use std::time::Duration;

use dentro_core::edits::{self, PatientDraft};
use dentro_core::models::ClinicSnapshot;
use dentro_core::{
    ClinicStore, DeviceOverrides, MemoryLocalStore, MemoryRemoteStore, SyncOrchestrator,
    SyncOutcome, SyncSettings, SyncStatus, Trigger,
};
use serde_json::json;

type Device = SyncOrchestrator<MemoryLocalStore, MemoryRemoteStore>;

fn device(remote: &MemoryRemoteStore) -> Device {
    let store = ClinicStore::open(MemoryLocalStore::new(), DeviceOverrides::default()).unwrap();
    SyncOrchestrator::new(Arc::new(store), remote.clone(), SyncSettings::default())
}

fn add_patient(device: &Device, name: &str) -> String {
    device
        .store()
        .edit(|s, now| {
            edits::add_patient(
                s,
                now,
                PatientDraft {
                    name: name.into(),
                    ..Default::default()
                },
            )
        })
        .unwrap()
        .0
}

fn patient_names(snapshot: &ClinicSnapshot) -> Vec<String> {
    let mut names: Vec<String> = snapshot.patients.iter().map(|p| p.name.clone()).collect();
    names.sort();
    names
}

async fn manual(device: &Device) -> SyncOutcome {
    device.sync_now(Trigger::Manual { force: true }).await
}

#[tokio::test(start_paused = true)]
async fn burst_of_edits_triggers_one_round() {
    let remote = MemoryRemoteStore::new();
    let device = device(&remote);
    let auto = device.spawn_auto_sync();

    for name in ["Ali", "Sara", "Omar"] {
        add_patient(&device, name);
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    assert_eq!(remote.load_count(), 0);

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(remote.load_count(), 1);
    assert_eq!(remote.save_count(), 1);
    assert_eq!(patient_names(&remote.snapshot().unwrap()).len(), 3);
    assert_eq!(device.status(), SyncStatus::Synced);

    device.shutdown();
    auto.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn edit_during_round_survives_landing() {
    let remote = MemoryRemoteStore::new();
    let cloud = device(&remote);
    add_patient(&cloud, "Cloud");
    assert!(manual(&cloud).await.is_synced());

    let device = device(&remote);
    remote.set_delay(Some(Duration::from_secs(5)));

    let round = tokio::spawn({
        let device = device.clone();
        async move { manual(&device).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(device.status(), SyncStatus::Syncing);
    add_patient(&device, "Late");

    assert!(round.await.unwrap().is_synced());
    assert_eq!(
        patient_names(&device.store().get()),
        vec!["Cloud".to_string(), "Late".to_string()]
    );
    assert_eq!(
        patient_names(&remote.snapshot().unwrap()),
        vec!["Cloud".to_string(), "Late".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn forced_sync_queues_unforced_skips() {
    let remote = MemoryRemoteStore::new();
    let device = device(&remote);
    add_patient(&device, "Ali");
    remote.set_delay(Some(Duration::from_secs(5)));

    let first = tokio::spawn({
        let device = device.clone();
        async move { manual(&device).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    let skipped = device.sync_now(Trigger::Manual { force: false }).await;
    assert!(matches!(skipped, SyncOutcome::Skipped));

    let queued = manual(&device).await;
    assert!(queued.is_synced());
    assert!(first.await.unwrap().is_synced());
    assert_eq!(remote.load_count(), 2);
    assert_eq!(remote.save_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_in_flight_round() {
    let remote = MemoryRemoteStore::new();
    let device = device(&remote);
    add_patient(&device, "Ali");
    remote.set_delay(Some(Duration::from_secs(20)));

    let round = tokio::spawn({
        let device = device.clone();
        async move { manual(&device).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(device.status(), SyncStatus::Syncing);

    device.shutdown();
    assert!(matches!(round.await.unwrap(), SyncOutcome::Cancelled));
    assert_eq!(device.status(), SyncStatus::Synced);
    assert!(remote.snapshot().is_none());
}

#[tokio::test]
async fn offline_then_back_online() {
    let remote = MemoryRemoteStore::new();
    let device = device(&remote);
    add_patient(&device, "Ali");

    remote.set_reachable(false);
    assert!(matches!(manual(&device).await, SyncOutcome::Offline));
    assert_eq!(device.status(), SyncStatus::Offline);

    remote.set_reachable(true);
    assert!(manual(&device).await.is_synced());
    assert_eq!(device.status(), SyncStatus::Synced);
    assert_eq!(patient_names(&remote.snapshot().unwrap()), vec!["Ali".to_string()]);
}

#[tokio::test]
async fn two_devices_converge_with_deletes() {
    let remote = MemoryRemoteStore::new();
    let a = device(&remote);
    let b = device(&remote);

    add_patient(&a, "Ali");
    assert!(manual(&a).await.is_synced());

    let sara = add_patient(&b, "Sara");
    assert!(manual(&b).await.is_synced());
    assert!(manual(&a).await.is_synced());
    assert_eq!(patient_names(&a.store().get()), patient_names(&b.store().get()));
    assert_eq!(patient_names(&a.store().get()).len(), 2);

    a.store()
        .edit(|s, now| edits::delete_patient(s, now, &sara))
        .unwrap();
    assert!(manual(&a).await.is_synced());
    assert!(manual(&b).await.is_synced());

    assert_eq!(patient_names(&b.store().get()), vec!["Ali".to_string()]);
    assert!(b.store().get().deleted.deleted_at("patients", &sara).is_some());
}

#[tokio::test]
async fn device_settings_stay_on_device() {
    let remote = MemoryRemoteStore::new();
    let device = device(&remote);
    device
        .store()
        .apply(|mut s| {
            s.settings
                .insert("rxBackgroundImage".into(), json!("data:image/png;base64,AAAA"));
            s.settings.insert("devicePin".into(), json!("4321"));
            s.settings.insert("currency".into(), json!("IQD"));
            s
        })
        .unwrap();

    assert!(manual(&device).await.is_synced());

    let row = remote.snapshot().unwrap();
    assert_eq!(row.settings["rxBackgroundImage"], json!(""));
    assert_eq!(row.settings["currency"], json!("IQD"));
    assert!(!row.settings.contains_key("devicePin"));

    let local = device.store().get();
    assert_eq!(local.settings["rxBackgroundImage"], json!("data:image/png;base64,AAAA"));
    assert_eq!(local.settings["devicePin"], json!("4321"));
}
