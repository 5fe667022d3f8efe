use std::fs;

use checkin_core::{
    status::Severity,
    storage::FileStorage,
    store::{CHECK_INS_STORAGE_KEY, TASKS_STORAGE_KEY},
    view::{StatusFilter, TimeWindow, ViewFilters},
    CheckIn, FrequencyUnit, ItemStore, Task, TrackerError,
};
use chrono::{Duration, TimeZone, Utc};
use tempfile::tempdir;

fn open(root: &std::path::Path) -> (ItemStore, Vec<TrackerError>) {
    ItemStore::builder()
        .with_storage(Box::new(FileStorage::new(root)))
        .persist_history(true)
        .build()
}

#[test]
fn tracker_session_survives_restart() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path().join("data");
    let now = Utc.with_ymd_and_hms(2025, 11, 7, 9, 0, 0).unwrap();

    let (mut store, errors) = open(&root);
    assert!(errors.is_empty(), "fresh directory loads cleanly");

    let overdue = store
        .add_check_in(
            CheckIn::new("Call Mom", 1, FrequencyUnit::Weeks, now - Duration::days(20))
                .with_thresholds(14, 14)
                .with_labels(["family"]),
        )
        .expect("add check-in")
        .into_persisted()
        .expect("persisted");
    store
        .add_check_in(
            CheckIn::new("Water plants", 3, FrequencyUnit::Days, now + Duration::days(2))
                .with_labels(["home"]),
        )
        .expect("add check-in")
        .into_persisted()
        .expect("persisted");
    let task = store
        .add_task(Task::new("Renew passport", now - Duration::days(10)).with_labels(["admin"]))
        .expect("add task")
        .into_persisted()
        .expect("persisted");

    assert!(root.join(format!("{CHECK_INS_STORAGE_KEY}.json")).is_file());
    assert!(root.join(format!("{TASKS_STORAGE_KEY}.json")).is_file());

    let red = store.view_check_ins(&ViewFilters::default().with_status(StatusFilter::Red), &now);
    assert_eq!(red.len(), 1);
    assert_eq!(red[0].id, overdue);
    assert_eq!(red[0].status(&now).overdue_days, 20);

    let this_week = store.view_check_ins(&ViewFilters::default().with_window(TimeWindow::Week), &now);
    assert_eq!(this_week.len(), 1);
    assert_eq!(this_week[0].title, "Water plants");

    assert_eq!(store.get_task(&task).unwrap().status(&now).state, Severity::Yellow);
    store
        .complete(&task, &now)
        .expect("complete")
        .into_persisted()
        .expect("persisted");
    drop(store);

    let (mut reopened, errors) = open(&root);
    assert!(errors.is_empty());
    assert_eq!(reopened.check_ins().len(), 2);
    assert!(reopened.get_task(&task).unwrap().completed);

    reopened.undo().expect("history restored").into_persisted().expect("persisted");
    let restored = reopened.get_task(&task).unwrap();
    assert!(!restored.completed);
    assert_eq!(restored.completed_date, None);
}

#[test]
fn corrupted_slot_is_reported_and_ignored() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path();
    fs::write(root.join(format!("{CHECK_INS_STORAGE_KEY}.json")), "[{\"title\":").expect("write fixture");

    let (store, errors) = open(root);
    assert!(store.check_ins().is_empty());
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], TrackerError::Parse { .. }));
}

#[test]
fn imports_browser_export() {
    let temp = tempdir().expect("tempdir");
    let (mut store, _) = open(temp.path());
    let raw = r#"{
  "checkins": [
    {
      "id": "6f1c1f0e-5b7a-4a53-9d7e-0c2f0a4a9d11",
      "title": "Dentist",
      "frequencyValue": 6,
      "frequencyUnit": "months",
      "nextDueDate": "2025-08-31T04:00:00.000Z",
      "lastCheckInDate": "2025-02-28T15:12:44.120Z",
      "yellowThresholdDays": 14,
      "redThresholdDays": 30,
      "labels": ["health"]
    }
  ],
  "tasks": [],
  "exportDate": "2025-09-01T12:00:00.000Z"
}"#;
    let summary = store
        .import_snapshot(raw)
        .expect("import")
        .into_persisted()
        .expect("persisted");
    assert_eq!(summary.check_ins, Some(1));
    assert_eq!(summary.tasks, Some(0));

    let now = Utc.with_ymd_and_hms(2025, 9, 20, 10, 0, 0).unwrap();
    let dentist = &store.check_ins()[0];
    let status = dentist.status(&now);
    assert_eq!(status.overdue_days, 20);
    assert_eq!(status.state, Severity::Red);

    let id = dentist.id.clone();
    let updated = store.check_in(&id, &now).expect("check in").value;
    assert_eq!(
        updated.next_due_date,
        Utc.with_ymd_and_hms(2026, 3, 20, 10, 0, 0).unwrap()
    );
}
