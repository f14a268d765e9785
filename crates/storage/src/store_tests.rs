// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use serial_test::serial;

fn store() -> (tempfile::TempDir, ProjectStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = ProjectStore::open(dir.path(), "abc123def456").unwrap();
    (dir, store)
}

fn record() -> VmRecord {
    VmRecord {
        instance_id: "i-0123456789abcdef0".to_string(),
        region: "us-east-1".to_string(),
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap(),
        project_dir: PathBuf::from("/home/dev/widget"),
        setup_hash: "f00dfeed1234".to_string(),
        cloud_init_version: 3,
    }
}

fn entry(n: u32, exit_code: i32) -> RunHistoryEntry {
    RunHistoryEntry {
        run_id: RunId::parse(&format!("{:08x}", n)).unwrap(),
        command: format!("make test-{}", n),
        exit_code,
        start_time: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        duration_ms: 1200,
    }
}

#[test]
fn vm_record_round_trips() {
    let (_dir, store) = store();
    let rec = record();
    store.save_vm(&rec).unwrap();
    assert_eq!(store.load_vm().unwrap(), rec);
}

#[test]
fn missing_vm_record_is_not_found() {
    let (_dir, store) = store();
    let err = store.load_vm().unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn delete_vm_is_idempotent() {
    let (_dir, store) = store();
    store.save_vm(&record()).unwrap();
    store.delete_vm().unwrap();
    store.delete_vm().unwrap();
    assert!(store.load_vm().unwrap_err().is_not_found());
}

#[test]
fn corrupt_vm_record_is_reported() {
    let (_dir, store) = store();
    std::fs::write(store.project_dir().join("vm.json"), b"{ nope").unwrap();
    assert!(matches!(
        store.load_vm(),
        Err(StoreError::Corrupt { .. })
    ));
}

#[test]
fn last_run_round_trips() {
    let (_dir, store) = store();
    let id = RunId::parse("deadbeef").unwrap();
    store.save_last_run(&id).unwrap();
    assert_eq!(store.load_last_run().unwrap(), id);
}

#[test]
fn history_appends_newest_first() {
    let (_dir, store) = store();
    store.append_history(entry(1, 0)).unwrap();
    store.append_history(entry(2, 7)).unwrap();

    let history = store.load_history().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].exit_code, 7);
    assert_eq!(history[1].exit_code, 0);
}

#[test]
fn history_caps_at_twenty_entries() {
    let (_dir, store) = store();
    for n in 0..25 {
        store.append_history(entry(n, 0)).unwrap();
    }

    let history = store.load_history().unwrap();
    assert_eq!(history.len(), HISTORY_CAP);
    // Newest survives at the front; the five oldest fell off.
    assert_eq!(history[0].command, "make test-24");
    assert_eq!(history[HISTORY_CAP - 1].command, "make test-5");
}

#[test]
fn missing_history_is_empty() {
    let (_dir, store) = store();
    assert!(store.load_history().unwrap().is_empty());
}

#[test]
fn corrupt_history_errors_on_load_but_save_resets() {
    let (_dir, store) = store();
    std::fs::write(store.project_dir().join("history.json"), b"[{ nope").unwrap();

    assert!(matches!(
        store.load_history(),
        Err(StoreError::Corrupt { .. })
    ));

    // Append tolerates the corruption and starts a fresh history.
    store.append_history(entry(9, 0)).unwrap();
    let history = store.load_history().unwrap();
    assert_eq!(history.len(), 1);
}

#[test]
fn idle_start_round_trips_at_nanosecond_precision() {
    let (_dir, store) = store();
    let t = Utc
        .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .unwrap()
        .checked_add_signed(chrono::Duration::nanoseconds(123_456_789))
        .unwrap();
    store.save_idle_start(t).unwrap();
    assert_eq!(store.load_idle_start().unwrap(), Some(t));
}

#[test]
fn idle_start_clears_to_none() {
    let (_dir, store) = store();
    store.save_idle_start(Utc::now()).unwrap();
    store.clear_idle_start().unwrap();
    assert_eq!(store.load_idle_start().unwrap(), None);
    // Clearing again is fine.
    store.clear_idle_start().unwrap();
}

#[test]
fn monitor_pid_round_trips() {
    let (_dir, store) = store();
    assert_eq!(store.load_monitor_pid().unwrap(), None);
    store.save_monitor_pid(4242).unwrap();
    assert_eq!(store.load_monitor_pid().unwrap(), Some(4242));
    store.clear_monitor_pid().unwrap();
    assert_eq!(store.load_monitor_pid().unwrap(), None);
}

#[test]
fn unparsable_monitor_pid_reads_as_none() {
    let (_dir, store) = store();
    std::fs::write(store.monitor_pid_path(), b"not-a-pid\n").unwrap();
    assert_eq!(store.load_monitor_pid().unwrap(), None);
}

#[test]
fn writes_leave_no_temp_files_behind() {
    let (_dir, store) = store();
    store.save_vm(&record()).unwrap();
    store.append_history(entry(1, 0)).unwrap();
    store.save_last_run(&RunId::parse("deadbeef").unwrap()).unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(store.project_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "leftover temp files: {:?}", leftovers);
}

#[test]
fn state_files_are_private() {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, store) = store();
    store.save_vm(&record()).unwrap();
    let mode = std::fs::metadata(store.project_dir().join("vm.json"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
#[serial(env)]
fn base_dir_prefers_explicit_override() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("YEAGER_STATE_DIR", dir.path());
    let resolved = default_base_dir().unwrap();
    std::env::remove_var("YEAGER_STATE_DIR");
    assert_eq!(resolved, dir.path());
}
