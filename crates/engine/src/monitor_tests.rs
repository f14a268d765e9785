// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use std::os::unix::fs::PermissionsExt;

fn store() -> (tempfile::TempDir, ProjectStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = ProjectStore::open(dir.path(), "abc123def456").unwrap();
    (dir, store)
}

/// Install a fake daemon binary and point YEAGER_BIN at it.
fn install_fake_daemon(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("fake-yg");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn stop_without_a_recorded_daemon_is_a_noop() {
    let (_dir, store) = store();
    stop_monitor(&store).unwrap();
}

#[test]
fn stop_clears_a_stale_pid() {
    let (_dir, store) = store();
    // Near the top of the pid space; no such process.
    store.save_monitor_pid(u32::MAX - 1).unwrap();
    stop_monitor(&store).unwrap();
    assert_eq!(store.load_monitor_pid().unwrap(), None);
}

#[test]
fn stop_terminates_a_live_daemon_and_clears_state() {
    let (_dir, store) = store();
    let mut child = std::process::Command::new("sleep")
        .arg("30")
        .spawn()
        .unwrap();
    store.save_monitor_pid(child.id()).unwrap();
    store.save_idle_start(Utc::now()).unwrap();

    stop_monitor(&store).unwrap();

    // Reap; SIGTERM ends sleep promptly.
    let status = child.wait().unwrap();
    assert!(!status.success());
    assert!(!process_exists(child.id()));
    assert_eq!(store.load_monitor_pid().unwrap(), None);
    assert_eq!(store.load_idle_start().unwrap(), None);
}

#[test]
fn start_short_circuits_when_a_daemon_is_alive() {
    let (_dir, store) = store();
    // Our own PID is certainly alive.
    store.save_monitor_pid(std::process::id()).unwrap();

    start_monitor(&store, "abc123def456", Duration::from_secs(1)).unwrap();

    // No spawn happened: the idle window was never opened and the
    // recorded PID is untouched.
    assert_eq!(store.load_idle_start().unwrap(), None);
    assert_eq!(store.load_monitor_pid().unwrap(), Some(std::process::id()));
}

#[test]
#[serial(yeager_bin)]
fn start_spawns_a_detached_daemon_and_records_its_pid() {
    let (dir, store) = store();
    let bin = install_fake_daemon(dir.path(), "sleep 30");
    std::env::set_var("YEAGER_BIN", &bin);

    let result = start_monitor(&store, "abc123def456", Duration::from_millis(500));
    std::env::remove_var("YEAGER_BIN");
    result.unwrap();

    let pid = store.load_monitor_pid().unwrap().unwrap();
    assert!(process_exists(pid));
    assert!(store.load_idle_start().unwrap().is_some());

    stop_monitor(&store).unwrap();
    assert_eq!(store.load_monitor_pid().unwrap(), None);
    assert_eq!(store.load_idle_start().unwrap(), None);
}

#[test]
#[serial(yeager_bin)]
fn concurrent_starts_spawn_exactly_one_daemon() {
    let (dir, store) = store();
    let count_file = dir.path().join("count");
    let bin = install_fake_daemon(
        dir.path(),
        &format!("echo started >> {}\nsleep 30", count_file.display()),
    );
    std::env::set_var("YEAGER_BIN", &bin);

    let threads: Vec<_> = (0..3)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || {
                start_monitor(&store, "abc123def456", Duration::from_secs(1))
            })
        })
        .collect();
    let results: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    std::env::remove_var("YEAGER_BIN");
    for result in results {
        result.unwrap();
    }

    // Give the winning daemon a moment to write its marker.
    std::thread::sleep(Duration::from_millis(300));
    let starts = std::fs::read_to_string(&count_file).unwrap_or_default();
    assert_eq!(starts.lines().count(), 1, "starts: {:?}", starts);

    // Exactly one PID recorded, and it is alive.
    let pid = store.load_monitor_pid().unwrap().unwrap();
    assert!(process_exists(pid));
    stop_monitor(&store).unwrap();
}
