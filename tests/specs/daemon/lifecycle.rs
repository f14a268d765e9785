//! Monitor daemon lifecycle specs (end-to-end, file-backed fake cloud).

use crate::prelude::*;

#[test]
fn daemon_stops_the_vm_after_the_grace_period() {
    let project = Project::empty();
    project.seed_vm_record("i-fake1");
    project.seed_fake_instance("i-fake1", "running");
    project.seed_idle_start();
    // The spawned daemon also leaves a PID file behind in real flows.
    std::fs::write(project.project_state().join("monitor.pid"), "0\n").unwrap();

    let mut daemon = project.spawn_daemon("50ms");

    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || {
            project.fake_instance_state("i-fake1").as_deref() == Some("stopped")
        }),
        "daemon never stopped the instance"
    );

    // After the stop it cleans up and exits on its own.
    assert!(wait_for(SPEC_WAIT_MAX_MS, || {
        matches!(daemon.try_wait(), Ok(Some(_)))
    }));
    let status = daemon.wait().unwrap();
    assert!(status.success());
    assert!(!project.idle_start_exists());
    assert!(!project.monitor_pid_exists());
}

#[test]
fn daemon_without_an_open_idle_window_keeps_the_vm_up() {
    let project = Project::empty();
    project.seed_vm_record("i-fake1");
    project.seed_fake_instance("i-fake1", "running");
    // No idle_start: the countdown never begins.

    let mut daemon = project.spawn_daemon("50ms");

    std::thread::sleep(std::time::Duration::from_millis(500));
    assert_eq!(
        project.fake_instance_state("i-fake1").as_deref(),
        Some("running")
    );
    assert!(matches!(daemon.try_wait(), Ok(None)), "daemon exited early");

    daemon.kill().unwrap();
    let _ = daemon.wait();
}

#[test]
fn daemon_exits_cleanly_when_there_is_no_vm_record() {
    let project = Project::empty();
    let mut daemon = project.spawn_daemon("50ms");

    assert!(wait_for(SPEC_WAIT_MAX_MS, || {
        matches!(daemon.try_wait(), Ok(Some(_)))
    }));
    assert!(daemon.wait().unwrap().success());
}
