//! Monitor daemon signal-handling specs.

use crate::prelude::*;
use std::process::Command;

fn sigterm(pid: u32) {
    Command::new("kill")
        .args(["-15", &pid.to_string()])
        .status()
        .expect("kill should run");
}

#[test]
fn sigterm_cancels_the_countdown_without_stopping_the_vm() {
    let project = Project::empty();
    project.seed_vm_record("i-fake1");
    project.seed_fake_instance("i-fake1", "running");
    project.seed_idle_start();

    // A long grace period: the daemon is mid-countdown when killed.
    let mut daemon = project.spawn_daemon("1h");
    std::thread::sleep(std::time::Duration::from_millis(200));

    sigterm(daemon.id());

    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || {
            matches!(daemon.try_wait(), Ok(Some(_)))
        }),
        "daemon ignored SIGTERM"
    );
    assert!(daemon.wait().unwrap().success());

    // No final stop on the way out: new activity is about to arrive.
    assert_eq!(
        project.fake_instance_state("i-fake1").as_deref(),
        Some("running")
    );
}
