//! `yg status` specs against an empty project

use crate::prelude::*;

#[test]
fn status_without_a_vm_says_so() {
    let project = Project::empty();
    project
        .yg()
        .args(&["status"])
        .passes()
        .stdout_has("no VM provisioned");
}

#[test]
fn status_json_emits_a_single_object() {
    let project = Project::empty();
    let run = project.yg().args(&["--json", "status"]).passes();
    let stdout = run.stdout();

    let line = stdout.lines().next().expect("one JSON line");
    let value: serde_json::Value = serde_json::from_str(line).expect("valid JSON");
    assert_eq!(value["type"], "status");
    assert!(value["vm"].is_null());
}

#[test]
fn status_json_stdout_is_pure_json() {
    let project = Project::empty();
    let run = project.yg().args(&["--json", "status"]).passes();
    for line in run.stdout().lines() {
        assert!(
            serde_json::from_str::<serde_json::Value>(line).is_ok(),
            "non-JSON line in --json output: {:?}",
            line
        );
    }
}
