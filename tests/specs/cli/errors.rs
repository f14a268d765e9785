//! CLI error-path specs

use crate::prelude::*;

#[test]
fn invalid_run_id_is_rejected_before_any_remote_work() {
    let project = Project::empty();
    project
        .yg()
        .args(&["logs", "NOT-A-RUN-ID"])
        .fails()
        .stderr_has("invalid run id");
}

#[test]
fn seven_char_run_id_is_rejected() {
    let project = Project::empty();
    project
        .yg()
        .args(&["kill", "abcdef0"])
        .fails()
        .stderr_has("invalid run id");
}

#[test]
fn logs_without_history_names_the_problem() {
    let project = Project::empty();
    project
        .yg()
        .args(&["logs"])
        .fails()
        .stderr_has("no runs recorded");
}

#[test]
fn destroy_without_force_warns_and_exits_nonzero() {
    let project = Project::empty();
    let run = project.yg().args(&["destroy"]).fails();
    assert_eq!(run.exit_code(), Some(1));
    run.stderr_has("--force");
}

#[test]
fn invalid_config_fails_fast() {
    let project = Project::empty();
    project.file("yeager.toml", "size = \"gigantic\"\n");
    project
        .yg()
        .args(&["status"])
        .fails()
        .stderr_has("invalid size");
}
