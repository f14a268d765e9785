//! CLI help output specs

use crate::prelude::*;

#[test]
fn yg_no_args_shows_usage_and_exits_zero() {
    let project = Project::empty();
    project.yg().passes().stdout_has("Usage:");
}

#[test]
fn yg_help_shows_usage_and_commands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("Usage:")
        .stdout_has("status")
        .stdout_has("logs")
        .stdout_has("destroy");
}

#[test]
fn yg_help_hides_the_daemon_entrypoint() {
    cli().args(&["--help"]).passes().stdout_lacks("monitor-daemon");
}

#[test]
fn yg_version_shows_version() {
    cli().args(&["--version"]).passes().stdout_has("0.1");
}
