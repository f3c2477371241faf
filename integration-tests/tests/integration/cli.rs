// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::temp_project;
use gtest_bridge_runner::exit_codes::BridgeExitCode;
use indoc::indoc;
use integration_tests::{bridge_cli::BridgeCli, temp_project::TempProject};

fn cli(p: &TempProject) -> BridgeCli {
    let mut cli = BridgeCli::new(env!("CARGO_BIN_EXE_gtest-bridge-dup"));
    cli.args(["--project-root", p.root().as_str()]);
    cli
}

#[test]
fn list_configured_cases() {
    let p = TempProject::without_binary().unwrap();
    let output = cli(&p).args(["list", "Proportional", "--skip", "Test2"]).output();

    let stdout = output.stdout_as_str();
    let expected = format!(
        "{}:\n\
         \x20   ControllerTest.BasicTest (skipped)\n\
         \x20   ControllerTest.IntegralTest (skipped)\n\
         \x20   ControllerTest.ProportionalTest\n\
         \x20   ControllerTest.ProportionalTest2 (skipped)\n\
         \x20   ControllerTest.DerivativeTest (skipped)\n\
         \x20   ControllerTest.ResetTest (skipped)\n",
        p.root().join("build/tests/test_controller"),
    );
    assert_eq!(stdout, expected, "{output}");
}

#[test]
fn list_discovered_json() {
    let p = temp_project();
    let output = cli(&p)
        .args(["list", "--discover", "--message-format", "json", "Integral"])
        .output();

    let list: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("list output is JSON");
    assert_eq!(list["case-count"], 6, "{output}");
    assert_eq!(list["run-count"], 1, "{output}");
    assert_eq!(list["cases"][1]["id"], "ControllerTest.IntegralTest");
    assert_eq!(list["cases"][1]["filter-match"]["status"], "matches");
    assert_eq!(list["cases"][0]["filter-match"]["status"], "mismatch");
}

#[test]
fn discovery_failure_exit_code() {
    let p = TempProject::without_binary().unwrap();
    let output = cli(&p)
        .args(["list", "--discover"])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(BridgeExitCode::CASE_LIST_CREATION_FAILED),
        "{output}"
    );
    assert!(output.stderr_as_str().contains("error: "), "{output}");
}

#[test]
fn run_passing_cases() {
    let p = temp_project();
    let output = cli(&p).args(["run", "BasicTest", "ResetTest"]).output();

    let stderr = output.stderr_as_str();
    assert!(
        stderr.contains("Starting 2 cases from") && stderr.contains("(4 skipped)"),
        "{output}"
    );
    assert!(stderr.contains("PASS ["), "{output}");
    assert!(
        stderr.contains("2 cases run: 2 passed, 4 skipped"),
        "{output}"
    );
}

#[test]
fn run_failing_case_shows_output() {
    let p = temp_project();
    let output = cli(&p)
        .args(["run", "IntegralTest"])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(BridgeExitCode::CASE_RUN_FAILED),
        "{output}"
    );

    let stderr = output.stderr_as_str();
    assert!(stderr.contains("FAIL ["), "{output}");
    assert!(
        stderr.contains("--- STDOUT: ControllerTest.IntegralTest ---\n"),
        "{output}"
    );
    assert!(stderr.contains("expected 0.5, got 0.75\n"), "{output}");
    assert!(
        stderr.contains("--- STDERR: ControllerTest.IntegralTest ---\nintegral windup detected\n"),
        "{output}"
    );
}

#[test]
fn run_failing_case_without_output() {
    let p = temp_project();
    let output = cli(&p)
        .args(["run", "IntegralTest", "--failure-output", "never"])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(BridgeExitCode::CASE_RUN_FAILED),
        "{output}"
    );
    assert!(!output.stderr_as_str().contains("--- STDOUT"), "{output}");
}

#[test]
fn run_crash_after_marker() {
    let p = temp_project();
    let output = cli(&p)
        .args(["run", "ProportionalTest2"])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(BridgeExitCode::CASE_RUN_FAILED),
        "{output}"
    );
    assert!(output.stderr_as_str().contains("AMBIGUOUS ["), "{output}");

    // The legacy policy only looks at the marker.
    let output = cli(&p)
        .args(["run", "ProportionalTest2", "--policy", "marker-only"])
        .output();
    assert!(output.stderr_as_str().contains("1 passed"), "{output}");
}

#[test]
fn run_missing_binary() {
    let p = TempProject::without_binary().unwrap();
    let output = cli(&p).arg("run").unchecked(true).output();
    assert_eq!(
        output.exit_code(),
        Some(BridgeExitCode::INFRASTRUCTURE_FAILED),
        "{output}"
    );

    let stderr = output.stderr_as_str();
    assert!(stderr.contains("LAUNCH ["), "{output}");
    assert!(stderr.contains("6 failed to launch"), "{output}");
}

#[test]
fn run_binary_override() {
    let p = TempProject::without_binary().unwrap();
    let output = cli(&p)
        .args(["run", "DerivativeTest"])
        .env("GTEST_BRIDGE_BINARY", crate::fake_gtest().as_str())
        .output();
    assert!(output.stderr_as_str().contains("1 passed"), "{output}");
}

#[test]
fn run_no_cases() {
    let p = temp_project();
    let output = cli(&p)
        .args(["run", "NoSuchTest"])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(BridgeExitCode::NO_CASES_RUN),
        "{output}"
    );
}

#[test]
fn run_timeout_from_config() {
    let p = temp_project();
    p.write_config(indoc! {r#"
        [profile.hang]
        cases = ["ControllerTest.HangTest", "ControllerTest.BasicTest"]
        timeout = "1s"
    "#})
    .unwrap();

    let output = cli(&p)
        .args(["run", "--profile", "hang"])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(BridgeExitCode::INFRASTRUCTURE_FAILED),
        "{output}"
    );

    let stderr = output.stderr_as_str();
    assert!(stderr.contains("TIMEOUT ["), "{output}");
    assert!(stderr.contains("waiting for the setpoint to settle"), "{output}");
    assert!(stderr.contains("1 passed, 1 timed out"), "{output}");
}

#[cfg(unix)]
#[test]
fn run_leaking_case_from_config() {
    let p = temp_project();
    p.write_config(indoc! {r#"
        [profile.leaky]
        cases = ["ControllerTest.LeakyTest", "ControllerTest.BasicTest"]
        leak-timeout = "200ms"
    "#})
    .unwrap();

    let output = cli(&p)
        .args(["run", "--profile", "leaky"])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(BridgeExitCode::INFRASTRUCTURE_FAILED),
        "{output}"
    );

    let stderr = output.stderr_as_str();
    assert!(stderr.contains("LEAK ["), "{output}");
    assert!(stderr.contains("1 passed, 1 leaked processes"), "{output}");
}

#[test]
fn profile_from_env() {
    let p = temp_project();
    p.write_config(indoc! {r#"
        [profile.legacy]
        policy = "marker-only"
        cases = ["ControllerTest.ProportionalTest2"]
    "#})
    .unwrap();

    let output = cli(&p)
        .arg("run")
        .env("GTEST_BRIDGE_PROFILE", "legacy")
        .output();
    assert!(output.stderr_as_str().contains("1 passed"), "{output}");
}

#[test]
fn unknown_profile() {
    let p = temp_project();
    let output = cli(&p)
        .args(["run", "--profile", "nope"])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(BridgeExitCode::SETUP_ERROR),
        "{output}"
    );
    assert!(
        output.stderr_as_str().contains("profile `nope` not found"),
        "{output}"
    );
}

#[test]
fn bad_config() {
    let p = temp_project();
    p.write_config(indoc! {r#"
        [profile.default]
        timeout = 12
    "#})
    .unwrap();

    let output = cli(&p).arg("list").unchecked(true).output();
    assert_eq!(
        output.exit_code(),
        Some(BridgeExitCode::SETUP_ERROR),
        "{output}"
    );
    assert!(
        output
            .stderr_as_str()
            .contains("failed to parse gtest-bridge config"),
        "{output}"
    );
}

#[test]
fn unknown_config_keys_warn() {
    let p = temp_project();
    p.write_config(indoc! {r#"
        [profile.default]
        retries = 3
    "#})
    .unwrap();

    let output = cli(&p).arg("list").output();
    assert!(
        output
            .stderr_as_str()
            .contains("warning: ignoring unknown configuration keys"),
        "{output}"
    );
}

#[test]
fn junit_report() {
    let p = temp_project();
    let junit_path = p.root().join("target/junit.xml");
    let output = cli(&p)
        .args(["run", "--junit", junit_path.as_str()])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(BridgeExitCode::CASE_RUN_FAILED),
        "{output}"
    );

    let xml = std::fs::read_to_string(&junit_path).expect("JUnit report was written");
    assert!(xml.contains(r#"name="ControllerTest""#), "{xml}");
    assert!(xml.contains(r#"tests="6""#), "{xml}");
    assert!(xml.contains(r#"type="case failure""#), "{xml}");
    assert!(xml.contains(r#"type="ambiguous result""#), "{xml}");
    assert!(xml.contains("integral windup detected"), "{xml}");
}

#[test]
fn junit_report_from_config() {
    let p = temp_project();
    p.write_config(indoc! {r#"
        [profile.ci]
        cases = ["ControllerTest.BasicTest"]

        [profile.ci.junit]
        path = "target/reports/junit.xml"
        report-name = "controller"
    "#})
    .unwrap();

    let _ = cli(&p).args(["run", "--profile", "ci"]).output();
    let xml = std::fs::read_to_string(p.root().join("target/reports/junit.xml"))
        .expect("JUnit report was written");
    assert!(xml.contains(r#"name="controller""#), "{xml}");
    assert!(xml.contains(r#"name="BasicTest""#), "{xml}");
}
