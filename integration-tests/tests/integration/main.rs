// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests
//!
//! These run against `fake-gtest`, which is copied into a temporary project tree as
//! `build/tests/test_controller`. The CLI tests use `gtest-bridge-dup`, a copy of the real CLI
//! binary, so that cargo never has to replace the binary that is running the tests.

use camino::Utf8Path;
use gtest_bridge_runner::{
    bridge::DelegatingBridge,
    case_list::{DEFAULT_CASES, TestCaseId, discover_cases},
    classifier::{
        CaseLineClassifier, ClassificationAmbiguity, ClassifyPolicy, MarkerClassifier, Outcome,
        PASSED_MARKER,
    },
    errors::{CaseFailure, InvokeError, LaunchError, ListCasesError, TimeoutError},
    invoker::{InvokeHooks, ProcessInvoker},
    test_output::DecodePolicy,
};
use integration_tests::temp_project::TempProject;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

mod cli;

fn fake_gtest() -> &'static Utf8Path {
    Utf8Path::new(env!("CARGO_BIN_EXE_fake-gtest"))
}

fn temp_project() -> TempProject {
    TempProject::new(fake_gtest()).expect("created temp project")
}

#[test]
fn anchor_resolves_to_the_built_binary() {
    let p = temp_project();
    let bridge = DelegatingBridge::from_anchor(p.anchor());
    assert_eq!(
        bridge.binary_path(),
        p.root().join("build/tests/test_controller")
    );
    assert!(p.binary_path().is_file());

    // The bridge actually reaches the binary through the anchor.
    let verdict = bridge
        .run_case("ControllerTest.BasicTest")
        .expect("binary found through the anchor");
    assert!(verdict.passed());
}

#[test]
fn passing_case() {
    let p = temp_project();
    let bridge = DelegatingBridge::from_anchor(p.anchor());

    let verdict = bridge
        .run_case("ControllerTest.BasicTest")
        .expect("case ran");
    assert_eq!(verdict.outcome, Outcome::Pass);
    assert_eq!(verdict.evidence.exit_code, 0);
    assert!(verdict.evidence.stdout.contains(PASSED_MARKER));

    bridge.assert_case_passes("ControllerTest.BasicTest");
}

#[test]
fn failing_case_reports_output_verbatim() {
    let p = temp_project();
    let bridge = DelegatingBridge::from_anchor(p.anchor());

    let failure = bridge
        .check_case("ControllerTest.IntegralTest")
        .expect_err("case fails");
    let CaseFailure::Verdict { evidence, .. } = &failure else {
        panic!("expected a verdict failure, got {failure:?}");
    };
    assert_eq!(evidence.exit_code, 1);

    let message = failure.to_string();
    assert!(
        message.starts_with("GTest 'ControllerTest.IntegralTest' failed (exit code 1):\n"),
        "message: {message}"
    );
    assert!(message.contains(&evidence.stdout), "message: {message}");
    assert!(message.contains("expected 0.5, got 0.75\n"), "message: {message}");
    assert!(message.ends_with("integral windup detected\n"), "message: {message}");
}

#[test]
fn missing_binary_is_a_launch_error() {
    let p = TempProject::without_binary().expect("created temp project");
    let bridge = DelegatingBridge::from_anchor(p.anchor());

    let error = bridge
        .run_case("ControllerTest.BasicTest")
        .expect_err("binary is missing");
    assert!(
        matches!(error, InvokeError::Launch(LaunchError::Spawn { .. })),
        "error: {error:?}"
    );

    let failure = bridge
        .check_case("ControllerTest.BasicTest")
        .expect_err("binary is missing");
    assert!(failure.is_infrastructure());
    assert!(
        failure.to_string().contains("could not be run"),
        "failure: {failure}"
    );
}

#[test]
fn exit_127_without_output_is_a_launch_error() {
    let p = temp_project();
    let bridge = DelegatingBridge::from_anchor(p.anchor());

    let error = bridge
        .run_case("ControllerTest.NotRunnableTest")
        .expect_err("binary can't run");
    match error {
        InvokeError::Launch(LaunchError::NotRunnable {
            exit_code, stderr, ..
        }) => {
            assert_eq!(exit_code, 127);
            assert!(stderr.contains("libcontroller.so"), "stderr: {stderr}");
        }
        other => panic!("expected NotRunnable, got {other:?}"),
    }
}

#[test]
fn crash_after_marker_is_ambiguous_when_strict() {
    let p = temp_project();
    let bridge = DelegatingBridge::from_anchor(p.anchor());

    let verdict = bridge
        .run_case("ControllerTest.ProportionalTest2")
        .expect("case ran");
    assert_eq!(
        verdict.outcome,
        Outcome::Ambiguous {
            reason: ClassificationAmbiguity::MarkerWithFailingExit {
                exit_code: 139,
                signal: None,
            }
        }
    );
    assert!(!verdict.passed());

    let failure = bridge
        .check_case("ControllerTest.ProportionalTest2")
        .expect_err("ambiguous verdicts don't pass");
    assert!(!failure.is_infrastructure());
}

#[test]
fn crash_after_marker_passes_when_marker_only() {
    let p = temp_project();
    let bridge = DelegatingBridge::from_anchor(p.anchor()).with_classifier(Box::new(
        MarkerClassifier::new(PASSED_MARKER, ClassifyPolicy::MarkerOnly),
    ));

    let verdict = bridge
        .run_case("ControllerTest.ProportionalTest2")
        .expect("case ran");
    assert_eq!(verdict.outcome, Outcome::Pass);
    assert_eq!(verdict.evidence.exit_code, 139);
}

#[test]
fn unknown_case_is_ambiguous() {
    let p = temp_project();
    let bridge = DelegatingBridge::from_anchor(p.anchor());

    let verdict = bridge
        .run_case("ControllerTest.NoSuchTest")
        .expect("case ran");
    assert_eq!(
        verdict.outcome,
        Outcome::Ambiguous {
            reason: ClassificationAmbiguity::SuccessfulExitWithoutMarker,
        }
    );
}

#[test]
fn repeated_runs_agree() {
    let p = temp_project();
    let bridge = DelegatingBridge::from_anchor(p.anchor());

    for case in ["ControllerTest.BasicTest", "ControllerTest.IntegralTest"] {
        let first = bridge.run_case(case).expect("case ran");
        let second = bridge.run_case(case).expect("case ran");
        assert_eq!(first.outcome, second.outcome, "outcomes for {case}");
        assert_eq!(first.evidence.exit_code, second.evidence.exit_code);
        assert_eq!(first.evidence.stdout, second.evidence.stdout);
        assert_eq!(first.evidence.stderr, second.evidence.stderr);
    }
}

#[test]
fn default_cases_in_order() {
    let p = temp_project();
    let bridge = DelegatingBridge::from_anchor(p.anchor());

    let outcomes: Vec<_> = DEFAULT_CASES
        .iter()
        .map(|&case| {
            let verdict = bridge.run_case(case).expect("case ran");
            (case, verdict.passed())
        })
        .collect();
    assert_eq!(
        outcomes,
        [
            ("ControllerTest.BasicTest", true),
            ("ControllerTest.IntegralTest", false),
            ("ControllerTest.ProportionalTest", true),
            ("ControllerTest.ProportionalTest2", false),
            ("ControllerTest.DerivativeTest", true),
            ("ControllerTest.ResetTest", true),
        ]
    );
}

#[test]
fn case_line_classifier() {
    let p = temp_project();
    let bridge = DelegatingBridge::from_anchor(p.anchor()).with_classifier(Box::new(
        CaseLineClassifier::new(ClassifyPolicy::Strict),
    ));

    assert!(bridge.run_case("ControllerTest.ResetTest").expect("case ran").passed());
    let verdict = bridge
        .run_case("ControllerTest.IntegralTest")
        .expect("case ran");
    assert_eq!(verdict.outcome, Outcome::Fail);
}

#[test]
fn timeout_keeps_partial_output() {
    let p = temp_project();
    let mut invoker = ProcessInvoker::new();
    invoker.set_timeout(Some(Duration::from_millis(500)));
    let bridge = DelegatingBridge::new(p.binary_path(), invoker);

    let error = bridge
        .run_case("ControllerTest.HangTest")
        .expect_err("case hangs");
    match error {
        InvokeError::Timeout(TimeoutError {
            timeout, partial, ..
        }) => {
            assert_eq!(timeout, Duration::from_millis(500));
            assert!(
                partial.stdout.contains("waiting for the setpoint to settle"),
                "partial stdout: {}",
                partial.stdout
            );
            assert!(partial.time_taken < Duration::from_secs(30));
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[test]
fn slow_cases_are_reported_before_timeout() {
    let p = temp_project();
    let mut invoker = ProcessInvoker::new();
    invoker
        .set_timeout(Some(Duration::from_millis(600)))
        .set_slow_timeout(Some(Duration::from_millis(100)));

    let slow_calls = AtomicUsize::new(0);
    let on_slow = |elapsed: Duration| {
        assert!(elapsed >= Duration::from_millis(100), "elapsed: {elapsed:?}");
        slow_calls.fetch_add(1, Ordering::SeqCst);
    };
    let error = invoker
        .invoke_with(
            &p.binary_path(),
            &TestCaseId::new("ControllerTest.HangTest"),
            InvokeHooks::default().with_on_slow(&on_slow),
        )
        .expect_err("case hangs");
    assert!(matches!(error, InvokeError::Timeout(_)), "error: {error:?}");
    assert!(slow_calls.load(Ordering::SeqCst) >= 1);
}

#[test]
fn cancellation_kills_the_child() {
    let p = temp_project();
    let mut invoker = ProcessInvoker::new();
    invoker.set_timeout(None);

    let (sender, receiver) = crossbeam_channel::bounded::<()>(0);
    drop(sender);
    let error = invoker
        .invoke_with(
            &p.binary_path(),
            &TestCaseId::new("ControllerTest.HangTest"),
            InvokeHooks::default().with_cancel_receiver(&receiver),
        )
        .expect_err("run was canceled");
    match error {
        InvokeError::Canceled { partial, .. } => {
            assert!(partial.time_taken < Duration::from_secs(30));
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn leftover_processes_are_killed_after_the_leak_timeout() {
    let p = temp_project();
    let mut invoker = ProcessInvoker::new();
    invoker
        .set_timeout(Some(Duration::from_secs(20)))
        .set_leak_timeout(Duration::from_millis(200));

    let start = Instant::now();
    let error = invoker
        .invoke(&p.binary_path(), &TestCaseId::new("ControllerTest.LeakyTest"))
        .expect_err("helper holds the output open");
    match error {
        InvokeError::Leaked {
            leak_timeout,
            partial,
            ..
        } => {
            assert_eq!(leak_timeout, Duration::from_millis(200));
            assert_eq!(partial.exit_code, 0);
            assert!(
                partial.stdout.contains(PASSED_MARKER),
                "partial stdout: {}",
                partial.stdout
            );
        }
        other => panic!("expected a leak, got {other:?}"),
    }
    assert!(
        start.elapsed() < Duration::from_secs(10),
        "returned after {:?}",
        start.elapsed()
    );
}

#[cfg(unix)]
#[test]
fn leftover_processes_cannot_outlast_the_timeout() {
    let p = temp_project();
    let mut invoker = ProcessInvoker::new();
    invoker
        .set_timeout(Some(Duration::from_secs(1)))
        .set_leak_timeout(Duration::from_secs(60));

    let start = Instant::now();
    let error = invoker
        .invoke(&p.binary_path(), &TestCaseId::new("ControllerTest.LeakyTest"))
        .expect_err("helper holds the output open");
    assert!(matches!(error, InvokeError::Timeout(_)), "error: {error:?}");
    assert!(
        start.elapsed() < Duration::from_secs(10),
        "returned after {:?}",
        start.elapsed()
    );
}

#[test]
fn invalid_utf8_output() {
    let p = temp_project();
    let case = TestCaseId::new("ControllerTest.EncodingTest");

    let lossy = DelegatingBridge::new(p.binary_path(), ProcessInvoker::new());
    let verdict = lossy.run_case(case.clone()).expect("lossy decoding succeeds");
    assert!(verdict.passed());
    assert!(verdict.evidence.stdout.contains('\u{FFFD}'));

    let mut invoker = ProcessInvoker::new();
    invoker.set_decode(DecodePolicy::Strict);
    let strict = DelegatingBridge::new(p.binary_path(), invoker);
    let error = strict.run_case(case).expect_err("strict decoding fails");
    assert!(matches!(error, InvokeError::Decode(_)), "error: {error:?}");
    let lossy_output = error.partial_output().expect("decode errors keep output");
    assert!(lossy_output.stdout.contains(PASSED_MARKER));
}

#[test]
fn discovery_lists_cases_in_order() {
    let p = temp_project();
    let cases = discover_cases(&p.binary_path(), Some(Duration::from_secs(30)))
        .expect("discovery succeeds");
    let expected: Vec<_> = DEFAULT_CASES.iter().map(|&id| TestCaseId::new(id)).collect();
    assert_eq!(cases, expected);
}

#[test]
fn discovery_is_bounded_by_the_timeout() {
    let dir = camino_tempfile::tempdir().expect("created temp dir");
    let binary = dir.path().join(format!(
        "hanging_test_controller{}",
        std::env::consts::EXE_SUFFIX
    ));
    fs_err::copy(fake_gtest(), &binary).expect("copied fake-gtest");

    let start = Instant::now();
    let error = discover_cases(&binary, Some(Duration::from_millis(300)))
        .expect_err("listing hangs");
    assert!(
        matches!(error, ListCasesError::TimedOut { timeout, .. } if timeout == Duration::from_millis(300)),
        "error: {error:?}"
    );
    assert!(start.elapsed() < Duration::from_secs(30));
}
