// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Surfaces each delegated GoogleTest case as its own Rust test.
//!
//! Cases that the fake binary fails on purpose are marked ignored. Run with `--ignored` to see
//! their output reported through the test harness.

use camino::Utf8Path;
use gtest_bridge_runner::{bridge::DelegatingBridge, case_list::DEFAULT_CASES};
use integration_tests::temp_project::TempProject;
use libtest_mimic::{Arguments, Failed, Trial};
use std::{process::ExitCode, sync::Arc};

const EXPECTED_FAILURES: [&str; 2] = [
    "ControllerTest.IntegralTest",
    "ControllerTest.ProportionalTest2",
];

fn main() -> ExitCode {
    let args = Arguments::from_args();

    let project = match TempProject::new(Utf8Path::new(env!("CARGO_BIN_EXE_fake-gtest"))) {
        Ok(project) => Arc::new(project),
        Err(error) => {
            eprintln!("failed to set up project: {error:?}");
            return ExitCode::FAILURE;
        }
    };

    let tests = DEFAULT_CASES
        .iter()
        .map(|&case| {
            let project = Arc::clone(&project);
            Trial::test(format!("controller::{case}"), move || {
                let bridge = DelegatingBridge::from_anchor(project.anchor());
                bridge
                    .check_case(case)
                    .map_err(|failure| Failed::from(failure.to_string()))
            })
            .with_ignored_flag(EXPECTED_FAILURES.contains(&case))
        })
        .collect();

    libtest_mimic::run(&args, tests).exit_code()
}
