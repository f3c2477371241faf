// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A stand-in for a GoogleTest binary, copied into temporary projects as
//! `build/tests/test_controller`.
//!
//! What a case does is decided by its name, so that every process behaves the same no matter
//! which environment it inherits. Listing hangs if the executable's own name contains
//! `hanging`.

use clap::Parser;
use std::{
    io::{self, Write},
    process::{Command, ExitCode},
    time::Duration,
};

const SUITE: &str = "ControllerTest";

/// Cases reported by --gtest_list_tests.
const LISTED_CASES: [&str; 6] = [
    "BasicTest",
    "IntegralTest",
    "ProportionalTest",
    "ProportionalTest2",
    "DerivativeTest",
    "ResetTest",
];

#[derive(Debug, Parser)]
struct Args {
    /// Run only the case with this id
    #[arg(long = "gtest_filter", value_name = "CASE")]
    filter: Option<String>,

    /// List cases instead of running them
    #[arg(long = "gtest_list_tests")]
    list_tests: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();

    if args.list_tests {
        if is_hanging_lister() {
            std::thread::sleep(Duration::from_secs(60));
        }
        let _ = writeln!(stdout, "{SUITE}.");
        for case in LISTED_CASES {
            let _ = writeln!(stdout, "  {case}");
        }
        return ExitCode::SUCCESS;
    }

    let Some(filter) = args.filter else {
        let _ = writeln!(stderr, "fake-gtest: --gtest_filter is required");
        return ExitCode::from(2);
    };

    let Some((SUITE, case)) = filter.split_once('.') else {
        return no_cases_ran(&mut stdout, &filter);
    };

    match case {
        "BasicTest" | "ProportionalTest" | "DerivativeTest" | "ResetTest" => {
            header(&mut stdout, &filter);
            passed(&mut stdout, &filter);
            ExitCode::SUCCESS
        }
        "IntegralTest" => {
            header(&mut stdout, &filter);
            let _ = write!(
                stdout,
                "test_controller.cpp:42: Failure\n\
                 expected 0.5, got 0.75\n\
                 [  FAILED  ] {filter} (0 ms)\n\
                 [==========] 1 test from 1 test suite ran. (0 ms total)\n\
                 [  PASSED  ] 0 tests.\n\
                 [  FAILED  ] 1 test, listed below:\n\
                 [  FAILED  ] {filter}\n\
                 \n 1 FAILED TEST\n"
            );
            let _ = writeln!(stderr, "integral windup detected");
            ExitCode::from(1)
        }
        "ProportionalTest2" => {
            // Reports success, then crashes during teardown.
            header(&mut stdout, &filter);
            passed(&mut stdout, &filter);
            let _ = stdout.flush();
            let _ = writeln!(stderr, "Segmentation fault (core dumped)");
            ExitCode::from(139)
        }
        "HangTest" => {
            header(&mut stdout, &filter);
            let _ = writeln!(stdout, "waiting for the setpoint to settle");
            let _ = stdout.flush();
            std::thread::sleep(Duration::from_secs(60));
            ExitCode::SUCCESS
        }
        "LeakyTest" => {
            // Passes, but leaves a process behind that holds stdout and stderr open.
            header(&mut stdout, &filter);
            passed(&mut stdout, &filter);
            let _ = stdout.flush();
            match std::env::current_exe().and_then(|exe| {
                Command::new(exe)
                    .arg(format!("--gtest_filter={SUITE}.LingeringHelper"))
                    .spawn()
            }) {
                Ok(_) => ExitCode::SUCCESS,
                Err(error) => {
                    let _ = writeln!(stderr, "fake-gtest: failed to spawn helper: {error}");
                    ExitCode::from(2)
                }
            }
        }
        "LingeringHelper" => {
            std::thread::sleep(Duration::from_secs(60));
            ExitCode::SUCCESS
        }
        "NotRunnableTest" => {
            let _ = writeln!(
                stderr,
                "test_controller: error while loading shared libraries: libcontroller.so: \
                 cannot open shared object file: No such file or directory"
            );
            ExitCode::from(127)
        }
        "EncodingTest" => {
            header(&mut stdout, &filter);
            let _ = stdout.write_all(b"gain: \xff\xfe\n");
            passed(&mut stdout, &filter);
            ExitCode::SUCCESS
        }
        _ => no_cases_ran(&mut stdout, &filter),
    }
}

fn is_hanging_lister() -> bool {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|stem| stem.to_string_lossy().contains("hanging")))
        .unwrap_or(false)
}

fn header(stdout: &mut impl Write, filter: &str) {
    let _ = write!(
        stdout,
        "Note: Google Test filter = {filter}\n\
         [==========] Running 1 test from 1 test suite.\n\
         [----------] Global test environment set-up.\n\
         [----------] 1 test from {SUITE}\n\
         [ RUN      ] {filter}\n"
    );
}

fn passed(stdout: &mut impl Write, filter: &str) {
    let _ = write!(
        stdout,
        "[       OK ] {filter} (0 ms)\n\
         [----------] 1 test from {SUITE} (0 ms total)\n\
         \n\
         [----------] Global test environment tear-down\n\
         [==========] 1 test from 1 test suite ran. (0 ms total)\n\
         [  PASSED  ] 1 test.\n"
    );
}

fn no_cases_ran(stdout: &mut impl Write, filter: &str) -> ExitCode {
    let _ = write!(
        stdout,
        "Note: Google Test filter = {filter}\n\
         [==========] Running 0 tests from 0 test suites.\n\
         [==========] 0 tests from 0 test suites ran. (0 ms total)\n\
         [  PASSED  ] 0 tests.\n"
    );
    ExitCode::SUCCESS
}
