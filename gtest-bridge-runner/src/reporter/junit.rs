// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code to generate JUnit XML reports from test events.

use super::events::{CaseResult, TestEvent, captured_output};
use crate::{
    case_list::TestCaseId,
    classifier::Outcome,
    config::JunitConfig,
    errors::{DisplayErrorChain, InvokeError, LaunchError, WriteEventError},
};
use chrono::{DateTime, FixedOffset, Local};
use debug_ignore::DebugIgnore;
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::{collections::BTreeMap, fs::File, time::SystemTime};

static PROCESS_FAILED_TO_START: &str = "(process failed to start)";

#[derive(Clone, Debug)]
pub(super) struct MetadataJunit<'cfg> {
    config: JunitConfig<'cfg>,
    test_suites: DebugIgnore<BTreeMap<String, TestSuite>>,
}

impl<'cfg> MetadataJunit<'cfg> {
    pub(super) fn new(config: JunitConfig<'cfg>) -> Self {
        Self {
            config,
            test_suites: DebugIgnore(BTreeMap::new()),
        }
    }

    pub(super) fn write_event(&mut self, event: TestEvent<'_>) -> Result<(), WriteEventError> {
        match event {
            TestEvent::RunStarted { .. }
            | TestEvent::TestStarted { .. }
            | TestEvent::TestSlow { .. }
            | TestEvent::RunBeginCancel { .. } => {}
            TestEvent::TestFinished { case_id, result } => {
                let testcase = testcase_for(case_id, &result);
                let suite_name = case_id.suite().unwrap_or(case_id.as_str());
                self.test_suites
                    .entry(suite_name.to_owned())
                    .or_insert_with(|| TestSuite::new(suite_name))
                    .add_test_case(testcase);
            }
            TestEvent::TestSkipped { .. } => {
                // Skipped cases are left out, so that reports from filtered runs can be compared
                // with reports from full runs.
            }
            TestEvent::RunFinished {
                start_time,
                elapsed,
                ..
            } => {
                // Write out the report to the given file.
                let mut report = Report::new(self.config.report_name());
                report
                    .set_timestamp(to_datetime(start_time))
                    .set_time(elapsed)
                    .add_test_suites(std::mem::take(&mut *self.test_suites).into_values());

                let junit_path = self.config.path();
                if let Some(junit_dir) = junit_path.parent() {
                    std::fs::create_dir_all(junit_dir).map_err(|error| WriteEventError::Fs {
                        file: junit_dir.to_path_buf(),
                        error,
                    })?;
                }

                let f = File::create(junit_path).map_err(|error| WriteEventError::Fs {
                    file: junit_path.to_path_buf(),
                    error,
                })?;
                report
                    .serialize(f)
                    .map_err(|error| WriteEventError::Junit {
                        file: junit_path.to_path_buf(),
                        error,
                    })?;
            }
        }

        Ok(())
    }
}

fn testcase_for(case_id: &TestCaseId, result: &CaseResult) -> TestCase {
    let status = match result {
        Ok(verdict) => match &verdict.outcome {
            Outcome::Pass => TestCaseStatus::success(),
            Outcome::Fail => {
                let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
                status
                    .set_type("case failure")
                    .set_message(verdict.summary());
                status
            }
            Outcome::Ambiguous { reason } => {
                let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
                status
                    .set_type("ambiguous result")
                    .set_message(reason.to_string());
                status
            }
        },
        Err(error) => {
            let mut status = TestCaseStatus::non_success(NonSuccessKind::Error);
            status
                .set_type(error.kind_str())
                .set_message(error.to_string())
                .set_description(DisplayErrorChain::new(error).to_string());
            status
        }
    };

    let mut testcase = TestCase::new(case_id.case_name(), status);
    testcase.set_classname(case_id.suite().unwrap_or(case_id.as_str()));

    match captured_output(result) {
        Some(output) => {
            testcase
                .set_timestamp(to_datetime(output.start_time))
                .set_time(output.time_taken)
                .set_system_out(output.stdout.as_str())
                .set_system_err(output.stderr.as_str());
        }
        None => {
            let stderr = match result {
                Err(InvokeError::Launch(LaunchError::NotRunnable { stderr, .. })) => stderr.as_str(),
                _ => PROCESS_FAILED_TO_START,
            };
            testcase
                .set_system_out(PROCESS_FAILED_TO_START)
                .set_system_err(stderr);
        }
    }
    testcase
}

fn to_datetime(time: SystemTime) -> DateTime<FixedOffset> {
    DateTime::<Local>::from(time).fixed_offset()
}
