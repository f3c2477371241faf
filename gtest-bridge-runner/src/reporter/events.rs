// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events emitted by the [`TestRunner`](crate::runner::TestRunner).

use crate::{
    case_list::{CaseList, TestCaseId},
    classifier::{Outcome, Verdict},
    errors::InvokeError,
    runner::RunStats,
    test_filter::MismatchReason,
    test_output::InvocationResult,
};
use std::time::{Duration, SystemTime};

/// What happened when a case was run: a verdict, or an infrastructure error.
pub type CaseResult = Result<Verdict, InvokeError>;

/// A test event.
///
/// Events are produced by a [`TestRunner`](crate::runner::TestRunner) and consumed by a
/// [`TestReporter`](crate::reporter::TestReporter).
#[derive(Debug)]
pub enum TestEvent<'a> {
    /// The run started.
    RunStarted {
        /// The list of cases that will be run.
        ///
        /// The methods on the case list indicate the number of cases that will be run.
        case_list: &'a CaseList,
    },

    /// A case started running.
    TestStarted {
        /// The case that was started.
        case_id: &'a TestCaseId,
    },

    /// A case has been running for longer than the slow-timeout period.
    TestSlow {
        /// The case that is slow.
        case_id: &'a TestCaseId,

        /// How long the case has been running for.
        elapsed: Duration,
    },

    /// A case finished running.
    TestFinished {
        /// The case that finished running.
        case_id: &'a TestCaseId,

        /// The verdict or the error.
        result: CaseResult,
    },

    /// A case was skipped.
    TestSkipped {
        /// The case that was skipped.
        case_id: &'a TestCaseId,

        /// The reason this case was skipped.
        reason: MismatchReason,
    },

    /// A cancellation notice was received.
    RunBeginCancel {
        /// The number of cases still running.
        running: usize,

        /// The reason this run was canceled.
        reason: CancelReason,
    },

    /// The run finished.
    RunFinished {
        /// The time at which the run was started.
        start_time: SystemTime,

        /// The amount of time it took for the cases to run.
        elapsed: Duration,

        /// Statistics for the run.
        run_stats: RunStats,
    },
}

/// The reason why a run is being canceled.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CancelReason {
    /// An error occurred while reporting results.
    ReportError,

    /// A termination signal was received.
    Signal,
}

/// A flattened summary of a [`CaseResult`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CaseStatus {
    /// The case passed.
    Pass,

    /// The case failed.
    Fail,

    /// The success text and the exit code disagreed.
    Ambiguous,

    /// The binary couldn't be launched.
    LaunchFailed,

    /// The binary timed out.
    TimedOut,

    /// The binary's output couldn't be decoded.
    DecodeFailed,

    /// The run was canceled while the case was running.
    Canceled,

    /// The binary left processes behind that held its output open.
    Leaked,
}

impl CaseStatus {
    /// Summarizes a case result.
    pub fn from_result(result: &CaseResult) -> Self {
        match result {
            Ok(verdict) => match verdict.outcome {
                Outcome::Pass => CaseStatus::Pass,
                Outcome::Fail => CaseStatus::Fail,
                Outcome::Ambiguous { .. } => CaseStatus::Ambiguous,
            },
            Err(InvokeError::Launch(_)) => CaseStatus::LaunchFailed,
            Err(InvokeError::Timeout(_)) => CaseStatus::TimedOut,
            Err(InvokeError::Decode(_)) => CaseStatus::DecodeFailed,
            Err(InvokeError::Canceled { .. }) => CaseStatus::Canceled,
            Err(InvokeError::Leaked { .. }) => CaseStatus::Leaked,
        }
    }

    /// Returns true if the case passed.
    pub fn is_success(self) -> bool {
        self == CaseStatus::Pass
    }

    /// Returns true if the case couldn't be run to completion.
    pub fn is_infrastructure(self) -> bool {
        matches!(
            self,
            CaseStatus::LaunchFailed
                | CaseStatus::TimedOut
                | CaseStatus::DecodeFailed
                | CaseStatus::Canceled
                | CaseStatus::Leaked
        )
    }
}

/// Returns the output captured for a case, if any.
///
/// Launch failures have no output. Timeouts, cancellations and leaks have whatever was captured
/// before the processes were terminated.
pub fn captured_output(result: &CaseResult) -> Option<&InvocationResult> {
    match result {
        Ok(verdict) => Some(&verdict.evidence),
        Err(error) => error.partial_output(),
    }
}
