// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns a captured invocation into a verdict.
//!
//! Classification is a pure function of the [`InvocationResult`]: the same captured output always
//! produces the same verdict. Two signals are available, the success text printed by the test
//! framework and the exit code, and a [`ClassifyPolicy`] decides how they combine.

use crate::{case_list::TestCaseId, helpers::describe_exit, test_output::InvocationResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// The literal GoogleTest prints when a run of exactly one test passes.
pub const PASSED_MARKER: &str = "[  PASSED  ] 1 test.";

/// The prefix of the line GoogleTest prints when an individual case passes.
pub const CASE_OK_PREFIX: &str = "[       OK ] ";

/// Derives a [`Verdict`] from captured output.
pub trait OutcomeClassifier: fmt::Debug + Send + Sync {
    /// Classifies `result`, which was produced by running `case_id`.
    fn classify(&self, result: InvocationResult, case_id: &TestCaseId) -> Verdict;
}

/// How the success text and the exit code combine.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifyPolicy {
    /// Both signals must agree. Success text with exit code 0 passes, no success text with a
    /// non-zero exit fails, and anything else is ambiguous.
    #[default]
    Strict,

    /// Only the success text counts; the exit code is ignored.
    ///
    /// A binary that crashes after printing the success text passes under this policy.
    MarkerOnly,
}

impl ClassifyPolicy {
    fn combine(self, marker_found: bool, result: &InvocationResult) -> Outcome {
        match self {
            ClassifyPolicy::MarkerOnly => {
                if marker_found {
                    Outcome::Pass
                } else {
                    Outcome::Fail
                }
            }
            ClassifyPolicy::Strict => match (marker_found, result.exited_successfully()) {
                (true, true) => Outcome::Pass,
                (false, false) => Outcome::Fail,
                (true, false) => Outcome::Ambiguous {
                    reason: ClassificationAmbiguity::MarkerWithFailingExit {
                        exit_code: result.exit_code,
                        signal: result.signal,
                    },
                },
                (false, true) => Outcome::Ambiguous {
                    reason: ClassificationAmbiguity::SuccessfulExitWithoutMarker,
                },
            },
        }
    }
}

/// Which success text to look for.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierKind {
    /// Look for [`PASSED_MARKER`] (or a configured replacement).
    #[default]
    Marker,

    /// Look for the per-case `[       OK ] <case>` line.
    CaseLine,
}

impl ClassifierKind {
    /// Builds a classifier of this kind.
    ///
    /// `marker` is only used by [`ClassifierKind::Marker`].
    pub fn build(self, marker: &str, policy: ClassifyPolicy) -> Box<dyn OutcomeClassifier> {
        match self {
            ClassifierKind::Marker => Box::new(MarkerClassifier::new(marker, policy)),
            ClassifierKind::CaseLine => Box::new(CaseLineClassifier::new(policy)),
        }
    }
}

/// Looks for a fixed substring in stdout.
#[derive(Clone, Debug)]
pub struct MarkerClassifier {
    marker: String,
    policy: ClassifyPolicy,
}

impl MarkerClassifier {
    /// Creates a new classifier looking for `marker`.
    pub fn new(marker: impl Into<String>, policy: ClassifyPolicy) -> Self {
        Self {
            marker: marker.into(),
            policy,
        }
    }
}

impl Default for MarkerClassifier {
    fn default() -> Self {
        Self::new(PASSED_MARKER, ClassifyPolicy::default())
    }
}

impl OutcomeClassifier for MarkerClassifier {
    fn classify(&self, result: InvocationResult, case_id: &TestCaseId) -> Verdict {
        let marker_found = result.stdout.contains(&self.marker);
        Verdict::new(case_id, self.policy.combine(marker_found, &result), result)
    }
}

/// Looks for GoogleTest's `[       OK ] <case>` line for the exact case.
///
/// Unlike [`MarkerClassifier`], this isn't thrown off by runs that report more than one test.
#[derive(Clone, Debug, Default)]
pub struct CaseLineClassifier {
    policy: ClassifyPolicy,
}

impl CaseLineClassifier {
    /// Creates a new classifier.
    pub fn new(policy: ClassifyPolicy) -> Self {
        Self { policy }
    }
}

impl OutcomeClassifier for CaseLineClassifier {
    fn classify(&self, result: InvocationResult, case_id: &TestCaseId) -> Verdict {
        let marker_found = result.stdout.lines().any(|line| {
            line.strip_prefix(CASE_OK_PREFIX)
                .and_then(|rest| rest.strip_prefix(case_id.as_str()))
                .is_some_and(|tail| tail.is_empty() || tail.starts_with(' '))
        });
        Verdict::new(case_id, self.policy.combine(marker_found, &result), result)
    }
}

/// The outcome of classifying one case.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The case passed.
    Pass,

    /// The case ran and failed.
    Fail,

    /// The signals disagree, so the case is neither a clean pass nor a clean failure.
    Ambiguous {
        /// How the signals disagree.
        reason: ClassificationAmbiguity,
    },
}

/// The exit code and the success text disagree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClassificationAmbiguity {
    /// The success text was printed, but the process exited unsuccessfully, for example a crash
    /// during teardown.
    MarkerWithFailingExit {
        /// The exit code.
        exit_code: i32,

        /// The terminating signal, if any.
        signal: Option<i32>,
    },

    /// The process exited with code 0, but the success text was never printed.
    SuccessfulExitWithoutMarker,
}

impl fmt::Display for ClassificationAmbiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationAmbiguity::MarkerWithFailingExit { exit_code, signal } => write!(
                f,
                "success marker present but process exited with {}",
                describe_exit(*exit_code, *signal)
            ),
            ClassificationAmbiguity::SuccessfulExitWithoutMarker => {
                write!(f, "process exited with code 0 but success marker is absent")
            }
        }
    }
}

/// A pass/fail decision for one case, along with the output it was derived from.
#[derive(Clone, Debug)]
pub struct Verdict {
    /// The case.
    pub case_id: TestCaseId,

    /// The outcome.
    pub outcome: Outcome,

    /// The captured output the outcome was derived from.
    pub evidence: InvocationResult,
}

impl Verdict {
    fn new(case_id: &TestCaseId, outcome: Outcome, evidence: InvocationResult) -> Self {
        if let Outcome::Ambiguous { reason } = &outcome {
            warn!(%case_id, "ambiguous result: {reason}");
        }
        Self {
            case_id: case_id.clone(),
            outcome,
            evidence,
        }
    }

    /// Returns true if the case passed.
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Pass
    }

    /// Returns true if the outcome is ambiguous.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self.outcome, Outcome::Ambiguous { .. })
    }

    /// A short description of the outcome, used in failure messages.
    pub fn summary(&self) -> String {
        match &self.outcome {
            Outcome::Pass => "passed".to_owned(),
            Outcome::Fail => format!("failed ({})", self.evidence.describe_exit()),
            Outcome::Ambiguous { reason } => format!("is ambiguous: {reason}"),
        }
    }
}
