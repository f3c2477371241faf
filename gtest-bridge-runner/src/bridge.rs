// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs one delegated case end to end and surfaces the result in Rust's test idiom.
//!
//! A [`DelegatingBridge`] holds no per-case state: every call locates the binary, invokes it once
//! for the case, and classifies what it printed. Nothing is retried.
//!
//! ```no_run
//! use gtest_bridge_runner::bridge::DelegatingBridge;
//!
//! // In <project-root>/tests/controller.rs:
//! let bridge = DelegatingBridge::from_anchor(file!());
//! bridge.assert_case_passes("ControllerTest.BasicTest");
//! ```

use crate::{
    case_list::TestCaseId,
    classifier::{MarkerClassifier, OutcomeClassifier, Verdict},
    errors::{CaseFailure, InvokeError},
    invoker::{InvokeHooks, ProcessInvoker},
    locator::{BinaryLocator, DEFAULT_BINARY_NAME},
};
use camino::{Utf8Path, Utf8PathBuf};

/// Delegates cases to an external GoogleTest binary.
#[derive(Debug)]
pub struct DelegatingBridge {
    binary_path: Utf8PathBuf,
    invoker: ProcessInvoker,
    classifier: Box<dyn OutcomeClassifier>,
}

impl DelegatingBridge {
    /// Creates a bridge for the binary at `binary_path`, classifying with the default
    /// [`MarkerClassifier`].
    pub fn new(binary_path: impl Into<Utf8PathBuf>, invoker: ProcessInvoker) -> Self {
        Self {
            binary_path: binary_path.into(),
            invoker,
            classifier: Box::new(MarkerClassifier::default()),
        }
    }

    /// Creates a bridge for the binary found by `locator`, with default settings.
    pub fn from_locator(locator: &BinaryLocator) -> Self {
        Self::new(locator.binary_path(), ProcessInvoker::new())
    }

    /// Creates a bridge for `<project-root>/build/tests/test_controller`, where the project root
    /// is two levels above `anchor`.
    ///
    /// `anchor` is typically `file!()` for a test file in `<project-root>/tests/`.
    pub fn from_anchor(anchor: impl AsRef<Utf8Path>) -> Self {
        Self::from_locator(&BinaryLocator::from_anchor(anchor, DEFAULT_BINARY_NAME))
    }

    /// Replaces the classifier.
    pub fn with_classifier(mut self, classifier: Box<dyn OutcomeClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Returns the path to the delegated binary.
    pub fn binary_path(&self) -> &Utf8Path {
        &self.binary_path
    }

    /// Returns the invoker.
    pub fn invoker(&self) -> &ProcessInvoker {
        &self.invoker
    }

    /// Runs `case_id` and classifies the result.
    ///
    /// Infrastructure failures are returned as errors and never reach the classifier.
    pub fn run_case(&self, case_id: impl Into<TestCaseId>) -> Result<Verdict, InvokeError> {
        self.run_case_with(&case_id.into(), InvokeHooks::default())
    }

    /// Like [`run_case`](Self::run_case), with cancellation and slow-case hooks.
    pub fn run_case_with(
        &self,
        case_id: &TestCaseId,
        hooks: InvokeHooks<'_>,
    ) -> Result<Verdict, InvokeError> {
        let result = self.invoker.invoke_with(&self.binary_path, case_id, hooks)?;
        Ok(self.classifier.classify(result, case_id))
    }

    /// Runs `case_id`, returning `Ok(())` only if it passed.
    ///
    /// On failure the error carries the full captured stdout and stderr.
    pub fn check_case(&self, case_id: impl Into<TestCaseId>) -> Result<(), CaseFailure> {
        let case_id = case_id.into();
        match self.run_case_with(&case_id, InvokeHooks::default()) {
            Ok(verdict) => verdict_to_result(verdict),
            Err(error) => Err(CaseFailure::Infrastructure { case_id, error }),
        }
    }

    /// Runs `case_id` and panics with the captured output unless it passed.
    #[track_caller]
    pub fn assert_case_passes(&self, case_id: impl Into<TestCaseId>) {
        if let Err(failure) = self.check_case(case_id) {
            panic!("{failure}");
        }
    }
}

/// Converts a verdict into the `Result` form used by [`DelegatingBridge::check_case`].
pub fn verdict_to_result(verdict: Verdict) -> Result<(), CaseFailure> {
    if verdict.passed() {
        return Ok(());
    }
    let summary = verdict.summary();
    Err(CaseFailure::Verdict {
        case_id: verdict.case_id,
        summary,
        evidence: verdict.evidence,
    })
}
