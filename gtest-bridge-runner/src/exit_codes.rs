// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `gtest-bridge` failures.
///
/// Runs may fail for a variety of reasons. This structure documents the exit codes that may occur
/// in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum BridgeExitCode {}

impl BridgeExitCode {
    /// No errors occurred and gtest-bridge exited normally.
    pub const OK: i32 = 0;

    /// No cases were selected to run, but no other errors occurred.
    pub const NO_CASES_RUN: i32 = 4;

    /// A user issue happened while setting up a run, for example a bad config file.
    pub const SETUP_ERROR: i32 = 96;

    /// One or more cases failed or were ambiguous.
    pub const CASE_RUN_FAILED: i32 = 100;

    /// One or more cases couldn't be run: the binary failed to launch, timed out, or produced
    /// output that couldn't be decoded.
    ///
    /// Takes precedence over [`CASE_RUN_FAILED`](Self::CASE_RUN_FAILED).
    pub const INFRASTRUCTURE_FAILED: i32 = 103;

    /// Listing or discovering cases produced an error.
    pub const CASE_LIST_CREATION_FAILED: i32 = 104;

    /// Writing data to stdout, stderr or a report produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// The run was canceled by a signal.
    pub const CANCELED: i32 = 130;
}
