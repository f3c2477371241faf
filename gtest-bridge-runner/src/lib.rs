// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core logic for running test cases that live in an external GoogleTest binary.
//!
//! The bridge resolves the binary's location, runs it once per test case with a case filter,
//! and turns the captured output into a pass/fail [`Verdict`](classifier::Verdict) that can be
//! surfaced through Rust's own test idioms, a terminal reporter, or a JUnit report.
//!
//! The main entry points are:
//!
//! * [`DelegatingBridge`](bridge::DelegatingBridge) for running a single case.
//! * [`TestRunner`](runner::TestRunner) for running a list of cases with events.

#![warn(missing_docs)]

pub mod bridge;
pub mod case_list;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod exit_codes;
mod helpers;
pub mod invoker;
pub mod locator;
pub mod reporter;
pub mod runner;
pub mod signal;
mod stopwatch;
pub mod test_filter;
pub mod test_output;
