// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Report the results of a run in human and machine-readable formats.
//!
//! The main type here is [`TestReporter`], which is constructed via a [`TestReporterBuilder`].

mod displayer;
mod events;
mod imp;
mod junit;

pub use displayer::FailureOutput;
pub use events::*;
pub use imp::*;
