// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs the cases of an external GoogleTest binary, one process per case.
//!
//! The binary is found at `<project-root>/build/tests/test_controller` by default. Settings are
//! read from `.config/gtest-bridge.toml` in the project root.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter};
