// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for gtest-bridge's integration tests.

pub mod bridge_cli;
pub mod temp_project;
