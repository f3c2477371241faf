// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Captured output of a single delegated invocation.

use crate::helpers::describe_exit;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    time::{Duration, SystemTime},
};

/// The result of running the delegated binary once, for one case.
///
/// Produced once per invocation and never mutated afterwards.
#[derive(Clone, Debug)]
pub struct InvocationResult {
    /// The exit code of the process.
    ///
    /// If the process was terminated by a signal, this is `128 + signal`.
    pub exit_code: i32,

    /// The signal that terminated the process, if any.
    pub signal: Option<i32>,

    /// Standard output, decoded as text.
    pub stdout: String,

    /// Standard error, decoded as text.
    pub stderr: String,

    /// When the process was started.
    pub start_time: SystemTime,

    /// How long the process ran for.
    pub time_taken: Duration,
}

impl InvocationResult {
    /// Returns true if the process exited with code 0.
    pub fn exited_successfully(&self) -> bool {
        self.exit_code == 0 && self.signal.is_none()
    }

    /// Returns a description of how the process exited, e.g. "exit code 1".
    pub fn describe_exit(&self) -> String {
        describe_exit(self.exit_code, self.signal)
    }
}

/// How captured bytes are turned into text.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecodePolicy {
    /// Invalid UTF-8 is replaced with U+FFFD.
    #[default]
    Lossy,

    /// Invalid UTF-8 is an error.
    Strict,
}

impl DecodePolicy {
    /// Decodes one captured stream.
    pub fn decode(self, bytes: Vec<u8>) -> Result<String, std::string::FromUtf8Error> {
        match self {
            DecodePolicy::Lossy => match String::from_utf8(bytes) {
                Ok(s) => Ok(s),
                Err(error) => Ok(String::from_utf8_lossy(error.as_bytes()).into_owned()),
            },
            DecodePolicy::Strict => String::from_utf8(bytes),
        }
    }
}

/// One of the two captured output streams.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StreamKind {
    /// Standard output.
    Stdout,

    /// Standard error.
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}
