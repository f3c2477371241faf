// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use owo_colors::{OwoColorize, Style};
use std::{fmt, time::Duration};

pub(crate) mod plural {
    /// Returns "case" if `count` is 1, otherwise "cases".
    pub(crate) fn cases_str(count: usize) -> &'static str {
        if count == 1 { "case" } else { "cases" }
    }
}

/// Writes out a case name, highlighting the part after the last `.` (the gtest case within its
/// suite).
pub(crate) fn write_case_name(name: &str, style: Style, mut writer: impl fmt::Write) -> fmt::Result {
    match name.rsplit_once('.') {
        Some((suite, case)) => write!(writer, "{suite}.{}", case.style(style)),
        None => write!(writer, "{}", name.style(style)),
    }
}

/// Formats a duration the way the displayer prints per-case times, e.g. `[   0.014s]`.
pub(crate) struct DisplayBracketedDuration(pub(crate) Duration);

impl fmt::Display for DisplayBracketedDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // * > means right-align.
        // * 8 is the number of characters to pad to.
        // * .3 means print three digits after the decimal point.
        write!(f, "[{:>8.3?}s]", self.0.as_secs_f64())
    }
}

/// Returns the conventional abbreviation for a Unix signal number, if it's a common one.
pub(crate) fn signal_str(signal: i32) -> Option<&'static str> {
    // These numbers are the same on at least Linux, macOS and FreeBSD.
    match signal {
        1 => Some("HUP"),
        2 => Some("INT"),
        3 => Some("QUIT"),
        4 => Some("ILL"),
        5 => Some("TRAP"),
        6 => Some("ABRT"),
        8 => Some("FPE"),
        9 => Some("KILL"),
        11 => Some("SEGV"),
        13 => Some("PIPE"),
        14 => Some("ALRM"),
        15 => Some("TERM"),
        _ => None,
    }
}

/// Describes how a child exited, for error messages and reports.
pub(crate) fn describe_exit(exit_code: i32, signal: Option<i32>) -> String {
    match signal {
        Some(signal) => match signal_str(signal) {
            Some(name) => format!("signal {signal} (SIG{name})"),
            None => format!("signal {signal}"),
        },
        None => format!("exit code {exit_code}"),
    }
}
