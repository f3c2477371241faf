// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints out and aggregates case statuses.
//!
//! The main structure in this module is [`TestReporter`].

use super::{
    displayer::{DisplayReporter, FailureOutput},
    events::TestEvent,
    junit::MetadataJunit,
};
use crate::{
    config::{BridgeProfile, JunitConfig},
    errors::WriteEventError,
};
use camino::Utf8PathBuf;
use std::io::{self, Write};

/// Standard error destination for the reporter.
///
/// This is usually a terminal, but can be an in-memory buffer for tests.
pub enum ReporterStderr<'a> {
    /// Produce output on the (possibly piped) terminal.
    Terminal,

    /// Write output to a buffer.
    Buffer(&'a mut Vec<u8>),
}

/// Test reporter builder.
#[derive(Debug, Default)]
pub struct TestReporterBuilder {
    should_colorize: bool,
    failure_output: Option<FailureOutput>,
    junit_path: Option<Utf8PathBuf>,
}

impl TestReporterBuilder {
    /// Set to true if the reporter should colorize output.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Sets the conditions under which the output of failing cases is shown.
    pub fn set_failure_output(&mut self, failure_output: FailureOutput) -> &mut Self {
        self.failure_output = Some(failure_output);
        self
    }

    /// Writes a JUnit report to `path`, whether or not the profile configures one.
    pub fn set_junit_path(&mut self, path: impl Into<Utf8PathBuf>) -> &mut Self {
        self.junit_path = Some(path.into());
        self
    }

    /// Creates a new test reporter.
    ///
    /// Settings not overridden on the builder are taken from `profile`.
    pub fn build<'a>(
        &self,
        profile: &BridgeProfile<'a>,
        output: ReporterStderr<'a>,
    ) -> TestReporter<'a> {
        let failure_output = self
            .failure_output
            .unwrap_or_else(|| profile.failure_output());
        let display_reporter = DisplayReporter::new(failure_output, self.should_colorize);
        let junit = match &self.junit_path {
            Some(path) => {
                let report_name = profile
                    .junit()
                    .map_or(JunitConfig::DEFAULT_REPORT_NAME, |junit| junit.report_name());
                Some(JunitConfig::new(path.clone(), report_name))
            }
            None => profile.junit(),
        };
        let metadata_reporter = junit.map(MetadataJunit::new);

        TestReporter {
            display_reporter,
            metadata_reporter,
            output,
        }
    }
}

/// Functionality to report case results to stderr and, if configured, to a JUnit report.
pub struct TestReporter<'a> {
    display_reporter: DisplayReporter,
    metadata_reporter: Option<MetadataJunit<'a>>,
    output: ReporterStderr<'a>,
}

impl<'a> TestReporter<'a> {
    /// Report a test event.
    pub fn report_event(&mut self, event: TestEvent<'a>) -> Result<(), WriteEventError> {
        match &mut self.output {
            ReporterStderr::Terminal => {
                // Buffer each event so that lines from different events aren't interleaved.
                let mut buf = Vec::new();
                self.display_reporter
                    .write_event(&event, &mut buf)
                    .map_err(WriteEventError::Io)?;
                let mut stderr = io::stderr().lock();
                stderr
                    .write_all(&buf)
                    .and_then(|()| stderr.flush())
                    .map_err(WriteEventError::Io)?;
            }
            ReporterStderr::Buffer(buf) => {
                self.display_reporter
                    .write_event(&event, &mut **buf)
                    .map_err(WriteEventError::Io)?;
            }
        }

        if let Some(metadata_reporter) = &mut self.metadata_reporter {
            metadata_reporter.write_event(event)?;
        }
        Ok(())
    }
}
