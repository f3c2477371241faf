// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the bridge.

use crate::{
    case_list::TestCaseId,
    helpers::describe_exit,
    test_output::{InvocationResult, StreamKind},
};
use camino::{Utf8Path, Utf8PathBuf};
use config::ConfigError;
use std::{error::Error, fmt, time::Duration};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse gtest-bridge config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// Returns the kind of error that occurred.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing the config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while reading or merging config sources.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the merged config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// The merged config has no `default` profile.
    #[error("profile `default` is missing")]
    MissingDefaultProfile,

    /// The default profile doesn't set a required key.
    #[error("profile `default` is missing required key `{0}`")]
    MissingDefaultKey(&'static str),
}

/// An error which indicates that a profile was requested but isn't defined.
#[derive(Clone, Debug, Error)]
#[error("profile `{profile}` not found (known profiles: {})", .all_profiles.join(", "))]
pub struct ProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl ProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_profiles: Vec<_> = all_profiles.into_iter().map(|s| s.into()).collect();
        all_profiles.sort_unstable();
        Self {
            profile: profile.into(),
            all_profiles,
        }
    }
}

/// The delegated binary could not be run at all.
///
/// This is an infrastructure failure: it says nothing about the code under test.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LaunchError {
    /// The operating system refused to start the process.
    #[error("failed to launch `{command}`")]
    Spawn {
        /// The command line that was attempted.
        command: String,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The process started, but exited with a "not found" or "not executable" exit code without
    /// producing any output.
    #[error(
        "`{command}` exited with {} before running any tests",
        describe_exit(*.exit_code, None)
    )]
    NotRunnable {
        /// The command line that was run.
        command: String,

        /// The exit code, conventionally 126 or 127.
        exit_code: i32,

        /// Whatever the process wrote to standard error.
        stderr: String,
    },

    /// Waiting on the process or reading its output failed.
    #[error("error while waiting for `{command}`")]
    Wait {
        /// The command line that was run.
        command: String,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },
}

impl LaunchError {
    /// Returns the command line associated with this error.
    pub fn command(&self) -> &str {
        match self {
            LaunchError::Spawn { command, .. }
            | LaunchError::NotRunnable { command, .. }
            | LaunchError::Wait { command, .. } => command,
        }
    }
}

/// The delegated binary didn't exit within the configured time and was terminated.
#[derive(Debug, Error)]
#[error("`{command}` timed out after {}", humantime::format_duration(*.timeout))]
pub struct TimeoutError {
    /// The command line that was run.
    pub command: String,

    /// The configured timeout.
    pub timeout: Duration,

    /// Output captured before the process was terminated.
    pub partial: InvocationResult,
}

/// The delegated binary wrote output that isn't valid UTF-8, and strict decoding is enabled.
#[derive(Debug, Error)]
#[error("{stream} of `{command}` is not valid UTF-8")]
pub struct DecodeError {
    /// The command line that was run.
    pub command: String,

    /// The stream that failed to decode.
    pub stream: StreamKind,

    /// The captured output, decoded lossily so it can still be shown.
    pub lossy: InvocationResult,

    /// The underlying error.
    #[source]
    pub error: std::string::FromUtf8Error,
}

/// An error that occurred while invoking a delegated case.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InvokeError {
    /// The binary could not be run.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// The binary didn't finish in time.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// The binary's output couldn't be decoded.
    #[error(transparent)]
    Decode(#[from] Box<DecodeError>),

    /// The run was canceled while the binary was executing; the binary was terminated.
    #[error("`{command}` was terminated because the run was canceled")]
    Canceled {
        /// The command line that was run.
        command: String,

        /// Output captured before the process was terminated.
        partial: InvocationResult,
    },

    /// The binary exited, but processes it started kept its output open past the leak timeout.
    /// They were killed.
    #[error(
        "`{command}` exited, but left processes holding its output open for longer than {}",
        humantime::format_duration(*.leak_timeout)
    )]
    Leaked {
        /// The command line that was run.
        command: String,

        /// How long the output was allowed to stay open after the binary exited.
        leak_timeout: Duration,

        /// Output captured before the leftover processes were killed.
        partial: InvocationResult,
    },
}

impl InvokeError {
    /// Returns whatever output was captured before the error, if any.
    pub fn partial_output(&self) -> Option<&InvocationResult> {
        match self {
            InvokeError::Launch(_) => None,
            InvokeError::Timeout(error) => Some(&error.partial),
            InvokeError::Decode(error) => Some(&error.lossy),
            InvokeError::Canceled { partial, .. } | InvokeError::Leaked { partial, .. } => {
                Some(partial)
            }
        }
    }

    /// A short, stable label for this kind of error.
    pub fn kind_str(&self) -> &'static str {
        match self {
            InvokeError::Launch(_) => "launch error",
            InvokeError::Timeout(_) => "timeout",
            InvokeError::Decode(_) => "decode error",
            InvokeError::Canceled { .. } => "canceled",
            InvokeError::Leaked { .. } => "leaked processes",
        }
    }
}

/// A delegated case didn't pass.
///
/// Produced by [`DelegatingBridge::check_case`](crate::bridge::DelegatingBridge::check_case). The
/// `Display` implementation includes the full captured stdout and stderr, so that the failure can
/// be diagnosed without re-running the case. For infrastructure failures it also includes the
/// whole chain of causes, so `source` returns `None`.
#[derive(Debug)]
#[non_exhaustive]
pub enum CaseFailure {
    /// The case ran and its verdict was not a pass.
    Verdict {
        /// The case that failed.
        case_id: TestCaseId,

        /// A description of the verdict, e.g. "failed" or "ambiguous: ...".
        summary: String,

        /// The captured output.
        evidence: InvocationResult,
    },

    /// The case could not be run to completion.
    Infrastructure {
        /// The case that failed.
        case_id: TestCaseId,

        /// The underlying error.
        error: InvokeError,
    },
}

impl CaseFailure {
    /// Returns true if this failure is an infrastructure failure rather than a failure of the code
    /// under test.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, CaseFailure::Infrastructure { .. })
    }

    /// Returns the case that failed.
    pub fn case_id(&self) -> &TestCaseId {
        match self {
            CaseFailure::Verdict { case_id, .. } | CaseFailure::Infrastructure { case_id, .. } => {
                case_id
            }
        }
    }
}

impl fmt::Display for CaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseFailure::Verdict {
                case_id,
                summary,
                evidence,
            } => {
                write!(
                    f,
                    "GTest '{case_id}' {summary}:\n{}\n{}",
                    evidence.stdout, evidence.stderr
                )
            }
            CaseFailure::Infrastructure { case_id, error } => {
                write!(
                    f,
                    "GTest '{case_id}' could not be run (infrastructure error: {})",
                    DisplayErrorChain::new(error)
                )?;
                if let Some(partial) = error.partial_output() {
                    write!(f, "\n{}\n{}", partial.stdout, partial.stderr)?;
                }
                if let InvokeError::Launch(LaunchError::NotRunnable { stderr, .. }) = error {
                    write!(f, "\n{stderr}")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for CaseFailure {}

/// An error that occurred while building a [`TestFilter`](crate::test_filter::TestFilter).
#[derive(Clone, Debug, Error)]
#[error("error building case filter")]
pub struct TestFilterBuildError(#[from] aho_corasick::BuildError);

/// An error that occurred while discovering the cases in a binary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ListCasesError {
    /// Running the binary failed.
    #[error("running `{command}` failed")]
    Exec {
        /// The command line that was run.
        command: String,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The binary exited unsuccessfully.
    #[error("`{command}` exited with {}", describe_exit(*.exit_code, None))]
    Failed {
        /// The command line that was run.
        command: String,

        /// The exit code of the binary, or -1 if it was terminated by a signal.
        exit_code: i32,

        /// The standard error of the binary.
        stderr: String,
    },

    /// The binary didn't finish listing its cases in time and was killed.
    #[error("`{command}` didn't finish within {}", humantime::format_duration(*.timeout))]
    TimedOut {
        /// The command line that was run.
        command: String,

        /// The time limit.
        timeout: Duration,
    },

    /// A line in the list output couldn't be parsed.
    #[error("line {line_number} of `{command}` output is a case without a suite: `{line}`")]
    Parse {
        /// The command line that was run.
        command: String,

        /// The 1-based line number.
        line_number: usize,

        /// The line itself.
        line: String,
    },
}

/// An error that occurs while writing an event or a report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing the event to the provided output.
    #[error("error writing to output")]
    Io(#[source] std::io::Error),

    /// An error occurred while serializing output.
    #[error("error serializing output")]
    Serialize(#[source] serde_json::Error),

    /// An error occurred while operating on the file system.
    #[error("error operating on path {file}")]
    Fs {
        /// The file being operated on.
        file: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// An error occurred while producing JUnit XML.
    #[error("error writing JUnit output to {file}")]
    Junit {
        /// The output file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: quick_junit::SerializeError,
    },
}

/// An error that occurred while setting up the signal handler.
#[derive(Debug, Error)]
#[error("error setting up signal handler")]
pub struct SignalHandlerSetupError(#[from] ctrlc::Error);

/// An error that occurred while building a test runner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestRunnerBuildError {
    /// The signal handler couldn't be set up.
    #[error("error setting up signals")]
    SignalHandlerSetupError(#[from] SignalHandlerSetupError),
}

/// Displays an error along with its chain of causes, one per line.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        let mut source = self.error.source();
        while let Some(error) = source {
            write!(f, "\n  caused by: {error}")?;
            source = error.source();
        }
        Ok(())
    }
}
