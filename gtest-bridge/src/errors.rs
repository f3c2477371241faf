// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{DETAIL_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use gtest_bridge_runner::{errors::*, exit_codes::BridgeExitCode};
use owo_colors::OwoColorize;
use std::{error::Error, path::PathBuf};
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that gtest-bridge knows how to report, along with its exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine current directory")]
    CurrentDirFailed {
        #[source]
        error: std::io::Error,
    },
    #[error("project root is not valid UTF-8")]
    ProjectRootInvalidUtf8 { path: PathBuf },
    #[error("project root not found")]
    ProjectRootNotFound { path: Utf8PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("profile not found")]
    ProfileNotFound {
        #[from]
        err: ProfileNotFound,
    },
    #[error("case filter build error")]
    TestFilterBuildError {
        #[from]
        err: TestFilterBuildError,
    },
    #[error("building test runner failed")]
    TestRunnerBuildError {
        #[from]
        err: TestRunnerBuildError,
    },
    #[error("case discovery failed")]
    ListCasesError {
        #[from]
        err: ListCasesError,
    },
    #[error("writing event failed")]
    WriteEventError {
        #[from]
        err: WriteEventError,
    },
    #[error("no cases to run")]
    NoCasesRun,
    #[error("cases failed")]
    CaseRunFailed,
    #[error("cases could not be run")]
    InfrastructureFailed,
    #[error("run canceled")]
    RunCanceled,
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::ProjectRootInvalidUtf8 { .. }
            | Self::ProjectRootNotFound { .. }
            | Self::ConfigParseError { .. }
            | Self::ProfileNotFound { .. }
            | Self::TestFilterBuildError { .. }
            | Self::TestRunnerBuildError { .. } => BridgeExitCode::SETUP_ERROR,
            Self::ListCasesError { .. } => BridgeExitCode::CASE_LIST_CREATION_FAILED,
            Self::WriteEventError { .. } => BridgeExitCode::WRITE_OUTPUT_ERROR,
            Self::NoCasesRun => BridgeExitCode::NO_CASES_RUN,
            Self::CaseRunFailed => BridgeExitCode::CASE_RUN_FAILED,
            Self::InfrastructureFailed => BridgeExitCode::INFRASTRUCTURE_FAILED,
            Self::RunCanceled => BridgeExitCode::CANCELED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirFailed { error } => {
                error!("could not determine current directory");
                Some(error as &dyn Error)
            }
            Self::ProjectRootInvalidUtf8 { path } => {
                error!(
                    "project root `{}` is not valid UTF-8",
                    path.display().style(styles.bold)
                );
                None
            }
            Self::ProjectRootNotFound { path } => {
                error!(
                    "project root `{}` is not a directory",
                    path.style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse gtest-bridge config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::ProfileNotFound { err } => {
                error!("{}", err);
                err.source()
            }
            Self::TestFilterBuildError { err } => {
                error!("{}", err);
                err.source()
            }
            Self::TestRunnerBuildError { err } => {
                error!("{}", err);
                err.source()
            }
            Self::ListCasesError { err } => {
                error!("{}", err);
                if let ListCasesError::Failed { stderr, .. } = err
                    && !stderr.is_empty()
                {
                    error!(
                        target: DETAIL_TARGET,
                        "\n{}\n{}",
                        "--- STDERR ---".style(styles.warning_text),
                        stderr.trim_end(),
                    );
                }
                err.source()
            }
            Self::WriteEventError { err } => {
                error!("failed to write event to output");
                Some(err as &dyn Error)
            }
            Self::NoCasesRun => {
                error!("no cases to run");
                None
            }
            Self::CaseRunFailed => {
                error!("one or more cases failed");
                None
            }
            Self::InfrastructureFailed => {
                error!("one or more cases could not be run");
                None
            }
            Self::RunCanceled => {
                error!("run canceled");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: DETAIL_TARGET, "caused by: {}", err);
            next_error = err.source();
        }
    }
}
