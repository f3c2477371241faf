// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    errors::Result,
    output::{OutputContext, OutputOpts, OutputWriter, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gtest_bridge_runner::{
    bridge::DelegatingBridge,
    case_list::{CaseList, OutputFormat},
    classifier::{ClassifierKind, ClassifyPolicy},
    config::{BridgeConfig, BridgeProfile},
    errors::WriteEventError,
    exit_codes::BridgeExitCode,
    reporter::{FailureOutput, TestReporterBuilder},
    runner::{RunStats, TestRunnerBuilder},
    signal::SignalHandlerKind,
    test_filter::TestFilter,
};
use std::{io::Write, time::Duration};
use supports_color::Stream;
use tracing::{debug, warn};

/// Runs the cases of an external GoogleTest binary, one process per case.
///
/// Each case is run as `<binary> --gtest_filter=<case-id>`, and its result is decided from the
/// binary's output and exit code.
#[derive(Debug, Parser)]
#[command(version, styles = clap_styles::style())]
pub struct GtestBridgeApp {
    /// Project root [default: current directory]
    #[arg(long, global = true, value_name = "DIR")]
    project_root: Option<Utf8PathBuf>,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(flatten)]
    output: OutputOpts,

    #[command(subcommand)]
    command: Command,
}

impl GtestBridgeApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code on success.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        self.exec_impl(output, output_writer, SignalHandlerKind::Standard)
    }

    fn exec_impl(
        self,
        output: OutputContext,
        output_writer: &mut OutputWriter,
        handler_kind: SignalHandlerKind,
    ) -> Result<i32> {
        let project_root = resolve_project_root(self.project_root)?;
        let config = self.config_opts.make_config(&project_root)?;
        let profile = self.config_opts.make_profile(&config)?;

        match self.command {
            Command::List {
                cases_opts,
                message_format,
            } => {
                let case_list = cases_opts.compute(&profile)?;
                let mut writer = output_writer.stdout_writer();
                case_list.write(
                    message_format.into(),
                    &mut writer,
                    output.color.should_colorize(Stream::Stdout),
                )?;
                writer
                    .flush()
                    .map_err(|err| ExpectedError::WriteEventError {
                        err: WriteEventError::Io(err),
                    })?;
                Ok(BridgeExitCode::OK)
            }
            Command::Run {
                cases_opts,
                runner_opts,
                reporter_opts,
            } => {
                let case_list = cases_opts.compute(&profile)?;
                let bridge = runner_opts.make_bridge(&profile, case_list.binary());
                debug!(
                    binary = %bridge.binary_path(),
                    profile = profile.name(),
                    "running cases",
                );

                let mut reporter_builder = reporter_opts.to_builder();
                reporter_builder.set_colorize(output.color.should_colorize(Stream::Stderr));
                let mut reporter =
                    reporter_builder.build(&profile, output_writer.reporter_output());

                let runner = runner_opts
                    .to_builder(&profile)
                    .build(&case_list, &bridge, handler_kind)?;
                let run_stats = runner.try_execute(|event| reporter.report_event(event))?;
                final_result(&run_stats)
            }
        }
    }
}

fn resolve_project_root(project_root: Option<Utf8PathBuf>) -> Result<Utf8PathBuf> {
    let project_root = match project_root {
        Some(project_root) => project_root,
        None => {
            let current_dir = std::env::current_dir()
                .map_err(|error| ExpectedError::CurrentDirFailed { error })?;
            Utf8PathBuf::try_from(current_dir).map_err(|err| {
                ExpectedError::ProjectRootInvalidUtf8 {
                    path: err.into_path_buf(),
                }
            })?
        }
    };
    if !project_root.is_dir() {
        return Err(ExpectedError::ProjectRootNotFound { path: project_root });
    }
    Ok(project_root)
}

/// Maps the stats of a finished run to an exit code.
///
/// Cancellation wins over infrastructure failures, which win over case failures.
fn final_result(run_stats: &RunStats) -> Result<i32> {
    if run_stats.is_canceled() {
        Err(ExpectedError::RunCanceled)
    } else if run_stats.has_infrastructure_failures() {
        Err(ExpectedError::InfrastructureFailed)
    } else if !run_stats.is_success() {
        Err(ExpectedError::CaseRunFailed)
    } else if run_stats.initial_run_count == 0 {
        Err(ExpectedError::NoCasesRun)
    } else {
        Ok(BridgeExitCode::OK)
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: project-root/.config/gtest-bridge.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Config profile to use
    #[arg(
        long,
        short = 'P',
        global = true,
        env = "GTEST_BRIDGE_PROFILE",
        default_value = BridgeConfig::DEFAULT_PROFILE,
    )]
    profile: String,
}

impl ConfigOpts {
    fn make_config(&self, project_root: &Utf8Path) -> Result<BridgeConfig> {
        Ok(BridgeConfig::from_sources(
            project_root,
            self.config_file.as_deref(),
        )?)
    }

    fn make_profile<'cfg>(&self, config: &'cfg BridgeConfig) -> Result<BridgeProfile<'cfg>> {
        Ok(config.profile(&self.profile)?)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the cases that would be run
    ///
    /// Cases come from the profile's `cases` list, or with --discover from the binary itself.
    List {
        #[command(flatten)]
        cases_opts: CasesOpts,

        /// Output format
        #[arg(
            short = 'T',
            long,
            value_enum,
            default_value_t,
            help_heading = "OUTPUT OPTIONS",
            value_name = "FMT"
        )]
        message_format: MessageFormatOpts,
    },
    /// Run cases, each one in its own process
    Run {
        #[command(flatten)]
        cases_opts: CasesOpts,

        #[command(flatten)]
        runner_opts: RunnerOpts,

        #[command(flatten)]
        reporter_opts: ReporterOpts,
    },
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum MessageFormatOpts {
    #[default]
    Plain,
    Json,
    JsonPretty,
}

impl From<MessageFormatOpts> for OutputFormat {
    fn from(opts: MessageFormatOpts) -> Self {
        match opts {
            MessageFormatOpts::Plain => OutputFormat::Plain,
            MessageFormatOpts::Json => OutputFormat::Json,
            MessageFormatOpts::JsonPretty => OutputFormat::JsonPretty,
        }
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "CASE OPTIONS")]
struct CasesOpts {
    /// Path to the GoogleTest binary [default: from the profile]
    #[arg(long, value_name = "PATH", env = "GTEST_BRIDGE_BINARY")]
    binary: Option<Utf8PathBuf>,

    /// Ask the binary for its cases with --gtest_list_tests
    #[arg(long)]
    discover: bool,

    /// Skip cases whose ids contain this text
    #[arg(long, value_name = "PATTERN")]
    skip: Vec<String>,

    /// Only run cases whose ids contain one of these
    #[arg(value_name = "FILTERS", help_heading = None)]
    filters: Vec<String>,
}

impl CasesOpts {
    fn compute(&self, profile: &BridgeProfile<'_>) -> Result<CaseList> {
        let binary = match &self.binary {
            Some(binary) => binary.clone(),
            None => profile.locator().binary_path(),
        };
        let filter = TestFilter::new(&self.filters, &self.skip)?;

        let case_list = if self.discover {
            CaseList::discover(binary, &filter, profile.timeout())?
        } else {
            CaseList::new(binary, profile.cases(), &filter)
        };
        if case_list.case_count() == 0 {
            warn!("profile `{}` lists no cases", profile.name());
        }
        Ok(case_list)
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PolicyOpt {
    /// Success text and exit code must agree
    Strict,
    /// Only the success text counts
    MarkerOnly,
}

impl From<PolicyOpt> for ClassifyPolicy {
    fn from(opt: PolicyOpt) -> Self {
        match opt {
            PolicyOpt::Strict => ClassifyPolicy::Strict,
            PolicyOpt::MarkerOnly => ClassifyPolicy::MarkerOnly,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ClassifierOpt {
    /// Look for the configured success marker
    Marker,
    /// Look for the "[       OK ] <case-id>" line
    CaseLine,
}

impl From<ClassifierOpt> for ClassifierKind {
    fn from(opt: ClassifierOpt) -> Self {
        match opt {
            ClassifierOpt::Marker => ClassifierKind::Marker,
            ClassifierOpt::CaseLine => ClassifierKind::CaseLine,
        }
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "RUNNER OPTIONS")]
struct RunnerOpts {
    /// Number of cases to run at once [default: from the profile]
    #[arg(long, short = 'j', visible_alias = "jobs", value_name = "THREADS")]
    test_threads: Option<usize>,

    /// Terminate cases that run longer than this; 0s waits forever
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// How the success text and the exit code combine
    #[arg(long, value_enum)]
    policy: Option<PolicyOpt>,

    /// Which success text to look for
    #[arg(long, value_enum)]
    classifier: Option<ClassifierOpt>,
}

impl RunnerOpts {
    fn make_bridge(&self, profile: &BridgeProfile<'_>, binary: &Utf8Path) -> DelegatingBridge {
        let mut invoker = profile.invoker();
        if let Some(timeout) = self.timeout {
            invoker.set_timeout((!timeout.is_zero()).then_some(timeout));
        }
        let kind = self
            .classifier
            .map_or_else(|| profile.classifier(), Into::into);
        let policy = self.policy.map_or_else(|| profile.policy(), Into::into);

        DelegatingBridge::new(binary, invoker)
            .with_classifier(kind.build(profile.success_marker(), policy))
    }

    fn to_builder(&self, profile: &BridgeProfile<'_>) -> TestRunnerBuilder {
        let mut builder = TestRunnerBuilder::default();
        let test_threads = self
            .test_threads
            .unwrap_or_else(|| profile.test_threads().compute());
        builder.set_test_threads(test_threads);
        builder
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FailureOutputOpt {
    /// Show output as soon as the case finishes
    Immediate,
    /// Never show output
    Never,
}

impl From<FailureOutputOpt> for FailureOutput {
    fn from(opt: FailureOutputOpt) -> Self {
        match opt {
            FailureOutputOpt::Immediate => FailureOutput::Immediate,
            FailureOutputOpt::Never => FailureOutput::Never,
        }
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "REPORTER OPTIONS")]
struct ReporterOpts {
    /// Output stdout and stderr of failing cases
    #[arg(long, value_enum, value_name = "WHEN", env = "GTEST_BRIDGE_FAILURE_OUTPUT")]
    failure_output: Option<FailureOutputOpt>,

    /// Write a JUnit report to this file
    #[arg(long, value_name = "PATH")]
    junit: Option<Utf8PathBuf>,
}

impl ReporterOpts {
    fn to_builder(&self) -> TestReporterBuilder {
        let mut builder = TestReporterBuilder::default();
        if let Some(failure_output) = self.failure_output {
            builder.set_failure_output(failure_output.into());
        }
        if let Some(junit) = &self.junit {
            builder.set_junit_path(junit.clone());
        }
        builder
    }
}
