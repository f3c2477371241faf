// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable status lines for a run.

use super::events::{CancelReason, CaseResult, CaseStatus, TestEvent, captured_output};
use crate::{
    case_list::TestCaseId,
    classifier::Outcome,
    errors::{DisplayErrorChain, InvokeError, LaunchError},
    helpers::{DisplayBracketedDuration, plural, write_case_name},
    runner::RunStats,
};
use owo_colors::{OwoColorize, Style};
use serde::Deserialize;
use std::io::{self, Write};

/// When to show the captured output of failing cases.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureOutput {
    /// Show output as soon as the case finishes.
    Immediate,

    /// Never show output.
    Never,
}

impl FailureOutput {
    /// Returns true if output should be shown as soon as the case finishes.
    pub fn is_immediate(self) -> bool {
        matches!(self, FailureOutput::Immediate)
    }
}

pub(super) struct DisplayReporter {
    failure_output: FailureOutput,
    styles: Box<Styles>,
}

impl DisplayReporter {
    pub(super) fn new(failure_output: FailureOutput, should_colorize: bool) -> Self {
        let mut styles = Box::<Styles>::default();
        if should_colorize {
            styles.colorize();
        }
        Self {
            failure_output,
            styles,
        }
    }

    pub(super) fn write_event(
        &mut self,
        event: &TestEvent<'_>,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        match event {
            TestEvent::RunStarted { case_list } => {
                write!(writer, "{:>12} ", "Starting".style(self.styles.pass))?;
                let run_count = case_list.run_count();
                write!(
                    writer,
                    "{} {} from {}",
                    run_count.style(self.styles.count),
                    plural::cases_str(run_count),
                    case_list.binary().style(self.styles.binary),
                )?;

                let skip_count = case_list.skip_count();
                if skip_count > 0 {
                    write!(writer, " ({} skipped)", skip_count.style(self.styles.count))?;
                }
                writeln!(writer)?;
            }
            TestEvent::TestStarted { .. } => {}
            TestEvent::TestSlow { case_id, elapsed } => {
                write!(writer, "{:>12} ", "SLOW".style(self.styles.skip))?;
                write!(writer, "{} ", DisplayBracketedDuration(*elapsed))?;
                self.write_case_id(case_id, writer)?;
                writeln!(writer)?;
            }
            TestEvent::TestFinished { case_id, result } => {
                let status = CaseStatus::from_result(result);
                let style = if status.is_success() {
                    self.styles.pass
                } else {
                    self.styles.fail
                };
                write!(writer, "{:>12} ", status_str(status).style(style))?;
                match captured_output(result) {
                    Some(output) => {
                        write!(writer, "{} ", DisplayBracketedDuration(output.time_taken))?
                    }
                    // Same spacing as [   0.034s].
                    None => write!(writer, "[         ] ")?,
                }
                self.write_case_id(case_id, writer)?;
                writeln!(writer)?;

                if !status.is_success() && self.failure_output.is_immediate() {
                    self.write_failure_details(case_id, result, writer)?;
                }
            }
            TestEvent::TestSkipped { case_id, .. } => {
                write!(writer, "{:>12} ", "SKIP".style(self.styles.skip))?;
                // Same spacing as [   0.034s].
                write!(writer, "[         ] ")?;
                self.write_case_id(case_id, writer)?;
                writeln!(writer)?;
            }
            TestEvent::RunBeginCancel { running, reason } => {
                write!(writer, "{:>12} due to ", "Canceling".style(self.styles.fail))?;
                let reason_str = match reason {
                    CancelReason::Signal => "signal",
                    CancelReason::ReportError => "error",
                };
                write!(
                    writer,
                    "{}, {} {} still running",
                    reason_str.style(self.styles.count),
                    running.style(self.styles.count),
                    plural::cases_str(*running),
                )?;
                writeln!(writer)?;
            }
            TestEvent::RunFinished {
                elapsed, run_stats, ..
            } => {
                let summary_style = if run_stats.is_success() {
                    self.styles.pass
                } else {
                    self.styles.fail
                };
                write!(writer, "{:>12} ", "Summary".style(summary_style))?;
                write!(writer, "{} ", DisplayBracketedDuration(*elapsed))?;
                self.write_summary_counts(run_stats, writer)?;
                writeln!(writer)?;
            }
        }
        Ok(())
    }

    fn write_summary_counts(&self, run_stats: &RunStats, writer: &mut dyn Write) -> io::Result<()> {
        write!(writer, "{}", run_stats.final_run_count.style(self.styles.count))?;
        if run_stats.final_run_count != run_stats.initial_run_count {
            write!(
                writer,
                "{}",
                format!("/{}", run_stats.initial_run_count).style(self.styles.count)
            )?;
        }
        write!(
            writer,
            " {} run: ",
            plural::cases_str(run_stats.initial_run_count)
        )?;
        write!(
            writer,
            "{} {}, ",
            run_stats.passed.style(self.styles.count),
            "passed".style(self.styles.pass),
        )?;

        let failures = [
            (run_stats.failed, "failed"),
            (run_stats.ambiguous, "ambiguous"),
            (run_stats.launch_failed, "failed to launch"),
            (run_stats.timed_out, "timed out"),
            (run_stats.decode_failed, "failed to decode"),
            (run_stats.leaked, "leaked processes"),
            (run_stats.canceled, "canceled"),
        ];
        for (count, label) in failures {
            if count > 0 {
                write!(
                    writer,
                    "{} {}, ",
                    count.style(self.styles.count),
                    label.style(self.styles.fail),
                )?;
            }
        }

        write!(
            writer,
            "{} {}",
            run_stats.skipped.style(self.styles.count),
            "skipped".style(self.styles.skip),
        )
    }

    fn write_failure_details(
        &self,
        case_id: &TestCaseId,
        result: &CaseResult,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        match result {
            Ok(verdict) => {
                if let Outcome::Ambiguous { reason } = &verdict.outcome {
                    self.write_header("AMBIGUOUS", case_id, writer)?;
                    writeln!(writer, "{}", reason.style(self.styles.fail_output))?;
                }
            }
            Err(error) => {
                self.write_header("ERROR", case_id, writer)?;
                writeln!(
                    writer,
                    "{}",
                    DisplayErrorChain::new(error).style(self.styles.fail_output)
                )?;
            }
        }

        if let Some(output) = captured_output(result) {
            self.write_output("STDOUT", case_id, &output.stdout, writer)?;
            self.write_output("STDERR", case_id, &output.stderr, writer)?;
        } else if let Err(InvokeError::Launch(LaunchError::NotRunnable { stderr, .. })) = result {
            self.write_output("STDERR", case_id, stderr, writer)?;
        }

        writeln!(writer)
    }

    fn write_header(
        &self,
        kind: &str,
        case_id: &TestCaseId,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        writeln!(
            writer,
            "{}",
            format!("\n--- {kind}: {case_id} ---").style(self.styles.fail)
        )
    }

    fn write_output(
        &self,
        kind: &str,
        case_id: &TestCaseId,
        output: &str,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        writeln!(
            writer,
            "{}",
            format!("--- {kind}: {case_id} ---").style(self.styles.fail)
        )?;
        write!(writer, "{}", output.style(self.styles.fail_output))?;
        if !output.is_empty() && !output.ends_with('\n') {
            writeln!(writer)?;
        }
        Ok(())
    }

    fn write_case_id(&self, case_id: &TestCaseId, writer: &mut dyn Write) -> io::Result<()> {
        let mut name = String::new();
        // Writing to a String can't fail.
        let _ = write_case_name(case_id.as_str(), self.styles.case_name, &mut name);
        write!(writer, "{name}")
    }
}

fn status_str(status: CaseStatus) -> &'static str {
    match status {
        CaseStatus::Pass => "PASS",
        CaseStatus::Fail => "FAIL",
        CaseStatus::Ambiguous => "AMBIGUOUS",
        CaseStatus::LaunchFailed => "LAUNCH",
        CaseStatus::TimedOut => "TIMEOUT",
        CaseStatus::DecodeFailed => "DECODE",
        CaseStatus::Canceled => "CANCEL",
        CaseStatus::Leaked => "LEAK",
    }
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    fail_output: Style,
    skip: Style,
    binary: Style,
    case_name: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.fail_output = Style::new().magenta();
        self.skip = Style::new().yellow().bold();
        self.binary = Style::new().magenta().bold();
        self.case_name = Style::new().blue().bold();
    }
}
