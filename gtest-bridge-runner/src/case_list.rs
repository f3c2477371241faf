// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The set of cases a run delegates to the external binary.
//!
//! Cases come from configuration, from the command line, or from asking the binary itself with
//! `--gtest_list_tests`.

use crate::{
    errors::{ListCasesError, WriteEventError},
    helpers::write_case_name,
    test_filter::{FilterMatch, TestFilter},
};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use owo_colors::{OwoColorize, Style};
use serde::{Deserialize, Serialize};
use std::{
    fmt, io,
    time::{Duration, Instant},
};
use tracing::debug;

/// The controller cases that the C++ test binary defines.
pub const DEFAULT_CASES: [&str; 6] = [
    "ControllerTest.BasicTest",
    "ControllerTest.IntegralTest",
    "ControllerTest.ProportionalTest",
    "ControllerTest.ProportionalTest2",
    "ControllerTest.DerivativeTest",
    "ControllerTest.ResetTest",
];

/// Identifies one case in the external binary, in `Suite.Case` form.
///
/// The id is opaque: it is passed to the binary verbatim.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TestCaseId(String);

impl TestCaseId {
    /// Creates a new case id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the suite part of the id (before the last `.`), if any.
    pub fn suite(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(suite, _)| suite)
    }

    /// Returns the case part of the id (after the last `.`).
    pub fn case_name(&self) -> &str {
        self.0.rsplit_once('.').map_or(&self.0, |(_, case)| case)
    }
}

impl fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestCaseId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TestCaseId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An ordered, deduplicated list of cases, along with whether each one was selected by the filter.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CaseList {
    binary: Utf8PathBuf,
    case_count: usize,
    run_count: usize,
    cases: Vec<CaseInfo>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct CaseInfo {
    id: TestCaseId,
    filter_match: FilterMatch,
}

impl CaseList {
    /// Creates a new list for `binary`. Duplicate ids are dropped, keeping the first occurrence.
    pub fn new(
        binary: impl Into<Utf8PathBuf>,
        ids: impl IntoIterator<Item = TestCaseId>,
        filter: &TestFilter,
    ) -> Self {
        let cases: Vec<_> = ids
            .into_iter()
            .unique()
            .map(|id| CaseInfo {
                filter_match: filter.filter_match(id.as_str()),
                id,
            })
            .collect();
        let run_count = cases
            .iter()
            .filter(|case| case.filter_match.is_match())
            .count();
        Self {
            binary: binary.into(),
            case_count: cases.len(),
            run_count,
            cases,
        }
    }

    /// Creates a new list by asking `binary` for its cases. `timeout` bounds how long the binary
    /// may take to answer.
    pub fn discover(
        binary: impl Into<Utf8PathBuf>,
        filter: &TestFilter,
        timeout: Option<Duration>,
    ) -> Result<Self, ListCasesError> {
        let binary = binary.into();
        let ids = discover_cases(&binary, timeout)?;
        Ok(Self::new(binary, ids, filter))
    }

    /// Returns the binary the cases belong to.
    pub fn binary(&self) -> &Utf8Path {
        &self.binary
    }

    /// Returns the total number of cases, including skipped ones.
    pub fn case_count(&self) -> usize {
        self.case_count
    }

    /// Returns the number of cases that will be run.
    ///
    /// It is always the case that `run_count + skip_count == case_count`.
    pub fn run_count(&self) -> usize {
        self.run_count
    }

    /// Returns the number of cases that were filtered out.
    pub fn skip_count(&self) -> usize {
        self.case_count - self.run_count
    }

    /// Iterates over the cases in order.
    pub fn iter(&self) -> impl Iterator<Item = CaseInstance<'_>> + '_ {
        self.cases.iter().map(|info| CaseInstance {
            id: &info.id,
            filter_match: info.filter_match,
        })
    }

    /// Writes this list to the given writer.
    pub fn write(
        &self,
        output_format: OutputFormat,
        mut writer: impl io::Write,
        colorize: bool,
    ) -> Result<(), WriteEventError> {
        match output_format {
            OutputFormat::Plain => {
                let mut styles = Styles::default();
                if colorize {
                    styles.colorize();
                }
                self.write_plain(&mut writer, &styles)
                    .map_err(WriteEventError::Io)
            }
            OutputFormat::Json => {
                serde_json::to_writer(&mut writer, self).map_err(WriteEventError::Serialize)?;
                writeln!(writer).map_err(WriteEventError::Io)
            }
            OutputFormat::JsonPretty => {
                serde_json::to_writer_pretty(&mut writer, self)
                    .map_err(WriteEventError::Serialize)?;
                writeln!(writer).map_err(WriteEventError::Io)
            }
        }
    }

    /// Writes this list to a string with the given format, without colors.
    pub fn to_string(&self, output_format: OutputFormat) -> Result<String, WriteEventError> {
        let mut buf = Vec::new();
        self.write(output_format, &mut buf, false)?;
        // Everything written is either a UTF-8 case id or JSON.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn write_plain(&self, writer: &mut dyn io::Write, styles: &Styles) -> io::Result<()> {
        writeln!(writer, "{}:", self.binary.style(styles.binary))?;
        for case in &self.cases {
            let mut name = String::new();
            // Writing to a String can't fail.
            let _ = write_case_name(case.id.as_str(), styles.case_name, &mut name);
            write!(writer, "    {name}")?;
            if !case.filter_match.is_match() {
                write!(writer, " {}", "(skipped)".style(styles.skipped))?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

/// A single case in a [`CaseList`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CaseInstance<'a> {
    /// The case id.
    pub id: &'a TestCaseId,

    /// Whether the case was selected.
    pub filter_match: FilterMatch,
}

/// Output formats for a case list.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    /// One case per line.
    #[default]
    Plain,

    /// Machine-readable JSON on a single line.
    Json,

    /// Machine-readable JSON, pretty-printed.
    JsonPretty,
}

#[derive(Clone, Debug, Default)]
struct Styles {
    binary: Style,
    case_name: Style,
    skipped: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.binary = Style::new().magenta().bold();
        self.case_name = Style::new().blue().bold();
        self.skipped = Style::new().dimmed();
    }
}

/// How often discovery checks whether the binary has finished.
const DISCOVERY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs `binary --gtest_list_tests` and returns the cases it reports, in order.
///
/// The binary is killed if it hasn't finished within `timeout`.
pub fn discover_cases(
    binary: &Utf8Path,
    timeout: Option<Duration>,
) -> Result<Vec<TestCaseId>, ListCasesError> {
    let command = format!("{binary} --gtest_list_tests");
    debug!(%command, "discovering cases");
    let exec_error = |error| ListCasesError::Exec {
        command: command.clone(),
        error,
    };
    let handle = duct::cmd(binary.as_std_path(), ["--gtest_list_tests"])
        .stdout_capture()
        .stderr_capture()
        .stdin_null()
        .unchecked()
        .start()
        .map_err(exec_error)?;

    let start = Instant::now();
    let output = loop {
        if let Some(output) = handle.try_wait().map_err(exec_error)? {
            break output;
        }
        if let Some(timeout) = timeout
            && start.elapsed() >= timeout
        {
            // The binary is abandoned either way, so a failed kill has nothing to add.
            let _ = handle.kill();
            return Err(ListCasesError::TimedOut {
                command: command.clone(),
                timeout,
            });
        }
        std::thread::sleep(DISCOVERY_POLL_INTERVAL);
    };

    if !output.status.success() {
        return Err(ListCasesError::Failed {
            command,
            exit_code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_gtest_list(&stdout).map_err(|(line_number, line)| ListCasesError::Parse {
        command,
        line_number,
        line,
    })
}

/// Parses `--gtest_list_tests` output.
///
/// The format is a suite line ending with `.`, followed by indented case lines. Anything after
/// `#` (type and value parameters) is ignored, as are unindented lines that aren't suites.
///
/// On error, returns the 1-based line number and the offending line.
pub fn parse_gtest_list(output: &str) -> Result<Vec<TestCaseId>, (usize, String)> {
    let mut cases = Vec::new();
    let mut suite: Option<&str> = None;

    for (idx, raw_line) in output.lines().enumerate() {
        let line = raw_line
            .split_once('#')
            .map_or(raw_line, |(before, _)| before)
            .trim_end();
        if line.trim_start().is_empty() {
            continue;
        }

        if line.starts_with(char::is_whitespace) {
            let Some(suite) = suite else {
                return Err((idx + 1, raw_line.to_owned()));
            };
            cases.push(TestCaseId::new(format!("{suite}.{}", line.trim_start())));
        } else if let Some(name) = line.strip_suffix('.') {
            suite = Some(name);
        } else {
            // e.g. "Running main() from gtest_main.cc".
            suite = None;
        }
    }

    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn default_ids() -> Vec<TestCaseId> {
        DEFAULT_CASES.iter().map(|&id| id.into()).collect()
    }

    #[test]
    fn case_id_parts() {
        let id = TestCaseId::new("ControllerTest.ProportionalTest2");
        assert_eq!(id.suite(), Some("ControllerTest"));
        assert_eq!(id.case_name(), "ProportionalTest2");

        let typed = TestCaseId::new("Typed/Suite/0.Case");
        assert_eq!(typed.suite(), Some("Typed/Suite/0"));

        let bare = TestCaseId::new("Bare");
        assert_eq!(bare.suite(), None);
        assert_eq!(bare.case_name(), "Bare");
    }

    #[test]
    fn dedup_keeps_order() {
        let ids = ["B.b", "A.a", "B.b", "C.c", "A.a"].map(TestCaseId::from);
        let list = CaseList::new("bin", ids, &TestFilter::any());
        let order: Vec<_> = list.iter().map(|case| case.id.as_str()).collect();
        assert_eq!(order, vec!["B.b", "A.a", "C.c"]);
        assert_eq!(list.case_count(), 3);
    }

    #[test]
    fn filtered_cases_are_skipped() {
        let filter = TestFilter::new(&["Proportional"], &[] as &[&str]).unwrap();
        let list = CaseList::new("build/tests/test_controller", default_ids(), &filter);
        assert_eq!(list.case_count(), 6);
        assert_eq!(list.run_count(), 2);
        assert_eq!(list.skip_count(), 4);

        assert_eq!(
            list.to_string(OutputFormat::Plain).unwrap(),
            indoc! {"
                build/tests/test_controller:
                    ControllerTest.BasicTest (skipped)
                    ControllerTest.IntegralTest (skipped)
                    ControllerTest.ProportionalTest
                    ControllerTest.ProportionalTest2
                    ControllerTest.DerivativeTest (skipped)
                    ControllerTest.ResetTest (skipped)
            "}
        );
    }

    #[test]
    fn json_output() {
        let filter = TestFilter::new(&["Reset"], &[] as &[&str]).unwrap();
        let ids = ["ControllerTest.BasicTest", "ControllerTest.ResetTest"].map(TestCaseId::from);
        let list = CaseList::new("t", ids, &filter);
        let json: serde_json::Value =
            serde_json::from_str(&list.to_string(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "binary": "t",
                "case-count": 2,
                "run-count": 1,
                "cases": [
                    {
                        "id": "ControllerTest.BasicTest",
                        "filter-match": { "status": "mismatch", "reason": "string" },
                    },
                    {
                        "id": "ControllerTest.ResetTest",
                        "filter-match": { "status": "matches" },
                    },
                ],
            })
        );
    }

    #[test]
    fn parse_list_output() {
        let output = indoc! {"
            Running main() from gtest_main.cc
            ControllerTest.
              BasicTest
              IntegralTest
            TypedTest/0.  # TypeParam = int
              Works
            ParamTest/Gains.
              Step/0  # GetParam() = 0.5
              Step/1  # GetParam() = 1
        "};
        let cases = parse_gtest_list(output).unwrap();
        let cases: Vec<_> = cases.iter().map(TestCaseId::as_str).collect();
        assert_eq!(
            cases,
            vec![
                "ControllerTest.BasicTest",
                "ControllerTest.IntegralTest",
                "TypedTest/0.Works",
                "ParamTest/Gains.Step/0",
                "ParamTest/Gains.Step/1",
            ]
        );
    }

    #[test]
    fn parse_case_without_suite() {
        let output = "Running main() from gtest_main.cc\n  Orphan\n";
        assert_eq!(parse_gtest_list(output), Err((2, "  Orphan".to_owned())));
    }

    #[test]
    fn parse_empty() {
        assert_eq!(parse_gtest_list(""), Ok(vec![]));
    }
}
