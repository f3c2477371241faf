// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the bridge.
//!
//! The embedded [default config](BridgeConfig::DEFAULT_CONFIG) is always loaded first. A
//! project-specific file, `.config/gtest-bridge.toml` in the project root or a file passed in
//! explicitly, is layered on top. Profiles other than `default` inherit any setting they don't
//! specify from the default profile.

use crate::{
    bridge::DelegatingBridge,
    case_list::TestCaseId,
    classifier::{ClassifierKind, ClassifyPolicy, OutcomeClassifier},
    errors::{ConfigParseError, ConfigParseErrorKind, ProfileNotFound},
    invoker::ProcessInvoker,
    locator::BinaryLocator,
    reporter::FailureOutput,
    test_output::DecodePolicy,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{cmp::Ordering, collections::BTreeSet, collections::HashMap, fmt, time::Duration};
use tracing::warn;

/// Overall configuration for the bridge.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    project_root: Utf8PathBuf,
    inner: BridgeConfigImpl,
}

impl BridgeConfig {
    /// The default location of the config within the project root: `.config/gtest-bridge.toml`.
    pub const CONFIG_PATH: &'static str = ".config/gtest-bridge.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// The name of the default profile.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// Reads the config from `config_file`, or if not specified from `.config/gtest-bridge.toml`
    /// in the project root.
    ///
    /// If the file isn't specified and the project root doesn't have one, the default config is
    /// used. Unknown keys are logged as warnings.
    pub fn from_sources(
        project_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_impl(project_root, config_file, |config_file, unknown| {
            let mut unknown_str = String::new();
            if unknown.len() == 1 {
                // Print this on the same line.
                unknown_str.push(' ');
                unknown_str.extend(unknown.iter().map(String::as_str));
            } else {
                for ignored_key in unknown {
                    unknown_str.push_str("\n  - ");
                    unknown_str.push_str(ignored_key);
                }
            }

            warn!("ignoring unknown configuration keys in config file {config_file}:{unknown_str}")
        })
    }

    // A custom unknown_callback can be passed in while testing.
    fn from_sources_impl(
        project_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
        mut unknown_callback: impl FnMut(&Utf8Path, &BTreeSet<String>),
    ) -> Result<Self, ConfigParseError> {
        let project_root = project_root.into();

        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = project_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (deserialized, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        if !unknown.is_empty() {
            unknown_callback(&config_file, &unknown);
        }

        let inner = deserialized
            .into_config_impl()
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        Ok(Self {
            project_root,
            inner,
        })
    }

    /// Returns the default config, with nothing layered on top.
    pub fn default_config(project_root: impl Into<Utf8PathBuf>) -> Self {
        let (deserialized, unknown) =
            Self::build_and_deserialize_config(&Self::make_default_config())
                .expect("default config is always valid");
        // The default config is embedded in this binary, so it must not have any unknown keys.
        debug_assert!(unknown.is_empty(), "unknown keys in default config: {unknown:?}");

        Self {
            project_root: project_root.into(),
            inner: deserialized
                .into_config_impl()
                .expect("default config has a complete default profile"),
        }
    }

    /// Returns the project root.
    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    /// Returns the profile with the given name, or an error if it isn't defined.
    pub fn profile(&self, name: impl AsRef<str>) -> Result<BridgeProfile<'_>, ProfileNotFound> {
        let name = name.as_ref();
        let custom_profile = match name {
            Self::DEFAULT_PROFILE => None,
            other => Some(
                self.inner
                    .other_profiles
                    .get(other)
                    .ok_or_else(|| ProfileNotFound::new(name, self.all_profiles()))?,
            ),
        };
        Ok(BridgeProfile {
            name: name.to_owned(),
            project_root: &self.project_root,
            default_profile: &self.inner.default_profile,
            custom_profile,
        })
    }

    /// Returns the names of all known profiles.
    pub fn all_profiles(&self) -> impl Iterator<Item = &str> {
        std::iter::once(Self::DEFAULT_PROFILE)
            .chain(self.inner.other_profiles.keys().map(String::as_str))
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(BridgeConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: BridgeConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // The config crate also reports the key. Drop it so the path is only printed once.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

/// A profile: a named set of settings for running delegated cases.
#[derive(Clone, Debug)]
pub struct BridgeProfile<'cfg> {
    name: String,
    project_root: &'cfg Utf8Path,
    default_profile: &'cfg DefaultProfileImpl,
    custom_profile: Option<&'cfg CustomProfileImpl>,
}

impl<'cfg> BridgeProfile<'cfg> {
    /// Returns the name of the profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the delegated binary.
    pub fn binary_name(&self) -> &'cfg str {
        self.custom_profile
            .and_then(|profile| profile.binary_name.as_deref())
            .unwrap_or(&self.default_profile.binary_name)
    }

    /// Returns the directory the binary lives in, relative to the project root.
    pub fn binary_dir(&self) -> &'cfg Utf8Path {
        self.custom_profile
            .and_then(|profile| profile.binary_dir.as_deref())
            .unwrap_or(&self.default_profile.binary_dir)
    }

    /// Returns a locator for the delegated binary.
    pub fn locator(&self) -> BinaryLocator {
        BinaryLocator::from_project_root(self.project_root, self.binary_name())
            .with_binary_dir(self.binary_dir())
    }

    /// Returns the flag used to select a case.
    pub fn filter_arg(&self) -> &'cfg str {
        self.custom_profile
            .and_then(|profile| profile.filter_arg.as_deref())
            .unwrap_or(&self.default_profile.filter_arg)
    }

    /// Returns the text that marks a passing case.
    pub fn success_marker(&self) -> &'cfg str {
        self.custom_profile
            .and_then(|profile| profile.success_marker.as_deref())
            .unwrap_or(&self.default_profile.success_marker)
    }

    /// Returns the classifier kind.
    pub fn classifier(&self) -> ClassifierKind {
        self.custom_profile
            .and_then(|profile| profile.classifier)
            .unwrap_or(self.default_profile.classifier)
    }

    /// Returns the classification policy.
    pub fn policy(&self) -> ClassifyPolicy {
        self.custom_profile
            .and_then(|profile| profile.policy)
            .unwrap_or(self.default_profile.policy)
    }

    /// Returns the decoding policy.
    pub fn decode(&self) -> DecodePolicy {
        self.custom_profile
            .and_then(|profile| profile.decode)
            .unwrap_or(self.default_profile.decode)
    }

    /// Returns the slow-timeout period, or `None` if slow reporting is disabled.
    pub fn slow_timeout(&self) -> Option<Duration> {
        self.custom_profile
            .and_then(|profile| profile.slow_timeout)
            .unwrap_or(self.default_profile.slow_timeout)
            .non_zero()
    }

    /// Returns the timeout, or `None` if cases may run forever.
    pub fn timeout(&self) -> Option<Duration> {
        self.custom_profile
            .and_then(|profile| profile.timeout)
            .unwrap_or(self.default_profile.timeout)
            .non_zero()
    }

    /// Returns how long the output pipes may stay open after the binary exits.
    pub fn leak_timeout(&self) -> Duration {
        self.custom_profile
            .and_then(|profile| profile.leak_timeout)
            .unwrap_or(self.default_profile.leak_timeout)
            .0
    }

    /// Returns the number of cases to run at once.
    pub fn test_threads(&self) -> TestThreads {
        self.custom_profile
            .and_then(|profile| profile.test_threads)
            .unwrap_or(self.default_profile.test_threads)
    }

    /// Returns when to show the output of failing cases.
    pub fn failure_output(&self) -> FailureOutput {
        self.custom_profile
            .and_then(|profile| profile.failure_output)
            .unwrap_or(self.default_profile.failure_output)
    }

    /// Returns the configured list of cases.
    pub fn cases(&self) -> Vec<TestCaseId> {
        self.custom_profile
            .and_then(|profile| profile.cases.as_deref())
            .unwrap_or(&self.default_profile.cases)
            .iter()
            .map(|id| TestCaseId::new(id.as_str()))
            .collect()
    }

    /// Returns the JUnit configuration, if a report should be written.
    pub fn junit(&self) -> Option<JunitConfig<'cfg>> {
        let path = self
            .custom_profile
            .and_then(|profile| profile.junit.path.as_deref())
            .or(self.default_profile.junit.path.as_deref())?;
        let report_name = self
            .custom_profile
            .and_then(|profile| profile.junit.report_name.as_deref())
            .or(self.default_profile.junit.report_name.as_deref())
            .unwrap_or(JunitConfig::DEFAULT_REPORT_NAME);
        Some(JunitConfig {
            path: self.project_root.join(path),
            report_name,
        })
    }

    /// Returns an invoker configured from this profile.
    pub fn invoker(&self) -> ProcessInvoker {
        let mut invoker = ProcessInvoker::new();
        invoker
            .set_filter_arg(self.filter_arg())
            .set_timeout(self.timeout())
            .set_slow_timeout(self.slow_timeout())
            .set_leak_timeout(self.leak_timeout())
            .set_decode(self.decode());
        invoker
    }

    /// Returns a classifier configured from this profile.
    pub fn outcome_classifier(&self) -> Box<dyn OutcomeClassifier> {
        self.classifier().build(self.success_marker(), self.policy())
    }

    /// Returns a bridge configured from this profile.
    pub fn bridge(&self) -> DelegatingBridge {
        DelegatingBridge::new(self.locator().binary_path(), self.invoker())
            .with_classifier(self.outcome_classifier())
    }
}

/// Where and how to write a JUnit report.
#[derive(Clone, Debug)]
pub struct JunitConfig<'cfg> {
    path: Utf8PathBuf,
    report_name: &'cfg str,
}

impl<'cfg> JunitConfig<'cfg> {
    /// The report name used if none is configured.
    pub const DEFAULT_REPORT_NAME: &'static str = "gtest-bridge-run";

    /// Creates a new JUnit configuration.
    pub fn new(path: impl Into<Utf8PathBuf>, report_name: &'cfg str) -> Self {
        Self {
            path: path.into(),
            report_name,
        }
    }

    /// Returns the absolute path to the report.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the name of the report.
    pub fn report_name(&self) -> &'cfg str {
        self.report_name
    }
}

/// The number of cases to run at once.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TestThreads {
    /// Run this many cases at once.
    Count(usize),

    /// Run as many cases at once as there are logical CPUs.
    NumCpus,
}

impl TestThreads {
    /// Gets the actual number of threads computed at runtime.
    pub fn compute(self) -> usize {
        match self {
            Self::Count(threads) => threads,
            Self::NumCpus => get_num_cpus(),
        }
    }
}

fn get_num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl<'de> Deserialize<'de> for TestThreads {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = TestThreads;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a non-zero integer or the string \"num-cpus\"")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v == "num-cpus" {
                    Ok(TestThreads::NumCpus)
                } else {
                    Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Str(v),
                        &self,
                    ))
                }
            }

            // TOML integers are i64.
            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match v.cmp(&0) {
                    Ordering::Greater => Ok(TestThreads::Count(v as usize)),
                    Ordering::Less => Ok(TestThreads::Count(
                        (get_num_cpus() as i64 + v).max(1) as usize,
                    )),
                    Ordering::Equal => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Signed(v),
                        &self,
                    )),
                }
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_i64(v as i64)
            }
        }

        deserializer.deserialize_any(V)
    }
}

/// A duration where zero means "disabled".
#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(transparent)]
struct OptionalDuration(#[serde(with = "humantime_serde")] Duration);

impl OptionalDuration {
    fn non_zero(self) -> Option<Duration> {
        (!self.0.is_zero()).then_some(self.0)
    }
}

#[derive(Clone, Debug)]
struct BridgeConfigImpl {
    default_profile: DefaultProfileImpl,
    other_profiles: HashMap<String, CustomProfileImpl>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct BridgeConfigDeserialize {
    #[serde(rename = "profile")]
    profiles: HashMap<String, CustomProfileImpl>,
}

impl BridgeConfigDeserialize {
    fn into_config_impl(mut self) -> Result<BridgeConfigImpl, ConfigParseErrorKind> {
        let default_profile = self
            .profiles
            .remove(BridgeConfig::DEFAULT_PROFILE)
            .ok_or(ConfigParseErrorKind::MissingDefaultProfile)
            .and_then(DefaultProfileImpl::new)?;
        Ok(BridgeConfigImpl {
            default_profile,
            other_profiles: self.profiles,
        })
    }
}

#[derive(Clone, Debug)]
struct DefaultProfileImpl {
    binary_name: String,
    binary_dir: Utf8PathBuf,
    filter_arg: String,
    success_marker: String,
    classifier: ClassifierKind,
    policy: ClassifyPolicy,
    decode: DecodePolicy,
    slow_timeout: OptionalDuration,
    timeout: OptionalDuration,
    leak_timeout: OptionalDuration,
    test_threads: TestThreads,
    failure_output: FailureOutput,
    cases: Vec<String>,
    junit: JunitImpl,
}

impl DefaultProfileImpl {
    fn new(p: CustomProfileImpl) -> Result<Self, ConfigParseErrorKind> {
        // The embedded default config sets every key, and files layered on top can only override
        // them, so a missing key here means the default config is broken.
        fn required<T>(value: Option<T>, key: &'static str) -> Result<T, ConfigParseErrorKind> {
            value.ok_or(ConfigParseErrorKind::MissingDefaultKey(key))
        }

        Ok(Self {
            binary_name: required(p.binary_name, "binary-name")?,
            binary_dir: required(p.binary_dir, "binary-dir")?,
            filter_arg: required(p.filter_arg, "filter-arg")?,
            success_marker: required(p.success_marker, "success-marker")?,
            classifier: required(p.classifier, "classifier")?,
            policy: required(p.policy, "policy")?,
            decode: required(p.decode, "decode")?,
            slow_timeout: required(p.slow_timeout, "slow-timeout")?,
            timeout: required(p.timeout, "timeout")?,
            leak_timeout: required(p.leak_timeout, "leak-timeout")?,
            test_threads: required(p.test_threads, "test-threads")?,
            failure_output: required(p.failure_output, "failure-output")?,
            cases: required(p.cases, "cases")?,
            junit: p.junit,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CustomProfileImpl {
    #[serde(default)]
    binary_name: Option<String>,
    #[serde(default)]
    binary_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    filter_arg: Option<String>,
    #[serde(default)]
    success_marker: Option<String>,
    #[serde(default)]
    classifier: Option<ClassifierKind>,
    #[serde(default)]
    policy: Option<ClassifyPolicy>,
    #[serde(default)]
    decode: Option<DecodePolicy>,
    #[serde(default)]
    slow_timeout: Option<OptionalDuration>,
    #[serde(default)]
    timeout: Option<OptionalDuration>,
    #[serde(default)]
    leak_timeout: Option<OptionalDuration>,
    #[serde(default)]
    test_threads: Option<TestThreads>,
    #[serde(default)]
    failure_output: Option<FailureOutput>,
    #[serde(default)]
    cases: Option<Vec<String>>,
    #[serde(default)]
    junit: JunitImpl,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct JunitImpl {
    #[serde(default)]
    path: Option<Utf8PathBuf>,
    #[serde(default)]
    report_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::{Utf8TempDir, tempdir};
    use indoc::indoc;
    use test_case::test_case;

    fn write_config(contents: &str) -> Utf8TempDir {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".config")).unwrap();
        std::fs::write(dir.path().join(BridgeConfig::CONFIG_PATH), contents).unwrap();
        dir
    }

    #[test]
    fn default_config_values() {
        let config = BridgeConfig::default_config("/proj");
        let profile = config.profile(BridgeConfig::DEFAULT_PROFILE).unwrap();
        assert_eq!(profile.binary_name(), "test_controller");
        assert_eq!(
            profile.locator().binary_path(),
            "/proj/build/tests/test_controller"
        );
        assert_eq!(profile.filter_arg(), "--gtest_filter");
        assert_eq!(profile.success_marker(), "[  PASSED  ] 1 test.");
        assert_eq!(profile.classifier(), ClassifierKind::Marker);
        assert_eq!(profile.policy(), ClassifyPolicy::Strict);
        assert_eq!(profile.decode(), DecodePolicy::Lossy);
        assert_eq!(profile.timeout(), Some(Duration::from_secs(60)));
        assert_eq!(profile.slow_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(profile.leak_timeout(), Duration::from_millis(100));
        assert_eq!(profile.test_threads(), TestThreads::NumCpus);
        assert_eq!(profile.failure_output(), FailureOutput::Immediate);
        assert_eq!(profile.cases().len(), 6);
        assert!(profile.junit().is_none());
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = BridgeConfig::from_sources_impl(dir.path(), None, |_, unknown| {
            panic!("unexpected unknown keys: {unknown:?}")
        })
        .unwrap();
        let profile = config.profile("default").unwrap();
        assert_eq!(profile.binary_name(), "test_controller");
    }

    #[test]
    fn custom_profile_inherits() {
        let dir = write_config(indoc! {r#"
            [profile.default]
            timeout = "5s"

            [profile.ci]
            policy = "marker-only"
            classifier = "case-line"
            slow-timeout = "0s"
            leak-timeout = "2s"
            test-threads = 2
            cases = ["ControllerTest.ResetTest"]

            [profile.ci.junit]
            path = "target/junit.xml"
        "#});

        let config = BridgeConfig::from_sources_impl(dir.path(), None, |_, unknown| {
            panic!("unexpected unknown keys: {unknown:?}")
        })
        .unwrap();

        let default = config.profile("default").unwrap();
        assert_eq!(default.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(default.policy(), ClassifyPolicy::Strict);

        let ci = config.profile("ci").unwrap();
        assert_eq!(ci.timeout(), Some(Duration::from_secs(5)), "inherited");
        assert_eq!(ci.policy(), ClassifyPolicy::MarkerOnly);
        assert_eq!(ci.classifier(), ClassifierKind::CaseLine);
        assert_eq!(ci.slow_timeout(), None, "0s disables slow reporting");
        assert_eq!(ci.leak_timeout(), Duration::from_secs(2));
        assert_eq!(default.leak_timeout(), Duration::from_millis(100), "not inherited upward");
        assert_eq!(ci.test_threads(), TestThreads::Count(2));
        assert_eq!(ci.cases(), vec![TestCaseId::new("ControllerTest.ResetTest")]);

        let junit = ci.junit().expect("junit configured for ci");
        assert_eq!(junit.path(), dir.path().join("target/junit.xml").as_path());
        assert_eq!(junit.report_name(), "gtest-bridge-run");
    }

    #[test]
    fn unknown_keys_are_reported() {
        let dir = write_config(indoc! {r#"
            [profile.default]
            retries = 3

            [profile.ci]
            binary-nam = "typo"
        "#});

        let mut reported = Vec::new();
        BridgeConfig::from_sources_impl(dir.path(), None, |file, unknown| {
            reported.push((file.to_owned(), unknown.clone()));
        })
        .unwrap();

        assert_eq!(reported.len(), 1);
        let (file, unknown) = &reported[0];
        assert_eq!(*file, dir.path().join(BridgeConfig::CONFIG_PATH));
        assert_eq!(
            unknown.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["profile.ci.binary-nam", "profile.default.retries"]
        );
    }

    #[test]
    fn explicit_config_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bridge.toml");
        std::fs::write(&file, "[profile.default]\nbinary-name = \"other\"\n").unwrap();

        let config = BridgeConfig::from_sources_impl("/proj", Some(&file), |_, _| {}).unwrap();
        let profile = config.profile("default").unwrap();
        assert_eq!(profile.binary_name(), "other");
        assert_eq!(config.project_root(), "/proj");
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("missing.toml");
        let error = BridgeConfig::from_sources_impl(dir.path(), Some(&file), |_, _| {})
            .expect_err("missing explicit file is an error");
        assert_eq!(error.config_file(), file.as_path());
    }

    #[test]
    fn profile_not_found() {
        let config = BridgeConfig::default_config("/proj");
        let error = config.profile("nope").unwrap_err();
        assert_eq!(
            error.to_string(),
            "profile `nope` not found (known profiles: default)"
        );
    }

    #[test_case(r#"policy = "sometimes""#; "bad policy")]
    #[test_case(r#"timeout = "soon""#; "bad duration")]
    #[test_case("test-threads = 0"; "zero threads")]
    fn invalid_values(line: &str) {
        let dir = write_config(&format!("[profile.default]\n{line}\n"));
        let error = BridgeConfig::from_sources_impl(dir.path(), None, |_, _| {})
            .expect_err("invalid value");
        assert!(
            matches!(error.kind(), ConfigParseErrorKind::DeserializeError(_)),
            "unexpected error: {error:?}"
        );
    }

    #[test_case("test-threads = -1", TestThreads::Count(get_num_cpus().saturating_sub(1).max(1)); "negative")]
    #[test_case("test-threads = 3", TestThreads::Count(3); "positive")]
    #[test_case(r#"test-threads = "num-cpus""#, TestThreads::NumCpus; "num cpus")]
    fn parse_test_threads(line: &str, expected: TestThreads) {
        let dir = write_config(&format!("[profile.default]\n{line}\n"));
        let config = BridgeConfig::from_sources_impl(dir.path(), None, |_, _| {}).unwrap();
        assert_eq!(config.profile("default").unwrap().test_threads(), expected);
    }
}
