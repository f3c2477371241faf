// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Substring filters over case ids.

use crate::errors::TestFilterBuildError;
use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A filter for cases.
///
/// A case is selected if its id contains any of the patterns (or there are no patterns), and
/// contains none of the skip patterns.
#[derive(Clone, Debug, Default)]
pub struct TestFilter {
    patterns: Option<Box<AhoCorasick>>,
    skip_patterns: Option<Box<AhoCorasick>>,
}

impl TestFilter {
    /// Creates a new `TestFilter` from the given patterns and skip patterns.
    ///
    /// If `patterns` is empty, every case that isn't skipped matches.
    pub fn new(
        patterns: &[impl AsRef<[u8]>],
        skip_patterns: &[impl AsRef<[u8]>],
    ) -> Result<Self, TestFilterBuildError> {
        Ok(Self {
            patterns: build_matcher(patterns)?,
            skip_patterns: build_matcher(skip_patterns)?,
        })
    }

    /// Creates a new `TestFilter` that matches every case.
    pub fn any() -> Self {
        Self::default()
    }

    /// Returns an enum describing the match status of this filter.
    pub fn filter_match(&self, case_id: &str) -> FilterMatch {
        if let Some(skip) = &self.skip_patterns
            && skip.is_match(case_id)
        {
            return FilterMatch::Mismatch {
                reason: MismatchReason::Skipped,
            };
        }
        match &self.patterns {
            Some(patterns) if !patterns.is_match(case_id) => FilterMatch::Mismatch {
                reason: MismatchReason::String,
            },
            _ => FilterMatch::Matches,
        }
    }
}

fn build_matcher(
    patterns: &[impl AsRef<[u8]>],
) -> Result<Option<Box<AhoCorasick>>, TestFilterBuildError> {
    if patterns.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Box::new(AhoCorasick::new(patterns)?)))
    }
}

/// An enum describing whether a case matches a filter.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum FilterMatch {
    /// This case matches this filter.
    Matches,

    /// This case does not match this filter.
    ///
    /// The `MismatchReason` inside describes the reason this filter isn't matched.
    Mismatch {
        /// The reason.
        reason: MismatchReason,
    },
}

impl FilterMatch {
    /// Returns true if the filter matches.
    pub fn is_match(&self) -> bool {
        matches!(self, FilterMatch::Matches)
    }
}

/// The reason for why a case doesn't match a filter.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MismatchReason {
    /// This case does not match the provided string filters.
    String,

    /// This case matches a skip pattern.
    Skipped,
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::String => write!(f, "does not match the provided string filters"),
            MismatchReason::Skipped => write!(f, "matches a skip pattern"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::{collection::vec, prelude::*};

    const NO_PATTERNS: &[&str] = &[];

    #[test]
    fn skip_wins_over_match() {
        let filter = TestFilter::new(&["Proportional"], &["Test2"]).unwrap();
        assert!(
            filter
                .filter_match("ControllerTest.ProportionalTest")
                .is_match()
        );
        assert_eq!(
            filter.filter_match("ControllerTest.ProportionalTest2"),
            FilterMatch::Mismatch {
                reason: MismatchReason::Skipped
            }
        );
        assert_eq!(
            filter.filter_match("ControllerTest.ResetTest"),
            FilterMatch::Mismatch {
                reason: MismatchReason::String
            }
        );
    }

    proptest! {
        #[test]
        fn proptest_empty(case_ids in vec(any::<String>(), 0..16)) {
            let filter = TestFilter::new(NO_PATTERNS, NO_PATTERNS).unwrap();
            for case_id in case_ids {
                prop_assert!(filter.filter_match(&case_id).is_match());
            }
        }

        // Exact ids match.
        #[test]
        fn proptest_exact(case_ids in vec(any::<String>(), 0..16)) {
            let filter = TestFilter::new(&case_ids, NO_PATTERNS).unwrap();
            for case_id in case_ids {
                prop_assert!(filter.filter_match(&case_id).is_match());
            }
        }

        // Substrings match.
        #[test]
        fn proptest_substring(
            substring_prefix_suffixes in vec([any::<String>(); 3], 0..16),
        ) {
            let mut patterns = Vec::with_capacity(substring_prefix_suffixes.len());
            let mut case_ids = Vec::with_capacity(substring_prefix_suffixes.len());
            for [substring, prefix, suffix] in substring_prefix_suffixes {
                case_ids.push(prefix + &substring + &suffix);
                patterns.push(substring);
            }

            let filter = TestFilter::new(&patterns, NO_PATTERNS).unwrap();
            for case_id in case_ids {
                prop_assert!(filter.filter_match(&case_id).is_match());
            }
        }

        // A pattern longer than the id doesn't match it.
        #[test]
        fn proptest_no_match(
            substring in any::<String>(),
            prefix in any::<String>(),
            suffix in any::<String>(),
        ) {
            prop_assume!(!substring.is_empty() && !(prefix.is_empty() && suffix.is_empty()));
            let pattern = prefix + &substring + &suffix;
            let filter = TestFilter::new(&[&pattern], NO_PATTERNS).unwrap();
            prop_assert!(!filter.filter_match(&substring).is_match());
        }
    }
}
