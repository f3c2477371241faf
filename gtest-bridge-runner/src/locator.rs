// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolves where the delegated test binary lives in a project tree.
//!
//! Resolution is pure path arithmetic: nothing here touches the filesystem. A missing binary is
//! only detected when the invoker tries to launch it.

use camino::{Utf8Path, Utf8PathBuf};

/// The directory, relative to the project root, that the C++ build puts test binaries in.
pub const DEFAULT_BINARY_DIR: &str = "build/tests";

/// The name of the controller's test binary.
pub const DEFAULT_BINARY_NAME: &str = "test_controller";

/// Computes the path to the delegated test binary.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BinaryLocator {
    project_root: Utf8PathBuf,
    binary_dir: Utf8PathBuf,
    binary_name: String,
}

impl BinaryLocator {
    /// Creates a locator from a file inside `<project-root>/<dir>/`.
    ///
    /// The project root is two directory levels above `anchor`. If `anchor` doesn't have that many
    /// ancestors, the empty relative root is used.
    pub fn from_anchor(anchor: impl AsRef<Utf8Path>, binary_name: impl Into<String>) -> Self {
        let project_root = anchor
            .as_ref()
            .parent()
            .and_then(|dir| dir.parent())
            .map(|root| root.to_path_buf())
            .unwrap_or_default();
        Self::from_project_root(project_root, binary_name)
    }

    /// Creates a locator from an explicit project root.
    pub fn from_project_root(
        project_root: impl Into<Utf8PathBuf>,
        binary_name: impl Into<String>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            binary_dir: DEFAULT_BINARY_DIR.into(),
            binary_name: binary_name.into(),
        }
    }

    /// Overrides the binary directory, relative to the project root.
    pub fn with_binary_dir(mut self, binary_dir: impl Into<Utf8PathBuf>) -> Self {
        self.binary_dir = binary_dir.into();
        self
    }

    /// Returns the project root.
    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    /// Returns the name of the binary.
    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    /// Returns `<project-root>/<binary-dir>/<binary-name>`.
    pub fn binary_path(&self) -> Utf8PathBuf {
        self.project_root
            .join(&self.binary_dir)
            .join(&self.binary_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(
        "/work/pendulum/tests/test_pytest_wrapper.py",
        "/work/pendulum/build/tests/test_controller";
        "anchor in tests dir"
    )]
    #[test_case(
        "pendulum/tests/bridge.rs",
        "pendulum/build/tests/test_controller";
        "relative anchor"
    )]
    #[test_case("tests/bridge.rs", "build/tests/test_controller"; "empty root")]
    #[test_case("bridge.rs", "build/tests/test_controller"; "too shallow")]
    fn from_anchor(anchor: &str, expected: &str) {
        let locator = BinaryLocator::from_anchor(anchor, DEFAULT_BINARY_NAME);
        assert_eq!(locator.binary_path(), expected);
    }

    #[test]
    fn binary_dir_override() {
        let locator = BinaryLocator::from_project_root("/proj", "t").with_binary_dir("out/bin");
        assert_eq!(locator.project_root(), "/proj");
        assert_eq!(locator.binary_name(), "t");
        assert_eq!(locator.binary_path(), "/proj/out/bin/t");
    }

    #[test]
    fn no_filesystem_access() {
        let locator = BinaryLocator::from_anchor("/does/not/exist/anchor.rs", "missing");
        assert_eq!(locator.binary_path(), "/does/not/build/tests/missing");
    }
}
