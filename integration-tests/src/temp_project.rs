// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use fs_err as fs;

/// A temporary project tree with a delegated binary at `build/tests/test_controller`.
#[derive(Debug)]
pub struct TempProject {
    // Held for its Drop impl.
    _temp_dir: Utf8TempDir,
    root: Utf8PathBuf,
}

impl TempProject {
    /// Creates a project whose test binary is a copy of `fake_gtest`.
    pub fn new(fake_gtest: &Utf8Path) -> color_eyre::Result<Self> {
        let project = Self::without_binary()?;
        let binary_path = project.binary_path();
        fs::create_dir_all(project.root.join("build/tests"))?;
        fs::copy(fake_gtest, &binary_path)?;
        Ok(project)
    }

    /// Creates a project that hasn't been built yet.
    pub fn without_binary() -> color_eyre::Result<Self> {
        let temp_dir = camino_tempfile::Builder::new()
            .prefix("gtest-bridge-fixture-")
            .tempdir()?;
        let root = temp_dir.path().to_path_buf();
        fs::create_dir_all(root.join("tests"))?;
        Ok(Self {
            _temp_dir: temp_dir,
            root,
        })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// A file in `tests/`, the way a test source file would be. The project root is two levels
    /// above it.
    pub fn anchor(&self) -> Utf8PathBuf {
        self.root.join("tests/test_controller.rs")
    }

    pub fn binary_path(&self) -> Utf8PathBuf {
        self.root
            .join("build/tests")
            .join(format!("test_controller{}", std::env::consts::EXE_SUFFIX))
    }

    /// Writes `.config/gtest-bridge.toml`.
    pub fn write_config(&self, contents: &str) -> color_eyre::Result<()> {
        let config_dir = self.root.join(".config");
        fs::create_dir_all(&config_dir)?;
        fs::write(config_dir.join("gtest-bridge.toml"), contents)?;
        Ok(())
    }
}
