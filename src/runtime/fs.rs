//! File system operations (read, write, directory, glob).

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self, contents))]
    pub(crate) fn write_impl(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents).context("Failed to write to file")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_to_string_impl(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).context("Failed to read file to string")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn exists_impl(&self, path: &Path) -> bool {
        path.exists()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn is_dir_impl(&self, path: &Path) -> bool {
        path.is_dir()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn glob_impl(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let mut paths = glob::glob(pattern)
            .with_context(|| format!("Invalid glob pattern {}", pattern))?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read paths matching {}", pattern))?;
        paths.sort();
        Ok(paths)
    }
}
