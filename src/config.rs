//! `medusa.json` configuration.

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::package::{local_mirror_url, normalize_repository_url};
use crate::runtime::Runtime;

pub const CONFIG_FILE_NAME: &str = "medusa.json";
const CONFIG_DIR_NAME: &str = "depmirror";

/// A repository mirrored as-is, without asking the registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryEntry {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Root directory of the mirrors
    #[serde(rename = "repodir", default)]
    pub repo_dir: PathBuf,
    /// Public base URL the mirrors are served under
    #[serde(rename = "satisurl", default)]
    pub satis_url: Option<String>,
    /// Satis configuration file to register mirrors in
    #[serde(rename = "satisconfig", default)]
    pub satis_config: Option<PathBuf>,
    /// Root packages
    #[serde(default)]
    pub require: Vec<String>,
    /// Repositories with an explicit URL
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// No config file at any of the searched locations.
    NotFound(Vec<PathBuf>),
    MissingRepoDir,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound(searched) => {
                let searched: Vec<_> = searched.iter().map(|p| p.display().to_string()).collect();
                write!(
                    f,
                    "No configuration file found (searched: {})",
                    searched.join(", ")
                )
            }
            ConfigError::MissingRepoDir => {
                write!(f, "No repodir configured. Please set \"repodir\" in {}", CONFIG_FILE_NAME)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Read and validate the config file at `path`.
    #[tracing::instrument(skip(runtime))]
    pub fn load(runtime: &dyn Runtime, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        debug!(
            "Loaded config from {}: {} required package(s), {} repository(ies)",
            path.display(),
            config.require.len(),
            config.repositories.len()
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content).context("Failed to parse JSON")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.repo_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingRepoDir);
        }
        Ok(())
    }

    /// Normalized URL of the configured repository `name`, if any.
    pub fn repository_url_of(&self, name: &str) -> Option<String> {
        self.repositories
            .iter()
            .find(|r| r.name == name && !r.url.trim().is_empty())
            .map(|r| normalize_repository_url(&r.url))
    }

    /// URL downstream consumers should fetch the mirror of `name` from.
    pub fn mirror_url(&self, name: &str) -> String {
        local_mirror_url(name, self.satis_url.as_deref(), &self.repo_dir)
    }
}

/// Locate the config file.
///
/// An explicit path wins. Otherwise `./medusa.json`, then
/// `{config_dir}/depmirror/medusa.json`.
pub fn find_config_file(runtime: &dyn Runtime, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let mut candidates = vec![runtime.current_dir()?.join(CONFIG_FILE_NAME)];
    if let Some(dir) = runtime.config_dir() {
        candidates.push(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }

    match candidates.iter().find(|p| runtime.exists(p)) {
        Some(path) => Ok(path.clone()),
        None => Err(ConfigError::NotFound(candidates).into()),
    }
}
