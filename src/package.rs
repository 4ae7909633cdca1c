//! Package identity and repository URL helpers.

use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::runtime::path::normalize_path;

/// A single package, e.g. "symfony/console".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Package {
    /// Name in "vendor/project" form. Names without a vendor are platform packages.
    pub name: String,
    /// Normalized repository URL, once known.
    pub repository_url: Option<String>,
}

impl Package {
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Package name required. Empty string given.");
        }
        Ok(Self {
            name: name.to_string(),
            repository_url: None,
        })
    }

    pub fn with_repository(name: &str, url: &str) -> Result<Self> {
        let mut package = Self::new(name)?;
        package.set_repository_url(url);
        Ok(package)
    }

    /// Store `url` after rewriting SSH shorthand. Empty URLs clear the field.
    pub fn set_repository_url(&mut self, url: &str) {
        let url = url.trim();
        self.repository_url = if url.is_empty() {
            None
        } else {
            Some(normalize_repository_url(url))
        };
    }

    /// Platform packages ("php", "ext-curl") must be provided by the system.
    pub fn is_platform(&self) -> bool {
        is_platform_package(&self.name)
    }

    /// Location of this package's bare mirror below `base_dir`.
    pub fn mirror_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(format!("{}.git", self.name))
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A requirement without a "vendor/" prefix is a platform package.
///
/// Registries answer those names with an HTML search page rather than
/// package metadata, so they are never looked up.
pub fn is_platform_package(name: &str) -> bool {
    !name.contains('/')
}

/// Rewrite `git@host:path` to `https://host/path`. Other URLs are returned as-is.
pub fn normalize_repository_url(url: &str) -> String {
    let url = url.trim();
    if url.contains("://") {
        return url.to_string();
    }

    if let Some(rest) = url.strip_prefix("git@") {
        if let Some((host, path)) = rest.split_once(':') {
            if !host.is_empty() && !path.is_empty() {
                return format!("https://{}/{}", host, path.trim_start_matches('/'));
            }
        }
    }

    url.to_string()
}

/// URL under which the mirror of `name` is published to downstream consumers.
///
/// Uses `{public_base_url}/{name}.git` when a public base URL is configured,
/// otherwise a `file://` URL to the local mirror.
pub fn local_mirror_url(name: &str, public_base_url: Option<&str>, repo_dir: &Path) -> String {
    match public_base_url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(base) => format!("{}/{}.git", base.trim_end_matches('/'), name),
        None => {
            let path = normalize_path(&repo_dir.join(format!("{}.git", name)));
            let path = path.to_string_lossy().replace('\\', "/");
            format!("file:///{}", path.trim_start_matches('/'))
        }
    }
}
