//! Repository mirroring.
//!
//! # Structure
//!
//! - `git` - [`MirrorTransport`] backed by the `git` binary
//! - `engine` - Worker pool creating new mirrors
//! - `update` - Worker pool refreshing existing mirrors

mod engine;
mod git;
mod update;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::package::Package;

pub use engine::MirrorEngine;
pub use git::{GitError, GitTransport};
pub use update::{UpdateEngine, find_mirrors};

/// Version control primitives needed to create and refresh a mirror.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MirrorTransport: Send + Sync {
    /// Create a bare mirror of `url` at `path`.
    async fn mirror_clone(&self, url: &str, path: &Path) -> Result<()>;

    /// Regenerate the metadata needed to serve `path` over dumb HTTP.
    async fn update_server_info(&self, path: &Path) -> Result<()>;

    /// Verify the object database at `path`.
    async fn fsck(&self, path: &Path) -> Result<()>;

    /// Fetch all refs into `path`, dropping refs deleted upstream.
    async fn fetch_prune(&self, path: &Path) -> Result<()>;
}

/// Outcome of mirroring one package.
#[derive(Debug)]
pub struct MirrorResult {
    pub package: Package,
    /// Target directory of the mirror.
    pub path: PathBuf,
    pub error: Option<MirrorError>,
}

impl MirrorResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The mirror was already on disk and nothing was done.
    pub fn already_exists(&self) -> bool {
        matches!(self.error, Some(MirrorError::AlreadyExists(_)))
    }
}

#[derive(Debug)]
pub enum MirrorError {
    /// Target directory exists. Expected for packages mirrored by an earlier run.
    AlreadyExists(PathBuf),
    /// The package has no repository URL to clone from.
    MissingUrl,
    /// The package name would place the mirror outside the mirror root.
    InvalidPath(PathBuf),
    /// A clone, server-info or fsck step failed.
    Transport(anyhow::Error),
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorError::AlreadyExists(path) => {
                write!(f, "Mirror already exists at {}", path.display())
            }
            MirrorError::MissingUrl => write!(f, "No repository URL known"),
            MirrorError::InvalidPath(path) => {
                write!(f, "Mirror path {} is outside the mirror root", path.display())
            }
            MirrorError::Transport(e) => write!(f, "{:#}", e),
        }
    }
}

impl std::error::Error for MirrorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MirrorError::Transport(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Outcome of refreshing one existing mirror.
#[derive(Debug)]
pub struct UpdateResult {
    pub path: PathBuf,
    pub error: Option<anyhow::Error>,
}

impl UpdateResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Errors that prevent an engine from being built or used.
#[derive(Debug, PartialEq, Eq)]
pub enum EngineError {
    NoWorkers,
    /// `mirror` was called after `close`.
    Closed,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NoWorkers => {
                write!(f, "Starting a mirror worker pool with zero workers is not possible")
            }
            EngineError::Closed => write!(f, "Mirror engine is already closed"),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_error_display() {
        let err = MirrorError::AlreadyExists(PathBuf::from("/var/mirror/twig/twig.git"));
        assert_eq!(err.to_string(), "Mirror already exists at /var/mirror/twig/twig.git");

        let err = MirrorError::Transport(anyhow::anyhow!("exit status 128").context("git fsck"));
        assert_eq!(err.to_string(), "git fsck: exit status 128");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_mirror_result_outcomes() {
        let package = Package::new("twig/twig").unwrap();
        let path = PathBuf::from("twig/twig.git");

        let result = MirrorResult {
            package: package.clone(),
            path: path.clone(),
            error: Some(MirrorError::AlreadyExists(path.clone())),
        };
        assert!(result.already_exists());
        assert!(!result.is_ok());

        let result = MirrorResult {
            package,
            path,
            error: Some(MirrorError::MissingUrl),
        };
        assert!(!result.already_exists());
    }
}
