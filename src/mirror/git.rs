//! [`MirrorTransport`] implementation using the system `git` binary.
//!
//! Shelling out picks up the user's SSH keys, credential helpers and
//! `~/.gitconfig` without any extra configuration.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Command;

use super::MirrorTransport;

/// A failed `git` invocation.
#[derive(Debug)]
pub enum GitError {
    /// The process could not be started.
    Spawn { command: String, source: io::Error },
    /// The process exited unsuccessfully.
    Failed {
        command: String,
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
}

impl fmt::Display for GitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitError::Spawn { command, source } => {
                write!(f, "Failed to run `{}`: {}", command, source)
            }
            GitError::Failed {
                command,
                status,
                stdout,
                stderr,
            } => {
                write!(f, "`{}` failed ({})", command, status)?;
                let output = [stderr.trim(), stdout.trim()]
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
                if !output.is_empty() {
                    write!(f, ": {}", output)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for GitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GitError::Spawn { source, .. } => Some(source),
            GitError::Failed { .. } => None,
        }
    }
}

pub struct GitTransport {
    program: PathBuf,
}

impl Default for GitTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl GitTransport {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Use `program` instead of the `git` found on `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<(), GitError> {
        let command = format!("git {}", args.join(" "));
        debug!("Running `{}` in {:?}", command, cwd);

        let mut cmd = Command::new(&self.program);
        cmd.args(args).kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|source| GitError::Spawn {
            command: command.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(GitError::Failed {
                command,
                status: output.status,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl MirrorTransport for GitTransport {
    #[tracing::instrument(skip(self))]
    async fn mirror_clone(&self, url: &str, path: &Path) -> Result<()> {
        let target = path.to_string_lossy();
        self.run(&["clone", "--mirror", url, &*target], None).await?;
        Ok(())
    }

    async fn update_server_info(&self, path: &Path) -> Result<()> {
        self.run(&["update-server-info", "-f"], Some(path)).await?;
        Ok(())
    }

    async fn fsck(&self, path: &Path) -> Result<()> {
        self.run(&["fsck"], Some(path)).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_prune(&self, path: &Path) -> Result<()> {
        self.run(&["fetch", "--prune"], Some(path)).await?;
        Ok(())
    }
}
