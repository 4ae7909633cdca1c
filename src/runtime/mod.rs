//! Runtime abstraction for system operations.
//!
//! This module provides a trait-based abstraction over the filesystem and
//! environment, enabling dependency injection and testability.
//!
//! # Structure
//!
//! - `path` - Lexical path helpers (normalize, is_path_under)
//! - `env` - Current and well-known directories
//! - `fs` - File system operations (read, write, directory)

mod env;
mod fs;
pub mod path;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use path::is_path_under;

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn current_dir(&self) -> Result<PathBuf>;

    // File System
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Expand a glob pattern into the matching paths, sorted.
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>>;

    // Directories
    fn config_dir(&self) -> Option<PathBuf>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn current_dir(&self) -> Result<PathBuf> {
        self.current_dir_impl()
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.write_impl(path, contents)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        self.glob_impl(pattern)
    }

    fn config_dir(&self) -> Option<PathBuf> {
        self.config_dir_impl()
    }
}
