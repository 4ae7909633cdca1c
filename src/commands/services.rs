//! Service factory for building command dependencies.
//!
//! Commands receive a [`Services`] container instead of constructing the
//! registry client and git transport themselves, so tests can swap them for
//! mocks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::debug;

use crate::{
    config::{Config, find_config_file},
    http::{DEFAULT_TIMEOUT_SECS, HttpClient},
    mirror::{GitTransport, MirrorTransport},
    registry::{DEFAULT_REGISTRY_URL, PackagistClient, RegistryClient, RenameTable},
    runtime::Runtime,
};

use super::Options;

/// Everything a command needs to run.
pub struct Services {
    pub runtime: Arc<dyn Runtime>,
    pub config: Config,
    pub registry: Arc<dyn RegistryClient>,
    pub transport: Arc<dyn MirrorTransport>,
    pub renames: RenameTable,
    pub workers: usize,
}

impl Services {
    /// Load the configuration and build the real registry client and transport.
    pub fn build(runtime: Arc<dyn Runtime>, options: &Options) -> Result<Self> {
        let path = find_config_file(runtime.as_ref(), options.config_path.as_deref())?;
        let config = Config::load(runtime.as_ref(), &path)?;
        let workers = options.workers.unwrap_or_else(default_workers);
        let registry_url = options
            .registry_url
            .as_deref()
            .unwrap_or(DEFAULT_REGISTRY_URL);

        debug!(
            "Using config {}, registry {}, {} worker(s)",
            path.display(),
            registry_url,
            workers
        );

        Ok(Self {
            runtime,
            config,
            registry: Arc::new(build_registry(registry_url)?),
            transport: Arc::new(GitTransport::new()),
            renames: RenameTable::default(),
            workers,
        })
    }
}

/// Build a registry client with the default request timeout.
pub fn build_registry(registry_url: &str) -> Result<PackagistClient> {
    let http_client = HttpClient::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?;
    PackagistClient::new(http_client, registry_url)
}

/// One worker per available CPU.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
