use anyhow::Result;
use log::{info, warn};
use std::sync::Arc;

use crate::{
    package::Package,
    resolver::DependencyResolver,
    runtime::Runtime,
    set::ConcurrentSet,
};

use super::{Options, Services, mirror_packages, write_satis};

/// Mirror every configured package and its dependencies.
#[tracing::instrument(skip(runtime, options))]
pub async fn mirror(runtime: Arc<dyn Runtime>, options: &Options) -> Result<()> {
    let services = Services::build(runtime, options)?;
    run(&services).await
}

pub(crate) async fn run(services: &Services) -> Result<()> {
    let config = &services.config;
    let names = ConcurrentSet::new();
    let mut packages = Vec::new();

    // Configured repositories are mirrored as-is.
    for entry in &config.repositories {
        let package = match Package::with_repository(&entry.name, &entry.url) {
            Ok(package) => package,
            Err(e) => {
                warn!("Ignoring configured repository {:?}: {}", entry.name, e);
                continue;
            }
        };
        if names.add(package.name.clone()) {
            packages.push(package);
        }
    }

    let roots: Vec<Package> = config
        .require
        .iter()
        .filter_map(|name| Package::new(name).ok())
        .collect();

    if !roots.is_empty() {
        let resolver = DependencyResolver::new(
            services.workers,
            services.registry.clone(),
            services.renames.clone(),
        )?;

        let mut results = resolver.resolve(roots);
        while let Some(result) = results.recv().await {
            if let Some(e) = result.error {
                warn!("Failed to resolve package {}: {:#}", result.package.name, e);
                continue;
            }
            if names.add(result.package.name.clone()) {
                packages.push(result.package);
            }
        }
    }

    info!(
        "Start concurrent download process for {} package(s) with {} worker(s)",
        packages.len(),
        services.workers
    );
    let urls = mirror_packages(services, packages).await?;
    write_satis(services, &urls)
}
