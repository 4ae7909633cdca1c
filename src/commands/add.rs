use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use std::sync::Arc;

use crate::{package::Package, resolver::DependencyResolver, runtime::Runtime};

use super::{Options, Services, mirror_packages, write_satis};

/// Mirror a single package, optionally with its dependencies.
#[tracing::instrument(skip(runtime, options))]
pub async fn add(
    runtime: Arc<dyn Runtime>,
    options: &Options,
    package: &str,
    with_deps: bool,
) -> Result<()> {
    let services = Services::build(runtime, options)?;
    run(&services, package, with_deps).await
}

pub(crate) async fn run(services: &Services, name: &str, with_deps: bool) -> Result<()> {
    let mut package = Package::new(name)?;

    let packages = if let Some(url) = services.config.repository_url_of(&package.name) {
        info!("Mirroring {} from configured repository {}", package.name, url);
        package.set_repository_url(&url);
        vec![package]
    } else if with_deps {
        resolve_with_dependencies(services, package).await?
    } else {
        vec![lookup(services, package).await?]
    };

    let urls = mirror_packages(services, packages).await?;
    write_satis(services, &urls)
}

async fn resolve_with_dependencies(services: &Services, root: Package) -> Result<Vec<Package>> {
    info!("Loading dependencies of {}", root.name);
    let resolver = DependencyResolver::new(
        services.workers,
        services.registry.clone(),
        services.renames.clone(),
    )?;

    let mut packages = Vec::new();
    for result in resolver.resolve_all(vec![root]).await {
        match result.error {
            Some(e) => warn!("Failed to resolve package {}: {:#}", result.package.name, e),
            None => packages.push(result.package),
        }
    }

    let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
    if names.is_empty() {
        info!("No dependencies found");
    } else {
        info!("Dependencies found: {}", names.join(", "));
    }
    Ok(packages)
}

/// Ask the registry for the canonical name and repository URL of `package`.
async fn lookup(services: &Services, mut package: Package) -> Result<Package> {
    let lookup_name = services.renames.canonical(&package.name).to_string();
    let metadata = services
        .registry
        .get_package_by_name(&lookup_name)
        .await
        .with_context(|| {
            format!(
                "Failed to retrieve information about package \"{}\" from the registry",
                lookup_name
            )
        })?
        .ok_or_else(|| anyhow!("Registry returned no package for \"{}\"", lookup_name))?;

    if metadata.repository.trim().is_empty() {
        return Err(anyhow!(
            "Received empty URL for package {} from the registry",
            package.name
        ));
    }
    package.name = if metadata.name.is_empty() {
        lookup_name
    } else {
        metadata.name
    };
    package.set_repository_url(&metadata.repository);
    Ok(package)
}
