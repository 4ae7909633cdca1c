use anyhow::Result;
use log::{info, warn};
use std::sync::Arc;

use crate::{
    mirror::{UpdateEngine, find_mirrors},
    runtime::Runtime,
};

use super::{Options, Services};

/// Refresh every mirror below the configured repodir.
#[tracing::instrument(skip(runtime, options))]
pub async fn update(runtime: Arc<dyn Runtime>, options: &Options) -> Result<()> {
    let services = Services::build(runtime, options)?;
    run(&services).await
}

pub(crate) async fn run(services: &Services) -> Result<()> {
    let repo_dir = &services.config.repo_dir;
    let mirrors = find_mirrors(services.runtime.as_ref(), repo_dir)?;
    if mirrors.is_empty() {
        info!("No mirrors found in {}", repo_dir.display());
        return Ok(());
    }

    let engine = UpdateEngine::new(services.workers, services.transport.clone())?;
    let results = engine.update_all(mirrors).await;

    let mut failed = 0;
    for result in &results {
        match &result.error {
            None => info!("Updated {}", result.path.display()),
            Some(e) => {
                failed += 1;
                warn!("Error while updating {}: {:#}", result.path.display(), e);
            }
        }
    }
    info!(
        "Updated {} of {} mirror(s)",
        results.len() - failed,
        results.len()
    );
    Ok(())
}
