use anyhow::{Context, Result};
use futures_util::future::join_all;
use log::{debug, error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::runtime::Runtime;

use super::{EngineError, MirrorTransport, UpdateResult};

/// List every mirror below `repo_dir` (`{repo_dir}/*/*.git`).
pub fn find_mirrors(runtime: &dyn Runtime, repo_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = repo_dir.join("*").join("*.git");
    let pattern = pattern.to_string_lossy();
    let mirrors = runtime
        .glob(&pattern)
        .with_context(|| format!("Failed to scan {} for mirrors", repo_dir.display()))?;

    Ok(mirrors.into_iter().filter(|p| runtime.is_dir(p)).collect())
}

/// Worker pool that refreshes existing mirrors.
pub struct UpdateEngine {
    worker_count: usize,
    transport: Arc<dyn MirrorTransport>,
}

impl UpdateEngine {
    pub fn new(
        worker_count: usize,
        transport: Arc<dyn MirrorTransport>,
    ) -> Result<Self, EngineError> {
        if worker_count == 0 {
            return Err(EngineError::NoWorkers);
        }
        Ok(Self {
            worker_count,
            transport,
        })
    }

    /// Fetch and refresh every mirror in `paths`. One result per path, in no
    /// particular order.
    pub async fn update_all(&self, paths: Vec<PathBuf>) -> Vec<UpdateResult> {
        if paths.is_empty() {
            return Vec::new();
        }
        info!(
            "Updating {} mirror(s) with {} worker(s)",
            paths.len(),
            self.worker_count
        );

        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let workers = self.worker_count.min(paths.len());
        for path in paths {
            let _ = job_tx.send(path);
        }
        drop(job_tx);

        let jobs = Arc::new(Mutex::new(job_rx));
        let handles = (1..=workers).map(|id| {
            let jobs = Arc::clone(&jobs);
            let transport = Arc::clone(&self.transport);
            tokio::spawn(async move {
                let mut results = Vec::new();
                loop {
                    let job = { jobs.lock().await.recv().await };
                    let Some(path) = job else {
                        break;
                    };
                    debug!("Update worker {}: updating {}", id, path.display());
                    let error = update_one(transport.as_ref(), &path).await.err();
                    results.push(UpdateResult { path, error });
                }
                results
            })
        });

        let mut results = Vec::new();
        for handle in join_all(handles).await {
            match handle {
                Ok(mut worker_results) => results.append(&mut worker_results),
                Err(e) => error!("Update worker failed: {}", e),
            }
        }
        results
    }
}

async fn update_one(transport: &dyn MirrorTransport, path: &Path) -> Result<()> {
    transport.fetch_prune(path).await?;
    transport.update_server_info(path).await?;
    Ok(())
}
