use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::package::Package;
use crate::runtime::{Runtime, is_path_under};

use super::{EngineError, MirrorError, MirrorResult, MirrorTransport};

/// Worker pool that creates bare mirrors below a base directory.
///
/// Results of every batch handed to [`mirror`](Self::mirror) arrive on one
/// stream read with [`next_result`](Self::next_result). The stream stays open
/// until [`close`](Self::close) is called, so the caller must read exactly as
/// many results as packages it submitted.
pub struct MirrorEngine {
    worker_count: usize,
    base_dir: PathBuf,
    transport: Arc<dyn MirrorTransport>,
    runtime: Arc<dyn Runtime>,
    results_tx: Option<mpsc::Sender<MirrorResult>>,
    results_rx: mpsc::Receiver<MirrorResult>,
}

impl MirrorEngine {
    pub fn new(
        worker_count: usize,
        base_dir: impl Into<PathBuf>,
        transport: Arc<dyn MirrorTransport>,
        runtime: Arc<dyn Runtime>,
    ) -> Result<Self, EngineError> {
        if worker_count == 0 {
            return Err(EngineError::NoWorkers);
        }

        let (results_tx, results_rx) = mpsc::channel(worker_count);
        Ok(Self {
            worker_count,
            base_dir: base_dir.into(),
            transport,
            runtime,
            results_tx: Some(results_tx),
            results_rx,
        })
    }

    /// Start mirroring `packages`. Returns the number of results to expect.
    pub fn mirror(&self, packages: Vec<Package>) -> Result<usize, EngineError> {
        let results = self.results_tx.as_ref().ok_or(EngineError::Closed)?;
        let count = packages.len();
        if count == 0 {
            return Ok(0);
        }

        info!(
            "Mirroring {} package(s) into {} with {} worker(s)",
            count,
            self.base_dir.display(),
            self.worker_count
        );

        // The whole batch is known up front; fill the queue and close it.
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        for package in packages {
            let _ = job_tx.send(package);
        }
        drop(job_tx);

        let jobs = Arc::new(Mutex::new(job_rx));
        for id in 1..=self.worker_count.min(count) {
            let worker = Worker {
                id,
                base_dir: self.base_dir.clone(),
                transport: Arc::clone(&self.transport),
                runtime: Arc::clone(&self.runtime),
            };
            tokio::spawn(worker.run(Arc::clone(&jobs), results.clone()));
        }

        Ok(count)
    }

    /// Next result of any submitted batch.
    ///
    /// Waits while packages are still in flight. Returns `None` only after
    /// [`close`](Self::close) once every pending result has been read.
    pub async fn next_result(&mut self) -> Option<MirrorResult> {
        self.results_rx.recv().await
    }

    /// Stop accepting batches and end the result stream.
    pub fn close(&mut self) {
        if self.results_tx.take().is_some() {
            debug!("Closing mirror engine");
        }
    }
}

struct Worker {
    id: usize,
    base_dir: PathBuf,
    transport: Arc<dyn MirrorTransport>,
    runtime: Arc<dyn Runtime>,
}

impl Worker {
    async fn run(
        self,
        jobs: Arc<Mutex<mpsc::UnboundedReceiver<Package>>>,
        results: mpsc::Sender<MirrorResult>,
    ) {
        loop {
            let job = { jobs.lock().await.recv().await };
            let Some(package) = job else {
                break;
            };

            let path = package.mirror_path(&self.base_dir);
            let error = self.mirror_one(&package, &path).await.err();
            if results.send(MirrorResult { package, path, error }).await.is_err() {
                debug!("Mirror worker {}: result stream closed", self.id);
                break;
            }
        }
    }

    async fn mirror_one(&self, package: &Package, path: &Path) -> Result<(), MirrorError> {
        if !is_path_under(path, &self.base_dir) {
            return Err(MirrorError::InvalidPath(path.to_path_buf()));
        }
        if self.runtime.exists(path) {
            return Err(MirrorError::AlreadyExists(path.to_path_buf()));
        }
        let url = package
            .repository_url
            .as_deref()
            .ok_or(MirrorError::MissingUrl)?;

        debug!(
            "Mirror worker {}: cloning {} into {}",
            self.id,
            url,
            path.display()
        );
        self.transport
            .mirror_clone(url, path)
            .await
            .map_err(MirrorError::Transport)?;
        self.transport
            .update_server_info(path)
            .await
            .map_err(MirrorError::Transport)?;
        self.transport
            .fsck(path)
            .await
            .map_err(MirrorError::Transport)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::MockMirrorTransport;
    use crate::runtime::MockRuntime;
    use anyhow::anyhow;
    use mockall::Sequence;
    use mockall::predicate::eq;
    use std::collections::HashMap;
    use std::time::Duration;

    fn base() -> PathBuf {
        PathBuf::from("/var/mirror")
    }

    fn package(name: &str) -> Package {
        Package::with_repository(name, &format!("git@github.com:{}.git", name)).unwrap()
    }

    fn runtime_with_existing(existing: &'static [&'static str]) -> Arc<dyn Runtime> {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .returning(move |p| existing.iter().any(|e| base().join(e) == p));
        Arc::new(runtime)
    }

    fn succeeding_transport() -> MockMirrorTransport {
        let mut transport = MockMirrorTransport::new();
        transport.expect_mirror_clone().returning(|_, _| Ok(()));
        transport.expect_update_server_info().returning(|_| Ok(()));
        transport.expect_fsck().returning(|_| Ok(()));
        transport
    }

    async fn drain(engine: &mut MirrorEngine, count: usize) -> HashMap<String, MirrorResult> {
        let mut results = HashMap::new();
        for _ in 0..count {
            let result = tokio::time::timeout(Duration::from_secs(5), engine.next_result())
                .await
                .expect("mirror result did not arrive")
                .expect("stream closed early");
            let previous = results.insert(result.package.name.clone(), result);
            assert!(previous.is_none(), "duplicate result");
        }
        results
    }

    #[test]
    fn test_new_rejects_zero_workers() {
        let err = MirrorEngine::new(
            0,
            base(),
            Arc::new(MockMirrorTransport::new()),
            Arc::new(MockRuntime::new()),
        )
        .err();
        assert_eq!(err, Some(EngineError::NoWorkers));
    }

    #[tokio::test]
    async fn test_existing_mirror_is_skipped_without_transport_calls() {
        let mut transport = MockMirrorTransport::new();
        transport.expect_mirror_clone().never();
        transport.expect_update_server_info().never();
        transport.expect_fsck().never();

        let runtime = runtime_with_existing(&["twig/twig.git"]);
        let mut engine = MirrorEngine::new(2, base(), Arc::new(transport), runtime).unwrap();

        for _ in 0..2 {
            let count = engine.mirror(vec![package("twig/twig")]).unwrap();
            assert_eq!(count, 1);
            let results = drain(&mut engine, count).await;
            let result = &results["twig/twig"];
            assert!(result.already_exists());
            assert_eq!(result.path, base().join("twig/twig.git"));
        }
        engine.close();
    }

    #[tokio::test]
    async fn test_mirror_runs_clone_server_info_fsck_in_order() {
        let mut seq = Sequence::new();
        let mut transport = MockMirrorTransport::new();
        let target = base().join("symfony/console.git");

        transport
            .expect_mirror_clone()
            .with(
                eq("https://github.com/symfony/console.git"),
                eq(target.clone()),
            )
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        transport
            .expect_update_server_info()
            .with(eq(target.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        transport
            .expect_fsck()
            .with(eq(target.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut engine =
            MirrorEngine::new(1, base(), Arc::new(transport), runtime_with_existing(&[])).unwrap();
        engine.mirror(vec![package("symfony/console")]).unwrap();

        let results = drain(&mut engine, 1).await;
        assert!(results["symfony/console"].is_ok());
    }

    #[tokio::test]
    async fn test_failed_step_aborts_package() {
        let mut transport = MockMirrorTransport::new();
        transport.expect_mirror_clone().returning(|_, _| Ok(()));
        transport
            .expect_update_server_info()
            .returning(|_| Err(anyhow!("update-server-info failed")));
        transport.expect_fsck().never();

        let mut engine =
            MirrorEngine::new(1, base(), Arc::new(transport), runtime_with_existing(&[])).unwrap();
        engine.mirror(vec![package("psr/log")]).unwrap();

        let results = drain(&mut engine, 1).await;
        match &results["psr/log"].error {
            Some(MirrorError::Transport(e)) => {
                assert!(e.to_string().contains("update-server-info"))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_one_result_per_package() {
        let mut transport = MockMirrorTransport::new();
        transport.expect_mirror_clone().returning(|url, _| {
            if url.contains("broken") {
                Err(anyhow!("fatal: repository not found"))
            } else {
                Ok(())
            }
        });
        transport.expect_update_server_info().returning(|_| Ok(()));
        transport.expect_fsck().returning(|_| Ok(()));

        let runtime = runtime_with_existing(&["psr/log.git"]);
        let mut engine = MirrorEngine::new(3, base(), Arc::new(transport), runtime).unwrap();

        let mut packages: Vec<_> = (0..20).map(|i| package(&format!("vendor/p{}", i))).collect();
        packages.push(package("vendor/broken"));
        packages.push(package("psr/log"));
        packages.push(Package::new("no/url").unwrap());

        let count = engine.mirror(packages).unwrap();
        assert_eq!(count, 23);

        let results = drain(&mut engine, count).await;
        assert_eq!(results.len(), 23);
        assert!(results["vendor/p7"].is_ok());
        assert!(matches!(
            results["vendor/broken"].error,
            Some(MirrorError::Transport(_))
        ));
        assert!(results["psr/log"].already_exists());
        assert!(matches!(results["no/url"].error, Some(MirrorError::MissingUrl)));
    }

    #[tokio::test]
    async fn test_path_traversal_is_rejected() {
        let mut transport = MockMirrorTransport::new();
        transport.expect_mirror_clone().never();

        let mut runtime = MockRuntime::new();
        runtime.expect_exists().never();

        let mut engine = MirrorEngine::new(1, base(), Arc::new(transport), Arc::new(runtime)).unwrap();
        engine.mirror(vec![package("evil/../../../etc")]).unwrap();

        let results = drain(&mut engine, 1).await;
        assert!(matches!(
            results["evil/../../../etc"].error,
            Some(MirrorError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_second_batch_and_close() {
        let mut engine = MirrorEngine::new(
            2,
            base(),
            Arc::new(succeeding_transport()),
            runtime_with_existing(&[]),
        )
        .unwrap();

        engine.mirror(vec![package("a/a"), package("b/b")]).unwrap();
        engine.mirror(vec![package("c/c")]).unwrap();
        let results = drain(&mut engine, 3).await;
        assert_eq!(results.len(), 3);

        assert_eq!(engine.mirror(vec![]).unwrap(), 0);

        engine.close();
        assert_eq!(engine.mirror(vec![package("d/d")]), Err(EngineError::Closed));
        let next = tokio::time::timeout(Duration::from_secs(5), engine.next_result())
            .await
            .unwrap();
        assert!(next.is_none());
    }
}
