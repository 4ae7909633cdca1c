//! Concurrent dependency resolver.
//!
//! Starting from one or more root packages, the resolver asks the registry for
//! each package's metadata and follows the requirements of **every** version,
//! so the result contains every package any tag or branch ever required.
//!
//! # Structure
//!
//! - A bounded job queue (`worker_count + 1`) feeds a fixed pool of workers.
//! - Newly discovered requirements are pushed by short-lived helper tasks, so
//!   a full queue never blocks the worker that discovered them.
//! - A [`WorkGroup`] counts queued jobs and in-flight pushes. When it reaches
//!   zero the queue is closed, the workers exit and the result stream ends.
//! - `queued` and `resolved` sets stop a package from being looked up twice,
//!   which also makes circular requirements terminate.

use anyhow::anyhow;
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::package::{Package, is_platform_package};
use crate::registry::{RegistryClient, RenameTable};
use crate::set::ConcurrentSet;
use crate::work::{WorkGroup, WorkTicket};

/// Outcome of looking up a single package.
#[derive(Debug)]
pub struct ResolutionResult {
    /// The package under its canonical name, or as requested if the lookup failed.
    pub package: Package,
    pub error: Option<anyhow::Error>,
}

impl ResolutionResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Errors that prevent a resolver from being built.
#[derive(Debug, PartialEq, Eq)]
pub enum ResolverError {
    NoWorkers,
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverError::NoWorkers => {
                write!(f, "Starting a dependency resolver with zero workers is not possible")
            }
        }
    }
}

impl std::error::Error for ResolverError {}

struct Job {
    package: Package,
    ticket: WorkTicket,
}

/// State shared by all workers of one resolver.
struct Shared {
    client: Arc<dyn RegistryClient>,
    renames: RenameTable,
    queued: Arc<ConcurrentSet<String>>,
    resolved: Arc<ConcurrentSet<String>>,
    group: WorkGroup,
}

impl Shared {
    /// Name used for lookups and for the queued/resolved bookkeeping.
    fn key(&self, name: &str) -> String {
        self.renames.canonical(name).to_string()
    }

    /// Claim `name` for the queue. Returns false if it is a platform package
    /// or was already queued or resolved.
    fn claim(&self, name: &str) -> bool {
        if is_platform_package(name) {
            return false;
        }
        let key = self.key(name);
        if self.resolved.exists(&key) {
            return false;
        }
        self.queued.add(key)
    }
}

pub struct DependencyResolver {
    worker_count: usize,
    client: Arc<dyn RegistryClient>,
    renames: RenameTable,
    queued: Arc<ConcurrentSet<String>>,
    resolved: Arc<ConcurrentSet<String>>,
}

impl DependencyResolver {
    pub fn new(
        worker_count: usize,
        client: Arc<dyn RegistryClient>,
        renames: RenameTable,
    ) -> Result<Self, ResolverError> {
        if worker_count == 0 {
            return Err(ResolverError::NoWorkers);
        }

        Ok(Self {
            worker_count,
            client,
            renames,
            queued: Arc::new(ConcurrentSet::new()),
            resolved: Arc::new(ConcurrentSet::new()),
        })
    }

    /// Use the given sets to track queued and resolved package names.
    pub fn with_sets(
        mut self,
        queued: Arc<ConcurrentSet<String>>,
        resolved: Arc<ConcurrentSet<String>>,
    ) -> Self {
        self.queued = queued;
        self.resolved = resolved;
        self
    }

    /// Start resolving `roots` and return the stream of results.
    ///
    /// Results arrive in no particular order. Every distinct non-platform
    /// package name that enters the queue yields exactly one result. The
    /// stream ends once the whole graph has been walked.
    ///
    /// Must be called from within a tokio runtime.
    pub fn resolve(&self, roots: Vec<Package>) -> mpsc::Receiver<ResolutionResult> {
        let (job_tx, job_rx) = mpsc::channel::<Job>(self.worker_count + 1);
        let (result_tx, result_rx) = mpsc::channel(1);
        let jobs = Arc::new(Mutex::new(job_rx));

        let shared = Arc::new(Shared {
            client: Arc::clone(&self.client),
            renames: self.renames.clone(),
            queued: Arc::clone(&self.queued),
            resolved: Arc::clone(&self.resolved),
            group: WorkGroup::new(),
        });

        info!(
            "Resolving dependencies of {} package(s) with {} worker(s)",
            roots.len(),
            self.worker_count
        );

        for id in 1..=self.worker_count {
            tokio::spawn(worker(
                id,
                Arc::clone(&shared),
                Arc::clone(&jobs),
                job_tx.downgrade(),
                result_tx.clone(),
            ));
        }
        drop(result_tx);

        tokio::spawn(async move {
            for root in roots {
                if !root.is_platform() && !shared.claim(&root.name) {
                    debug!("Root package {} given twice, skipping", root.name);
                    continue;
                }
                let ticket = shared.group.ticket();
                if job_tx.send(Job { package: root, ticket }).await.is_err() {
                    warn!("Job queue closed before all root packages were queued");
                    break;
                }
            }

            shared.group.wait().await;
            debug!(
                "Resolution finished: {} package(s) resolved",
                shared.resolved.len()
            );
            // Workers only hold weak senders; dropping this one closes the queue.
            drop(job_tx);
        });

        result_rx
    }

    /// Resolve `roots` and collect every result.
    pub async fn resolve_all(&self, roots: Vec<Package>) -> Vec<ResolutionResult> {
        let mut stream = self.resolve(roots);
        let mut results = Vec::new();
        while let Some(result) = stream.recv().await {
            results.push(result);
        }
        results
    }
}

async fn worker(
    id: usize,
    shared: Arc<Shared>,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    queue: mpsc::WeakSender<Job>,
    results: mpsc::Sender<ResolutionResult>,
) {
    debug!("Worker {}: started", id);

    loop {
        let job = { jobs.lock().await.recv().await };
        let Some(Job { package, ticket }) = job else {
            break;
        };

        if package.is_platform() {
            debug!("Worker {}: {} is a platform package, skipping", id, package.name);
            drop(ticket);
            continue;
        }

        let requested_key = shared.key(&package.name);
        let Some(result) = process(id, &shared, &queue, package).await else {
            shared.resolved.add(requested_key);
            drop(ticket);
            continue;
        };
        let resolved_key = shared.key(&result.package.name);

        if results.send(result).await.is_err() {
            debug!("Worker {}: result receiver dropped, stopping", id);
            break;
        }
        shared.resolved.add(requested_key);
        shared.resolved.add(resolved_key);
        drop(ticket);
    }

    debug!("Worker {}: done", id);
}

/// Look `package` up and queue every requirement not seen before.
///
/// Returns `None` if the registry reports a canonical name that another job
/// has already claimed; that job emits the result instead.
async fn process(
    id: usize,
    shared: &Shared,
    queue: &mpsc::WeakSender<Job>,
    package: Package,
) -> Option<ResolutionResult> {
    let lookup_name = shared.key(&package.name);
    debug!("Worker {}: looking up {}", id, lookup_name);

    let metadata = match shared.client.get_package_by_name(&lookup_name).await {
        Ok(Some(metadata)) => metadata,
        Ok(None) => {
            return Some(ResolutionResult {
                error: Some(anyhow!(
                    "Registry request for package \"{}\" succeeded, but no package was received",
                    lookup_name
                )),
                package,
            });
        }
        Err(e) => {
            return Some(ResolutionResult {
                package,
                error: Some(e),
            });
        }
    };

    let canonical = if metadata.name.is_empty() {
        lookup_name.clone()
    } else {
        metadata.name.clone()
    };
    let canonical_key = shared.key(&canonical);
    if canonical_key != lookup_name && !shared.queued.add(canonical_key) {
        debug!(
            "Worker {}: {} is {}, which is already queued",
            id, lookup_name, canonical
        );
        return None;
    }

    for dependency in metadata.all_requirements() {
        if !shared.claim(dependency) {
            continue;
        }

        let Ok(next) = Package::new(dependency) else {
            continue;
        };
        debug!("Worker {}: queueing {} -> {}", id, lookup_name, dependency);

        // One unit for the package itself and one for the push below.
        let ticket = shared.group.ticket();
        let push_ticket = shared.group.ticket();
        match queue.upgrade() {
            Some(tx) => {
                tokio::spawn(async move {
                    let _push_ticket = push_ticket;
                    let _ = tx
                        .send(Job {
                            package: next,
                            ticket,
                        })
                        .await;
                });
            }
            None => warn!("Worker {}: job queue closed, dropping {}", id, dependency),
        }
    }

    let mut resolved = package;
    resolved.name = canonical;
    resolved.set_repository_url(&metadata.repository);

    debug!("Worker {}: resolved {}", id, resolved.name);
    Some(ResolutionResult {
        package: resolved,
        error: None,
    })
}
