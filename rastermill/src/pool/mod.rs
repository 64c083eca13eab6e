//! Fixed-size worker pool.
//!
//! [`WorkerPool::run`] spawns a set of named OS threads that drain the
//! dispatch queue: each worker repeatedly claims one item, builds its job
//! (with the job's own copy of the raster environment), applies the
//! transform, and records an [`Artifact`]. A failed transform marks that
//! item's artifact `Failed` and the worker moves on; one bad item never
//! aborts a worker or the pool.
//!
//! `run` returns only after every worker thread has terminated, which is the
//! join barrier the aggregator relies on: when it returns, all artifacts of
//! the run exist.

use crate::catalog::WorkItem;
use crate::queue::DispatchQueue;
use crate::telemetry::RunMetrics;
use crate::transform::{JobPlan, Transform};
use parking_lot::Mutex;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Default bounded wait when polling the queue.
///
/// Matches the guard interval the queue consumers have always used; with the
/// explicit close signal it only bounds how often an idle worker rechecks.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Errors that prevent the pool from running at all.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No worker thread could be spawned.
    #[error("no worker threads could be started")]
    NoWorkers,
}

/// Terminal state of one processed work item.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactStatus {
    /// The transform produced the output artifact.
    Success,

    /// The transform failed; the reason is recorded, the run continued.
    Failed(String),
}

/// The persisted result of processing one work item.
///
/// Created by a worker when it finishes an item, immutable thereafter.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// The item this artifact came from.
    pub item: WorkItem,

    /// Deterministic output path derived from the item's identifier.
    pub output: PathBuf,

    /// Whether the transform succeeded.
    pub status: ArtifactStatus,
}

impl Artifact {
    /// Stable identifier of the source item.
    pub fn id(&self) -> String {
        self.item.id()
    }

    pub fn is_success(&self) -> bool {
        self.status == ArtifactStatus::Success
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            ArtifactStatus::Success => write!(f, "{} -> {}", self.item, self.output.display()),
            ArtifactStatus::Failed(reason) => write!(f, "{} FAILED: {}", self.item, reason),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads. Defaults to the available parallelism.
    pub workers: usize,

    /// Bounded wait for each queue poll.
    pub poll_timeout: Duration,
}

impl PoolConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// A fixed-size set of concurrent worker threads.
pub struct WorkerPool {
    config: PoolConfig,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    /// Number of worker threads this pool will spawn.
    pub fn workers(&self) -> usize {
        self.config.workers.max(1)
    }

    /// Drains `queue` with this pool's workers and returns all artifacts.
    ///
    /// The queue must already have a producer feeding it (or be closed);
    /// workers exit once the queue is closed and drained. Artifact order is
    /// completion order, which is unspecified across workers.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoWorkers`] if not a single worker thread could
    /// be spawned.
    pub fn run(
        &self,
        queue: &DispatchQueue<WorkItem>,
        plan: &JobPlan,
        transform: &dyn Transform,
        metrics: &RunMetrics,
    ) -> Result<Vec<Artifact>, PoolError> {
        let artifacts: Mutex<Vec<Artifact>> = Mutex::new(Vec::new());
        let poll_timeout = self.config.poll_timeout;

        // scope joins every spawned worker before returning: the hard join
        // barrier between fan-out and aggregation.
        thread::scope(|scope| {
            let mut spawned = 0usize;
            for i in 0..self.workers() {
                let builder = thread::Builder::new().name(format!("rastermill-worker-{}", i));
                let result = builder.spawn_scoped(scope, || {
                    Self::worker_loop(queue, plan, transform, metrics, &artifacts, poll_timeout);
                });
                match result {
                    Ok(_) => spawned += 1,
                    Err(e) => error!(worker = i, error = %e, "Failed to spawn worker thread"),
                }
            }
            if spawned == 0 {
                return Err(PoolError::NoWorkers);
            }
            debug!(workers = spawned, "Worker pool started");
            Ok(())
        })?;

        Ok(artifacts.into_inner())
    }

    /// One worker: claim, transform, record, repeat until exhaustion.
    fn worker_loop(
        queue: &DispatchQueue<WorkItem>,
        plan: &JobPlan,
        transform: &dyn Transform,
        metrics: &RunMetrics,
        artifacts: &Mutex<Vec<Artifact>>,
        poll_timeout: Duration,
    ) {
        let worker = thread::current()
            .name()
            .unwrap_or("rastermill-worker")
            .to_owned();

        loop {
            let item = match queue.poll(poll_timeout) {
                Some(item) => item,
                None => {
                    // Exhausted only once the queue is closed AND drained;
                    // closed is monotonic and accepts no further pushes, so
                    // this observation is terminal. A bare timeout means the
                    // producer is still filling the queue.
                    if queue.is_closed() && queue.is_empty() {
                        break;
                    }
                    continue;
                }
            };

            metrics.item_claimed();
            debug!(worker = %worker, item = %item, transform = transform.name(), "Claimed work item");

            let job = plan.job_for(item);
            let started = Instant::now();
            // A panicking transform counts as that item's failure, not the
            // worker's: isolation is per unit of work.
            let result =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| transform.apply(&job)));
            let status = match result {
                Ok(Ok(())) => {
                    metrics.item_succeeded(started.elapsed());
                    ArtifactStatus::Success
                }
                Ok(Err(e)) => {
                    metrics.item_failed(started.elapsed());
                    warn!(worker = %worker, item = %job.item, error = %e, "Transform failed; continuing");
                    ArtifactStatus::Failed(e.to_string())
                }
                Err(_) => {
                    metrics.item_failed(started.elapsed());
                    warn!(worker = %worker, item = %job.item, "Transform panicked; continuing");
                    ArtifactStatus::Failed("transform panicked".to_string())
                }
            };

            artifacts.lock().push(Artifact {
                item: job.item,
                output: job.output,
                status,
            });
        }

        debug!(worker = %worker, "Worker finished: queue exhausted");
    }
}
