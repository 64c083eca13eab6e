//! Run orchestration.
//!
//! [`Runner::execute`] drives one run end to end: build the dispatch queue,
//! let the producer populate it completely, fan out to the worker pool, wait
//! at the join barrier, then aggregate. The report it returns enumerates
//! every artifact, failed ones included; per-item failures never abort a
//! run, only malformed configuration does.

use crate::catalog::{WorkCatalog, WorkItem};
use crate::extent::{Extent, GridTile};
use crate::mosaic::{Mosaic, MosaicError};
use crate::pool::{Artifact, PoolConfig, PoolError, WorkerPool};
use crate::queue::DispatchQueue;
use crate::telemetry::{MetricsSnapshot, RunMetrics};
use crate::transform::{JobPlan, Transform, TransformContext};
use std::fmt;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Fatal errors that abort a run before any worker starts.
#[derive(Debug, Error)]
pub enum RunError {
    /// The output directory could not be created.
    #[error("failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The producer thread could not be started.
    #[error("failed to start producer thread: {0}")]
    Producer(#[source] std::io::Error),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Mosaic(#[from] MosaicError),
}

/// Overall outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The catalog was empty; nothing to do.
    Empty,

    /// Every item succeeded.
    AllSucceeded,

    /// The run completed, but one or more items failed.
    PartialFailure,
}

/// Configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory artifacts are written under; created if absent.
    pub output_dir: PathBuf,

    /// Artifact file extension, leading dot included.
    pub extension: String,

    /// Worker pool sizing and polling.
    pub pool: PoolConfig,

    /// Shared source raster for tile-mode jobs.
    pub source: Option<PathBuf>,

    /// Where to write the composite manifest; tile mode only.
    pub mosaic_target: Option<PathBuf>,

    /// Base raster environment copied into every job.
    pub context: TransformContext,
}

impl RunConfig {
    pub fn new(output_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.into(),
            pool: PoolConfig::default(),
            source: None,
            mosaic_target: None,
            context: TransformContext::default(),
        }
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_mosaic_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.mosaic_target = Some(target.into());
        self
    }

    pub fn with_context(mut self, context: TransformContext) -> Self {
        self.context = context;
        self
    }
}

/// Final report of a run. Terminal; the aggregator only reads artifacts.
#[derive(Debug)]
pub struct RunReport {
    /// Every artifact the pool produced, in completion order.
    pub artifacts: Vec<Artifact>,

    /// Path of the composite manifest, when one was composed.
    pub merged_output: Option<PathBuf>,

    /// Counter snapshot taken after the join barrier.
    pub metrics: MetricsSnapshot,

    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RunReport {
    fn empty() -> Self {
        Self {
            artifacts: Vec::new(),
            merged_output: None,
            metrics: MetricsSnapshot::default(),
            elapsed: Duration::ZERO,
        }
    }

    /// Artifacts whose transform succeeded.
    pub fn succeeded(&self) -> Vec<&Artifact> {
        self.artifacts.iter().filter(|a| a.is_success()).collect()
    }

    /// Artifacts whose transform failed. Always fully enumerated.
    pub fn failed(&self) -> Vec<&Artifact> {
        self.artifacts.iter().filter(|a| !a.is_success()).collect()
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.artifacts.is_empty() {
            RunOutcome::Empty
        } else if self.failed().is_empty() {
            RunOutcome::AllSucceeded
        } else {
            RunOutcome::PartialFailure
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failed();
        writeln!(
            f,
            "{} artifacts ({} failed) in {:.2}s",
            self.artifacts.len(),
            failed.len(),
            self.elapsed.as_secs_f64()
        )?;
        for artifact in &failed {
            writeln!(f, "  failed: {}", artifact)?;
        }
        if let Some(merged) = &self.merged_output {
            writeln!(f, "  composite: {}", merged.display())?;
        }
        Ok(())
    }
}

/// Drives catalog → queue → pool → aggregation for one run.
pub struct Runner {
    config: RunConfig,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Executes the run to completion.
    ///
    /// An empty catalog is a no-op run, not an error. Per-item transform
    /// failures are recorded in the report and never propagate here.
    ///
    /// # Errors
    ///
    /// Only pre-flight failures: unusable output directory, producer or pool
    /// startup, or composite manifest I/O.
    pub fn execute(
        &self,
        catalog: WorkCatalog,
        transform: &dyn Transform,
    ) -> Result<RunReport, RunError> {
        if catalog.is_empty() {
            info!("Catalog is empty; nothing to process");
            return Ok(RunReport::empty());
        }

        std::fs::create_dir_all(&self.config.output_dir).map_err(|source| {
            RunError::OutputDir {
                path: self.config.output_dir.clone(),
                source,
            }
        })?;

        let started = Instant::now();
        let total = catalog.len();
        info!(
            items = total,
            workers = self.config.pool.workers,
            transform = transform.name(),
            "Starting run"
        );

        // Tile mode is implied by the catalog: remember the expected tiling
        // for the aggregator before the items move into the queue.
        let tiling: Vec<GridTile> = catalog
            .items()
            .iter()
            .filter_map(|item| match item {
                WorkItem::Tile { index, extent } => Some(GridTile {
                    index: *index,
                    extent: *extent,
                }),
                _ => None,
            })
            .collect();

        let mut plan = JobPlan::new(&self.config.output_dir, &self.config.extension)
            .with_context(self.config.context.clone());
        if let Some(source) = &self.config.source {
            plan = plan.with_source(source);
        }

        let queue = DispatchQueue::new();
        self.populate(&queue, catalog)?;

        let metrics = RunMetrics::new();
        let pool = WorkerPool::new(self.config.pool.clone());
        let artifacts = pool.run(&queue, &plan, transform, &metrics)?;

        // The pool has joined: every artifact exists, aggregation may begin.
        let merged_output = self.aggregate(&tiling, &artifacts)?;

        let report = RunReport {
            artifacts,
            merged_output,
            metrics: metrics.snapshot(),
            elapsed: started.elapsed(),
        };
        info!(
            metrics = %report.metrics,
            elapsed_s = report.elapsed.as_secs_f64(),
            "Run complete"
        );
        Ok(report)
    }

    /// Runs the producer: enqueue the whole catalog, close the queue, and
    /// join before any worker starts.
    fn populate(
        &self,
        queue: &DispatchQueue<WorkItem>,
        catalog: WorkCatalog,
    ) -> Result<(), RunError> {
        thread::scope(|scope| {
            let producer = thread::Builder::new()
                .name("rastermill-producer".into())
                .spawn_scoped(scope, move || {
                    for item in catalog.into_items() {
                        debug!(item = %item, "Producer enqueueing work item");
                        if queue.push(item).is_err() {
                            break;
                        }
                    }
                    queue.close();
                })
                .map_err(RunError::Producer)?;
            // Wait for the queue to be fully populated before any worker
            // starts. close() is idempotent: re-issuing it here guarantees
            // workers can drain and exit even if the producer died early.
            let _ = producer.join();
            queue.close();
            Ok(())
        })
    }

    /// Fan-in: compose tile artifacts when a mosaic target is configured.
    fn aggregate(
        &self,
        tiling: &[GridTile],
        artifacts: &[Artifact],
    ) -> Result<Option<PathBuf>, RunError> {
        let Some(target) = &self.config.mosaic_target else {
            return Ok(None);
        };
        if tiling.is_empty() {
            debug!("No tile items in catalog; skipping composite");
            return Ok(None);
        }

        let domain = tiling
            .iter()
            .skip(1)
            .fold(tiling[0].extent, |acc: Extent, t| acc.union(&t.extent));
        Mosaic::new(domain, tiling).compose(artifacts, target)?;
        Ok(Some(target.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{FnTransform, TransformError, TransformJob};
    use std::path::Path;

    fn write_output(job: &TransformJob) -> Result<(), TransformError> {
        std::fs::write(&job.output, job.item.id())?;
        Ok(())
    }

    #[test]
    fn test_empty_catalog_yields_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(RunConfig::new(dir.path().join("out"), ".tif"));
        let transform = FnTransform::new("noop", |_: &TransformJob| Ok(()));

        let report = runner.execute(WorkCatalog::default(), &transform).unwrap();
        assert_eq!(report.outcome(), RunOutcome::Empty);
        assert!(report.artifacts.is_empty());
        assert!(report.merged_output.is_none());
    }

    #[test]
    fn test_batch_run_produces_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let catalog = WorkCatalog::from_file_list(
            (0..5).map(|i| PathBuf::from(format!("in_{}.tif", i))).collect::<Vec<_>>(),
        );

        let runner = Runner::new(RunConfig::new(&out, ".tif"));
        let transform = FnTransform::new("write", write_output);
        let report = runner.execute(catalog, &transform).unwrap();

        assert_eq!(report.outcome(), RunOutcome::AllSucceeded);
        assert_eq!(report.artifacts.len(), 5);
        for i in 0..5 {
            assert!(out.join(format!("in_{}_fnl.tif", i)).exists());
        }
        assert_eq!(report.metrics.items_succeeded, 5);
    }

    #[test]
    fn test_failed_items_are_enumerated() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = WorkCatalog::from_file_list(vec![
            PathBuf::from("good.tif"),
            PathBuf::from("bad.tif"),
            PathBuf::from("fine.tif"),
        ]);

        let runner = Runner::new(RunConfig::new(dir.path().join("out"), ".tif"));
        let transform = FnTransform::new("flaky", |job: &TransformJob| {
            if job.item.id() == "bad" {
                Err(TransformError::Other("synthetic".into()))
            } else {
                Ok(())
            }
        });
        let report = runner.execute(catalog, &transform).unwrap();

        assert_eq!(report.outcome(), RunOutcome::PartialFailure);
        let failed = report.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id(), "bad");
        assert!(report.to_string().contains("bad"));
    }

    #[test]
    fn test_output_dir_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let runner = Runner::new(RunConfig::new(blocker.join("out"), ".tif"));
        let transform = FnTransform::new("noop", |_: &TransformJob| Ok(()));
        let catalog = WorkCatalog::from_file_list(vec![PathBuf::from("a.tif")]);

        assert!(matches!(
            runner.execute(catalog, &transform),
            Err(RunError::OutputDir { .. })
        ));
    }

    #[test]
    fn test_tile_run_composes_mosaic() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mosaic_path = dir.path().join("mosaic.json");

        let extent = crate::extent::Extent::new(0.0, 0.0, 100.0, 100.0).unwrap();
        let grid = crate::extent::GridSpec::new(2, 2).unwrap();
        let catalog = WorkCatalog::from_grid(&extent, &grid);

        let config = RunConfig::new(&out, ".tif")
            .with_source("/in/big.tif")
            .with_mosaic_target(&mosaic_path);
        let runner = Runner::new(config);
        let transform = FnTransform::new("write", write_output);
        let report = runner.execute(catalog, &transform).unwrap();

        assert_eq!(report.outcome(), RunOutcome::AllSucceeded);
        assert_eq!(report.merged_output.as_deref(), Some(mosaic_path.as_path()));

        let manifest: crate::mosaic::MosaicManifest =
            serde_json::from_str(&std::fs::read_to_string(&mosaic_path).unwrap()).unwrap();
        assert!(manifest.is_complete());
        assert_eq!(manifest.tiles.len(), 4);
        assert_eq!(manifest.extent, extent);
    }

    #[test]
    fn test_rerun_overwrites_same_paths() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let inputs: Vec<PathBuf> = (0..4).map(|i| PathBuf::from(format!("r{}.tif", i))).collect();
        let transform = FnTransform::new("write", write_output);

        for _ in 0..2 {
            let runner = Runner::new(RunConfig::new(&out, ".tif"));
            let report = runner
                .execute(WorkCatalog::from_file_list(inputs.clone()), &transform)
                .unwrap();
            assert_eq!(report.outcome(), RunOutcome::AllSucceeded);
        }

        let names = list_names(&out);
        assert_eq!(
            names,
            vec!["r0_fnl.tif", "r1_fnl.tif", "r2_fnl.tif", "r3_fnl.tif"]
        );
    }

    fn list_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
