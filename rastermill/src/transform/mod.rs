//! The transform collaborator seam.
//!
//! The numerical operation applied to each work item lives outside this
//! crate. [`Transform`] is the boundary: workers hand it a [`TransformJob`]
//! describing one unit of work and it either produces the output artifact at
//! the job's output path or fails with an opaque error.
//!
//! Raster environment settings (clip extent, cell size, snap source) travel
//! inside the job as an owned [`TransformContext`], one copy per unit of
//! work. Nothing here is process-global, so two workers can never corrupt
//! each other's transform inputs.

mod command;

pub use command::CommandTransform;

use crate::catalog::WorkItem;
use crate::extent::Extent;
use std::path::PathBuf;
use thiserror::Error;

/// Errors an external transform may fail with.
#[derive(Debug, Error)]
pub enum TransformError {
    /// I/O failure while producing the output artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The external command exited unsuccessfully.
    #[error("transform command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    /// The job requires an input raster but none was supplied.
    #[error("no input raster supplied for item {0}")]
    MissingInput(String),

    /// The command template is malformed or references unavailable fields.
    #[error("invalid command template: {0}")]
    Template(String),

    /// Any other transform-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Raster environment for one unit of work.
///
/// This is the explicit-context redesign of a shared "current extent /
/// cell size" workspace: every job owns its copy, and tile jobs get their
/// clip extent filled in from the item they process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformContext {
    /// Analysis window the transform must restrict itself to.
    pub clip_extent: Option<Extent>,

    /// Output cell size in map units.
    pub cell_size: Option<f64>,

    /// Raster whose cell alignment the output should snap to.
    pub snap_source: Option<PathBuf>,
}

/// Everything a worker hands to the transform for one item.
#[derive(Debug, Clone)]
pub struct TransformJob {
    /// The unit of work being processed.
    pub item: WorkItem,

    /// Source raster. The item's own path in batch mode, the shared input
    /// in tile mode; `None` when the run supplies no source raster.
    pub input: Option<PathBuf>,

    /// Deterministic output artifact path for this item.
    pub output: PathBuf,

    /// This job's owned copy of the raster environment.
    pub context: TransformContext,
}

/// An opaque, deterministic raster operation.
///
/// Implementations must be thread-safe: the worker pool calls `apply`
/// concurrently from many threads, one job per call, jobs never shared.
pub trait Transform: Send + Sync {
    /// Processes one unit of work, producing the artifact at `job.output`.
    fn apply(&self, job: &TransformJob) -> Result<(), TransformError>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "transform"
    }
}

/// Closure-backed transform, mainly for wiring and tests.
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> FnTransform<F>
where
    F: Fn(&TransformJob) -> Result<(), TransformError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(&TransformJob) -> Result<(), TransformError> + Send + Sync,
{
    fn apply(&self, job: &TransformJob) -> Result<(), TransformError> {
        (self.f)(job)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Builds [`TransformJob`]s for the items of one run.
///
/// Holds the run-wide pieces every job shares: output directory and
/// extension, the tile-mode source raster, and the base context. Tile items
/// get their clip extent overridden with the tile's own sub-extent.
#[derive(Debug, Clone)]
pub struct JobPlan {
    output_dir: PathBuf,
    extension: String,
    source: Option<PathBuf>,
    context: TransformContext,
}

impl JobPlan {
    /// Creates a plan writing artifacts as `{output_dir}/{id}_fnl{extension}`.
    pub fn new(output_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.into(),
            source: None,
            context: TransformContext::default(),
        }
    }

    /// Sets the shared source raster for tile-mode jobs.
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the base raster environment copied into every job.
    pub fn with_context(mut self, context: TransformContext) -> Self {
        self.context = context;
        self
    }

    /// Builds the job for one claimed item.
    pub fn job_for(&self, item: WorkItem) -> TransformJob {
        let input = match &item {
            WorkItem::File { path } => Some(path.clone()),
            WorkItem::Tile { .. } => self.source.clone(),
        };
        let mut context = self.context.clone();
        if let Some(extent) = item.extent() {
            context.clip_extent = Some(*extent);
        }
        let output = item.output_path(&self.output_dir, &self.extension);
        TransformJob {
            item,
            input,
            output,
            context,
        }
    }
}
