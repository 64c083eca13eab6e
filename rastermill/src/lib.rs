//! Rastermill - parallel raster transform runner.
//!
//! Distributes a raster-transform workload across a fixed pool of worker
//! threads on one machine. Two decomposition strategies are supported:
//!
//! - **batch** (task parallelism): many independent input files, each
//!   transformed in isolation to its own output artifact;
//! - **tiles** (data parallelism): one large input subdivided into a grid of
//!   spatial sub-extents, each transformed independently, then recombined
//!   into a composite dataset.
//!
//! The flow is catalog → dispatch queue → worker pool → artifacts →
//! aggregator. The transform itself is an external collaborator behind the
//! [`transform::Transform`] trait; rastermill owns the decomposition,
//! dispatch, failure isolation, and result aggregation around it.

pub mod catalog;
pub mod config;
pub mod extent;
pub mod mosaic;
pub mod pool;
pub mod queue;
pub mod run;
pub mod telemetry;
pub mod transform;

pub use catalog::{WorkCatalog, WorkItem};
pub use extent::{partition, Extent, ExtentError, GridSpec, GridTile};
pub use pool::{Artifact, ArtifactStatus, PoolConfig, WorkerPool};
pub use queue::DispatchQueue;
pub use run::{RunConfig, RunError, RunOutcome, RunReport, Runner};
pub use transform::{Transform, TransformContext, TransformError, TransformJob};
