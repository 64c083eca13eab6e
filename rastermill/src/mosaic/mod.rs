//! Result aggregation: composing tile artifacts into a mosaic.
//!
//! After the worker pool has fully terminated, the aggregator collects every
//! successful tile artifact and writes a mosaic manifest describing the
//! composite dataset: each member tile's extent and artifact path, the
//! spatial domain, and any gaps left by failed tiles. Raster pixel merging
//! is the renderer's business; the manifest carries the spatial composition
//! contract.
//!
//! Coverage problems are never fatal. A missing or failed tile becomes a
//! documented gap; an artifact whose extent disagrees with the expected
//! tiling, or overlaps a neighbor, is reported at warning level and the
//! composite is still written.

use crate::catalog::WorkItem;
use crate::extent::{Extent, GridTile};
use crate::pool::Artifact;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors writing the composite manifest.
#[derive(Debug, Error)]
pub enum MosaicError {
    #[error("failed to write mosaic manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize mosaic manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One member tile of the composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosaicEntry {
    pub index: u32,
    pub extent: Extent,
    pub path: PathBuf,
}

/// The composite dataset description written by [`Mosaic::compose`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosaicManifest {
    /// Spatial domain of the full tiling.
    pub extent: Extent,

    /// Successful member tiles, in index order.
    pub tiles: Vec<MosaicEntry>,

    /// Indices of expected tiles absent from the composite.
    pub gaps: Vec<u32>,
}

impl MosaicManifest {
    /// Whether every expected tile made it into the composite.
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }
}

/// Aggregates tile artifacts against a known expected tiling.
pub struct Mosaic {
    domain: Extent,
    expected: BTreeMap<u32, Extent>,
}

impl Mosaic {
    /// Creates an aggregator for the tiling produced by the partitioner.
    pub fn new(domain: Extent, tiling: &[GridTile]) -> Self {
        let expected = tiling.iter().map(|t| (t.index, t.extent)).collect();
        Self { domain, expected }
    }

    /// Composes the successful tile artifacts into a manifest at `target`.
    ///
    /// Only artifacts for tile items participate; failed artifacts are
    /// excluded and recorded as gaps, as are expected tiles no artifact
    /// covers. Aggregation order does not matter: the expected tiling is
    /// disjoint, so the merge is commutative.
    pub fn compose(
        &self,
        artifacts: &[Artifact],
        target: &Path,
    ) -> Result<MosaicManifest, MosaicError> {
        let mut tiles: Vec<MosaicEntry> = Vec::new();

        for artifact in artifacts {
            let WorkItem::Tile { index, extent } = &artifact.item else {
                continue;
            };
            if !artifact.is_success() {
                continue;
            }

            match self.expected.get(index) {
                None => {
                    warn!(
                        index = *index,
                        "Artifact for unknown tile index; excluded from composite"
                    );
                    continue;
                }
                Some(expected) if expected != extent => {
                    warn!(
                        index = *index,
                        artifact_extent = %extent,
                        expected_extent = %expected,
                        "Tile extent disagrees with the expected tiling"
                    );
                }
                Some(_) => {}
            }

            tiles.push(MosaicEntry {
                index: *index,
                extent: *extent,
                path: artifact.output.clone(),
            });
        }

        tiles.sort_by_key(|t| t.index);

        // Interior overlap between members: the expected tiling is disjoint,
        // so any hit means inconsistent artifact extents.
        for (i, a) in tiles.iter().enumerate() {
            for b in tiles.iter().skip(i + 1) {
                if a.extent.overlaps(&b.extent) {
                    warn!(
                        first = a.index,
                        second = b.index,
                        "Overlapping tile extents in composite"
                    );
                }
            }
        }

        let covered: Vec<u32> = tiles.iter().map(|t| t.index).collect();
        let gaps: Vec<u32> = self
            .expected
            .keys()
            .filter(|index| !covered.contains(index))
            .copied()
            .collect();
        for index in &gaps {
            warn!(index = *index, "Tile missing from composite; leaving a gap");
        }

        let manifest = MosaicManifest {
            extent: self.domain,
            tiles,
            gaps,
        };

        let json = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(target, json).map_err(|source| MosaicError::Io {
            path: target.to_path_buf(),
            source,
        })?;

        info!(
            target = %target.display(),
            tiles = manifest.tiles.len(),
            gaps = manifest.gaps.len(),
            "Composite manifest written"
        );
        Ok(manifest)
    }
}
