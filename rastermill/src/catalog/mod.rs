//! Work catalog: the units of work for a run.
//!
//! A [`WorkCatalog`] is an ordered list of [`WorkItem`]s, built either from
//! input files (task-parallel batch mode) or from a grid subdivision of one
//! extent (data-parallel tile mode). Each item carries the stable identifier
//! its output artifact name derives from, so reruns overwrite the same paths.

use crate::extent::{partition, Extent, GridSpec};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Suffix appended to every output artifact name.
pub const OUTPUT_SUFFIX: &str = "_fnl";

/// Errors produced while building a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The input directory could not be enumerated.
    #[error("failed to read input directory {path}: {source}")]
    InputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One unit of work, processed by exactly one worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    /// An independent input file (task-parallel mode).
    File { path: PathBuf },

    /// One sub-extent of a larger input (data-parallel mode).
    Tile { index: u32, extent: Extent },
}

impl WorkItem {
    /// Stable identifier: the file stem for files, the tile index for tiles.
    ///
    /// Output naming derives from this identifier alone, never from execution
    /// order or timestamps, so concurrent workers cannot collide and reruns
    /// overwrite the same paths.
    pub fn id(&self) -> String {
        match self {
            WorkItem::File { path } => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            WorkItem::Tile { index, .. } => index.to_string(),
        }
    }

    /// Output file name for this item: `{id}_fnl{ext}`.
    ///
    /// `extension` includes the leading dot (e.g. `".tif"`).
    pub fn output_name(&self, extension: &str) -> String {
        format!("{}{}{}", self.id(), OUTPUT_SUFFIX, extension)
    }

    /// Full output path under `dir`.
    pub fn output_path(&self, dir: &Path, extension: &str) -> PathBuf {
        dir.join(self.output_name(extension))
    }

    /// The tile extent, for tile items.
    pub fn extent(&self) -> Option<&Extent> {
        match self {
            WorkItem::File { .. } => None,
            WorkItem::Tile { extent, .. } => Some(extent),
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::File { path } => write!(f, "file {}", path.display()),
            WorkItem::Tile { index, extent } => write!(f, "tile {} {}", index, extent),
        }
    }
}

/// An ordered list of work items for one run.
///
/// An empty catalog is legal and yields a run with zero artifacts.
#[derive(Debug, Clone, Default)]
pub struct WorkCatalog {
    items: Vec<WorkItem>,
}

impl WorkCatalog {
    /// Builds a task-parallel catalog from an explicit file list, preserving
    /// input order.
    pub fn from_file_list<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let items = paths
            .into_iter()
            .map(|path| WorkItem::File { path })
            .collect();
        Self { items }
    }

    /// Builds a task-parallel catalog by enumerating `dir` for files with the
    /// given extension (leading dot, case-sensitive), in lexical order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InputDir`] if the directory cannot be read.
    pub fn from_dir(dir: &Path, extension: &str) -> Result<Self, CatalogError> {
        let entries = std::fs::read_dir(dir).map_err(|source| CatalogError::InputDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let suffix = extension.trim_start_matches('.');
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .map(|e| e.to_string_lossy() == suffix)
                        .unwrap_or(false)
            })
            .collect();
        paths.sort();

        debug!(
            dir = %dir.display(),
            extension,
            count = paths.len(),
            "Enumerated input workspace"
        );

        Ok(Self::from_file_list(paths))
    }

    /// Builds a data-parallel catalog by subdividing `extent` into a
    /// `rows x cols` grid, one tile item per sub-extent, index order
    /// preserved.
    pub fn from_grid(extent: &Extent, grid: &GridSpec) -> Self {
        let items = partition(extent, grid)
            .into_iter()
            .map(|tile| WorkItem::Tile {
                index: tile.index,
                extent: tile.extent,
            })
            .collect();
        Self { items }
    }

    /// Number of work items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the catalog has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The items in catalog order.
    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    /// Consumes the catalog, yielding its items in order.
    pub fn into_items(self) -> Vec<WorkItem> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_item_id_and_output_name() {
        let item = WorkItem::File {
            path: PathBuf::from("/data/input/elevation.tif"),
        };
        assert_eq!(item.id(), "elevation");
        assert_eq!(item.output_name(".tif"), "elevation_fnl.tif");
        assert_eq!(
            item.output_path(Path::new("/data/out"), ".tif"),
            PathBuf::from("/data/out/elevation_fnl.tif")
        );
    }

    #[test]
    fn test_tile_item_id_and_output_name() {
        let item = WorkItem::Tile {
            index: 7,
            extent: Extent::new(0.0, 0.0, 10.0, 10.0).unwrap(),
        };
        assert_eq!(item.id(), "7");
        assert_eq!(item.output_name(".tif"), "7_fnl.tif");
    }

    #[test]
    fn test_from_file_list_preserves_order() {
        let catalog = WorkCatalog::from_file_list(vec![
            PathBuf::from("c.tif"),
            PathBuf::from("a.tif"),
            PathBuf::from("b.tif"),
        ]);
        let ids: Vec<String> = catalog.items().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_from_grid_delegates_to_partitioner() {
        let extent = Extent::new(0.0, 0.0, 100.0, 100.0).unwrap();
        let grid = GridSpec::new(2, 2).unwrap();
        let catalog = WorkCatalog::from_grid(&extent, &grid);

        assert_eq!(catalog.len(), 4);
        let ids: Vec<String> = catalog.items().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert_eq!(
            catalog.items()[0].extent(),
            Some(&Extent::new(0.0, 0.0, 50.0, 50.0).unwrap())
        );
    }

    #[test]
    fn test_empty_catalog_is_legal() {
        let catalog = WorkCatalog::from_file_list(Vec::<PathBuf>::new());
        assert!(catalog.is_empty());
        assert_eq!(catalog.len(), 0);
    }

    #[test]
    fn test_from_dir_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.tif", "a.tif", "notes.txt", "c.tif"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.tif")).unwrap();

        let catalog = WorkCatalog::from_dir(dir.path(), ".tif").unwrap();
        let ids: Vec<String> = catalog.items().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_from_dir_missing_directory_errors() {
        let err = WorkCatalog::from_dir(Path::new("/nonexistent/rastermill"), ".tif");
        assert!(matches!(err, Err(CatalogError::InputDir { .. })));
    }
}
