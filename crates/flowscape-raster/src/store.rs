//! Artifact store
//!
//! Layers and grids are cached under an [`ArtifactKey`], a pure function of
//! the case identity and the artifact kind. Generators ask the store before
//! computing anything, so rerunning a case reuses what already exists.
//!
//! - [`FsArtifactStore`]: files under a root directory (the case folder),
//!   each sealed with a blake3 digest written next to it
//! - [`MemoryArtifactStore`]: in-process map, for tests and dry runs

use crate::error::RasterError;
use crate::geotiff;
use crate::raster::RasterLayer;
use dashmap::DashMap;
use flowscape_grid::SpatialGrid;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// Extension of the digest file written next to each stored artifact
pub const DIGEST_EXTENSION: &str = "blake3";

/// What an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Grid,
    Density,
    Capacity,
    Condition,
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Grid => "grid",
            Self::Density => "density",
            Self::Capacity => "capacity",
            Self::Condition => "condition",
        };
        f.write_str(name)
    }
}

/// Cache key of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub kind: ArtifactKind,
    /// File name inside the store, unique per case identity and kind
    pub file_name: String,
}

impl ArtifactKey {
    #[must_use]
    pub fn new(kind: ArtifactKind, file_name: impl Into<String>) -> Self {
        Self {
            kind,
            file_name: file_name.into(),
        }
    }
}

impl Display for ArtifactKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.file_name)
    }
}

/// Hex blake3 digest of a file's bytes
///
/// # Errors
/// `RasterError::Io` if the file cannot be read
pub fn content_digest(path: &Path) -> Result<String, RasterError> {
    let bytes = fs::read(path).map_err(|e| RasterError::io(path, e))?;
    Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
}

/// Keyed storage for grids and rasters
pub trait ArtifactStore: Send + Sync {
    /// Where the artifact for `key` lives (or would live)
    fn locate(&self, key: &ArtifactKey) -> PathBuf;

    /// Artifact already stored
    fn contains(&self, key: &ArtifactKey) -> bool;

    /// Store a raster, returning its location
    ///
    /// # Errors
    /// Storage failures
    fn put_raster(&self, key: &ArtifactKey, layer: &RasterLayer) -> Result<PathBuf, RasterError>;

    /// Fetch a raster, `None` when absent
    ///
    /// # Errors
    /// Storage or decoding failures
    fn get_raster(&self, key: &ArtifactKey) -> Result<Option<RasterLayer>, RasterError>;

    /// Store a grid, returning its location
    ///
    /// # Errors
    /// Storage failures
    fn put_grid(&self, key: &ArtifactKey, grid: &SpatialGrid) -> Result<PathBuf, RasterError>;

    /// Fetch a grid, `None` when absent
    ///
    /// # Errors
    /// Storage or decoding failures
    fn get_grid(&self, key: &ArtifactKey) -> Result<Option<SpatialGrid>, RasterError>;
}

/// Artifacts as files under one directory
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Digest file sealing the artifact of `key`
    #[must_use]
    pub fn digest_path(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(format!("{}.{DIGEST_EXTENSION}", key.file_name))
    }

    fn seal(&self, key: &ArtifactKey, path: &Path) -> Result<(), RasterError> {
        let digest = content_digest(path)?;
        let seal = self.digest_path(key);
        fs::write(&seal, digest).map_err(|e| RasterError::io(&seal, e))
    }

    /// Whether the stored file still matches its digest
    ///
    /// Files without a digest (placed by hand or by an older run) are
    /// trusted as they are.
    fn intact(&self, key: &ArtifactKey, path: &Path) -> bool {
        let Ok(expected) = fs::read_to_string(self.digest_path(key)) else {
            return true;
        };
        match content_digest(path) {
            Ok(actual) if actual == expected.trim() => true,
            Ok(_) => {
                warn!(
                    artifact = %key,
                    path = %path.display(),
                    "artifact digest mismatch, regenerating"
                );
                false
            }
            Err(e) => {
                warn!(artifact = %key, error = %e, "artifact unreadable, regenerating");
                false
            }
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn locate(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(&key.file_name)
    }

    fn contains(&self, key: &ArtifactKey) -> bool {
        let path = self.locate(key);
        path.is_file() && self.intact(key, &path)
    }

    fn put_raster(&self, key: &ArtifactKey, layer: &RasterLayer) -> Result<PathBuf, RasterError> {
        let path = self.locate(key);
        geotiff::write(&path, layer)?;
        self.seal(key, &path)?;
        Ok(path)
    }

    fn get_raster(&self, key: &ArtifactKey) -> Result<Option<RasterLayer>, RasterError> {
        if !self.contains(key) {
            return Ok(None);
        }
        geotiff::read(&self.locate(key)).map(Some)
    }

    fn put_grid(&self, key: &ArtifactKey, grid: &SpatialGrid) -> Result<PathBuf, RasterError> {
        let path = self.locate(key);
        fs::create_dir_all(&self.root).map_err(|e| RasterError::io(&self.root, e))?;

        let partial = path.with_extension("json.partial");
        {
            let file = File::create(&partial).map_err(|e| RasterError::io(&partial, e))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, grid)
                .map_err(|e| RasterError::json(&partial, e))?;
            writer.flush().map_err(|e| RasterError::io(&partial, e))?;
        }
        fs::rename(&partial, &path).map_err(|e| RasterError::io(&path, e))?;
        self.seal(key, &path)?;
        Ok(path)
    }

    fn get_grid(&self, key: &ArtifactKey) -> Result<Option<SpatialGrid>, RasterError> {
        if !self.contains(key) {
            return Ok(None);
        }
        let path = self.locate(key);
        let file = File::open(&path).map_err(|e| RasterError::io(&path, e))?;
        serde_json::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(|e| RasterError::json(&path, e))
    }
}

#[derive(Debug, Clone)]
enum Stored {
    Raster(RasterLayer),
    Grid(SpatialGrid),
}

/// In-memory store that counts writes
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    root: PathBuf,
    entries: DashMap<ArtifactKey, Stored>,
    writes: AtomicUsize,
}

impl MemoryArtifactStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Number of successful puts
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn put(&self, key: &ArtifactKey, value: Stored) -> PathBuf {
        self.entries.insert(key.clone(), value);
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.locate(key)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn locate(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(&key.file_name)
    }

    fn contains(&self, key: &ArtifactKey) -> bool {
        self.entries.contains_key(key)
    }

    fn put_raster(&self, key: &ArtifactKey, layer: &RasterLayer) -> Result<PathBuf, RasterError> {
        Ok(self.put(key, Stored::Raster(layer.clone())))
    }

    fn get_raster(&self, key: &ArtifactKey) -> Result<Option<RasterLayer>, RasterError> {
        Ok(self.entries.get(key).and_then(|e| match e.value() {
            Stored::Raster(layer) => Some(layer.clone()),
            Stored::Grid(_) => None,
        }))
    }

    fn put_grid(&self, key: &ArtifactKey, grid: &SpatialGrid) -> Result<PathBuf, RasterError> {
        Ok(self.put(key, Stored::Grid(grid.clone())))
    }

    fn get_grid(&self, key: &ArtifactKey) -> Result<Option<SpatialGrid>, RasterError> {
        Ok(self.entries.get(key).and_then(|e| match e.value() {
            Stored::Grid(grid) => Some(grid.clone()),
            Stored::Raster(_) => None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowscape_grid::SpatialReference;
    use tempfile::TempDir;

    fn grid() -> SpatialGrid {
        SpatialGrid::new(10.0, 20.0, 5.0, 4, 3, SpatialReference::default()).unwrap()
    }

    #[test]
    fn key_displays_kind_and_name() {
        let key = ArtifactKey::new(ArtifactKind::Density, "x.tif");
        assert_eq!(key.to_string(), "density:x.tif");
    }

    #[test]
    fn fs_store_seals_what_it_writes() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let key = ArtifactKey::new(ArtifactKind::Density, "city_population.tif");
        let layer = RasterLayer::filled_f32(grid(), 2.0, None);
        let path = store.put_raster(&key, &layer).unwrap();

        let seal = std::fs::read_to_string(store.digest_path(&key)).unwrap();
        assert_eq!(seal, content_digest(&path).unwrap());
        assert_eq!(seal.len(), 64);
        assert!(store.contains(&key));
    }

    #[test]
    fn fs_store_drops_artifact_that_no_longer_matches() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let key = ArtifactKey::new(ArtifactKind::Grid, "city_grid_30m.json");
        store.put_grid(&key, &grid()).unwrap();

        std::fs::write(store.locate(&key), b"{\"truncated\":").unwrap();

        assert!(!store.contains(&key));
        assert_eq!(store.get_grid(&key).unwrap(), None);
        store.put_grid(&key, &grid()).unwrap();
        assert_eq!(store.get_grid(&key).unwrap(), Some(grid()));
    }

    #[test]
    fn fs_store_trusts_unsealed_files() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let key = ArtifactKey::new(ArtifactKind::Capacity, "placed.tif");
        std::fs::write(store.locate(&key), b"placed by hand").unwrap();
        assert!(store.contains(&key));
    }

    #[test]
    fn fs_store_persists_grids_and_rasters() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().join("case"));
        let grid_key = ArtifactKey::new(ArtifactKind::Grid, "city_grid_30m.json");
        let layer_key = ArtifactKey::new(ArtifactKind::Condition, "city_condition.tif");

        assert!(!store.contains(&grid_key));
        assert_eq!(store.get_grid(&grid_key).unwrap(), None);

        store.put_grid(&grid_key, &grid()).unwrap();
        assert!(store.contains(&grid_key));
        assert_eq!(store.get_grid(&grid_key).unwrap(), Some(grid()));

        let layer = RasterLayer::filled_i8(grid(), 1);
        let path = store.put_raster(&layer_key, &layer).unwrap();
        assert_eq!(path, dir.path().join("case/city_condition.tif"));
        assert_eq!(store.get_raster(&layer_key).unwrap(), Some(layer));
    }

    #[test]
    fn memory_store_counts_writes() {
        let store = MemoryArtifactStore::new("/virtual");
        let key = ArtifactKey::new(ArtifactKind::Grid, "g.json");
        assert!(store.is_empty());
        store.put_grid(&key, &grid()).unwrap();
        store.put_grid(&key, &grid()).unwrap();
        assert_eq!(store.writes(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.locate(&key), PathBuf::from("/virtual/g.json"));
        assert_eq!(store.get_raster(&key).unwrap(), None);
    }
}
