//! Cache file persistence across runs
//!
//! The dedup cache is loaded once at startup and dumped once at clean
//! shutdown. Files are tagged with the mode that produced them; a file from
//! another mode, or one that cannot be decoded, is replaced by an empty cache.
//!
//! # Example
//!
//! ```no_run
//! use chandere::models::Mode;
//! use chandere::storage::checkpoint::CacheStore;
//!
//! # fn example() -> chandere::error::Result<()> {
//! let store = CacheStore::new(Some("/home/anon/.chandere".into()));
//! let cache = store.load(Mode::Archive);
//! // ... scrape ...
//! store.dump(Mode::Archive, cache)?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::{CacheEntry, Mode};
use crate::storage::cache::DedupCache;
use crate::utils::error::StorageError;

/// On-disk layout of a cache dump
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    /// Mode tag of the run that wrote the file
    mode: String,
    entries: Vec<CacheEntry>,
}

/// Loads and dumps the dedup cache
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: Option<PathBuf>,
}

impl CacheStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the cache for `mode`
    ///
    /// Never fails: a missing path, unreadable or corrupt file, or a file
    /// tagged with another mode yields an empty cache.
    pub fn load(&self, mode: Mode) -> DedupCache {
        let Some(path) = self.path.as_deref() else {
            tracing::info!("No cache file configured, starting empty");
            return DedupCache::new();
        };

        if !path.exists() {
            tracing::info!(path = %path.display(), "Cache file does not exist, starting empty");
            return DedupCache::new();
        }

        match read_cache_file(path) {
            Ok(None) => {
                tracing::warn!(path = %path.display(), "Empty cache file, starting empty");
                DedupCache::new()
            }
            Ok(Some(file)) if file.mode != mode.as_str() => {
                tracing::info!(
                    path = %path.display(),
                    found = %file.mode,
                    expected = %mode,
                    "Incompatible cache file, starting empty"
                );
                DedupCache::new()
            }
            Ok(Some(file)) => {
                let cache = DedupCache::from_entries(
                    file.entries.into_iter().filter(|entry| !entry.is_board_level()),
                );
                tracing::info!(path = %path.display(), entries = cache.len(), "Cache file loaded");
                cache
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable cache file, starting empty");
                DedupCache::new()
            }
        }
    }

    /// Dump the cache, dropping board-level entries first
    ///
    /// Returns the written path, or `None` when no path is configured, in
    /// which case the cache is discarded with a warning.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Persistence` if the file cannot be written
    pub fn dump(&self, mode: Mode, mut cache: DedupCache) -> Result<Option<PathBuf>, StorageError> {
        cache.strip_board_level();

        let Some(path) = self.path.as_deref() else {
            tracing::warn!(entries = cache.len(), "Invalid cache dump path, cache was lost");
            return Ok(None);
        };

        let file = CacheFile {
            mode: mode.as_str().to_string(),
            entries: cache.into_entries(),
        };
        let count = file.entries.len();

        write_atomic(path, &file).map_err(|source| StorageError::Persistence {
            target: path.display().to_string(),
            source,
        })?;

        tracing::info!(path = %path.display(), entries = count, "Cache dumped");
        Ok(Some(path.to_path_buf()))
    }
}

fn read_cache_file(path: &Path) -> Result<Option<CacheFile>, StorageError> {
    let metadata = fs::metadata(path)?;
    if metadata.len() == 0 {
        return Ok(None);
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map(Some)
        .map_err(|e| StorageError::CacheCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

// Write to temp file first, then rename over the target
fn write_atomic(path: &Path, file: &CacheFile) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("cache"));
    let temp_path = path.with_file_name(format!("{file_name}.tmp"));

    {
        let out = File::create(&temp_path)?;
        let mut writer = BufWriter::new(out);
        serde_json::to_writer(&mut writer, file)?;
        writer.flush()?;
    }

    fs::rename(&temp_path, path)
}
