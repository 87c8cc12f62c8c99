//! Output path preparation
//!
//! Validates the `--output` path for the selected mode before any network
//! activity, creating the image directory when it is missing.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::models::Mode;
use crate::utils::error::StorageError;

/// Archive file created inside a directory output
pub const ARCHIVE_FILE_NAME: &str = "archive.txt";

// Something with an extension, e.g. `dump.txt`
static FILE_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S\.\w+$").expect("Invalid regex pattern"));

/// Resolve the output location for `mode`
///
/// Returns the image directory or archive file, or `None` for modes that
/// write nothing.
///
/// # Errors
///
/// Returns `StorageError::InvalidOutput` if the path cannot serve the mode,
/// or `StorageError::Persistence` if the image directory cannot be created
pub fn prepare_output(mode: Mode, path: &Path) -> Result<Option<PathBuf>, StorageError> {
    match mode {
        Mode::TestConnection => Ok(None),
        Mode::ImageDownload => prepare_image_dir(path).map(Some),
        Mode::Archive => prepare_archive_file(path).map(Some),
    }
}

fn invalid(path: &Path, reason: &str) -> StorageError {
    StorageError::InvalidOutput {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn parent_exists(path: &Path) -> bool {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => true,
        Some(parent) => parent.is_dir(),
        None => false,
    }
}

fn prepare_image_dir(path: &Path) -> Result<PathBuf, StorageError> {
    if path.is_dir() {
        return Ok(path.to_path_buf());
    }
    if path.exists() {
        return Err(invalid(path, "image output must be a directory"));
    }

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if FILE_LIKE.is_match(&name) {
        return Err(invalid(path, "image output looks like a file"));
    }
    if !parent_exists(path) {
        return Err(invalid(path, "parent directory does not exist"));
    }

    std::fs::create_dir(path).map_err(|source| StorageError::Persistence {
        target: path.display().to_string(),
        source,
    })?;
    tracing::info!(path = %path.display(), "Created output directory");
    Ok(path.to_path_buf())
}

fn prepare_archive_file(path: &Path) -> Result<PathBuf, StorageError> {
    if path.is_dir() {
        return Ok(path.join(ARCHIVE_FILE_NAME));
    }
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if path.exists() {
        return Err(invalid(path, "archive output is neither file nor directory"));
    }
    if !parent_exists(path) {
        return Err(invalid(path, "parent directory does not exist"));
    }
    Ok(path.to_path_buf())
}
