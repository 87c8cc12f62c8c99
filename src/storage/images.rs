//! Image downloads into an output directory

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};

use crate::models::Record;
use crate::storage::{PersistOutcome, RecordSink};
use crate::utils::error::StorageError;
use crate::utils::{format_bytes, sanitize_filename};

/// Marker prepended to a filename until it no longer collides
pub const COPY_MARKER: &str = "(copy)";

/// Downloads image records into a directory
pub struct ImageDownloader {
    client: Client,
    output_dir: PathBuf,
}

impl ImageDownloader {
    pub fn new(client: Client, output_dir: &Path) -> Self {
        Self {
            client,
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// First free path for `filename`, prefixing the copy marker as needed
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be inspected
    pub async fn free_path(&self, filename: &str) -> Result<PathBuf, StorageError> {
        let mut name = sanitize_filename(filename);
        loop {
            let candidate = self.output_dir.join(&name);
            if !tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
            name = format!("{COPY_MARKER}{name}");
        }
    }
}

#[async_trait]
impl RecordSink for ImageDownloader {
    async fn persist(&mut self, record: Record) -> Result<PersistOutcome, StorageError> {
        let Record::Image(image) = record else {
            tracing::warn!(record = record.label(), "Image downloader ignoring non-image record");
            return Ok(PersistOutcome::Skipped);
        };

        // Network failures lose only this image
        let bytes = match self.client.get(&image.url).send().await {
            Ok(response) if response.status().is_success() => match response.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(url = %image.url, error = %e, "Failed to read image body");
                    return Ok(PersistOutcome::Skipped);
                }
            },
            Ok(response) => {
                tracing::warn!(url = %image.url, status = %response.status(), "Image download failed");
                return Ok(PersistOutcome::Skipped);
            }
            Err(e) => {
                tracing::warn!(url = %image.url, error = %e, "Image download failed");
                return Ok(PersistOutcome::Skipped);
            }
        };

        let path = self.free_path(&image.filename).await?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| StorageError::Persistence {
                target: path.display().to_string(),
                source,
            })?;

        tracing::info!(
            file = %path.display(),
            size = %format_bytes(bytes.len() as u64),
            "File successfully downloaded"
        );
        Ok(PersistOutcome::Written(path))
    }

    async fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}
