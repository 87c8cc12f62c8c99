//! Persistence of scraped records and of the dedup cache
//!
//! Records leave the pipeline through a [`RecordSink`]: image mode writes
//! files into a directory, archive mode appends entries to one text file.
//! The dedup cache lives in memory during a run and is restored and saved
//! around it by [`CacheStore`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::models::{Mode, Record};
use crate::utils::error::StorageError;

pub mod archive;
pub mod cache;
pub mod checkpoint;
pub mod images;
pub mod output;

pub use archive::ArchiveWriter;
pub use cache::DedupCache;
pub use checkpoint::CacheStore;
pub use images::ImageDownloader;
pub use output::prepare_output;

/// Result of persisting one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Written to this path
    Written(PathBuf),
    /// Dropped without a fatal error
    Skipped,
}

/// Destination for extracted records
///
/// Errors returned from [`persist`](RecordSink::persist) are fatal to the
/// session; recoverable failures are reported as [`PersistOutcome::Skipped`].
#[async_trait]
pub trait RecordSink: Send {
    async fn persist(&mut self, record: Record) -> Result<PersistOutcome, StorageError>;

    /// Flush buffered output before shutdown
    async fn flush(&mut self) -> Result<(), StorageError>;
}

/// Build the sink for `mode` writing to a prepared `output`
///
/// Returns `None` for modes that persist nothing.
///
/// # Errors
///
/// Returns `StorageError` if the archive file cannot be opened
pub async fn open_sink(
    mode: Mode,
    output: Option<&Path>,
    client: reqwest::Client,
) -> Result<Option<Box<dyn RecordSink>>, StorageError> {
    let Some(output) = output else {
        return Ok(None);
    };

    let sink: Box<dyn RecordSink> = match mode {
        Mode::TestConnection => return Ok(None),
        Mode::ImageDownload => Box::new(ImageDownloader::new(client, output)),
        Mode::Archive => Box::new(ArchiveWriter::open(output).await?),
    };
    Ok(Some(sink))
}
