//! Plain-text post archive
//!
//! Every archived post is appended to a single file as one fixed-format
//! entry. Entries land in arrival order; within a page op posts precede
//! their replies.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::models::{ArchiveRecord, Record};
use crate::parser::sanitize::sanitize_post_text;
use crate::storage::{PersistOutcome, RecordSink};
use crate::utils::error::StorageError;

/// Separator framing every entry
const RULE: &str = "********************";

/// Render one archive entry
///
/// The title line is omitted when the sanitized title is empty and the
/// `Reply to:` line is present only for replies.
pub fn format_entry(record: &ArchiveRecord) -> String {
    let title = sanitize_post_text(&record.title);
    let body = sanitize_post_text(&record.body);

    let mut entry = format!("\n{RULE}\n");
    if !title.is_empty() {
        entry.push_str(&title);
        entry.push('\n');
    }
    entry.push_str(&format!(
        "Post ID: {}\nFile: {}\n",
        record.post_id, record.filename
    ));
    if let Some(parent_id) = &record.parent_id {
        entry.push_str(&format!("Reply to: {parent_id}\n"));
    }
    entry.push_str(&format!(
        "{} posted this on {} at {}\n{body}\n{RULE}",
        record.poster_name, record.date, record.time
    ));
    entry
}

/// Appends archive records to one output file
pub struct ArchiveWriter {
    path: PathBuf,
    file: File,
    written: u64,
}

impl ArchiveWriter {
    /// Open `path` for appending, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Persistence` if the file cannot be opened
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| StorageError::Persistence {
                target: path.display().to_string(),
                source,
            })?;

        tracing::debug!(path = %path.display(), "Archive opened");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            written: 0,
        })
    }

    fn persistence_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Persistence {
            target: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl RecordSink for ArchiveWriter {
    async fn persist(&mut self, record: Record) -> Result<PersistOutcome, StorageError> {
        let Record::Archive(post) = record else {
            tracing::warn!(record = record.label(), "Archive writer ignoring non-archive record");
            return Ok(PersistOutcome::Skipped);
        };

        let entry = format_entry(&post);
        if let Err(source) = self.file.write_all(entry.as_bytes()).await {
            return Err(self.persistence_error(source));
        }
        if let Err(source) = self.file.flush().await {
            return Err(self.persistence_error(source));
        }

        self.written += 1;
        tracing::info!(post_id = %post.post_id, "Post successfully archived");
        Ok(PersistOutcome::Written(self.path.clone()))
    }

    async fn flush(&mut self) -> Result<(), StorageError> {
        if let Err(source) = self.file.flush().await {
            return Err(self.persistence_error(source));
        }
        if let Err(source) = self.file.sync_all().await {
            return Err(self.persistence_error(source));
        }
        tracing::info!(path = %self.path.display(), entries = self.written, "Archive closed");
        Ok(())
    }
}
