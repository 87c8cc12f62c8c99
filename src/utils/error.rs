//! Error types for the chandere scraper
//!
//! This module defines custom error types used throughout the application.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while fetching a page
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Page does not exist (HTTP 404 or a "404" page title)
    #[error("Page not found: {0}")]
    Gone(String),

    /// Site is refusing scrapers (HTTP 403 or an "access denied" page)
    #[error("Access denied: {0}")]
    Blocked(String),

    /// Unexpected status code
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),
}

/// Errors that can occur while extracting posts from a page
#[derive(Error, Debug)]
pub enum ParseError {
    /// Page carries no board title
    #[error("Board title not found in page")]
    MissingBoardTitle,

    /// Post lacks a field required for the active mode
    #[error("Post {post_id} is missing {field}")]
    MalformedPost { post_id: String, field: &'static str },

    /// Post container without a recognizable id
    #[error("Post id not found")]
    MissingPostId,
}

/// Errors related to persistence and the cache file
#[derive(Error, Debug)]
pub enum StorageError {
    /// Cache file could not be decoded
    #[error("Cache file {path} is corrupt: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    /// Output target is unusable for the active mode
    #[error("Invalid output path {path}: {reason}")]
    InvalidOutput { path: PathBuf, reason: String },

    /// Writing a record failed
    #[error("Failed to persist {target}: {source}")]
    Persistence {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Other I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// General scraper errors
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// Fetch error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Chan alias or hostname resolves to no usable host
    #[error("Invalid source \"{0}\"")]
    InvalidSource(String),

    /// Board/thread operand could not be parsed
    #[error("Invalid board or thread \"{0}\"")]
    InvalidTarget(String),

    /// No board/thread operand survived parsing
    #[error("No valid board or thread given")]
    NoTargets,
}
