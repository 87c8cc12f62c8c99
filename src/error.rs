//! Unified error handling for the chandere crate
//!
//! Fetch, parse, storage and scraper errors meet in one `Error` enum so the
//! session can return a single type, while each stage keeps raising its own
//! narrower error.
//!
//! # Architecture
//!
//! - [`ChandereErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use chandere::error::{ChandereErrorTrait, Error};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(error = %err, "Skipping until next refresh");
//!     } else {
//!         tracing::error!(error = %err, category = err.category().as_str(), "Giving up");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::utils::error::{CrawlerError, FetchError, ParseError, StorageError};

/// Common trait for all chandere error types
pub trait ChandereErrorTrait: std::error::Error {
    /// Check if the run can continue past this error
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, dead or blocked pages)
    Network,
    /// Parsing and data extraction errors
    Parsing,
    /// Storage and I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Config => "config",
        }
    }
}

impl ChandereErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        // Every fetch failure is retried on the next refresh cycle or
        // resolved by evicting the page from the cache.
        true
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Decode(_) => ErrorCategory::Parsing,
            _ => ErrorCategory::Network,
        }
    }
}

impl ChandereErrorTrait for ParseError {
    fn is_recoverable(&self) -> bool {
        true
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Parsing
    }
}

impl ChandereErrorTrait for StorageError {
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::CacheCorrupt { .. })
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidOutput { .. } => ErrorCategory::Config,
            _ => ErrorCategory::Storage,
        }
    }
}

impl ChandereErrorTrait for CrawlerError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(e) => e.is_recoverable(),
            Self::InvalidSource(_) | Self::NoTargets => false,
            Self::InvalidTarget(_) => true,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Parse(e) => e.category(),
            Self::InvalidSource(_) | Self::InvalidTarget(_) | Self::NoTargets => {
                ErrorCategory::Config
            }
        }
    }
}

/// Unified error type for the chandere crate
#[derive(Error, Debug)]
pub enum Error {
    /// Scraper-level errors (sources, targets)
    #[error("Crawler error: {0}")]
    Crawler(#[from] CrawlerError),

    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse-specific errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Persistence and cache errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl ChandereErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Crawler(e) => e.is_recoverable(),
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(e) => e.is_recoverable(),
            Self::Storage(e) => e.is_recoverable(),
            Self::Io(_) => false,
            Self::Json(_) => false,
            Self::Http(_) => true,
            Self::Config(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Crawler(e) => e.category(),
            Self::Fetch(e) => e.category(),
            Self::Http(_) => ErrorCategory::Network,
            Self::Parse(_) | Self::Json(_) => ErrorCategory::Parsing,
            Self::Storage(e) => e.category(),
            Self::Io(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
