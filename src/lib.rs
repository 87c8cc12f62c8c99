//! chandere - Futaba-style imageboard scraper
//!
//! Polls boards and threads, downloading attached images or appending every
//! post to a plain-text archive, while a persistent cache keeps posts from
//! being handled twice across runs.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - URL generation, fetching and the scrape pipeline
//! - [`parser`] - Per-site extraction rules and post extraction
//! - [`models`] - Core data structures and types
//! - [`storage`] - Record sinks and the dedup cache
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use chandere::config::Config;
//! use chandere::crawler::{parse_targets, ScrapeSession, SessionOptions};
//! use chandere::models::Mode;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let options = SessionOptions::new(Mode::ImageDownload, "4chan", parse_targets(&["/g/"]));
//!     let (_shutdown, shutdown_rx) = tokio::sync::watch::channel(false);
//!     ScrapeSession::new(config, options).run(shutdown_rx).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod parser;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{ScrapeSession, SessionOptions, SessionReport, Target};
    pub use crate::error::{ChandereErrorTrait, Error, ErrorCategory, Result};
    pub use crate::models::{ArchiveRecord, CacheEntry, ImageRecord, Mode, Record};
    pub use crate::parser::{PostExtractor, RuleRegistry};
    pub use crate::storage::{CacheStore, DedupCache, RecordSink};
}
