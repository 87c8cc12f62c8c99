// Core data structures for the chandere scraper

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mode of operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Fetch every seed page once and report connectivity
    #[serde(rename = "tc")]
    TestConnection,
    /// Download every attached image
    #[serde(rename = "id")]
    ImageDownload,
    /// Append every post to a plain-text archive
    #[serde(rename = "ar")]
    Archive,
}

impl Mode {
    /// Short tag used on the command line and in cache files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TestConnection => "tc",
            Self::ImageDownload => "id",
            Self::Archive => "ar",
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::TestConnection => "Test Connection",
            Self::ImageDownload => "Image Downloader",
            Self::Archive => "Archiver",
        }
    }

    /// Get all modes
    pub fn all() -> [Self; 3] {
        [Self::TestConnection, Self::ImageDownload, Self::Archive]
    }

    /// Whether this mode extracts and persists posts
    pub fn is_extracting(&self) -> bool {
        !matches!(self, Self::TestConnection)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tc" => Ok(Self::TestConnection),
            "id" => Ok(Self::ImageDownload),
            "ar" => Ok(Self::Archive),
            other => Err(format!("unknown mode \"{other}\" (expected tc, id, or ar)")),
        }
    }
}

/// A single page or thread URL queued for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
}

impl PageRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Composite identity of a post across runs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub board: String,
    pub post_id: String,
    pub chan: String,
}

/// One entry of the dedup cache
///
/// `post_id = None` marks a board-level entry: a seed listing page or seed
/// thread URL that lives for a single run only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub board: String,
    pub post_id: Option<String>,
    pub chan: String,
    pub url: String,
}

impl CacheEntry {
    /// Create a post-level entry
    pub fn post(board: &str, post_id: &str, chan: &str, url: impl Into<String>) -> Self {
        Self {
            board: board.to_string(),
            post_id: Some(post_id.to_string()),
            chan: chan.to_string(),
            url: url.into(),
        }
    }

    /// Create a board-level seed entry
    pub fn seed(board: &str, chan: &str, url: impl Into<String>) -> Self {
        Self {
            board: board.to_string(),
            post_id: None,
            chan: chan.to_string(),
            url: url.into(),
        }
    }

    pub fn is_board_level(&self) -> bool {
        self.post_id.is_none()
    }

    /// Dedup key, present only for post-level entries
    pub fn key(&self) -> Option<DedupKey> {
        self.post_id.as_ref().map(|post_id| DedupKey {
            board: self.board.clone(),
            post_id: post_id.clone(),
            chan: self.chan.clone(),
        })
    }
}

/// Image attachment found in image-download mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub url: String,
    pub filename: String,
}

/// Post captured in archive mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub post_id: String,
    /// Id of the thread's originating post, `None` for the op itself
    pub parent_id: Option<String>,
    pub poster_name: String,
    pub date: String,
    pub time: String,
    pub filename: String,
    pub title: String,
    pub body: String,
}

/// Record handed from extraction to persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Image(ImageRecord),
    Archive(ArchiveRecord),
}

impl Record {
    /// Identifier used in log lines
    pub fn label(&self) -> &str {
        match self {
            Self::Image(image) => &image.filename,
            Self::Archive(post) => &post.post_id,
        }
    }
}
