//! Configuration management for the chandere scraper
//!
//! This module handles loading and validating configuration from environment variables,
//! files, and command-line arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::default_dump_file;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and pipeline configuration
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Scrape session behavior
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Dedup cache persistence
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Crawler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// User agent string; the client default is used when unset
    pub user_agent: Option<String>,

    /// Skip TLS certificate verification
    pub accept_invalid_certs: bool,

    /// Capacity of each pipeline channel
    pub channel_buffer_size: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            user_agent: None,
            accept_invalid_certs: false,
            channel_buffer_size: 1000,
        }
    }
}

impl CrawlerConfig {
    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Scrape session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Seconds between refresh cycles
    pub refresh_secs: u64,

    /// Use https for every request
    pub force_ssl: bool,

    /// Ignore .webm attachments in image mode
    pub no_video: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            refresh_secs: 300,
            force_ssl: false,
            no_video: false,
        }
    }
}

/// Cache persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Where the cache is loaded from and dumped to
    pub dump_file: Option<PathBuf>,

    /// Dump the cache on shutdown
    pub dump: bool,

    /// Fold the cache set aside by a thread-scoped run back into its dump.
    /// Off by default: a thread run dumps only its own entries.
    pub merge_thread_runs: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dump_file: default_dump_file(),
            dump: true,
            merge_thread_runs: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let request_timeout_secs = std::env::var("CHANDERE_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.crawler.request_timeout_secs);

        let user_agent = std::env::var("CHANDERE_USER_AGENT").ok();

        let accept_invalid_certs = std::env::var("CHANDERE_ACCEPT_INVALID_CERTS")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(defaults.crawler.accept_invalid_certs);

        let channel_buffer_size = std::env::var("CHANDERE_CHANNEL_BUFFER")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.crawler.channel_buffer_size);

        let refresh_secs = std::env::var("CHANDERE_REFRESH")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.scrape.refresh_secs);

        let dump_file = std::env::var("CHANDERE_DUMP_FILE")
            .ok()
            .map(PathBuf::from)
            .or(defaults.cache.dump_file);

        let log_level =
            std::env::var("CHANDERE_LOG_LEVEL").unwrap_or_else(|_| defaults.logging.level.clone());

        let log_format =
            std::env::var("CHANDERE_LOG_FORMAT").unwrap_or_else(|_| defaults.logging.format.clone());

        Ok(Self {
            crawler: CrawlerConfig {
                request_timeout_secs,
                user_agent,
                accept_invalid_certs,
                channel_buffer_size,
            },
            scrape: ScrapeConfig {
                refresh_secs,
                ..defaults.scrape
            },
            cache: CacheConfig {
                dump_file,
                ..defaults.cache
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.crawler.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.crawler.channel_buffer_size == 0 {
            anyhow::bail!("channel_buffer_size must be greater than 0");
        }

        if self.scrape.refresh_secs == 0 {
            anyhow::bail!("refresh_secs must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be \"text\" or \"json\"");
        }

        Ok(())
    }

    /// Get refresh interval as Duration
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.scrape.refresh_secs)
    }
}
