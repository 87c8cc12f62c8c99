//! HTTP fetcher with dead-page classification
//!
//! Imageboards report deleted threads and scraper blocks in two ways: with
//! a status code, or with a normal 200 page whose title says so. Both are
//! folded into [`FetchError::Gone`] and [`FetchError::Blocked`] here so the
//! pipeline can evict the page from the dedup cache.

use regex::Regex;
use reqwest::{Client, StatusCode};
use std::sync::LazyLock;

use crate::config::CrawlerConfig;
use crate::utils::error::FetchError;

static TITLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<title>(.+?)</title>").expect("Invalid regex pattern"));

/// Outcome of fetching one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStatus {
    /// Body is usable
    Ok,
    /// Page no longer exists
    Gone,
    /// Site refuses the request
    Blocked,
    /// Failure that the next refresh may not repeat
    Transient,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Gone => "gone",
            Self::Blocked => "blocked",
            Self::Transient => "transient",
        }
    }

    /// Whether cache entries pointing at the page should be evicted
    pub fn is_dead(&self) -> bool {
        matches!(self, Self::Gone | Self::Blocked)
    }
}

impl From<&FetchError> for PageStatus {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::Gone(_) => Self::Gone,
            FetchError::Blocked(_) => Self::Blocked,
            _ => Self::Transient,
        }
    }
}

impl<T> From<&Result<T, FetchError>> for PageStatus {
    fn from(result: &Result<T, FetchError>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => e.into(),
        }
    }
}

/// Build the HTTP client shared by page fetches and image downloads
///
/// # Errors
///
/// Returns `FetchError::Http` if the client cannot be created
pub fn build_client(config: &CrawlerConfig) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .timeout(config.request_timeout())
        .gzip(true)
        .danger_accept_invalid_certs(config.accept_invalid_certs);

    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent.as_str());
    }

    Ok(builder.build()?)
}

/// Classify a 200 page by its title
///
/// Returns the matching error for "404" pages and "access denied" pages.
pub fn classify_title(url: &str, html: &str) -> Option<FetchError> {
    let title = TITLE_PATTERN.captures(html)?.get(1)?.as_str();

    if title.contains("404") {
        Some(FetchError::Gone(url.to_string()))
    } else if title.to_lowercase().contains("access denied") {
        Some(FetchError::Blocked(url.to_string()))
    } else {
        None
    }
}

/// Fetches imageboard pages one request at a time
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    /// Create a fetcher from crawler configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(config: &CrawlerConfig) -> Result<Self, FetchError> {
        Ok(Self::with_client(build_client(config)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetch `url` and return its body
    ///
    /// # Errors
    ///
    /// - `FetchError::Gone` for HTTP 404 or a page titled with "404"
    /// - `FetchError::Blocked` for HTTP 403 or an "access denied" page
    /// - `FetchError::ServerError` for any other non-success status
    /// - `FetchError::Timeout` / `FetchError::Http` for transport failures
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http(e)
            }
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(FetchError::Gone(url.to_string())),
            StatusCode::FORBIDDEN => return Err(FetchError::Blocked(url.to_string())),
            status if !status.is_success() => return Err(FetchError::ServerError(status.as_u16())),
            _ => {}
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        if let Some(err) = classify_title(url, &html) {
            return Err(err);
        }

        Ok(html)
    }

    /// Fetch `url` and report only its classification
    pub async fn check(&self, url: &str) -> PageStatus {
        let result = self.fetch(url).await;
        let status = PageStatus::from(&result);

        match &result {
            Ok(_) => tracing::info!(url, "Connection successful"),
            Err(e) => tracing::warn!(url, status = status.as_str(), error = %e, "Connection failed"),
        }

        status
    }
}
