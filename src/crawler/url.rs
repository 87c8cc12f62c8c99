//! URL generation for imageboard boards and threads
//!
//! This module resolves chan aliases to hosts, renders board page and thread
//! URLs, and parses `board[/thread]` operands given on the command line.

use regex::Regex;
use std::sync::LazyLock;

use crate::parser::rules::Pagination;
use crate::utils::error::CrawlerError;

/// Chan aliases with a built-in host
pub const KNOWN_CHANS: &[(&str, &str)] = &[
    ("4chan", "boards.4chan.org"),
    ("lainchan", "lainchan.org"),
];

// Minimal hostname shape accepted for unlisted chans
static HOST_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d\w]+\.\S{2,}").expect("Invalid regex pattern"));

// board, optionally followed by a thread id after '/' or whitespace
static TARGET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*/?([\d\w]+)/?(?:\s*(\d+))?/?\s*$").expect("Invalid regex pattern")
});

/// Host for a chan alias or raw URL
///
/// # Errors
///
/// Returns `CrawlerError::InvalidSource` if `chan` is neither a known alias
/// nor contains something shaped like a hostname
///
/// # Examples
///
/// ```
/// use chandere::crawler::url::resolve_host;
///
/// assert_eq!(resolve_host("4chan").unwrap(), "boards.4chan.org");
/// assert_eq!(resolve_host("https://www.example.net/").unwrap(), "www.example.net");
/// assert!(resolve_host("nohost").is_err());
/// ```
pub fn resolve_host(chan: &str) -> Result<String, CrawlerError> {
    if let Some((_, host)) = KNOWN_CHANS.iter().find(|(alias, _)| *alias == chan) {
        return Ok((*host).to_string());
    }

    HOST_PATTERN
        .find(chan)
        .map(|m| m.as_str().trim_end_matches('/').to_string())
        .filter(|host| !host.is_empty())
        .ok_or_else(|| CrawlerError::InvalidSource(chan.to_string()))
}

/// Renders board page and thread URLs for one chan
#[derive(Debug, Clone)]
pub struct UrlGenerator {
    /// Scheme and host, without trailing slash
    origin: String,
    pagination: Pagination,
}

impl UrlGenerator {
    /// Create a generator for `chan`
    ///
    /// # Errors
    ///
    /// Returns `CrawlerError::InvalidSource` if the chan resolves to no host
    pub fn new(chan: &str, ssl: bool, pagination: Pagination) -> Result<Self, CrawlerError> {
        let host = resolve_host(chan)?;
        let prefix = if ssl { "https://" } else { "http://" };

        Ok(Self {
            origin: format!("{prefix}{host}"),
            pagination,
        })
    }

    /// Create a generator rooted at an explicit origin such as a mock server
    pub fn with_origin(origin: &str, pagination: Pagination) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            pagination,
        }
    }

    /// URL of the board's first page
    pub fn board_url(&self, board: &str) -> String {
        format!("{}{board}", self.origin)
    }

    /// Permalink of a single thread
    pub fn thread_url(&self, board: &str, thread: &str) -> String {
        format!(
            "{}{}{thread}",
            self.board_url(board),
            self.pagination.thread_delimiter
        )
    }

    /// Lazily yields the thread URL when `thread` is given, otherwise every
    /// board page in ascending order (descending with `bottomfeed`)
    pub fn generate(&self, board: &str, thread: Option<&str>, bottomfeed: bool) -> Urls {
        match thread {
            Some(thread) => Urls {
                base: self.board_url(board),
                delimiter: String::new(),
                single: Some(self.thread_url(board, thread)),
                pages: 1..=0,
                reverse: false,
            },
            None => Urls {
                base: self.board_url(board),
                delimiter: self.pagination.page_delimiter.clone(),
                single: None,
                pages: 1..=self.pagination.page_count(),
                reverse: bottomfeed,
            },
        }
    }
}

/// Lazy sequence of page or thread URLs
#[derive(Debug, Clone)]
pub struct Urls {
    base: String,
    delimiter: String,
    single: Option<String>,
    pages: std::ops::RangeInclusive<u32>,
    reverse: bool,
}

impl Urls {
    fn render(&self, page: u32) -> String {
        if page == 1 {
            self.base.clone()
        } else {
            format!("{}{}{page}", self.base, self.delimiter)
        }
    }
}

impl Iterator for Urls {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if let Some(url) = self.single.take() {
            return Some(url);
        }

        let page = if self.reverse {
            self.pages.next_back()
        } else {
            self.pages.next()
        }?;

        Some(self.render(page))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (low, high) = self.pages.size_hint();
        let extra = usize::from(self.single.is_some());
        (low + extra, high.map(|h| h + extra))
    }
}

/// One-call form of [`UrlGenerator::generate`]
///
/// `max_page = None` visits the default number of pages.
///
/// # Errors
///
/// Returns `CrawlerError::InvalidSource` if the chan resolves to no host
///
/// # Examples
///
/// ```
/// use chandere::crawler::url::generate_urls;
///
/// let urls: Vec<String> =
///     generate_urls("4chan", "/g/", None, false, false, "", "thread/", Some(10))
///         .unwrap()
///         .collect();
/// assert_eq!(urls.len(), 10);
/// assert_eq!(urls[0], "http://boards.4chan.org/g/");
/// assert_eq!(urls[1], "http://boards.4chan.org/g/2");
/// ```
#[allow(clippy::too_many_arguments)]
pub fn generate_urls(
    chan: &str,
    board: &str,
    thread: Option<&str>,
    ssl: bool,
    bottomfeed: bool,
    page_delimiter: &str,
    thread_delimiter: &str,
    max_page: Option<u32>,
) -> Result<Urls, CrawlerError> {
    let pagination = Pagination::new(max_page, page_delimiter, thread_delimiter);
    let generator = UrlGenerator::new(chan, ssl, pagination)?;
    Ok(generator.generate(board, thread, bottomfeed))
}

/// A board, optionally narrowed to one thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Board in `/name/` form
    pub board: String,
    pub thread: Option<String>,
}

/// Parse a `board[/thread]` operand
///
/// Accepts `g`, `/g`, `g/`, `/g/` and any of those followed by a thread id
/// after a slash or whitespace, e.g. `/g/51971506` or `g 51971506`.
///
/// # Errors
///
/// Returns `CrawlerError::InvalidTarget` for anything else
///
/// # Examples
///
/// ```
/// use chandere::crawler::url::parse_target;
///
/// let target = parse_target("g/ 1234567890").unwrap();
/// assert_eq!(target.board, "/g/");
/// assert_eq!(target.thread.as_deref(), Some("1234567890"));
/// ```
pub fn parse_target(operand: &str) -> Result<Target, CrawlerError> {
    let caps = TARGET_PATTERN
        .captures(operand)
        .ok_or_else(|| CrawlerError::InvalidTarget(operand.to_string()))?;

    let board = caps
        .get(1)
        .map(|m| format!("/{}/", m.as_str()))
        .ok_or_else(|| CrawlerError::InvalidTarget(operand.to_string()))?;
    let thread = caps.get(2).map(|m| m.as_str().to_string());

    Ok(Target { board, thread })
}

/// Parse every operand, logging and dropping the invalid ones
pub fn parse_targets<S: AsRef<str>>(operands: &[S]) -> Vec<Target> {
    operands
        .iter()
        .filter_map(|operand| match parse_target(operand.as_ref()) {
            Ok(target) => Some(target),
            Err(e) => {
                tracing::error!(error = %e, "Ignoring operand");
                None
            }
        })
        .collect()
}
