//! HTML parsing and post extraction
//!
//! This module turns fetched board and thread pages into [`Record`]s using
//! the patterns of a [`RuleSet`], consulting and updating the dedup cache so
//! that a post is only ever emitted once.

pub mod rules;
pub mod sanitize;

pub use rules::{ExtractionRules, Pagination, RuleRegistry, RuleSet};

use regex::Regex;
use std::sync::Arc;

use crate::crawler::url::UrlGenerator;
use crate::error::{Error, Result};
use crate::models::{ArchiveRecord, CacheEntry, DedupKey, ImageRecord, Record};
use crate::storage::cache::DedupCache;
use crate::utils::error::ParseError;
use rules::{ArchiveRules, ImageRules};

/// Placeholder filename for posts without an attachment
pub const NO_FILE: &str = "[No File]";

/// Placeholder body for posts without text
pub const EMPTY_POST: &str = "[Empty Post]";

/// Value of the first capture group, or of the whole match when the
/// pattern has no group
pub fn capture<'h>(re: &Regex, haystack: &'h str) -> Option<&'h str> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
        .map(|m| m.as_str())
}

/// Every non-overlapping capture, in document order
pub fn capture_all<'h>(re: &Regex, haystack: &'h str) -> Vec<&'h str> {
    re.captures_iter(haystack)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
        .map(|m| m.as_str())
        .collect()
}

/// Outcome of extracting one page
#[derive(Debug, Default)]
pub struct PageExtraction {
    /// Board named by the page title
    pub board: String,

    /// Whether the page is a single thread
    pub thread_page: bool,

    /// New records, op posts first, in document order
    pub records: Vec<Record>,

    /// Posts skipped because their key was already cached
    pub known: usize,

    /// Posts that lacked a field required by the active mode
    pub malformed: usize,

    /// Cache entries added for this page
    pub inserted: usize,
}

/// Extraction stage: finds new posts on a page and builds their records
pub struct PostExtractor {
    chan: String,
    rules: Arc<RuleSet>,
    urls: UrlGenerator,
    no_video: bool,
}

impl PostExtractor {
    /// Create an extractor for `chan`
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the rule set carries no extraction rules,
    /// which is the case in test-connection mode
    pub fn new(chan: &str, rules: Arc<RuleSet>, urls: UrlGenerator) -> Result<Self> {
        if rules.extraction.is_none() {
            return Err(Error::config("rule set has no extraction patterns"));
        }

        Ok(Self {
            chan: chan.to_string(),
            rules,
            urls,
            no_video: false,
        })
    }

    /// Ignore `.webm` attachments in image mode
    pub fn with_no_video(mut self, no_video: bool) -> Self {
        self.no_video = no_video;
        self
    }

    /// Extract every post of `html` not yet present in `cache`
    ///
    /// The caller holds the cache for the whole call, so membership tests and
    /// insertions for one page are atomic with respect to other workers.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::MissingBoardTitle` if the page names no board
    pub fn extract(
        &self,
        html: &str,
        cache: &mut DedupCache,
    ) -> std::result::Result<PageExtraction, ParseError> {
        let Some(extraction) = self.rules.extraction.as_ref() else {
            return Ok(PageExtraction::default());
        };
        let posts = extraction.posts();

        let board = capture(&posts.board_title, html)
            .ok_or(ParseError::MissingBoardTitle)?
            .to_string();
        let thread_page = posts.thread_marker.is_match(html);

        let mut page = PageExtraction {
            board,
            thread_page,
            ..Default::default()
        };

        let mut last_op: Option<String> = None;
        for post in capture_all(&posts.post_op, html) {
            if let Some(post_id) = self.process_post(extraction, post, None, cache, &mut page) {
                last_op = Some(post_id);
            }
        }

        if thread_page {
            for post in capture_all(&posts.post_reply, html) {
                self.process_post(extraction, post, last_op.as_deref(), cache, &mut page);
            }
        }

        tracing::debug!(
            board = %page.board,
            thread_page = page.thread_page,
            records = page.records.len(),
            known = page.known,
            malformed = page.malformed,
            "Page extracted"
        );

        Ok(page)
    }

    /// Handle one post container; returns its id when one was found
    fn process_post(
        &self,
        extraction: &ExtractionRules,
        post: &str,
        parent_id: Option<&str>,
        cache: &mut DedupCache,
        page: &mut PageExtraction,
    ) -> Option<String> {
        let Some(post_id) = capture(&extraction.posts().post_id, post) else {
            tracing::warn!(board = %page.board, error = %ParseError::MissingPostId, "Skipping post");
            page.malformed += 1;
            return None;
        };

        let key = DedupKey {
            board: page.board.clone(),
            post_id: post_id.to_string(),
            chan: self.chan.clone(),
        };
        if cache.contains(&key) {
            tracing::trace!(post_id, "Post already handled");
            page.known += 1;
            return Some(post_id.to_string());
        }

        let record = match extraction {
            ExtractionRules::Image(rules) => self.image_record(rules, post_id, post),
            ExtractionRules::Archive(rules) => archive_record(rules, post_id, parent_id, post),
        };

        match record {
            Ok(Some(record)) => {
                tracing::info!(post_id, reply = parent_id.is_some(), "New post found");
                page.records.push(record);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Post was not handled properly");
                page.malformed += 1;
            }
        }

        // Cached even without a record so the same post is not re-warned
        // on every refresh.
        let thread_id = parent_id.unwrap_or(post_id);
        let permalink = self.urls.thread_url(&page.board, thread_id);
        if cache.insert(CacheEntry::post(&page.board, post_id, &self.chan, permalink)) {
            page.inserted += 1;
        }

        Some(post_id.to_string())
    }

    fn image_record(
        &self,
        rules: &ImageRules,
        post_id: &str,
        post: &str,
    ) -> std::result::Result<Option<Record>, ParseError> {
        let link = capture(&rules.image_link, post).ok_or_else(|| ParseError::MalformedPost {
            post_id: post_id.to_string(),
            field: "image link",
        })?;
        let filename = capture(&rules.file_name, post).ok_or_else(|| ParseError::MalformedPost {
            post_id: post_id.to_string(),
            field: "file name",
        })?;

        if self.no_video && filename.to_lowercase().ends_with(".webm") {
            tracing::debug!(post_id, filename, "Ignoring video");
            return Ok(None);
        }

        Ok(Some(Record::Image(ImageRecord {
            url: format!("{}{link}", rules.link_prefix),
            filename: filename.to_string(),
        })))
    }
}

fn archive_record(
    rules: &ArchiveRules,
    post_id: &str,
    parent_id: Option<&str>,
    post: &str,
) -> std::result::Result<Option<Record>, ParseError> {
    let required = |re: &Regex, field: &'static str| {
        capture(re, post).ok_or_else(|| ParseError::MalformedPost {
            post_id: post_id.to_string(),
            field,
        })
    };

    let poster_name = required(&rules.poster_name, "poster name")?;
    let date = required(&rules.pub_date, "date")?;
    let time = required(&rules.pub_time, "time")?;

    Ok(Some(Record::Archive(ArchiveRecord {
        post_id: post_id.to_string(),
        parent_id: parent_id.map(str::to_string),
        poster_name: poster_name.to_string(),
        date: date.to_string(),
        time: time.to_string(),
        filename: capture(&rules.file_name, post).unwrap_or(NO_FILE).to_string(),
        title: capture(&rules.post_title, post).unwrap_or_default().to_string(),
        body: capture(&rules.post_body, post).unwrap_or(EMPTY_POST).to_string(),
    })))
}
