//! Extraction rule sets for the supported imageboards
//!
//! Each `(mode, chan)` pair maps to a [`RuleSet`]: pagination parameters
//! plus, for extracting modes, the patterns that locate posts and their
//! fields. Unknown pairs fall back to the generic 4chan-style rules.
//!
//! Patterns follow capture semantics: when a pattern has a capture group,
//! the first group is the extracted value, otherwise the whole match is.

use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::Mode;

// Helper macro to compile built-in patterns
macro_rules! pattern {
    ($s:expr) => {
        Regex::new($s).expect("Invalid extraction pattern")
    };
}

/// Page count used when a rule set leaves `max_page` unset
pub const DEFAULT_MAX_PAGE: u32 = 25;

/// Marker present on single-thread pages
const THREAD_MARKER: &str = r"Return</a>";

/// Pagination parameters for a site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub max_page: Option<u32>,
    pub page_delimiter: String,
    pub thread_delimiter: String,
}

impl Pagination {
    pub fn new(max_page: Option<u32>, page_delimiter: &str, thread_delimiter: &str) -> Self {
        Self {
            max_page,
            page_delimiter: page_delimiter.to_string(),
            thread_delimiter: thread_delimiter.to_string(),
        }
    }

    /// Number of board pages to visit
    pub fn page_count(&self) -> u32 {
        self.max_page.unwrap_or(DEFAULT_MAX_PAGE)
    }
}

/// Patterns shared by every extracting mode
#[derive(Debug, Clone)]
pub struct PostRules {
    pub board_title: Regex,
    pub thread_marker: Regex,
    pub post_op: Regex,
    pub post_reply: Regex,
    pub post_id: Regex,
}

/// Image-download patterns
#[derive(Debug, Clone)]
pub struct ImageRules {
    pub posts: PostRules,
    /// Prepended to every extracted image link
    pub link_prefix: String,
    pub image_link: Regex,
    pub file_name: Regex,
}

/// Archive patterns
#[derive(Debug, Clone)]
pub struct ArchiveRules {
    pub posts: PostRules,
    pub file_name: Regex,
    pub poster_name: Regex,
    pub post_title: Regex,
    pub pub_date: Regex,
    pub pub_time: Regex,
    pub post_body: Regex,
}

/// Mode-specific extraction behavior
#[derive(Debug, Clone)]
pub enum ExtractionRules {
    Image(ImageRules),
    Archive(ArchiveRules),
}

impl ExtractionRules {
    pub fn posts(&self) -> &PostRules {
        match self {
            Self::Image(rules) => &rules.posts,
            Self::Archive(rules) => &rules.posts,
        }
    }
}

/// Everything needed to scrape one site in one mode
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub pagination: Pagination,
    /// `None` in test-connection mode
    pub extraction: Option<ExtractionRules>,
}

/// Lookup table of rule sets keyed by mode and chan alias
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    rules: HashMap<(Mode, String), Arc<RuleSet>>,
    generic: HashMap<Mode, Arc<RuleSet>>,
}

impl RuleRegistry {
    /// Registry holding the built-in 4chan, lainchan and generic rule sets
    pub fn builtin() -> Self {
        let mut generic = HashMap::new();
        for mode in Mode::all() {
            generic.insert(mode, Arc::new(futaba_rules(mode, None)));
        }

        let mut registry = Self {
            rules: HashMap::new(),
            generic,
        };

        for mode in Mode::all() {
            registry.register(mode, "4chan", futaba_rules(mode, Some(10)));
            registry.register(mode, "lainchan", lainchan_rules(mode));
        }

        registry
    }

    /// Add or replace the rule set for `(mode, chan)`
    pub fn register(&mut self, mode: Mode, chan: &str, rules: RuleSet) {
        self.rules.insert((mode, chan.to_string()), Arc::new(rules));
    }

    /// Rule set for `(mode, chan)`, falling back to the generic rules
    pub fn lookup(&self, mode: Mode, chan: &str) -> Arc<RuleSet> {
        if let Some(rules) = self.rules.get(&(mode, chan.to_string())) {
            return Arc::clone(rules);
        }

        tracing::debug!(mode = %mode, chan, "No dedicated rule set, using generic rules");
        match self.generic.get(&mode) {
            Some(rules) => Arc::clone(rules),
            None => Arc::new(futaba_rules(mode, None)),
        }
    }

    /// Whether a dedicated rule set exists for `(mode, chan)`
    pub fn is_registered(&self, mode: Mode, chan: &str) -> bool {
        self.rules.contains_key(&(mode, chan.to_string()))
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn futaba_posts() -> PostRules {
    PostRules {
        board_title: pattern!(r#"boardTitle">(/\S+?/)"#),
        thread_marker: pattern!(THREAD_MARKER),
        post_op: pattern!(r#"post op">(<div.+?/blockquote>)</div>"#),
        post_reply: pattern!(r#"post reply">(<div.+?/blockquote>)</div>"#),
        post_id: pattern!(r##"#p(\d+)""##),
    }
}

/// 4chan-style rules, also used for unknown chans
fn futaba_rules(mode: Mode, max_page: Option<u32>) -> RuleSet {
    let pagination = Pagination::new(max_page, "", "thread/");

    let extraction = match mode {
        Mode::TestConnection => None,
        Mode::ImageDownload => Some(ExtractionRules::Image(ImageRules {
            posts: futaba_posts(),
            link_prefix: String::from("http:"),
            image_link: pattern!(r#"(?:File: <a href="|" href=")(.+?\.\w{3,4})""#),
            file_name: pattern!(r#"target="_blank">(.+?\.\w{3,4})</a>"#),
        })),
        Mode::Archive => Some(ExtractionRules::Archive(ArchiveRules {
            posts: futaba_posts(),
            file_name: pattern!(r#"target="_blank">(.+?\.\w{3,4})</a>"#),
            poster_name: pattern!(r#"class="name">(.*?)</span>"#),
            post_title: pattern!(r#"class="subject">(.*?)</span>"#),
            pub_date: pattern!(r"\d{2}/\d{2}/\d{2}\(\w{3}\)"),
            pub_time: pattern!(r"\d{2}:\d{2}:\d{2}"),
            post_body: pattern!(r#""postMessage" id="m\d{8}">(.+?)</block"#),
        })),
    };

    RuleSet {
        pagination,
        extraction,
    }
}

fn lainchan_posts() -> PostRules {
    PostRules {
        board_title: pattern!(r"header><h1>(/\S+?/)"),
        thread_marker: pattern!(THREAD_MARKER),
        post_op: pattern!(r#"post op"(.+?)</div>"#),
        post_reply: pattern!(r#"post reply">(.+?)</div></div>"#),
        post_id: pattern!(r#"<a id="(\d+)" class="post_anchor""#),
    }
}

fn lainchan_rules(mode: Mode) -> RuleSet {
    let pagination = Pagination::new(Some(7), "", "res/");

    let extraction = match mode {
        Mode::TestConnection => None,
        Mode::ImageDownload => Some(ExtractionRules::Image(ImageRules {
            posts: lainchan_posts(),
            link_prefix: String::from("https://lainchan.org"),
            image_link: pattern!(r#"(?:File: <a href="|" href=")(.+?\.\w{3,4})""#),
            file_name: pattern!(r"/(\d+?\.\w{3,4})"),
        })),
        Mode::Archive => Some(ExtractionRules::Archive(ArchiveRules {
            posts: lainchan_posts(),
            file_name: pattern!(r"/(\d+?\.\w{3,4})"),
            poster_name: pattern!(r#"class="name">(.*?)</span>"#),
            post_title: pattern!(r#"class="subject">(.*?)</span>"#),
            pub_date: pattern!(r"\d{4}-\d{2}-\d{2}"),
            pub_time: pattern!(r"\d{2}:\d{2}:\d{2}"),
            post_body: pattern!(r#"class="body">(.+?)</div"#),
        })),
    };

    RuleSet {
        pagination,
        extraction,
    }
}
