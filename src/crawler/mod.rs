//! Imageboard crawling: URL generation, page fetching and the scrape pipeline
//!
//! [`url`] turns chan aliases and `board[/thread]` operands into page URLs,
//! [`fetcher`] retrieves and classifies pages, and [`pipeline`] wires both
//! to extraction and persistence in a polling session.

pub mod fetcher;
pub mod pipeline;
pub mod url;

pub use fetcher::{PageFetcher, PageStatus};
pub use pipeline::{PipelineStats, ScrapeSession, SessionOptions, SessionReport, StatsSnapshot};
pub use url::{generate_urls, parse_target, parse_targets, Target, UrlGenerator, KNOWN_CHANS};
