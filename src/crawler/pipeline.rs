//! Staged scrape pipeline and its control loop
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Control   │     │    Fetch    │     │   Extract   │     │   Persist   │
//! │    Loop     │────▶│   Worker    │────▶│   Worker    │────▶│   Worker    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!       │                   │                   │                   │
//!       │              PageRequest         FetchedPage            Record
//!       │                   │                   │                   │
//!       └───────────────────┴─────── DedupCache ┴───────────────────┘
//! ```
//!
//! Every refresh interval the control loop re-enqueues each distinct URL in
//! the dedup cache. Dead pages are evicted by the fetch worker; new posts are
//! recorded by the extract worker under one cache lock per page.
//!
//! # Example
//!
//! ```no_run
//! use chandere::config::Config;
//! use chandere::crawler::pipeline::{ScrapeSession, SessionOptions};
//! use chandere::crawler::url::parse_targets;
//! use chandere::models::Mode;
//!
//! # async fn example() -> chandere::error::Result<()> {
//! let options = SessionOptions::new(Mode::Archive, "4chan", parse_targets(&["/g/"]));
//! let (_shutdown, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let report = ScrapeSession::new(Config::default(), options)
//!     .run(shutdown_rx)
//!     .await?;
//! println!("Archived {} posts", report.stats.records_persisted);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::Config;
use crate::crawler::fetcher::{PageFetcher, PageStatus};
use crate::crawler::url::{Target, UrlGenerator};
use crate::error::{Error, Result};
use crate::models::{CacheEntry, Mode, PageRequest, Record};
use crate::parser::{PageExtraction, PostExtractor, RuleRegistry, RuleSet};
use crate::storage::{
    open_sink, prepare_output, CacheStore, DedupCache, PersistOutcome, RecordSink,
};
use crate::utils::error::{CrawlerError, StorageError};

// ============================================================================
// Message Types
// ============================================================================

/// Page body handed from the fetch worker to the extract worker
#[derive(Debug)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
}

/// Why the control loop stopped
#[derive(Debug)]
enum Halt {
    /// Cycle limit reached; queued pages are still processed
    Drained,
    Shutdown,
    Fatal(StorageError),
    Closed,
}

/// Send `urls` to the fetch worker, giving up as soon as a shutdown signal
/// or a fatal error arrives
async fn enqueue(
    fetch_tx: &mpsc::Sender<PageRequest>,
    urls: Vec<String>,
    shutdown: &mut watch::Receiver<bool>,
    fatal_rx: &mut mpsc::Receiver<StorageError>,
) -> Option<Halt> {
    for url in urls {
        tokio::select! {
            sent = fetch_tx.send(PageRequest::new(url)) => {
                if sent.is_err() {
                    return Some(Halt::Closed);
                }
            }
            _ = shutdown.changed() => return Some(Halt::Shutdown),
            Some(err) = fatal_rx.recv() => return Some(Halt::Fatal(err)),
        }
    }
    None
}

// ============================================================================
// Pipeline Statistics
// ============================================================================

/// Pipeline statistics (thread-safe)
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Pages fetched with a usable body
    pub pages_fetched: AtomicU64,

    /// Pages found deleted
    pub pages_gone: AtomicU64,

    /// Pages refused by the site
    pub pages_blocked: AtomicU64,

    /// Fetches dropped until the next refresh
    pub transient_failures: AtomicU64,

    /// Records produced by extraction
    pub records_emitted: AtomicU64,

    /// Posts that produced no record, or whose record was dropped
    pub posts_skipped: AtomicU64,

    /// Records written by the sink
    pub records_persisted: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record the classification of one fetch
    pub fn record_page(&self, status: PageStatus) {
        let counter = match status {
            PageStatus::Ok => &self.pages_fetched,
            PageStatus::Gone => &self.pages_gone,
            PageStatus::Blocked => &self.pages_blocked,
            PageStatus::Transient => &self.transient_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of extracting one page
    pub fn record_extraction(&self, page: &PageExtraction) {
        self.records_emitted
            .fetch_add(page.records.len() as u64, Ordering::Relaxed);
        self.posts_skipped
            .fetch_add(page.malformed as u64, Ordering::Relaxed);
    }

    pub fn record_persisted(&self) {
        self.records_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.posts_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            pages_gone: self.pages_gone.load(Ordering::Relaxed),
            pages_blocked: self.pages_blocked.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            posts_skipped: self.posts_skipped.load(Ordering::Relaxed),
            records_persisted: self.records_persisted.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub pages_fetched: u64,
    pub pages_gone: u64,
    pub pages_blocked: u64,
    pub transient_failures: u64,
    pub records_emitted: u64,
    pub posts_skipped: u64,
    pub records_persisted: u64,
}

impl StatsSnapshot {
    /// Pages evicted from the cache as dead
    pub fn pages_dead(&self) -> u64 {
        self.pages_gone + self.pages_blocked
    }
}

// ============================================================================
// Session
// ============================================================================

/// What to scrape and where to put it
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub mode: Mode,

    /// Chan alias or hostname
    pub chan: String,

    pub targets: Vec<Target>,

    /// Image directory or archive file, validated before start
    pub output: PathBuf,

    /// Visit board pages last to first
    pub bottomfeed: bool,

    /// Suppress the board-wide traffic warning
    pub force: bool,

    /// Scheme and host replacing the chan's own, for mock servers
    pub origin: Option<String>,
}

impl SessionOptions {
    pub fn new(mode: Mode, chan: &str, targets: Vec<Target>) -> Self {
        Self {
            mode,
            chan: chan.to_string(),
            targets,
            output: PathBuf::from("."),
            bottomfeed: false,
            force: false,
            origin: None,
        }
    }
}

/// Summary of a finished session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub stats: StatsSnapshot,

    /// Refresh cycles started
    pub cycles: u32,

    /// Test-connection result; always true in other modes
    pub connected: bool,

    /// Cache file written at shutdown
    pub dumped: Option<PathBuf>,
}

/// One scrape run from seeding to cache dump
pub struct ScrapeSession {
    config: Config,
    options: SessionOptions,
    registry: RuleRegistry,
    stats: Arc<PipelineStats>,
    max_cycles: Option<u32>,
}

impl ScrapeSession {
    pub fn new(config: Config, options: SessionOptions) -> Self {
        Self {
            config,
            options,
            registry: RuleRegistry::builtin(),
            stats: PipelineStats::new(),
            max_cycles: None,
        }
    }

    /// Use a custom rule registry
    pub fn with_registry(mut self, registry: RuleRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Stop after `cycles` refresh cycles and drain the queues
    pub fn with_max_cycles(mut self, cycles: u32) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    fn url_generator(&self, rules: &RuleSet) -> std::result::Result<UrlGenerator, CrawlerError> {
        match &self.options.origin {
            Some(origin) => Ok(UrlGenerator::with_origin(origin, rules.pagination.clone())),
            None => UrlGenerator::new(
                &self.options.chan,
                self.config.scrape.force_ssl,
                rules.pagination.clone(),
            ),
        }
    }

    /// Board-level entries for every page of every target
    fn seed_entries(&self, urls: &UrlGenerator) -> Vec<CacheEntry> {
        self.options
            .targets
            .iter()
            .flat_map(|target| {
                urls.generate(&target.board, target.thread.as_deref(), self.options.bottomfeed)
                    .map(|url| CacheEntry::seed(&target.board, &self.options.chan, url))
            })
            .collect()
    }

    /// Run until `shutdown` flips, a fatal persistence error occurs, or the
    /// cycle limit is reached
    ///
    /// # Errors
    ///
    /// Fails before any network activity on no targets, an unresolvable
    /// chan, or an unusable output path. A fatal persistence error is
    /// returned after the cache has been dumped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<SessionReport> {
        let mode = self.options.mode;
        if self.options.targets.is_empty() {
            return Err(CrawlerError::NoTargets.into());
        }

        let rules = self.registry.lookup(mode, &self.options.chan);
        let urls = self.url_generator(&rules)?;
        let output = prepare_output(mode, &self.options.output)?;
        let fetcher = PageFetcher::new(&self.config.crawler)?;
        let seeds = self.seed_entries(&urls);

        let thread_scoped = self.options.targets.iter().any(|t| t.thread.is_some());
        if !thread_scoped && !self.options.force && mode.is_extracting() {
            tracing::warn!(
                pages = seeds.len(),
                "Scraping entire boards puts heavy load on the server; pass --force to silence this"
            );
        }

        let store = CacheStore::new(self.config.cache.dump_file.clone());
        let mut cache = store.load(mode);
        // A thread run starts from its seeds alone
        let carry_over = if thread_scoped {
            std::mem::take(&mut cache)
        } else {
            DedupCache::new()
        };
        for seed in seeds {
            cache.insert(seed);
        }

        if mode == Mode::TestConnection {
            return Ok(self.test_connection(&fetcher, &cache.urls()).await);
        }

        let extractor = PostExtractor::new(&self.options.chan, Arc::clone(&rules), urls)?
            .with_no_video(self.config.scrape.no_video);
        let sink = open_sink(mode, output.as_deref(), fetcher.client().clone())
            .await?
            .ok_or_else(|| Error::config(format!("mode {mode} persists nothing")))?;

        tracing::info!(
            mode = %mode,
            chan = %self.options.chan,
            targets = self.options.targets.len(),
            cached = cache.len(),
            set_aside = carry_over.len(),
            thread_scoped,
            "Starting scrape session"
        );
        let cache = Arc::new(Mutex::new(cache));

        let buffer = self.config.crawler.channel_buffer_size;
        let (fetch_tx, fetch_rx) = mpsc::channel::<PageRequest>(buffer);
        let (extract_tx, extract_rx) = mpsc::channel::<FetchedPage>(buffer);
        let (persist_tx, persist_rx) = mpsc::channel::<Record>(buffer);
        let (fatal_tx, mut fatal_rx) = mpsc::channel::<StorageError>(1);
        let (stop_tx, stop_rx) = watch::channel(false);

        let fetch_handle = self.spawn_fetch_worker(
            fetcher,
            fetch_rx,
            extract_tx,
            Arc::clone(&cache),
            stop_rx,
        );
        let extract_handle =
            self.spawn_extract_worker(extractor, extract_rx, persist_tx, Arc::clone(&cache));
        let persist_handle = self.spawn_persist_worker(sink, persist_rx, fatal_tx);

        let mut ticker = interval(self.config.refresh_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u32;

        let halt = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let pending = cache.lock().await.urls();
                    cycles += 1;
                    tracing::debug!(cycle = cycles, urls = pending.len(), "Refreshing");

                    if let Some(halt) =
                        enqueue(&fetch_tx, pending, &mut shutdown, &mut fatal_rx).await
                    {
                        break halt;
                    }
                    if self.max_cycles.is_some_and(|max| cycles >= max) {
                        break Halt::Drained;
                    }
                }
                _ = shutdown.changed() => break Halt::Shutdown,
                Some(err) = fatal_rx.recv() => break Halt::Fatal(err),
            }
        };

        let mut fatal = None;
        match halt {
            Halt::Drained => tracing::info!(cycles, "Cycle limit reached, draining"),
            Halt::Closed => tracing::error!("Fetch channel closed"),
            Halt::Shutdown => {
                tracing::info!("Shutdown signal received, quitting");
                let _ = stop_tx.send(true);
            }
            Halt::Fatal(err) => {
                tracing::error!(error = %err, "Persistence failed, shutting down");
                let _ = stop_tx.send(true);
                fatal = Some(err);
            }
        }

        // Closing the fetch queue lets every stage finish in order
        drop(fetch_tx);
        for (stage, handle) in [
            ("fetch", fetch_handle),
            ("extract", extract_handle),
            ("persist", persist_handle),
        ] {
            if let Err(e) = handle.await {
                tracing::error!(stage, error = %e, "Worker panicked");
            }
        }
        if fatal.is_none() {
            fatal = fatal_rx.try_recv().ok();
        }

        let mut cache = std::mem::take(&mut *cache.lock().await);
        if self.config.cache.merge_thread_runs && !carry_over.is_empty() {
            let restored = cache.merge(carry_over);
            tracing::debug!(restored, "Set-aside cache merged");
        }

        let dumped = if self.config.cache.dump {
            store.dump(mode, cache)?
        } else {
            tracing::info!("Cache dumping disabled");
            None
        };

        let stats = self.stats.snapshot();
        tracing::info!(
            cycles,
            fetched = stats.pages_fetched,
            dead = stats.pages_dead(),
            transient = stats.transient_failures,
            emitted = stats.records_emitted,
            persisted = stats.records_persisted,
            skipped = stats.posts_skipped,
            "Scrape session finished"
        );

        if let Some(err) = fatal {
            return Err(err.into());
        }

        Ok(SessionReport {
            stats,
            cycles,
            connected: true,
            dumped,
        })
    }

    /// Fetch every URL once, sequentially
    async fn test_connection(&self, fetcher: &PageFetcher, urls: &[String]) -> SessionReport {
        let mut connected = true;
        for url in urls {
            let status = fetcher.check(url).await;
            self.stats.record_page(status);
            connected &= status == PageStatus::Ok;
        }

        let stats = self.stats.snapshot();
        tracing::info!(
            pages = urls.len(),
            ok = stats.pages_fetched,
            connected,
            "Connection test finished"
        );

        SessionReport {
            stats,
            cycles: 1,
            connected,
            dumped: None,
        }
    }

    /// Spawn the fetch worker
    fn spawn_fetch_worker(
        &self,
        fetcher: PageFetcher,
        mut fetch_rx: mpsc::Receiver<PageRequest>,
        extract_tx: mpsc::Sender<FetchedPage>,
        cache: Arc<Mutex<DedupCache>>,
        mut stop_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            loop {
                let request = tokio::select! {
                    _ = stop_rx.changed() => break,
                    request = fetch_rx.recv() => match request {
                        Some(r) => r,
                        None => break, // Channel closed
                    },
                };

                let result = tokio::select! {
                    _ = stop_rx.changed() => break,
                    result = fetcher.fetch(&request.url) => result,
                };

                let status = PageStatus::from(&result);
                stats.record_page(status);

                match result {
                    Ok(html) => {
                        tracing::debug!(url = %request.url, bytes = html.len(), "Fetched");
                        let page = FetchedPage {
                            url: request.url,
                            html,
                        };
                        if extract_tx.send(page).await.is_err() {
                            tracing::error!("Extract channel closed");
                            break;
                        }
                    }
                    Err(e) if status.is_dead() => {
                        let removed = cache.lock().await.remove_by_url(&request.url);
                        tracing::warn!(
                            url = %request.url,
                            status = status.as_str(),
                            removed,
                            error = %e,
                            "Removing dead page from cache"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(url = %request.url, error = %e, "Fetch failed, retrying next refresh");
                    }
                }
            }

            tracing::debug!("Fetch worker shutting down");
        })
    }

    /// Spawn the extract worker
    fn spawn_extract_worker(
        &self,
        extractor: PostExtractor,
        mut extract_rx: mpsc::Receiver<FetchedPage>,
        persist_tx: mpsc::Sender<Record>,
        cache: Arc<Mutex<DedupCache>>,
    ) -> JoinHandle<()> {
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            'pages: while let Some(page) = extract_rx.recv().await {
                let extraction = {
                    let mut cache = cache.lock().await;
                    extractor.extract(&page.html, &mut cache)
                };

                let extraction = match extraction {
                    Ok(extraction) => extraction,
                    Err(e) => {
                        tracing::warn!(url = %page.url, error = %e, "Skipping page");
                        continue;
                    }
                };
                stats.record_extraction(&extraction);

                for record in extraction.records {
                    if persist_tx.send(record).await.is_err() {
                        tracing::error!("Persist channel closed");
                        break 'pages;
                    }
                }
            }

            tracing::debug!("Extract worker shutting down");
        })
    }

    /// Spawn the persist worker
    fn spawn_persist_worker(
        &self,
        mut sink: Box<dyn RecordSink>,
        mut persist_rx: mpsc::Receiver<Record>,
        fatal_tx: mpsc::Sender<StorageError>,
    ) -> JoinHandle<()> {
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            while let Some(record) = persist_rx.recv().await {
                match sink.persist(record).await {
                    Ok(PersistOutcome::Written(_)) => stats.record_persisted(),
                    Ok(PersistOutcome::Skipped) => stats.record_skip(),
                    Err(e) => {
                        let _ = fatal_tx.send(e).await;
                        return;
                    }
                }
            }

            if let Err(e) = sink.flush().await {
                let _ = fatal_tx.send(e).await;
                return;
            }

            tracing::debug!("Persist worker shutting down");
        })
    }
}
