//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Seeding the frontier from a root URL, search results or the store's
//!   `Pending` records left by an earlier run
//! - Filtering, robots checks and the politeness throttle
//! - Fetching, cleaning, enrichment and persistence of each URL
//! - Link discovery at `depth + 1`
//! - Run bookkeeping and cancellation between URLs

use crate::config::Config;
use crate::content::{is_html, ContentFilter, SettingsResolver};
use crate::crawler::scheduler::{Frontier, QueuedUrl, SeedOrigin, Throttle};
use crate::crawler::{FetchedPage, Fetcher};
use crate::llm::{Enrichment, LlmClient};
use crate::robots::{fetch_robots, robots_path, ParsedRobots};
use crate::state::UrlStatus;
use crate::storage::{RunCounts, RunStatus, Storage, StorageError, StorageResult, UrlRecord};
use crate::url::{extract_host, normalize_url};
use crate::{Result, SafarnamaError};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

/// Cloneable flag that stops a crawl between URLs
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Breadth-first site crawler
///
/// The store is the authority on which URLs were already processed; the
/// frontier's claim set covers URLs queued during the current run.
pub struct SiteCrawler<F: Fetcher, S: Storage> {
    config: Arc<Config>,
    storage: Arc<Mutex<S>>,
    fetcher: F,
    filter: ContentFilter,
    settings: SettingsResolver,
    llm: Option<LlmClient>,
    robots: HashMap<String, ParsedRobots>,
    throttle: Throttle,
    frontier: Frontier,
    cancel: CancelHandle,
    counts: RunCounts,
}

impl<F: Fetcher, S: Storage> SiteCrawler<F, S> {
    /// Creates a crawler over an open store
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `fetcher` - HTTP collaborator used for pages and robots.txt
    /// * `storage` - The persistence store
    ///
    /// # Returns
    ///
    /// * `Err(SafarnamaError::Config)` - An exclusion or override pattern
    ///   failed to compile
    pub fn new(config: Config, fetcher: F, storage: S) -> Result<Self> {
        let filter = ContentFilter::from_config(&config.filter);
        let settings = SettingsResolver::from_config(&config)?;
        let throttle = Throttle::new(
            Duration::from_millis(config.crawler.delay_ms),
            config.crawler.throttle,
        );

        Ok(Self {
            config: Arc::new(config),
            storage: Arc::new(Mutex::new(storage)),
            fetcher,
            filter,
            settings,
            llm: None,
            robots: HashMap::new(),
            throttle,
            frontier: Frontier::new(),
            cancel: CancelHandle::default(),
            counts: RunCounts::default(),
        })
    }

    /// Enables enrichment of fetched pages
    pub fn with_llm(mut self, client: LlmClient) -> Self {
        self.llm = Some(client);
        self
    }

    /// Handle that stops the crawl before the next URL
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Outcome counts of the most recent run
    pub fn stats(&self) -> RunCounts {
        self.counts
    }

    /// Shared handle to the store
    pub fn storage(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.storage)
    }

    /// Seeds a URL at the given depth
    ///
    /// The URL is persisted as `Pending` and queued unless the store already
    /// holds it in a terminal state.
    ///
    /// # Returns
    ///
    /// `true` if the URL was queued for this run
    pub fn add_url(&mut self, url: &str, depth: u32) -> Result<bool> {
        self.seed(url, depth, SeedOrigin::Root)
    }

    /// Seeds a search hit as a depth-0 root
    ///
    /// Binary-looking hits are fetched anyway when
    /// `fetch-binary-search-results` is set.
    pub fn add_search_result(&mut self, url: &str) -> Result<bool> {
        self.seed(url, 0, SeedOrigin::Search)
    }

    fn seed(&mut self, url: &str, depth: u32, origin: SeedOrigin) -> Result<bool> {
        let url = normalize_url(url)?;
        let scope_host = self.scope_for(&url);

        let existing = self.with_store(|store| {
            let existing = store.get(url.as_str())?;
            store.upsert(&UrlRecord::pending(url.as_str(), depth))?;
            Ok(existing)
        })?;

        if let Some(record) = existing.filter(|r| r.status.is_terminal()) {
            tracing::debug!("Not queueing {}: already {}", url, record.status);
            return Ok(false);
        }

        Ok(self.frontier.push(url, depth, origin, scope_host))
    }

    /// Crawls from `seed` down to `max_depth`
    ///
    /// # Returns
    ///
    /// Every URL the store holds in a terminal state, including those from
    /// earlier runs
    pub async fn crawl(&mut self, seed: &str, max_depth: u32) -> Result<BTreeSet<String>> {
        self.add_url(seed, 0)?;
        self.crawl_frontier(max_depth).await
    }

    /// Drains the frontier, first picking up `Pending` records left in the store
    pub async fn crawl_frontier(&mut self, max_depth: u32) -> Result<BTreeSet<String>> {
        let resumed = self.with_store(|store| store.pending(max_depth))?;
        let mut picked_up = 0;
        for record in resumed {
            let Ok(url) = Url::parse(&record.url) else {
                tracing::warn!("Ignoring unparseable pending URL {}", record.url);
                continue;
            };
            let origin = if record.depth == 0 {
                SeedOrigin::Root
            } else {
                SeedOrigin::Link
            };
            let scope_host = self.scope_for(&url);
            if self.frontier.push(url, record.depth, origin, scope_host) {
                picked_up += 1;
            }
        }
        if picked_up > 0 {
            tracing::info!("Resuming {} pending URLs from the store", picked_up);
        }

        let fingerprint = self.config.fingerprint()?;
        let run_id = self.with_store(|store| store.create_run(&fingerprint))?;
        tracing::info!("Starting crawl run {} (max depth {})", run_id, max_depth);

        self.counts = RunCounts::default();
        let start_time = Instant::now();
        let mut status = RunStatus::Completed;

        while let Some(queued) = self.frontier.pop() {
            if self.cancel.is_cancelled() {
                tracing::info!("Crawl cancelled, {} URLs left in the frontier", self.frontier.len() + 1);
                status = RunStatus::Interrupted;
                break;
            }

            if queued.depth > max_depth {
                tracing::debug!("Leaving {} pending: depth {} > {}", queued.url, queued.depth, max_depth);
                continue;
            }

            match self.process_url(&queued, max_depth).await {
                Ok(outcome) => self.counts.record(outcome),
                Err(e) => {
                    tracing::error!("Aborting run {} on {}: {}", run_id, queued.url, e);
                    let counts = self.counts;
                    if let Err(close_err) = self
                        .with_store(|store| store.complete_run(run_id, RunStatus::Failed, &counts))
                    {
                        tracing::warn!("Could not mark run {} failed: {}", run_id, close_err);
                    }
                    return Err(e);
                }
            }

            let processed = self.counts.total();
            if processed > 0 && processed % 10 == 0 {
                let rate = processed as f64 / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {} URLs processed, {} in frontier, {:.2} URLs/sec",
                    processed,
                    self.frontier.len(),
                    rate
                );
            }
        }

        let counts = self.counts;
        self.with_store(|store| store.complete_run(run_id, status, &counts))?;

        tracing::info!(
            "Run {} {}: {} fetched, {} failed, {} skipped in {:?}",
            run_id,
            status.to_db_string(),
            counts.fetched,
            counts.failed,
            counts.skipped,
            start_time.elapsed()
        );

        self.visited()
    }

    /// Every URL in a terminal state, the input of sitemap generation
    pub fn visited(&self) -> Result<BTreeSet<String>> {
        self.with_store(|store| store.list_visited())
    }

    /// Releases the store
    ///
    /// Fails if a handle returned by [`SiteCrawler::storage`] is still alive.
    pub fn close(self) -> Result<()> {
        let storage = Arc::try_unwrap(self.storage)
            .map_err(|_| StorageError::Database("store is still shared".to_string()))?;
        let storage = storage
            .into_inner()
            .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))?;
        storage.close()?;
        Ok(())
    }

    /// Processes a single URL and persists its terminal status
    ///
    /// Per-URL failures become `Failed` or `Skipped` records; only a store
    /// failure is returned as an error.
    async fn process_url(&mut self, queued: &QueuedUrl, max_depth: u32) -> Result<UrlStatus> {
        let url = queued.url.as_str();

        let excluded = self
            .settings
            .resolve(url, queued.depth)
            .exclusions
            .excluded_by(url)
            .map(str::to_string);
        if let Some(pattern) = excluded {
            let reason = SafarnamaError::ExcludedByPattern {
                url: url.to_string(),
                pattern,
            };
            return self.settle_unprocessed(queued, reason, None);
        }

        let binary_allowed =
            queued.origin == SeedOrigin::Search && self.config.crawler.fetch_binary_search_results;
        if self.filter.is_binary(url) && !binary_allowed {
            let reason = SafarnamaError::BinaryExtensionSkip {
                url: url.to_string(),
            };
            return self.settle_unprocessed(queued, reason, None);
        }

        if self.config.crawler.respect_robots && !self.robots_allow(&queued.url).await {
            let reason = SafarnamaError::RobotsDenied {
                url: url.to_string(),
            };
            return self.settle_unprocessed(queued, reason, None);
        }

        let host = extract_host(&queued.url).unwrap_or_default();
        self.throttle.wait(&host).await;

        let timeout = Duration::from_secs(self.config.crawler.request_timeout_secs);
        let page = match self.fetcher.fetch(url, timeout).await {
            Ok(page) if page.is_success() => page,
            Ok(page) => {
                let reason = SafarnamaError::Network {
                    url: url.to_string(),
                    message: format!("HTTP {}", page.status_code),
                };
                return self.settle_unprocessed(queued, reason, page.content_type);
            }
            Err(e) => {
                let reason = SafarnamaError::Network {
                    url: url.to_string(),
                    message: e.to_string(),
                };
                return self.settle_unprocessed(queued, reason, None);
            }
        };

        let content_type = page.content_type.clone().unwrap_or_default();
        if !self.filter.is_accepted(&content_type) {
            let reason = SafarnamaError::UnacceptedContentType {
                url: url.to_string(),
                content_type: content_type.clone(),
            };
            return self.settle_unprocessed(queued, reason, page.content_type);
        }

        let (text, links) = self.extract(&page, queued, &content_type);
        let enrichment = self.enrich(url, &text).await;

        let mut record = UrlRecord::pending(url, queued.depth).settle(UrlStatus::Fetched);
        record.content_type = page.content_type;
        if let Some(Enrichment { summary, tags }) = enrichment {
            record.summary = Some(summary);
            record.tags = Some(tags);
        }
        let status = self.persist(record)?;
        tracing::info!("Fetched {} (depth {})", url, queued.depth);

        if self.config.crawler.follows_links(max_depth) {
            let queued_links = self.enqueue_links(&links, queued, max_depth)?;
            tracing::debug!("Queued {} of {} links from {}", queued_links, links.len(), url);
        }

        Ok(status)
    }

    /// Cleaned text and outbound links of an accepted response
    ///
    /// The cleaner and image discovery follow the overrides for the URL and
    /// its depth.
    fn extract(&self, page: &FetchedPage, queued: &QueuedUrl, content_type: &str) -> (String, Vec<String>) {
        let settings = self.settings.resolve(queued.url.as_str(), queued.depth);

        if !is_html(content_type) {
            return (settings.cleaner.clean_text(&page.body), Vec::new());
        }

        let base = Url::parse(&page.final_url).unwrap_or_else(|_| queued.url.clone());
        let cleaned = settings.cleaner.clean(&page.body, &base);
        if settings.find_images {
            for image in &cleaned.images {
                tracing::info!("Found image: {}", image);
            }
        }
        (cleaned.text, cleaned.links)
    }

    /// Best-effort enrichment; a failure leaves the page without summary
    async fn enrich(&self, url: &str, text: &str) -> Option<Enrichment> {
        let llm = self.llm.as_ref()?;
        if text.trim().is_empty() {
            tracing::debug!("No text to enrich for {}", url);
            return None;
        }

        match llm.summarize(text).await {
            Ok(enrichment) => Some(enrichment),
            Err(e) => {
                tracing::warn!("Enrichment failed for {}: {}", url, SafarnamaError::from(e));
                None
            }
        }
    }

    /// Persists discovered links as `Pending` at `depth + 1` and queues them
    ///
    /// Links past `max_depth` are stored but not queued, so a later run with
    /// a larger depth picks them up.
    fn enqueue_links(&mut self, links: &[String], parent: &QueuedUrl, max_depth: u32) -> Result<usize> {
        let depth = parent.depth + 1;
        let mut queued = 0;

        for link in links {
            let url = match normalize_url(link) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Dropping link {}: {}", link, e);
                    continue;
                }
            };

            if let Some(scope) = &parent.scope_host {
                if extract_host(&url).as_deref() != Some(scope.as_str()) {
                    tracing::debug!("Dropping off-host link {}", url);
                    continue;
                }
            }

            let existing = self.with_store(|store| {
                let existing = store.get(url.as_str())?;
                store.upsert(&UrlRecord::pending(url.as_str(), depth))?;
                Ok(existing)
            })?;

            if existing.is_some_and(|r| r.status.is_terminal()) {
                tracing::debug!("Already processed: {}", url);
                continue;
            }
            if depth > max_depth {
                continue;
            }

            if self.frontier.push(url, depth, SeedOrigin::Link, parent.scope_host.clone()) {
                queued += 1;
            }
        }

        Ok(queued)
    }

    /// Checks robots.txt, fetching it on first contact with an origin
    async fn robots_allow(&mut self, url: &Url) -> bool {
        let Some(host) = extract_host(url) else {
            return true;
        };
        let origin = format!("{}://{}", url.scheme(), host);
        let agent = self.config.user_agent.crawler_name.clone();

        if !self.robots.contains_key(&origin) {
            self.throttle.wait(&host).await;
            let timeout = Duration::from_secs(self.config.crawler.request_timeout_secs);
            let parsed = fetch_robots(&self.fetcher, url, timeout).await;
            if let Some(delay) = parsed.crawl_delay(&agent) {
                tracing::info!("Using crawl-delay {:?} for {}", delay, host);
                self.throttle.set_host_delay(&host, delay);
            }
            self.robots.insert(origin.clone(), parsed);
        }

        self.robots
            .get(&origin)
            .map_or(true, |robots| robots.is_allowed(&robots_path(url), &agent))
    }

    /// Settles a URL that was not processed
    ///
    /// Skip reasons mark it `Skipped`; anything else marks it `Failed`. A
    /// network failure stores its bare message, such as `HTTP 404`.
    fn settle_unprocessed(
        &self,
        queued: &QueuedUrl,
        reason: SafarnamaError,
        content_type: Option<String>,
    ) -> Result<UrlStatus> {
        let status = if reason.is_skip() {
            tracing::debug!("Skipping: {}", reason);
            UrlStatus::Skipped
        } else {
            tracing::warn!("{}", reason);
            UrlStatus::Failed
        };

        let mut record = UrlRecord::pending(queued.url.as_str(), queued.depth).settle(status);
        record.content_type = content_type;
        record.error_message = Some(match reason {
            SafarnamaError::Network { message, .. } => message,
            other => other.to_string(),
        });
        self.persist(record)
    }

    fn persist(&self, record: UrlRecord) -> Result<UrlStatus> {
        let status = record.status;
        self.with_store(|store| store.upsert(&record))?;
        Ok(status)
    }

    fn scope_for(&self, url: &Url) -> Option<String> {
        if self.config.crawler.same_host_only {
            extract_host(url)
        } else {
            None
        }
    }

    fn with_store<T>(&self, op: impl FnOnce(&mut S) -> StorageResult<T>) -> Result<T> {
        let mut store = self
            .storage
            .lock()
            .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))?;
        Ok(op(&mut *store)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DepthOverride, SettingsOverride, UrlOverride};
    use crate::crawler::FetchError;
    use crate::storage::SqliteStorage;

    /// Serves canned responses and logs every requested URL with its time
    #[derive(Default)]
    struct MapFetcher {
        pages: HashMap<String, FetchedPage>,
        requests: Arc<Mutex<Vec<String>>>,
        stamps: Arc<Mutex<Vec<Instant>>>,
        /// Cancels the crawl once the given URL has been fetched
        cancel_on: Arc<Mutex<Option<(String, CancelHandle)>>>,
    }

    impl MapFetcher {
        fn page(mut self, url: &str, content_type: &str, body: &str) -> Self {
            self.pages.insert(
                url.to_string(),
                FetchedPage {
                    final_url: url.to_string(),
                    status_code: 200,
                    content_type: Some(content_type.to_string()),
                    body: body.to_string(),
                },
            );
            self
        }

        fn status(mut self, url: &str, status_code: u16) -> Self {
            self.pages.insert(
                url.to_string(),
                FetchedPage {
                    final_url: url.to_string(),
                    status_code,
                    content_type: None,
                    body: String::new(),
                },
            );
            self
        }
    }

    impl Fetcher for MapFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> std::result::Result<FetchedPage, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.stamps.lock().unwrap().push(Instant::now());
            if let Some((trigger, handle)) = self.cancel_on.lock().unwrap().as_ref() {
                if trigger == url {
                    handle.cancel();
                }
            }
            match self.pages.get(url) {
                Some(page) => Ok(page.clone()),
                None if url.ends_with("/robots.txt") => Ok(FetchedPage {
                    final_url: url.to_string(),
                    status_code: 404,
                    content_type: None,
                    body: String::new(),
                }),
                None => Err(FetchError::Connect {
                    url: url.to_string(),
                    message: "no such host".to_string(),
                }),
            }
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.crawler.delay_ms = 0;
        config
    }

    fn site() -> MapFetcher {
        MapFetcher::default()
            .page(
                "https://ex.com/",
                "text/html",
                r#"<html><body><a href="/a">A</a><a href="/b">B</a><a href="/a#top">A again</a></body></html>"#,
            )
            .page("https://ex.com/a", "text/html; charset=utf-8", r#"<a href="/deep">deep</a>"#)
            .page("https://ex.com/b", "text/html", "<p>b</p>")
            .page("https://ex.com/deep", "text/html", "<p>deep</p>")
    }

    fn crawler(fetcher: MapFetcher) -> SiteCrawler<MapFetcher, SqliteStorage> {
        SiteCrawler::new(config(), fetcher, SqliteStorage::new_in_memory().unwrap()).unwrap()
    }

    fn fetched_pages(requests: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        requests
            .lock()
            .unwrap()
            .iter()
            .filter(|u| !u.ends_with("/robots.txt"))
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn test_crawl_depth_one() {
        let mut crawler = crawler(site());
        let visited = crawler.crawl("https://ex.com", 1).await.unwrap();

        let expected: BTreeSet<String> = ["https://ex.com/", "https://ex.com/a", "https://ex.com/b"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(visited, expected);

        let storage = crawler.storage();
        let store = storage.lock().unwrap();
        assert_eq!(store.get("https://ex.com/").unwrap().unwrap().depth, 0);
        assert_eq!(store.get("https://ex.com/a").unwrap().unwrap().depth, 1);
        assert_eq!(store.get("https://ex.com/b").unwrap().unwrap().depth, 1);

        let deep = store.get("https://ex.com/deep").unwrap().unwrap();
        assert_eq!(deep.depth, 2);
        assert_eq!(deep.status, UrlStatus::Pending);
    }

    #[tokio::test]
    async fn test_breadth_first_fetch_order() {
        let fetcher = site();
        let requests = Arc::clone(&fetcher.requests);
        let mut crawler = crawler(fetcher);
        crawler.crawl("https://ex.com/", 2).await.unwrap();

        assert_eq!(
            fetched_pages(&requests),
            vec![
                "https://ex.com/",
                "https://ex.com/a",
                "https://ex.com/b",
                "https://ex.com/deep"
            ]
        );
    }

    #[tokio::test]
    async fn test_resume_does_not_refetch() {
        let fetcher = site();
        let requests = Arc::clone(&fetcher.requests);
        let mut crawler = crawler(fetcher);

        crawler.crawl("https://ex.com", 1).await.unwrap();
        requests.lock().unwrap().clear();

        let visited = crawler.crawl("https://ex.com", 2).await.unwrap();
        assert_eq!(fetched_pages(&requests), vec!["https://ex.com/deep"]);
        assert!(visited.contains("https://ex.com/deep"));

        requests.lock().unwrap().clear();
        crawler.crawl("https://ex.com", 2).await.unwrap();
        assert!(fetched_pages(&requests).is_empty());
        assert_eq!(crawler.stats(), RunCounts::default());
    }

    #[tokio::test]
    async fn test_failures_are_recorded_not_fatal() {
        let fetcher = MapFetcher::default()
            .page(
                "https://ex.com/",
                "text/html",
                r#"<a href="/missing">m</a><a href="/down">d</a><a href="/ok">ok</a>"#,
            )
            .status("https://ex.com/missing", 404)
            .page("https://ex.com/ok", "text/plain", "plain text");
        let mut crawler = crawler(fetcher);
        let visited = crawler.crawl("https://ex.com/", 1).await.unwrap();
        assert_eq!(visited.len(), 4);

        let counts = crawler.stats();
        assert_eq!(counts.fetched, 2);
        assert_eq!(counts.failed, 2);

        let storage = crawler.storage();
        let store = storage.lock().unwrap();
        let missing = store.get("https://ex.com/missing").unwrap().unwrap();
        assert_eq!(missing.status, UrlStatus::Failed);
        assert_eq!(missing.error_message.as_deref(), Some("HTTP 404"));
        assert_eq!(
            store.get("https://ex.com/down").unwrap().unwrap().status,
            UrlStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_unaccepted_content_type_skipped() {
        let fetcher = MapFetcher::default()
            .page("https://ex.com/", "text/html", r#"<a href="/img">img</a>"#)
            .page("https://ex.com/img", "image/png", "PNG");
        let mut crawler = crawler(fetcher);
        crawler.crawl("https://ex.com/", 1).await.unwrap();

        let storage = crawler.storage();
        let store = storage.lock().unwrap();
        let img = store.get("https://ex.com/img").unwrap().unwrap();
        assert_eq!(img.status, UrlStatus::Skipped);
        assert_eq!(img.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_binary_links_skipped_without_fetch() {
        let fetcher = MapFetcher::default().page(
            "https://ex.com/",
            "text/html",
            r#"<a href="/report.PDF">report</a>"#,
        );
        let requests = Arc::clone(&fetcher.requests);
        let mut crawler = crawler(fetcher);
        crawler.crawl("https://ex.com/", 1).await.unwrap();

        assert_eq!(fetched_pages(&requests), vec!["https://ex.com/"]);
        assert_eq!(crawler.stats().skipped, 1);
    }

    #[tokio::test]
    async fn test_binary_search_result_override() {
        let fetcher = MapFetcher::default().page("https://docs.com/paper.pdf", "text/plain", "paper");
        let mut config = config();
        config.crawler.fetch_binary_search_results = true;
        config.filter.accepted_content_types.push("application/pdf".to_string());
        let mut crawler =
            SiteCrawler::new(config, fetcher, SqliteStorage::new_in_memory().unwrap()).unwrap();

        assert!(crawler.add_search_result("https://docs.com/paper.pdf").unwrap());
        crawler.crawl_frontier(1).await.unwrap();
        assert_eq!(crawler.stats().fetched, 1);
    }

    #[tokio::test]
    async fn test_same_host_only() {
        let fetcher = MapFetcher::default()
            .page(
                "https://ex.com/",
                "text/html",
                r#"<a href="https://other.com/x">x</a><a href="/a">a</a>"#,
            )
            .page("https://ex.com/a", "text/html", "a");
        let mut crawler = crawler(fetcher);
        let visited = crawler.crawl("https://ex.com/", 1).await.unwrap();

        assert!(!visited.contains("https://other.com/x"));
        let storage = crawler.storage();
        assert!(storage.lock().unwrap().get("https://other.com/x").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_recursive_fetches_root_only() {
        let mut config = config();
        config.crawler.recursive = false;
        let mut crawler =
            SiteCrawler::new(config, site(), SqliteStorage::new_in_memory().unwrap()).unwrap();
        let visited = crawler.crawl("https://ex.com/", 3).await.unwrap();
        assert_eq!(visited.len(), 1);
    }

    #[tokio::test]
    async fn test_excluded_pattern_skipped() {
        let mut config = config();
        config.crawler.exclude_url_patterns = vec!["/b$".to_string()];
        let fetcher = site();
        let requests = Arc::clone(&fetcher.requests);
        let mut crawler =
            SiteCrawler::new(config, fetcher, SqliteStorage::new_in_memory().unwrap()).unwrap();
        crawler.crawl("https://ex.com/", 1).await.unwrap();

        assert!(!fetched_pages(&requests).contains(&"https://ex.com/b".to_string()));
        let storage = crawler.storage();
        let b = storage.lock().unwrap().get("https://ex.com/b").unwrap().unwrap();
        assert_eq!(b.status, UrlStatus::Skipped);
    }

    #[tokio::test]
    async fn test_robots_disallow() {
        let fetcher = site().page(
            "https://ex.com/robots.txt",
            "text/plain",
            "User-agent: *\nDisallow: /b",
        );
        let requests = Arc::clone(&fetcher.requests);
        let mut crawler = crawler(fetcher);
        crawler.crawl("https://ex.com/", 1).await.unwrap();

        let all = requests.lock().unwrap().clone();
        assert_eq!(all.iter().filter(|u| u.ends_with("/robots.txt")).count(), 1);
        assert!(!all.contains(&"https://ex.com/b".to_string()));
        assert_eq!(crawler.stats().skipped, 1);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let fetcher = site();
        let requests = Arc::clone(&fetcher.requests);
        let mut crawler = crawler(fetcher);
        crawler.cancel_handle().cancel();

        let visited = crawler.crawl("https://ex.com/", 1).await.unwrap();
        assert!(visited.is_empty());
        assert!(requests.lock().unwrap().is_empty());

        let storage = crawler.storage();
        let store = storage.lock().unwrap();
        let run = store.get_latest_run().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Interrupted);
        assert_eq!(
            store.get("https://ex.com/").unwrap().unwrap().status,
            UrlStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_cancel_between_urls() {
        let fetcher = site();
        let requests = Arc::clone(&fetcher.requests);
        let cancel_on = Arc::clone(&fetcher.cancel_on);
        let mut crawler = crawler(fetcher);
        *cancel_on.lock().unwrap() = Some(("https://ex.com/".to_string(), crawler.cancel_handle()));

        let visited = crawler.crawl("https://ex.com/", 1).await.unwrap();
        assert_eq!(visited.len(), 1);
        assert_eq!(fetched_pages(&requests), vec!["https://ex.com/"]);
        assert_eq!(crawler.stats().fetched, 1);

        let storage = crawler.storage();
        let store = storage.lock().unwrap();
        let run = store.get_latest_run().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Interrupted);
        assert_eq!(run.counts.fetched, 1);
        assert!(run.finished_at.is_some());
        for url in ["https://ex.com/a", "https://ex.com/b"] {
            let record = store.get(url).unwrap().unwrap();
            assert_eq!(record.status, UrlStatus::Pending);
            assert_eq!(record.depth, 1);
        }
    }

    #[tokio::test]
    async fn test_politeness_delay_between_fetches() {
        let mut config = config();
        config.crawler.delay_ms = 50;
        let fetcher = site();
        let stamps = Arc::clone(&fetcher.stamps);
        let mut crawler =
            SiteCrawler::new(config, fetcher, SqliteStorage::new_in_memory().unwrap()).unwrap();

        let start = Instant::now();
        crawler.crawl("https://ex.com/", 1).await.unwrap();

        // robots.txt, then /, /a and /b
        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len(), 4);
        assert!(start.elapsed() >= Duration::from_millis(150));
        for pair in stamps.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(40));
        }
    }

    #[tokio::test]
    async fn test_resumed_link_takes_shallower_depth() {
        let fetcher = MapFetcher::default()
            .page("https://ex.com/", "text/html", r#"<a href="/a">a</a>"#)
            .page("https://ex.com/a", "text/html", r#"<a href="/deep">deep</a>"#)
            .page("https://ex.com/deep", "text/html", r#"<a href="/leaf">leaf</a>"#)
            .page("https://ex.com/leaf", "text/html", "<p>leaf</p>")
            .page("https://ex.com/c", "text/html", r#"<a href="/deep">deep</a>"#);
        let requests = Arc::clone(&fetcher.requests);
        let mut crawler = crawler(fetcher);

        crawler.crawl("https://ex.com/", 1).await.unwrap();
        {
            let storage = crawler.storage();
            let deep = storage.lock().unwrap().get("https://ex.com/deep").unwrap().unwrap();
            assert_eq!((deep.status, deep.depth), (UrlStatus::Pending, 2));
        }
        requests.lock().unwrap().clear();

        // /deep is resumed at depth 2 and rediscovered from /c at depth 1
        crawler.crawl("https://ex.com/c", 2).await.unwrap();
        assert_eq!(
            fetched_pages(&requests),
            vec!["https://ex.com/c", "https://ex.com/deep", "https://ex.com/leaf"]
        );

        let storage = crawler.storage();
        let store = storage.lock().unwrap();
        let deep = store.get("https://ex.com/deep").unwrap().unwrap();
        assert_eq!((deep.status, deep.depth), (UrlStatus::Fetched, 1));
        let leaf = store.get("https://ex.com/leaf").unwrap().unwrap();
        assert_eq!((leaf.status, leaf.depth), (UrlStatus::Fetched, 2));
    }

    #[tokio::test]
    async fn test_depth_override_excludes_at_depth() {
        let mut config = config();
        config.crawler.depth_overrides = vec![DepthOverride {
            depth: 1,
            settings: SettingsOverride {
                exclude_url_patterns: Some(vec!["/b$".to_string()]),
                ..SettingsOverride::default()
            },
        }];
        let fetcher = site();
        let requests = Arc::clone(&fetcher.requests);
        let mut crawler =
            SiteCrawler::new(config, fetcher, SqliteStorage::new_in_memory().unwrap()).unwrap();
        crawler.crawl("https://ex.com/", 2).await.unwrap();

        assert_eq!(
            fetched_pages(&requests),
            vec!["https://ex.com/", "https://ex.com/a", "https://ex.com/deep"]
        );
        let storage = crawler.storage();
        let b = storage.lock().unwrap().get("https://ex.com/b").unwrap().unwrap();
        assert_eq!(b.status, UrlStatus::Skipped);
        assert!(b.error_message.unwrap().contains("/b$"));
    }

    #[tokio::test]
    async fn test_url_override_lifts_exclusion() {
        let mut config = config();
        config.crawler.exclude_url_patterns = vec!["^https://ex.com/[ab]$".to_string()];
        config.crawler.url_overrides = vec![UrlOverride {
            pattern: "/a$".to_string(),
            settings: SettingsOverride {
                exclude_url_patterns: Some(Vec::new()),
                ..SettingsOverride::default()
            },
        }];
        let fetcher = site();
        let requests = Arc::clone(&fetcher.requests);
        let mut crawler =
            SiteCrawler::new(config, fetcher, SqliteStorage::new_in_memory().unwrap()).unwrap();
        crawler.crawl("https://ex.com/", 1).await.unwrap();

        assert_eq!(
            fetched_pages(&requests),
            vec!["https://ex.com/", "https://ex.com/a"]
        );
        assert_eq!(crawler.stats().skipped, 1);
    }

    #[tokio::test]
    async fn test_bad_override_pattern_rejected() {
        let mut config = config();
        config.crawler.url_overrides = vec![UrlOverride {
            pattern: "(".to_string(),
            settings: SettingsOverride::default(),
        }];
        let result = SiteCrawler::new(config, site(), SqliteStorage::new_in_memory().unwrap());
        assert!(matches!(result, Err(SafarnamaError::Config(_))));
    }

    #[tokio::test]
    async fn test_add_search_result_rejects_invalid_url() {
        let mut crawler = crawler(site());
        let err = crawler.add_search_result("mailto:someone@ex.com").unwrap_err();
        assert!(matches!(err, SafarnamaError::Url(_)));
        assert!(crawler.add_search_result("https://ex.com/a").unwrap());
    }

    #[tokio::test]
    async fn test_run_recorded() {
        let mut crawler = crawler(site());
        crawler.crawl("https://ex.com/", 1).await.unwrap();

        let storage = crawler.storage();
        let store = storage.lock().unwrap();
        let run = store.get_latest_run().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.counts.fetched, 3);
        assert_eq!(run.config_hash, config().fingerprint().unwrap());
    }

    #[tokio::test]
    async fn test_add_url_rejects_processed() {
        let mut crawler = crawler(site());
        crawler.crawl("https://ex.com/", 0).await.unwrap();
        assert!(!crawler.add_url("https://ex.com", 0).unwrap());
        assert!(crawler.add_url("https://ex.com/a", 0).unwrap());
    }

    #[tokio::test]
    async fn test_close_releases_store() {
        let crawler = crawler(site());
        let shared = crawler.storage();
        drop(shared);
        assert!(crawler.close().is_ok());
    }
}
