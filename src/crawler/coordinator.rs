//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Seeding one pagination chain per start URL
//! - Admitting fetch tasks through the scheduler
//! - Folding extracted images into the result set
//! - Following pagination while rejecting cycles
//! - Handling stop requests and the wall-clock deadline
//! - Writing the results and producing the final report

use crate::config::{validate, Config, RetryPolicy};
use crate::crawler::extractor::{extract_from_document, ImageCandidate};
use crate::crawler::fetcher::{build_http_client, fetch_page, FetchedPage, PageRequest, PageResult};
use crate::crawler::pagination::{discover_next, reject_cycle, NextPage};
use crate::crawler::scheduler::Scheduler;
use crate::output::{download_images, write_results, CrawlReport, DownloadSummary};
use crate::robots::RobotsCache;
use crate::state::{CrawlPhase, CrawlState};
use crate::{FetchErrorKind, ScrapeError};
use chrono::Utc;
use reqwest::Client;
use scraper::Html;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use url::Url;

/// How often (in finished pages) progress is logged
const PROGRESS_INTERVAL: u32 = 10;

/// Requests a cooperative stop of a running crawl
///
/// After `stop()` no new pages are admitted; pages already in flight finish and the
/// results collected so far are written.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// What a worker hands back to the coordinator loop
#[derive(Debug)]
struct PageOutcome {
    request: PageRequest,
    attempts: u32,
    result: Result<ParsedPage, FetchErrorKind>,
}

/// A fetched page reduced to what the coordinator needs
#[derive(Debug)]
struct ParsedPage {
    final_url: Url,
    candidates: Vec<ImageCandidate>,
    next: Option<NextPage>,
}

/// How the main loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Exhausted,
    DeadlineExpired,
}

/// Main crawler coordinator structure
///
/// The coordinator is the only owner of [`CrawlState`]. Workers never touch it; they
/// return a `PageOutcome` that the loop applies in completion order.
pub struct Coordinator {
    config: Arc<Config>,
    client: Client,
    robots: RobotsCache,
    state: CrawlState,
    stop_tx: Arc<watch::Sender<bool>>,
    /// Wall-clock limit of the whole run, fixed when `run` starts
    deadline: Option<Instant>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(ScrapeError)` - The configuration is invalid or the HTTP client could not be built
    pub fn new(config: Config) -> Result<Self, ScrapeError> {
        validate(&config)?;

        let client = build_http_client(&config.user_agent, config.crawler.timeout())?;
        let robots = RobotsCache::new(config.user_agent.crawler_name.to_lowercase());
        let (stop_tx, _) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            client,
            robots,
            state: CrawlState::new(),
            stop_tx: Arc::new(stop_tx),
            deadline: None,
        })
    }

    /// Returns a handle that can stop this crawl from another task
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: self.stop_tx.clone(),
        }
    }

    /// Runs the crawl to completion
    ///
    /// 1. Load robots.txt for every seed origin (unless disabled)
    /// 2. Enqueue one chain per distinct seed
    /// 3. Admit, fetch, fold and follow until every chain is exhausted
    /// 4. Write the result file (and download images if configured)
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl reached `Done` or `Aborted` and results were written
    /// * `Err(ScrapeError)` - The result file could not be written, or an internal error
    pub async fn run(mut self) -> Result<CrawlReport, ScrapeError> {
        let crawler = self.config.crawler.clone();
        tracing::info!(
            "Starting crawl of {} seed(s): max {} pages, concurrency {}",
            self.config.seeds.len(),
            crawler.max_pages,
            crawler.max_concurrency
        );

        self.deadline = crawler.deadline().map(|d| Instant::now() + d);
        self.state.transition(CrawlPhase::Paginating)?;

        let seeds = self.seed_requests()?;
        if crawler.respect_robots {
            for seed in &seeds {
                if !self.load_robots(&seed.url).await {
                    break;
                }
            }
        }

        let mut min_interval = crawler.request_delay();
        if crawler.respect_robots {
            if let Some(delay) = self.robots.max_crawl_delay() {
                if delay > min_interval {
                    tracing::info!("Honoring robots.txt crawl-delay of {:?}", delay);
                    min_interval = delay;
                }
            }
        }

        let mut scheduler: Scheduler<PageOutcome> =
            Scheduler::new(crawler.max_concurrency as usize, min_interval);
        for seed in seeds {
            self.try_enqueue(&mut scheduler, seed).await;
        }

        let exit = self.drive(&mut scheduler).await?;

        let phase = self.finish(exit)?;
        self.complete(phase).await
    }

    /// Parses the configured seeds into first-page requests
    fn seed_requests(&self) -> Result<Vec<PageRequest>, ScrapeError> {
        self.config
            .seeds
            .iter()
            .enumerate()
            .map(|(index, seed)| -> Result<PageRequest, ScrapeError> {
                Ok(PageRequest::seed(Url::parse(seed)?, index))
            })
            .collect()
    }

    /// The admission / completion loop
    async fn drive(
        &mut self,
        scheduler: &mut Scheduler<PageOutcome>,
    ) -> Result<LoopExit, ScrapeError> {
        let client = self.client.clone();
        let policy: RetryPolicy = self.config.retry.clone();
        let mut stop_rx = self.stop_tx.subscribe();

        let deadline_sleep = deadline_reached(self.deadline);
        tokio::pin!(deadline_sleep);

        loop {
            if matches!(self.deadline, Some(at) if Instant::now() >= at) {
                return Ok(self.expire(scheduler));
            }

            if *stop_rx.borrow() && self.state.phase().accepts_pages() {
                self.begin_drain(scheduler, "stop requested")?;
            }

            if self.state.phase().accepts_pages() {
                scheduler.admit(|request| process_page(client.clone(), policy.clone(), request));
            }

            if scheduler.in_flight() == 0 {
                return Ok(LoopExit::Exhausted);
            }

            tokio::select! {
                _ = &mut deadline_sleep => {
                    return Ok(self.expire(scheduler));
                }
                changed = stop_rx.changed(), if self.state.phase().accepts_pages() => {
                    if changed.is_err() {
                        tracing::debug!("Stop channel closed");
                    }
                }
                Some(joined) = scheduler.next_completed() => {
                    match joined {
                        Ok(outcome) => self.handle_outcome(scheduler, outcome).await,
                        Err(e) => {
                            tracing::error!("Page task failed: {}", e);
                            let kind = FetchErrorKind::ConnectionError(format!("task failed: {}", e));
                            self.state.record_failure(&kind, 0);
                        }
                    }
                    self.log_progress(scheduler);
                }
            }
        }
    }

    /// Drops every pending and in-flight page once the deadline has passed
    fn expire(&mut self, scheduler: &mut Scheduler<PageOutcome>) -> LoopExit {
        let abandoned = scheduler.abort_all();
        self.state.record_abandoned(abandoned);
        tracing::warn!(
            "Deadline expired, abandoning {} pending or in-flight page(s)",
            abandoned
        );
        LoopExit::DeadlineExpired
    }

    /// Loads robots.txt for the URL's origin
    ///
    /// Returns false when the deadline or a stop request cut the load short.
    async fn load_robots(&mut self, url: &Url) -> bool {
        let stop_rx = self.stop_tx.subscribe();
        tokio::select! {
            biased;
            _ = self.robots.ensure_loaded(&self.client, url) => true,
            _ = deadline_reached(self.deadline) => {
                tracing::warn!("Deadline expired while loading robots.txt for {}", url);
                false
            }
            _ = stop_requested(stop_rx) => {
                tracing::info!("Stop requested while loading robots.txt for {}", url);
                false
            }
        }
    }

    /// Stops admitting pages and counts the ones left behind
    fn begin_drain(
        &mut self,
        scheduler: &mut Scheduler<PageOutcome>,
        reason: &str,
    ) -> Result<(), ScrapeError> {
        let abandoned = scheduler.close();
        self.state.record_abandoned(abandoned.len());
        tracing::info!(
            "Draining ({}): {} in flight, {} abandoned",
            reason,
            scheduler.in_flight(),
            abandoned.len()
        );
        self.state.transition(CrawlPhase::Draining)
    }

    /// Applies one worker outcome to the crawl state
    async fn handle_outcome(&mut self, scheduler: &mut Scheduler<PageOutcome>, outcome: PageOutcome) {
        let PageOutcome {
            request,
            attempts,
            result,
        } = outcome;

        let page = match result {
            Ok(page) => page,
            Err(kind) => {
                tracing::warn!(
                    "Page {} (seed {}, page {}) failed after {} attempt(s): {}",
                    request.url,
                    request.seed_index,
                    request.page_index,
                    attempts,
                    kind
                );
                self.state.record_failure(&kind, attempts);
                return;
            }
        };

        self.state.record_success(request.is_seed(), attempts);
        if page.final_url != request.url {
            tracing::debug!("{} redirected to {}", request.url, page.final_url);
            self.state.mark_visited(&page.final_url);
        }

        let added = self.state.fold_candidates(&page.candidates);
        tracing::info!(
            "Page {} (seed {}, page {}): {} candidates, {} new",
            request.url,
            request.seed_index,
            request.page_index,
            page.candidates.len(),
            added
        );

        if !self.state.phase().accepts_pages() {
            return;
        }

        match page.next.and_then(|next| reject_cycle(next, self.state.visited())) {
            Some(next) => {
                let next_request = request.next(next.url, next.page_index);
                self.try_enqueue(scheduler, next_request).await;
            }
            None => {
                tracing::debug!("Seed {} chain ended at page {}", request.seed_index, request.page_index);
            }
        }
    }

    /// Queues a page if it is new, within the page budget and allowed by robots.txt
    async fn try_enqueue(&mut self, scheduler: &mut Scheduler<PageOutcome>, request: PageRequest) -> bool {
        if self.state.counters().enqueued >= self.config.crawler.max_pages {
            tracing::info!(
                "Page limit of {} reached, not queuing {}",
                self.config.crawler.max_pages,
                request.url
            );
            return false;
        }

        if !self.state.mark_visited(&request.url) {
            tracing::debug!("Skipping already visited page {}", request.url);
            return false;
        }

        if self.config.crawler.respect_robots {
            if !self.load_robots(&request.url).await {
                self.state.record_abandoned(1);
                return false;
            }
            if !self.robots.is_allowed(&request.url) {
                tracing::info!("Page {} disallowed by robots.txt", request.url);
                self.state.record_disallowed();
                return false;
            }
        }

        if !scheduler.enqueue(request) {
            return false;
        }
        self.state.record_enqueued();
        true
    }

    fn log_progress(&self, scheduler: &Scheduler<PageOutcome>) {
        let counters = self.state.counters();
        let finished = counters.succeeded + counters.failed;
        if finished > 0 && finished % PROGRESS_INTERVAL == 0 {
            tracing::info!(
                "Progress: {} pages done, {} in flight, {} pending, {} unique images",
                finished,
                scheduler.in_flight(),
                scheduler.pending(),
                self.state.results().len()
            );
        }
    }

    /// Moves the crawl into its terminal phase
    fn finish(&mut self, exit: LoopExit) -> Result<CrawlPhase, ScrapeError> {
        if exit == LoopExit::DeadlineExpired {
            self.state.transition(CrawlPhase::Aborted)?;
            return Ok(CrawlPhase::Aborted);
        }

        if self.state.phase() == CrawlPhase::Paginating {
            self.state.transition(CrawlPhase::Draining)?;
        }

        let terminal = if self.state.any_seed_established() {
            CrawlPhase::Done
        } else {
            tracing::error!("No seed page could be fetched, aborting");
            CrawlPhase::Aborted
        };
        self.state.transition(terminal)?;
        Ok(terminal)
    }

    /// Writes results, runs the optional download pass and builds the report
    async fn complete(self, phase: CrawlPhase) -> Result<CrawlReport, ScrapeError> {
        let output_path = PathBuf::from(&self.config.output.path);
        write_results(self.state.results(), &output_path)?;

        let downloads = match (&self.config.output.download_dir, phase) {
            (Some(dir), CrawlPhase::Done) if !self.state.results().is_empty() => {
                let urls: Vec<Url> = self.state.results().iter().cloned().collect();
                let dir = PathBuf::from(dir);
                let summary = match download_images(
                    &self.client,
                    &urls,
                    &dir,
                    &self.config.retry,
                    self.config.crawler.max_concurrency as usize,
                )
                .await
                {
                    Ok(summary) => summary,
                    Err(e) => {
                        // The result file is already written, so the crawl still stands
                        tracing::error!("Image download skipped: {}", e);
                        DownloadSummary::unavailable(&dir, urls.len(), e)
                    }
                };
                Some(summary)
            }
            _ => None,
        };

        let pages_visited = self.state.pages_visited();
        let started_at = self.state.started_at();
        let (results, counters, failures) = self.state.into_parts();

        let report = CrawlReport {
            phase,
            pages_visited,
            counters,
            unique_images: results.len(),
            output_path,
            failures,
            downloads,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            "Crawl {}: {} pages ok, {} failed, {} unique images in {:?}",
            report.phase,
            report.counters.succeeded,
            report.counters.failed,
            report.unique_images,
            report.elapsed().to_std().unwrap_or_default()
        );
        Ok(report)
    }
}

/// Resolves once the deadline passes, never without one
async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Resolves once a stop has been requested
async fn stop_requested(mut stop_rx: watch::Receiver<bool>) {
    loop {
        let stopped = *stop_rx.borrow_and_update();
        if stopped {
            return;
        }
        if stop_rx.changed().await.is_err() {
            // Sender dropped, no stop can arrive any more
            std::future::pending::<()>().await;
        }
    }
}

/// Fetches one page and reduces it to candidates and a next-page hint
async fn process_page(client: Client, policy: RetryPolicy, request: PageRequest) -> PageOutcome {
    let PageResult {
        request,
        attempts,
        outcome,
    } = fetch_page(&client, request, &policy).await;

    let result = outcome.map(|fetched| analyze_page(&fetched, request.page_index));
    PageOutcome {
        request,
        attempts,
        result,
    }
}

/// Parses the page once and runs extraction and pagination discovery on it
///
/// Links resolve against the final URL so redirects are honored.
fn analyze_page(page: &FetchedPage, page_index: u32) -> ParsedPage {
    let document = Html::parse_document(&page.html);
    let candidates = extract_from_document(&document, &page.final_url);
    let next = discover_next(&document, &page.final_url, page_index, !candidates.is_empty());

    ParsedPage {
        final_url: page.final_url.clone(),
        candidates,
        next,
    }
}
