//! The per-worker crawl loop.
//!
//! One worker owns one frontier, one visited set and one fetcher, and
//! processes its seed partition sequentially. Every per-URL failure is
//! recovered here — converted into a retry, a log line or both — and
//! nothing propagates out of the loop.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

use crate::artifacts::{ArtifactWriter, CrawlLogs, DownloadOutcome};
use crate::config::CrawlerConfig;
use crate::error::CrawlError;
use crate::extract::{discover_links, extract};
use crate::fetcher::Fetcher;
use crate::frontier::{Frontier, FrontierEntry};
use crate::robots::RobotsCache;
use crate::scope::{Route, ScopeFilter};

/// What one worker accomplished.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerReport {
    pub worker_id: usize,
    /// Text artifacts written.
    pub pages_saved: usize,
    /// Documents downloaded.
    pub documents_saved: usize,
    /// URLs abandoned after errors (retry exhaustion included).
    pub failures: usize,
    /// URLs skipped: out of scope, already scraped, redirected away.
    pub skips: usize,
    /// Distinct URLs this worker visited.
    pub urls_visited: usize,
}

pub(crate) struct Worker<F: Fetcher> {
    id: usize,
    config: Arc<CrawlerConfig>,
    fetcher: F,
    writer: Arc<ArtifactWriter>,
    logs: Arc<CrawlLogs>,
    robots: Option<Arc<RobotsCache>>,
    report: WorkerReport,
}

impl<F: Fetcher> Worker<F> {
    pub fn new(
        id: usize,
        config: Arc<CrawlerConfig>,
        fetcher: F,
        writer: Arc<ArtifactWriter>,
        logs: Arc<CrawlLogs>,
        robots: Option<Arc<RobotsCache>>,
    ) -> Self {
        Self {
            id,
            config,
            fetcher,
            writer,
            logs,
            robots,
            report: WorkerReport {
                worker_id: id,
                ..Default::default()
            },
        }
    }

    /// Crawl every seed in this worker's partition, then close the
    /// fetcher. The visited set spans all seeds of the partition.
    pub async fn run(mut self, seeds: Vec<Url>) -> WorkerReport {
        let mut frontier = Frontier::new();

        for seed in seeds {
            let domain = match &self.config.allowed_domain {
                Some(domain) => domain.clone(),
                None => match seed.host_str() {
                    Some(host) => host.to_string(),
                    None => {
                        self.logs
                            .error(format!("seed has no host, skipping: {seed}"))
                            .await;
                        continue;
                    }
                },
            };

            let mut scope = ScopeFilter::new(domain, &self.config);
            if let Some(robots) = &self.robots {
                scope = scope.with_robots(Arc::clone(robots));
            }

            info!(
                worker = self.id,
                seed = %seed,
                domain = scope.allowed_domain(),
                "Starting crawl for seed"
            );
            frontier.push_seed(seed, self.config.proxies.clone());
            self.crawl(&mut frontier, &scope).await;
        }

        self.fetcher.close().await;
        self.report.urls_visited = frontier.visited_count();
        info!(
            worker = self.id,
            visited = self.report.urls_visited,
            pages = self.report.pages_saved,
            documents = self.report.documents_saved,
            "Worker finished"
        );
        self.report
    }

    async fn crawl(&mut self, frontier: &mut Frontier, scope: &ScopeFilter) {
        while let Some(entry) = frontier.next() {
            match scope.evaluate(&entry.url).await {
                Route::Skip(reason) => {
                    self.logs.skipped(format!("{reason}: {}", entry.url)).await;
                    self.report.skips += 1;
                }
                Route::Document => self.handle_document(&entry.url).await,
                Route::Page => self.handle_page(frontier, scope, entry).await,
            }
        }
    }

    async fn handle_document(&mut self, url: &Url) {
        match self.writer.download_document(url).await {
            Ok(DownloadOutcome::Downloaded) => self.report.documents_saved += 1,
            Ok(DownloadOutcome::AlreadyPresent) => {
                self.logs.skipped(format!("already scraped: {url}")).await;
                self.report.skips += 1;
            }
            Ok(DownloadOutcome::WrongContentType) => {
                self.logs.skipped(format!("not a document: {url}")).await;
                self.report.skips += 1;
            }
            Err(e) => {
                self.logs
                    .error(format!("could not download {url}: {e}"))
                    .await;
                self.report.failures += 1;
            }
        }
    }

    async fn handle_page(
        &mut self,
        frontier: &mut Frontier,
        scope: &ScopeFilter,
        entry: FrontierEntry,
    ) {
        info!(
            worker = self.id,
            url = %entry.url,
            attempt = entry.attempt_count,
            "Visiting page"
        );

        let page = match self.fetcher.fetch(&entry.url).await {
            Ok(page) => page,
            Err(e) if e.is_retryable() => {
                self.handle_retry(frontier, entry, e).await;
                return;
            }
            Err(e) => {
                self.logs.error(format!("failed: {} - {e}", entry.url)).await;
                self.report.failures += 1;
                return;
            }
        };

        // The browser follows redirects itself; a fetch that left the
        // allowed domain is discarded whole — no artifact, no links.
        if !scope.is_same_domain(&page.final_url) {
            self.logs
                .skipped(format!(
                    "external redirect: {} -> {}",
                    entry.url, page.final_url
                ))
                .await;
            self.report.skips += 1;
            return;
        }

        let document = extract(&page.html, &entry.url, Utc::now(), self.config.dedup_mode);
        match self.writer.write_if_absent(&document).await {
            Ok(true) => self.report.pages_saved += 1,
            Ok(false) => {
                self.logs
                    .skipped(format!("already scraped: {}", entry.url))
                    .await;
                self.report.skips += 1;
                // Still follow links: a resumed crawl must traverse
                // through pages it saved on an earlier run.
            }
            Err(e) => {
                self.logs
                    .error(format!("extraction failed for {}: {e}", entry.url))
                    .await;
                self.report.failures += 1;
                return;
            }
        }

        for link in discover_links(&page.html, &page.final_url) {
            if scope.accepts_link(&link) {
                frontier.push_discovered(link, self.config.proxies.clone());
            }
        }
    }

    async fn handle_retry(
        &mut self,
        frontier: &mut Frontier,
        entry: FrontierEntry,
        cause: CrawlError,
    ) {
        let attempts_made = entry.attempt_count + 1;
        self.logs
            .error(format!(
                "failed: {} - {cause} (attempt {attempts_made})",
                entry.url
            ))
            .await;

        if attempts_made >= self.config.max_retries {
            error!(worker = self.id, url = %entry.url, "Retries exhausted");
            self.logs
                .error(format!(
                    "skipping {} after {} attempts",
                    entry.url, self.config.max_retries
                ))
                .await;
            self.report.failures += 1;
            return;
        }

        let mut proxy_chain = entry.proxy_chain;
        if attempts_made == self.config.proxy_rotate_threshold {
            // Drop the proxy the failures happened on and rebind the
            // session to the next one (or none, when exhausted).
            if !proxy_chain.is_empty() {
                proxy_chain.remove(0);
            }
            let next_proxy = proxy_chain.first().map(String::as_str);
            if let Err(e) = self.fetcher.rotate_session(next_proxy).await {
                self.logs
                    .error(format!("session rotation failed: {e}"))
                    .await;
            }
        }

        frontier.push_retry(FrontierEntry {
            url: entry.url,
            attempt_count: attempts_made,
            proxy_chain,
        });
    }
}
