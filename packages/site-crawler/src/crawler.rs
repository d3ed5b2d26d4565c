//! Multi-worker crawl orchestration.
//!
//! Seeds are partitioned into disjoint chunks, one tokio task per worker.
//! Workers share nothing except the robots.txt cache and the crawl logs;
//! each owns its frontier, visited set and fetcher. A worker that dies
//! takes only its partition with it.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::info;
use url::Url;

use crate::artifacts::{ArtifactWriter, CrawlLogs};
use crate::config::CrawlerConfig;
use crate::error::{CrawlError, CrawlResult};
use crate::fetcher::{BrowserFetcher, Fetcher};
use crate::robots::RobotsCache;
use crate::worker::{Worker, WorkerReport};

/// Aggregate outcome of a crawl run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlReport {
    pub workers: Vec<WorkerReport>,
}

impl CrawlReport {
    pub fn pages_saved(&self) -> usize {
        self.workers.iter().map(|w| w.pages_saved).sum()
    }

    pub fn documents_saved(&self) -> usize {
        self.workers.iter().map(|w| w.documents_saved).sum()
    }

    pub fn failures(&self) -> usize {
        self.workers.iter().map(|w| w.failures).sum()
    }

    pub fn urls_visited(&self) -> usize {
        self.workers.iter().map(|w| w.urls_visited).sum()
    }
}

/// Orchestrates a crawl run across workers.
pub struct Crawler {
    config: Arc<CrawlerConfig>,
}

impl Crawler {
    /// Create a crawler after validating the configuration.
    pub fn new(config: CrawlerConfig) -> CrawlResult<Self> {
        config.validate().map_err(CrawlError::Config)?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// The validated configuration.
    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Run a browser-backed crawl over the given seeds.
    pub async fn run(&self, seeds: Vec<Url>) -> CrawlResult<CrawlReport> {
        let config = Arc::clone(&self.config);
        self.run_with(seeds, move |_worker_id| {
            let config = Arc::clone(&config);
            async move {
                // Sessions start on the head of the proxy chain; rotation
                // walks down it.
                let proxy = config.proxies.first().cloned();
                Ok(BrowserFetcher::new(&config).with_proxy(proxy))
            }
        })
        .await
    }

    /// Run a crawl with a custom fetcher per worker. This is the seam the
    /// tests drive with `MockFetcher`.
    pub async fn run_with<F, Fut, Mk>(
        &self,
        seeds: Vec<Url>,
        make_fetcher: Mk,
    ) -> CrawlResult<CrawlReport>
    where
        F: Fetcher + 'static,
        Fut: Future<Output = CrawlResult<F>>,
        Mk: Fn(usize) -> Fut,
    {
        let writer = Arc::new(ArtifactWriter::new(
            &self.config.text_dir,
            &self.config.document_dir,
        ));
        writer.ensure_dirs().await?;
        let logs = Arc::new(CrawlLogs::open(&self.config.log_dir).await?);
        let robots = self
            .config
            .polite_mode
            .then(|| Arc::new(RobotsCache::new(self.config.robots_user_agent.clone())));

        let worker_count = self.config.workers.min(seeds.len()).max(1);
        let chunk_size = seeds.len().div_ceil(worker_count);
        let partitions: Vec<Vec<Url>> = seeds
            .chunks(chunk_size.max(1))
            .map(|chunk| chunk.to_vec())
            .collect();

        info!(
            seeds = seeds.len(),
            workers = partitions.len(),
            polite = self.config.polite_mode,
            "Starting crawl"
        );

        let mut handles = Vec::with_capacity(partitions.len());
        for (worker_id, partition) in partitions.into_iter().enumerate() {
            let fetcher = match make_fetcher(worker_id).await {
                Ok(fetcher) => fetcher,
                Err(e) => {
                    logs.error(format!("worker {worker_id} failed to start: {e}"))
                        .await;
                    continue;
                }
            };

            let worker = Worker::new(
                worker_id,
                Arc::clone(&self.config),
                fetcher,
                Arc::clone(&writer),
                Arc::clone(&logs),
                robots.clone(),
            );
            handles.push(tokio::spawn(worker.run(partition)));
        }

        let mut report = CrawlReport::default();
        for handle in handles {
            match handle.await {
                Ok(worker_report) => report.workers.push(worker_report),
                Err(e) => {
                    // One worker dying does not abort the crawl.
                    logs.error(format!("worker terminated abnormally: {e}")).await;
                }
            }
        }

        info!(
            visited = report.urls_visited(),
            pages = report.pages_saved(),
            documents = report.documents_saved(),
            failures = report.failures(),
            "Crawl complete"
        );
        Ok(report)
    }
}
