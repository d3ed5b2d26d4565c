//! Polite, Resumable, Domain-Scoped Site Crawler
//!
//! Crawls a site (typically a university subdomain) depth-first from a set
//! of seed URLs, extracts deduplicated text and downloads linked documents,
//! persisting one artifact per page. Artifacts are keyed by URL-derived
//! filenames and existing artifacts are never rewritten, which makes a
//! crawl resumable across runs.
//!
//! # Design
//!
//! - Workers own their crawl state; only the robots.txt cache and the
//!   error/skipped logs are shared
//! - Failures stay local: a URL that keeps failing is retried up to a
//!   ceiling (with proxy/session rotation on the way) and then abandoned
//! - robots.txt is enforced by default; bypassing it is explicit opt-in
//!
//! # Usage
//!
//! ```rust,ignore
//! use site_crawler::{Crawler, CrawlerConfig, seeds};
//!
//! let config = CrawlerConfig::new().with_allowed_domain("example.edu");
//! let seed_urls = seeds::load_seed_file("urls.csv")?;
//! let report = Crawler::new(config)?.run(seed_urls).await?;
//! println!("saved {} pages", report.pages_saved());
//! ```
//!
//! # Modules
//!
//! - [`norm`] - URL normalization
//! - [`scope`] - domain/robots/blocklist scoping
//! - [`frontier`] - LIFO frontier and visited tracking
//! - [`fetcher`] - browser-backed page fetching
//! - [`extract`] - content extraction and dedup
//! - [`artifacts`] - artifact persistence and crawl logs
//! - [`seeds`] - seed file loading and sitemap expansion
//! - [`testing`] - mock fetcher for tests

pub mod artifacts;
pub mod config;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod frontier;
pub mod norm;
pub mod robots;
pub mod scope;
pub mod seeds;
pub mod testing;
mod worker;

// Re-export core types at crate root
pub use artifacts::{ArtifactWriter, CrawlLogs, DownloadOutcome};
pub use config::{CrawlerConfig, DedupMode, SessionPolicy};
pub use crawler::{CrawlReport, Crawler};
pub use error::{CrawlError, CrawlResult, SeedError};
pub use extract::{BlockKind, ContentBlock, ExtractedDocument};
pub use fetcher::{BrowserFetcher, FetchedPage, Fetcher};
pub use frontier::{Frontier, FrontierEntry};
pub use robots::{DomainPolicy, RobotsCache};
pub use scope::{Route, ScopeFilter, SkipReason};
pub use worker::WorkerReport;
