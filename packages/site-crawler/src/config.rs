//! Crawl configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Browser session lifecycle across page fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// Close and recreate the browser session after every fetch,
    /// successful or not.
    FreshPerPage,
    /// Reuse one session until a rotation is triggered.
    Persistent,
}

/// Text extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    /// Two-level dedup: skip repeated containers by text hash, then skip
    /// repeated individual text leaves.
    ContainerHash,
    /// Headings and paragraphs taken directly, no container pass.
    Flat,
}

/// Configuration for a crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Restrict the crawl to this domain and its subdomains.
    /// When unset, each seed URL's host becomes its crawl's domain.
    pub allowed_domain: Option<String>,

    /// Total attempts per URL before it is permanently abandoned.
    pub max_retries: u32,

    /// Attempt count at which the session/proxy rotates. Must be
    /// strictly less than `max_retries`.
    pub proxy_rotate_threshold: u32,

    /// Lower bound of the randomized post-load delay.
    pub min_delay_ms: u64,

    /// Upper bound of the randomized post-load delay.
    pub max_delay_ms: u64,

    /// Page navigation timeout in seconds.
    pub page_load_timeout_secs: u64,

    /// Enforce robots.txt Disallow rules before fetching.
    pub polite_mode: bool,

    /// Browser session lifecycle policy.
    pub session_policy: SessionPolicy,

    /// Text extraction strategy.
    pub dedup_mode: DedupMode,

    /// External host substrings that are never followed.
    #[serde(default)]
    pub blocked_hosts: Vec<String>,

    /// Path extensions that are skipped outright (archives, media).
    #[serde(default)]
    pub skip_extensions: Vec<String>,

    /// Path extensions routed to the direct document download path.
    #[serde(default)]
    pub document_extensions: Vec<String>,

    /// URL substrings that are skipped (e.g. satellite-campus names
    /// duplicating content across locations).
    #[serde(default)]
    pub path_deny_keywords: Vec<String>,

    /// Proxy servers to rotate through, in order.
    #[serde(default)]
    pub proxies: Vec<String>,

    /// User-agents; each new browser session picks one at random.
    #[serde(default)]
    pub user_agents: Vec<String>,

    /// User-agent presented when fetching robots.txt.
    pub robots_user_agent: String,

    /// Case-insensitive substrings that mark a soft-blocked page.
    #[serde(default)]
    pub soft_block_markers: Vec<String>,

    /// Number of crawl workers; seeds are partitioned across them.
    pub workers: usize,

    /// Directory for extracted text artifacts.
    pub text_dir: PathBuf,

    /// Directory for downloaded documents (PDF/DOCX).
    pub document_dir: PathBuf,

    /// Directory for the error and skipped logs.
    pub log_dir: PathBuf,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            allowed_domain: None,
            max_retries: 3,
            proxy_rotate_threshold: 2,
            min_delay_ms: 1_000,
            max_delay_ms: 3_000,
            page_load_timeout_secs: 30,
            polite_mode: true,
            session_policy: SessionPolicy::FreshPerPage,
            dedup_mode: DedupMode::ContainerHash,
            blocked_hosts: [
                "twitter.com",
                "facebook.com",
                "linkedin.com",
                "reddit.com",
                "instagram.com",
                "tiktok.com",
                "youtube.com",
                "medium.com",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            skip_extensions: [
                ".zip", ".mp4", ".avi", ".gz", ".tar", ".7z", ".iso", ".jpg", ".jpeg", ".png",
                ".gif", ".svg", ".css", ".js",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            document_extensions: [".pdf", ".docx"].into_iter().map(String::from).collect(),
            path_deny_keywords: vec![],
            proxies: vec![],
            user_agents: [
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            robots_user_agent: "SiteCrawler/1.0".to_string(),
            soft_block_markers: ["verify you are human", "access denied"]
                .into_iter()
                .map(String::from)
                .collect(),
            workers: 4,
            text_dir: PathBuf::from("data/scraped_texts"),
            document_dir: PathBuf::from("data/scraped_docs"),
            log_dir: PathBuf::from("data/logs"),
        }
    }
}

impl CrawlerConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the crawl to one domain and its subdomains.
    pub fn with_allowed_domain(mut self, domain: impl Into<String>) -> Self {
        self.allowed_domain = Some(domain.into());
        self
    }

    /// Set the retry ceiling.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the attempt count that triggers proxy rotation.
    pub fn with_proxy_rotate_threshold(mut self, threshold: u32) -> Self {
        self.proxy_rotate_threshold = threshold;
        self
    }

    /// Set the randomized post-load delay bounds.
    pub fn with_delay_ms(mut self, min: u64, max: u64) -> Self {
        self.min_delay_ms = min;
        self.max_delay_ms = max;
        self
    }

    /// Set the page navigation timeout.
    pub fn with_page_load_timeout_secs(mut self, secs: u64) -> Self {
        self.page_load_timeout_secs = secs;
        self
    }

    /// Enable or disable robots.txt enforcement. Ignoring robots.txt is
    /// an explicit opt-out; polite mode is the default.
    pub fn with_polite_mode(mut self, polite: bool) -> Self {
        self.polite_mode = polite;
        self
    }

    /// Set the session lifecycle policy.
    pub fn with_session_policy(mut self, policy: SessionPolicy) -> Self {
        self.session_policy = policy;
        self
    }

    /// Set the extraction strategy.
    pub fn with_dedup_mode(mut self, mode: DedupMode) -> Self {
        self.dedup_mode = mode;
        self
    }

    /// Set the proxy rotation list.
    pub fn with_proxies(mut self, proxies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.proxies = proxies.into_iter().map(|p| p.into()).collect();
        self
    }

    /// Add URL substrings to skip.
    pub fn with_path_deny_keywords(
        mut self,
        keywords: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.path_deny_keywords = keywords.into_iter().map(|k| k.into()).collect();
        self
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the output directories.
    pub fn with_output_dirs(
        mut self,
        text_dir: impl Into<PathBuf>,
        document_dir: impl Into<PathBuf>,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        self.text_dir = text_dir.into();
        self.document_dir = document_dir.into();
        self.log_dir = log_dir.into();
        self
    }

    /// Page load timeout as a `Duration`.
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err("max_retries must be at least 1".into());
        }
        if self.proxy_rotate_threshold >= self.max_retries {
            return Err(format!(
                "proxy_rotate_threshold ({}) must be strictly less than max_retries ({})",
                self.proxy_rotate_threshold, self.max_retries
            ));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(format!(
                "min_delay_ms ({}) exceeds max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            ));
        }
        if self.workers == 0 {
            return Err("workers must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(CrawlerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rotation_threshold_must_precede_ceiling() {
        let config = CrawlerConfig::new()
            .with_max_retries(3)
            .with_proxy_rotate_threshold(3);
        assert!(config.validate().is_err());

        let config = CrawlerConfig::new()
            .with_max_retries(4)
            .with_proxy_rotate_threshold(2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_delay_bounds_checked() {
        let config = CrawlerConfig::new().with_delay_ms(5_000, 1_000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_polite_by_default() {
        assert!(CrawlerConfig::default().polite_mode);
    }
}
