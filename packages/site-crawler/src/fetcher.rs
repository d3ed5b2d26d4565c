//! Page fetching through a headless browser session.
//!
//! The `Fetcher` trait is the seam between the crawl loop and browser
//! automation; `BrowserFetcher` drives a chromium instance and owns the
//! session lifecycle (fresh-per-page or persistent, proxy binding,
//! user-agent choice). Rotation is commanded by the crawl loop when the
//! retry policy says so.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use rand::Rng;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{CrawlerConfig, SessionPolicy};
use crate::error::{CrawlError, CrawlResult};

/// A successfully loaded page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Rendered markup.
    pub html: String,
    /// URL after any redirects the browser followed.
    pub final_url: Url,
}

/// Fetches rendered pages. One fetch is in flight per fetcher at a time;
/// each worker owns exactly one fetcher.
#[async_trait]
pub trait Fetcher: Send {
    /// Navigate to `url` and return the rendered page.
    async fn fetch(&mut self, url: &Url) -> CrawlResult<FetchedPage>;

    /// Discard the current session and bind the next one to `proxy`
    /// (no proxy when the chain is exhausted).
    async fn rotate_session(&mut self, proxy: Option<&str>) -> CrawlResult<()>;

    /// Tear down any live session.
    async fn close(&mut self);
}

struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

/// `Fetcher` backed by a headless chromium browser.
pub struct BrowserFetcher {
    session_policy: SessionPolicy,
    page_load_timeout: Duration,
    min_delay_ms: u64,
    max_delay_ms: u64,
    soft_block_markers: Vec<String>,
    user_agents: Vec<String>,
    current_proxy: Option<String>,
    session: Option<BrowserSession>,
}

impl BrowserFetcher {
    /// Create a fetcher from the crawl config. The browser session is
    /// launched lazily on the first fetch.
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            session_policy: config.session_policy,
            page_load_timeout: config.page_load_timeout(),
            min_delay_ms: config.min_delay_ms,
            max_delay_ms: config.max_delay_ms,
            soft_block_markers: config
                .soft_block_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            user_agents: config.user_agents.clone(),
            current_proxy: None,
            session: None,
        }
    }

    /// Bind the first session to a proxy.
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.current_proxy = proxy;
        self
    }

    async fn ensure_session(&mut self) -> CrawlResult<&mut BrowserSession> {
        if self.session.is_none() {
            self.session = Some(
                Self::launch_session(&self.user_agents, self.current_proxy.as_deref()).await?,
            );
        }
        Ok(self.session.as_mut().expect("session just ensured"))
    }

    async fn launch_session(
        user_agents: &[String],
        proxy: Option<&str>,
    ) -> CrawlResult<BrowserSession> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1024, 768)
            .arg("--disable-gpu")
            .arg("--disable-blink-features=AutomationControlled")
            // Images off for faster page loads.
            .arg("--blink-settings=imagesEnabled=false");

        if !user_agents.is_empty() {
            let pick = rand::thread_rng().gen_range(0..user_agents.len());
            builder = builder.arg(format!("--user-agent={}", user_agents[pick]));
        }
        if let Some(proxy) = proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }

        let browser_config = builder.build().map_err(CrawlError::Session)?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CrawlError::Session(e.to_string()))?;

        // The handler stream must be polled for the browser to make
        // progress.
        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        debug!(proxy = ?proxy, "Browser session started");
        Ok(BrowserSession {
            browser,
            handler_task,
        })
    }

    async fn teardown_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.browser.close().await {
                warn!(error = %e, "Failed to close browser cleanly");
            }
            let _ = session.browser.wait().await;
            session.handler_task.abort();
        }
    }

    /// Randomized post-load pause; rate-limits the crawl before link
    /// extraction proceeds.
    async fn pause(&self) {
        if self.max_delay_ms == 0 {
            return;
        }
        let ms = rand::thread_rng().gen_range(self.min_delay_ms..=self.max_delay_ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn find_soft_block_marker(&self, html: &str) -> Option<&str> {
        let content = html.to_lowercase();
        self.soft_block_markers
            .iter()
            .find(|marker| content.contains(marker.as_str()))
            .map(String::as_str)
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&mut self, url: &Url) -> CrawlResult<FetchedPage> {
        let url_str = url.as_str().to_string();
        let timeout = self.page_load_timeout;

        let session = self.ensure_session().await?;
        let navigation = async {
            let page = session.browser.new_page(url_str.as_str()).await?;
            page.wait_for_navigation().await?;
            let html = page.content().await?;
            let final_url = page.url().await?;
            let _ = page.close().await;
            Ok::<_, CdpError>((html, final_url))
        };

        let navigated = tokio::time::timeout(timeout, navigation).await;

        // Fresh-per-page policy discards the session after every fetch,
        // successful or not; the next fetch relaunches with the same proxy.
        if self.session_policy == SessionPolicy::FreshPerPage {
            self.teardown_session().await;
        }

        let (html, reported_url) = match navigated {
            Err(_) => return Err(CrawlError::Timeout { url: url_str }),
            Ok(Err(e)) => {
                return Err(CrawlError::Transport {
                    url: url_str,
                    message: e.to_string(),
                })
            }
            Ok(Ok(loaded)) => loaded,
        };

        self.pause().await;

        if let Some(marker) = self.find_soft_block_marker(&html) {
            return Err(CrawlError::SoftBlock {
                url: url_str,
                marker: marker.to_string(),
            });
        }

        let final_url = reported_url
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        Ok(FetchedPage { html, final_url })
    }

    async fn rotate_session(&mut self, proxy: Option<&str>) -> CrawlResult<()> {
        info!(proxy = ?proxy, "Rotating browser session");
        self.teardown_session().await;
        self.current_proxy = proxy.map(String::from);
        // Relaunched lazily on the next fetch.
        Ok(())
    }

    async fn close(&mut self) {
        self.teardown_session().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> BrowserFetcher {
        BrowserFetcher::new(&CrawlerConfig::default())
    }

    #[test]
    fn test_soft_block_markers_case_insensitive() {
        let f = fetcher();
        assert_eq!(
            f.find_soft_block_marker("<html>Please VERIFY You Are Human</html>"),
            Some("verify you are human")
        );
        assert_eq!(
            f.find_soft_block_marker("<html>Access Denied</html>"),
            Some("access denied")
        );
        assert_eq!(f.find_soft_block_marker("<html>Welcome</html>"), None);
    }

    #[test]
    fn test_proxy_binding() {
        let f = fetcher().with_proxy(Some("http://203.0.113.7:8080".into()));
        assert_eq!(f.current_proxy.as_deref(), Some("http://203.0.113.7:8080"));
    }
}
