//! Testing utilities including a scripted mock fetcher.
//!
//! Useful for exercising the crawl loop without launching a browser or
//! touching the network.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use url::Url;

use crate::error::{CrawlError, CrawlResult};
use crate::fetcher::{FetchedPage, Fetcher};

/// One scripted fetch result for a URL.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Page loads with the given markup; `final_url` defaults to the
    /// requested URL when `None`.
    Page {
        html: String,
        final_url: Option<String>,
    },
    /// Navigation times out.
    Timeout,
    /// Transport-level failure.
    Transport(String),
    /// Page loads but trips a soft-block marker.
    SoftBlock(String),
}

/// A `Fetcher` that replays scripted outcomes and records every call.
///
/// Outcomes for a URL are consumed in order; the last one repeats, so a
/// single `Timeout` script models a URL that always fails. Unscripted
/// URLs resolve to an empty page.
#[derive(Clone, Default)]
pub struct MockFetcher {
    scripts: Arc<Mutex<HashMap<String, VecDeque<MockOutcome>>>>,
    fetches: Arc<Mutex<Vec<String>>>,
    rotations: Arc<Mutex<Vec<Option<String>>>>,
}

impl MockFetcher {
    /// Create a mock with no scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a page load for a URL.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.with_outcome(
            url,
            MockOutcome::Page {
                html: html.into(),
                final_url: None,
            },
        )
    }

    /// Script a page load that lands on a different final URL.
    pub fn with_redirect(
        self,
        url: impl Into<String>,
        final_url: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        self.with_outcome(
            url,
            MockOutcome::Page {
                html: html.into(),
                final_url: Some(final_url.into()),
            },
        )
    }

    /// Append an outcome to a URL's script.
    pub fn with_outcome(self, url: impl Into<String>, outcome: MockOutcome) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.into())
            .or_default()
            .push_back(outcome);
        self
    }

    /// URLs fetched so far, in call order.
    pub fn fetch_log(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    /// Proxies passed to `rotate_session`, in call order.
    pub fn rotation_log(&self) -> Vec<Option<String>> {
        self.rotations.lock().unwrap().clone()
    }

    fn next_outcome(&self, url: &str) -> MockOutcome {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().expect("non-empty queue"),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| MockOutcome::Page {
                    html: String::new(),
                    final_url: None,
                }),
            None => MockOutcome::Page {
                html: String::new(),
                final_url: None,
            },
        }
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&mut self, url: &Url) -> CrawlResult<FetchedPage> {
        self.fetches.lock().unwrap().push(url.as_str().to_string());

        match self.next_outcome(url.as_str()) {
            MockOutcome::Page { html, final_url } => {
                let final_url = match final_url {
                    Some(u) => Url::parse(&u).map_err(|e| CrawlError::Transport {
                        url: url.as_str().to_string(),
                        message: e.to_string(),
                    })?,
                    None => url.clone(),
                };
                Ok(FetchedPage { html, final_url })
            }
            MockOutcome::Timeout => Err(CrawlError::Timeout {
                url: url.as_str().to_string(),
            }),
            MockOutcome::Transport(message) => Err(CrawlError::Transport {
                url: url.as_str().to_string(),
                message,
            }),
            MockOutcome::SoftBlock(marker) => Err(CrawlError::SoftBlock {
                url: url.as_str().to_string(),
                marker,
            }),
        }
    }

    async fn rotate_session(&mut self, proxy: Option<&str>) -> CrawlResult<()> {
        self.rotations
            .lock()
            .unwrap()
            .push(proxy.map(String::from));
        Ok(())
    }

    async fn close(&mut self) {}
}
