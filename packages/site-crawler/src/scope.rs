//! Scope filtering: which URLs this crawl is allowed to touch.

use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::config::CrawlerConfig;
use crate::robots::RobotsCache;

/// Where an in-scope URL goes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Render through the browser and extract text + links.
    Page,
    /// Download directly (PDF/DOCX); terminal, no link extraction.
    Document,
    /// Do not fetch.
    Skip(SkipReason),
}

/// Why a URL was rejected by the scope filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Path ends in a configured binary-skip extension
    Extension,
    /// Host is outside the allowed domain
    ExternalDomain,
    /// URL contains a blocked external host substring
    BlockedHost,
    /// robots.txt disallows the path (polite mode only)
    RobotsDisallowed,
    /// URL contains a configured deny keyword
    DeniedKeyword,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Extension => write!(f, "ignored extension"),
            SkipReason::ExternalDomain => write!(f, "external domain"),
            SkipReason::BlockedHost => write!(f, "blocked host"),
            SkipReason::RobotsDisallowed => write!(f, "disallowed by robots.txt"),
            SkipReason::DeniedKeyword => write!(f, "denied keyword"),
        }
    }
}

/// Decides eligibility of URLs for one crawl, bounded to one domain.
pub struct ScopeFilter {
    allowed_domain: String,
    blocked_hosts: Vec<String>,
    skip_extensions: Vec<String>,
    document_extensions: Vec<String>,
    path_deny_keywords: Vec<String>,
    polite_mode: bool,
    robots: Option<Arc<RobotsCache>>,
}

impl ScopeFilter {
    /// Build a filter for `allowed_domain` from the crawl config.
    pub fn new(allowed_domain: impl Into<String>, config: &CrawlerConfig) -> Self {
        let allowed_domain: String = allowed_domain.into();
        Self {
            allowed_domain: allowed_domain.to_lowercase(),
            blocked_hosts: config.blocked_hosts.clone(),
            skip_extensions: config.skip_extensions.clone(),
            document_extensions: config.document_extensions.clone(),
            path_deny_keywords: config.path_deny_keywords.clone(),
            polite_mode: config.polite_mode,
            robots: None,
        }
    }

    /// Attach the shared robots.txt cache (consulted only in polite mode).
    pub fn with_robots(mut self, robots: Arc<RobotsCache>) -> Self {
        self.robots = Some(robots);
        self
    }

    /// The domain this filter is bound to.
    pub fn allowed_domain(&self) -> &str {
        &self.allowed_domain
    }

    /// Full eligibility check, applied when a frontier entry is popped.
    ///
    /// Checks run in order and short-circuit on the first rejection:
    /// extension, domain, blocklist, robots.txt (polite mode), deny
    /// keywords. Document extensions are routed rather than rejected but
    /// still must pass every later check.
    pub async fn evaluate(&self, url: &Url) -> Route {
        let path = url.path().to_lowercase();

        if self.skip_extensions.iter().any(|ext| path.ends_with(ext.as_str())) {
            return Route::Skip(SkipReason::Extension);
        }
        let is_document = self
            .document_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()));

        if !self.is_same_domain(url) {
            return Route::Skip(SkipReason::ExternalDomain);
        }

        if self.is_blocked_host(url) {
            return Route::Skip(SkipReason::BlockedHost);
        }

        if self.polite_mode {
            if let Some(robots) = &self.robots {
                let policy = robots.policy_for(url).await;
                if !policy.is_allowed(url.path()) {
                    return Route::Skip(SkipReason::RobotsDisallowed);
                }
            }
        }

        let url_lower = url.as_str().to_lowercase();
        if self
            .path_deny_keywords
            .iter()
            .any(|kw| url_lower.contains(&kw.to_lowercase()))
        {
            return Route::Skip(SkipReason::DeniedKeyword);
        }

        if is_document {
            Route::Document
        } else {
            Route::Page
        }
    }

    /// Cheap push-time gate for discovered links: domain and blocklist
    /// only. The full check (robots included) runs again at pop time.
    pub fn accepts_link(&self, url: &Url) -> bool {
        self.is_same_domain(url) && !self.is_blocked_host(url)
    }

    /// Whether the URL's host is the allowed domain or a subdomain of it.
    /// Used both for eligibility and for the post-redirect re-check.
    pub fn is_same_domain(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        host == self.allowed_domain || host.ends_with(&format!(".{}", self.allowed_domain))
    }

    fn is_blocked_host(&self, url: &Url) -> bool {
        let url_str = url.as_str();
        self.blocked_hosts.iter().any(|b| url_str.contains(b.as_str()))
    }
}
