//! Typed errors for the crawler library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match
//! on failure classes and the retry loop can classify them.

use thiserror::Error;

/// Errors that can occur while crawling.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// href does not resolve to a fetchable absolute URL (mailto, javascript:, empty)
    #[error("not a crawlable URL: {href:?}")]
    NotCrawlable { href: String },

    /// URL failed the scope filter
    #[error("out of scope: {url} ({reason})")]
    OutOfScope { url: String, reason: String },

    /// Page load exceeded the configured timeout
    #[error("timeout loading: {url}")]
    Timeout { url: String },

    /// Navigation or protocol failure below the content level
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// Page loaded but its content indicates bot detection
    #[error("soft block on {url}: matched {marker:?}")]
    SoftBlock { url: String, marker: String },

    /// Post-navigation URL left the allowed domain
    #[error("external redirect: {url} -> {final_url}")]
    ExternalRedirect { url: String, final_url: String },

    /// Failed to build or persist the extracted document
    #[error("extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },

    /// Browser session could not be created or torn down
    #[error("browser session error: {0}")]
    Session(String),

    /// Plain HTTP failure (robots.txt, sitemap or document download)
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration failed validation
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CrawlError {
    /// Whether the frontier should re-queue the URL for another attempt.
    ///
    /// Soft blocks share the retry counter and rotation policy with
    /// transport failures; everything else is terminal for the URL.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CrawlError::Timeout { .. }
                | CrawlError::Transport { .. }
                | CrawlError::SoftBlock { .. }
                | CrawlError::Session(_)
        )
    }
}

/// Errors that can occur while loading seed URLs.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Seed file has no column with the exact header `URL`
    #[error("seed file {path} has no 'URL' column")]
    MissingUrlColumn { path: String },

    /// Seed file could not be read or parsed
    #[error("failed to read seed file: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for crawl operations.
pub type CrawlResult<T> = std::result::Result<T, CrawlError>;
