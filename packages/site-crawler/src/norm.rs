//! URL normalization.
//!
//! Canonicalizes discovered hrefs so that equivalent URLs collapse to one
//! frontier entry: relative references are resolved against the page they
//! were found on and fragments are stripped.

use url::Url;

use crate::error::CrawlError;

/// Schemes that can never be fetched; dropped silently by callers.
const NON_FETCHABLE_PREFIXES: &[&str] = &["mailto:", "javascript:", "tel:", "data:"];

/// Resolve an href found on `base` into an absolute, fragment-free URL.
///
/// Returns `CrawlError::NotCrawlable` for empty hrefs, non-fetchable
/// schemes and anything the URL parser rejects.
pub fn normalize(href: &str, base: &Url) -> Result<Url, CrawlError> {
    let href = href.trim();
    if href.is_empty() || href == "#" {
        return Err(CrawlError::NotCrawlable { href: href.into() });
    }

    let lower = href.to_ascii_lowercase();
    if NON_FETCHABLE_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return Err(CrawlError::NotCrawlable { href: href.into() });
    }

    let mut resolved = base.join(href).map_err(|_| CrawlError::NotCrawlable {
        href: href.into(),
    })?;
    resolved.set_fragment(None);

    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return Err(CrawlError::NotCrawlable { href: href.into() });
    }
    Ok(resolved)
}

/// Normalize an already-absolute URL string (seed input).
pub fn normalize_absolute(url: &str) -> Result<Url, CrawlError> {
    let mut parsed = Url::parse(url.trim()).map_err(|_| CrawlError::NotCrawlable {
        href: url.into(),
    })?;
    parsed.set_fragment(None);
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(CrawlError::NotCrawlable { href: url.into() });
    }
    Ok(parsed)
}
