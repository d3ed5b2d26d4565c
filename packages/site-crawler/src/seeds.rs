//! Seed loading: CSV files and sitemap expansion.

use regex::Regex;
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::error::{CrawlError, CrawlResult, SeedError};
use crate::norm;

/// Load seed URLs from a CSV file with a column whose header is exactly
/// `URL`. Blank cells and malformed URLs are dropped with a warning.
pub fn load_seed_file(path: impl AsRef<Path>) -> Result<Vec<Url>, SeedError> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;

    let url_column = reader
        .headers()?
        .iter()
        .position(|header| header == "URL")
        .ok_or_else(|| SeedError::MissingUrlColumn {
            path: path.display().to_string(),
        })?;

    let mut seeds = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(raw) = record.get(url_column) else {
            continue;
        };
        if raw.trim().is_empty() {
            continue;
        }
        match norm::normalize_absolute(raw) {
            Ok(url) => seeds.push(url),
            Err(_) => warn!(raw = %raw, "Skipping malformed seed URL"),
        }
    }
    Ok(seeds)
}

/// Expand sitemap seeds: a seed whose path ends in `.xml` is fetched over
/// plain HTTP and replaced by its `<loc>` entries. Sitemap indexes expand
/// one level deep; everything else passes through unchanged.
pub async fn expand_sitemaps(seeds: Vec<Url>, user_agent: &str) -> Vec<Url> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .user_agent(user_agent.to_string())
        .build()
        .unwrap_or_default();

    let mut expanded = Vec::new();
    for seed in seeds {
        if !is_sitemap(&seed) {
            expanded.push(seed);
            continue;
        }

        match fetch_locs(&client, &seed).await {
            Ok(entries) => {
                for entry in entries {
                    if is_sitemap(&entry) {
                        // One level of sitemap-index nesting.
                        match fetch_locs(&client, &entry).await {
                            Ok(nested) => {
                                expanded.extend(nested.into_iter().filter(|u| !is_sitemap(u)))
                            }
                            Err(e) => warn!(sitemap = %entry, error = %e, "Failed nested sitemap"),
                        }
                    } else {
                        expanded.push(entry);
                    }
                }
            }
            Err(e) => warn!(sitemap = %seed, error = %e, "Failed to expand sitemap"),
        }
    }
    expanded
}

fn is_sitemap(url: &Url) -> bool {
    url.path().to_lowercase().ends_with(".xml")
}

async fn fetch_locs(client: &reqwest::Client, url: &Url) -> CrawlResult<Vec<Url>> {
    let body = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| CrawlError::Http(Box::new(e)))?
        .error_for_status()
        .map_err(|e| CrawlError::Http(Box::new(e)))?
        .text()
        .await
        .map_err(|e| CrawlError::Http(Box::new(e)))?;

    Ok(parse_locs(&body))
}

fn parse_locs(body: &str) -> Vec<Url> {
    let loc_pattern = Regex::new(r"<loc>\s*([^<]+?)\s*</loc>").unwrap();
    loc_pattern
        .captures_iter(body)
        .filter_map(|cap| norm::normalize_absolute(cap.get(1)?.as_str()).ok())
        .collect()
}
