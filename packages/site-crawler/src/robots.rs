//! robots.txt parsing and the per-host policy cache.
//!
//! Each host's robots.txt is fetched at most once per crawl run. In polite
//! mode the scope filter consults the cached policy before every fetch;
//! when robots.txt cannot be retrieved the host is treated as allow-all.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

/// Disallow rules for one host, as seen by our user-agent.
#[derive(Debug, Clone, Default)]
pub struct DomainPolicy {
    /// Disallowed path prefixes from the matching user-agent groups.
    disallowed: Vec<String>,
}

impl DomainPolicy {
    /// Policy with no restrictions.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse robots.txt content, keeping the Disallow directives of every
    /// group that applies to `user_agent` (exact token containment or `*`).
    pub fn parse(content: &str, user_agent: &str) -> Self {
        let agent_lower = user_agent.to_lowercase();
        let mut disallowed = Vec::new();
        // Whether the group currently being read applies to us.
        let mut group_applies = false;
        // A Disallow before any User-agent line applies to nobody.
        let mut in_group_header = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    let token = value.to_lowercase();
                    let matches = token == "*" || agent_lower.contains(&token);
                    if in_group_header {
                        // Consecutive User-agent lines share one rule group.
                        group_applies = group_applies || matches;
                    } else {
                        group_applies = matches;
                        in_group_header = true;
                    }
                }
                "disallow" => {
                    in_group_header = false;
                    if group_applies && !value.is_empty() {
                        disallowed.push(value.to_string());
                    }
                }
                _ => {
                    in_group_header = false;
                }
            }
        }

        Self { disallowed }
    }

    /// Whether the given path may be fetched.
    pub fn is_allowed(&self, path: &str) -> bool {
        !self.disallowed.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Disallowed prefixes, for logging.
    pub fn disallowed(&self) -> &[String] {
        &self.disallowed
    }
}

/// Lazily-populated, process-wide cache of per-host robots.txt policies.
///
/// Shared across workers; the mutex makes the check-then-fetch-then-insert
/// sequence atomic so a host's robots.txt is never fetched twice.
pub struct RobotsCache {
    client: reqwest::Client,
    user_agent: String,
    policies: Mutex<HashMap<String, Arc<DomainPolicy>>>,
}

impl RobotsCache {
    /// Create a cache that identifies itself as `user_agent`.
    pub fn new(user_agent: impl Into<String>) -> Self {
        let user_agent = user_agent.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(user_agent.clone())
            .build()
            .unwrap_or_default();
        Self {
            client,
            user_agent,
            policies: Mutex::new(HashMap::new()),
        }
    }

    /// Policy for the host of `url`, fetching robots.txt on first use.
    pub async fn policy_for(&self, url: &Url) -> Arc<DomainPolicy> {
        let Some(host) = url.host_str() else {
            return Arc::new(DomainPolicy::allow_all());
        };

        let mut policies = self.policies.lock().await;
        if let Some(policy) = policies.get(host) {
            return Arc::clone(policy);
        }

        let policy = Arc::new(self.fetch_policy(url.scheme(), host).await);
        policies.insert(host.to_string(), Arc::clone(&policy));
        policy
    }

    /// Number of hosts with a cached policy.
    pub async fn cached_hosts(&self) -> usize {
        self.policies.lock().await.len()
    }

    async fn fetch_policy(&self, scheme: &str, host: &str) -> DomainPolicy {
        let robots_url = format!("{scheme}://{host}/robots.txt");
        match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(content) => {
                    let policy = DomainPolicy::parse(&content, &self.user_agent);
                    debug!(
                        host = %host,
                        disallow_count = policy.disallowed().len(),
                        "Cached robots.txt policy"
                    );
                    policy
                }
                Err(e) => {
                    warn!(host = %host, error = %e, "Failed to read robots.txt body; allowing all");
                    DomainPolicy::allow_all()
                }
            },
            Ok(response) => {
                debug!(host = %host, status = %response.status(), "No robots.txt; allowing all");
                DomainPolicy::allow_all()
            }
            Err(e) => {
                warn!(host = %host, error = %e, "Failed to fetch robots.txt; allowing all");
                DomainPolicy::allow_all()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wildcard_group() {
        let content = "User-agent: *\nDisallow: /private/\nDisallow: /admin/\n";
        let policy = DomainPolicy::parse(content, "SiteCrawler/1.0");

        assert!(!policy.is_allowed("/private/records"));
        assert!(!policy.is_allowed("/admin/"));
        assert!(policy.is_allowed("/courses/cs101"));
    }

    #[test]
    fn test_parse_specific_agent_group() {
        let content = "User-agent: sitecrawler\nDisallow: /search\n\nUser-agent: otherbot\nDisallow: /\n";
        let policy = DomainPolicy::parse(content, "SiteCrawler/1.0");

        assert!(!policy.is_allowed("/search"));
        // The otherbot group does not apply to us.
        assert!(policy.is_allowed("/anything"));
    }

    #[test]
    fn test_consecutive_agents_share_group() {
        let content = "User-agent: otherbot\nUser-agent: *\nDisallow: /cgi-bin/\n";
        let policy = DomainPolicy::parse(content, "SiteCrawler/1.0");
        assert!(!policy.is_allowed("/cgi-bin/script"));
    }

    #[test]
    fn test_empty_disallow_ignored() {
        let content = "User-agent: *\nDisallow:\n";
        let policy = DomainPolicy::parse(content, "SiteCrawler/1.0");
        assert!(policy.is_allowed("/any/path"));
    }

    #[test]
    fn test_comments_stripped() {
        let content = "User-agent: * # everyone\nDisallow: /tmp/ # scratch\n";
        let policy = DomainPolicy::parse(content, "SiteCrawler/1.0");
        assert!(!policy.is_allowed("/tmp/x"));
    }

    #[test]
    fn test_allow_all_when_empty() {
        let policy = DomainPolicy::parse("", "SiteCrawler/1.0");
        assert!(policy.is_allowed("/"));
    }
}
