//! End-to-end crawl loop tests over a scripted fetcher.

use site_crawler::testing::{MockFetcher, MockOutcome};
use site_crawler::{Crawler, CrawlerConfig};
use url::Url;

fn test_config(dir: &tempfile::TempDir) -> CrawlerConfig {
    CrawlerConfig::new()
        // No network in tests: robots.txt enforcement off.
        .with_polite_mode(false)
        .with_delay_ms(0, 0)
        .with_workers(1)
        .with_output_dirs(
            dir.path().join("texts"),
            dir.path().join("docs"),
            dir.path().join("logs"),
        )
}

fn seed(url: &str) -> Vec<Url> {
    vec![Url::parse(url).unwrap()]
}

async fn run_crawl(config: CrawlerConfig, mock: &MockFetcher, seeds: Vec<Url>) {
    let crawler = Crawler::new(config).unwrap();
    crawler
        .run_with(seeds, |_| {
            let fetcher = mock.clone();
            async move { Ok(fetcher) }
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reachable_pages_visited_exactly_once() {
    let dir = tempfile::tempdir().unwrap();

    // a -> b, c; b -> a (cycle), c; c -> leaf. Duplicate links everywhere.
    let mock = MockFetcher::new()
        .with_page(
            "https://example.edu/a",
            r#"<div><p>Page A</p></div>
               <a href="/b">b</a><a href="/c">c</a><a href="/b#frag">b again</a>"#,
        )
        .with_page(
            "https://example.edu/b",
            r#"<div><p>Page B</p></div><a href="/a">back</a><a href="/c">c</a>"#,
        )
        .with_page(
            "https://example.edu/c",
            r#"<div><p>Page C</p></div><a href="/leaf">leaf</a>"#,
        )
        .with_page("https://example.edu/leaf", "<div><p>Leaf</p></div>");

    run_crawl(test_config(&dir), &mock, seed("https://example.edu/a")).await;

    let mut fetched = mock.fetch_log();
    fetched.sort();
    assert_eq!(
        fetched,
        vec![
            "https://example.edu/a",
            "https://example.edu/b",
            "https://example.edu/c",
            "https://example.edu/leaf",
        ],
        "every reachable URL fetched exactly once"
    );

    for name in [
        "example_edu_a.txt",
        "example_edu_b.txt",
        "example_edu_c.txt",
        "example_edu_leaf.txt",
    ] {
        assert!(
            dir.path().join("texts").join(name).exists(),
            "missing artifact {name}"
        );
    }
}

#[tokio::test]
async fn test_off_domain_links_not_followed() {
    let dir = tempfile::tempdir().unwrap();

    let mock = MockFetcher::new().with_page(
        "https://example.edu/a",
        r#"<div><p>A</p></div>
           <a href="https://other.org/page">external</a>
           <a href="https://twitter.com/example">social</a>
           <a href="https://sub.example.edu/b">subdomain ok</a>"#,
    );

    run_crawl(test_config(&dir), &mock, seed("https://example.edu/a")).await;

    let fetched = mock.fetch_log();
    assert!(fetched.contains(&"https://sub.example.edu/b".to_string()));
    assert!(!fetched.iter().any(|u| u.contains("other.org")));
    assert!(!fetched.iter().any(|u| u.contains("twitter.com")));
}

#[tokio::test]
async fn test_external_redirect_discarded() {
    let dir = tempfile::tempdir().unwrap();

    let mock = MockFetcher::new().with_redirect(
        "https://example.edu/start",
        "https://other.org/landing",
        r#"<div><p>Landing page elsewhere</p></div><a href="https://other.org/more">more</a>"#,
    );

    run_crawl(test_config(&dir), &mock, seed("https://example.edu/start")).await;

    // No artifact saved for either URL, no links followed.
    let texts = std::fs::read_dir(dir.path().join("texts")).unwrap().count();
    assert_eq!(texts, 0);
    assert_eq!(mock.fetch_log().len(), 1);

    let skipped =
        std::fs::read_to_string(dir.path().join("logs").join("skipped_pages.log")).unwrap();
    assert!(skipped.contains("external redirect"));
    assert!(skipped.contains("https://other.org/landing"));
}

#[tokio::test]
async fn test_retry_ceiling_and_single_rotation() {
    let dir = tempfile::tempdir().unwrap();

    let config = test_config(&dir)
        .with_max_retries(4)
        .with_proxy_rotate_threshold(2)
        .with_proxies(["http://p1:80", "http://p2:80"]);

    let mock = MockFetcher::new().with_outcome(
        "https://example.edu/flaky",
        MockOutcome::Timeout,
    );

    run_crawl(config, &mock, seed("https://example.edu/flaky")).await;

    // Attempted exactly max_retries times, then abandoned.
    assert_eq!(mock.fetch_log().len(), 4);

    // Rotated exactly once, on the transition into the second retry,
    // binding to the next proxy in the chain.
    assert_eq!(mock.rotation_log(), vec![Some("http://p2:80".to_string())]);

    let errors = std::fs::read_to_string(dir.path().join("logs").join("errors.log")).unwrap();
    assert!(errors.contains("skipping https://example.edu/flaky after 4 attempts"));
}

#[tokio::test]
async fn test_soft_block_retried_like_transport_failure() {
    let dir = tempfile::tempdir().unwrap();

    let config = test_config(&dir).with_max_retries(3);

    let mock = MockFetcher::new()
        .with_outcome(
            "https://example.edu/guarded",
            MockOutcome::SoftBlock("access denied".into()),
        )
        .with_outcome(
            "https://example.edu/guarded",
            MockOutcome::SoftBlock("access denied".into()),
        )
        .with_page("https://example.edu/guarded", "<div><p>Real content</p></div>");

    run_crawl(config, &mock, seed("https://example.edu/guarded")).await;

    // Two soft blocks consumed, third attempt succeeds and saves.
    assert_eq!(mock.fetch_log().len(), 3);
    assert!(dir
        .path()
        .join("texts")
        .join("example_edu_guarded.txt")
        .exists());
}

#[tokio::test]
async fn test_resumed_crawl_skips_existing_artifact_but_follows_links() {
    let dir = tempfile::tempdir().unwrap();

    let mock = MockFetcher::new()
        .with_page(
            "https://example.edu/hub",
            r#"<div><p>Hub</p></div><a href="/new">new</a>"#,
        )
        .with_page("https://example.edu/new", "<div><p>Fresh page</p></div>");

    // First run saves the hub only.
    let first = MockFetcher::new().with_page("https://example.edu/hub", "<div><p>Hub</p></div>");
    run_crawl(test_config(&dir), &first, seed("https://example.edu/hub")).await;
    assert!(dir.path().join("texts").join("example_edu_hub.txt").exists());

    // Second run re-visits the hub (new visited set), skips the existing
    // artifact but still traverses to the new page.
    run_crawl(test_config(&dir), &mock, seed("https://example.edu/hub")).await;
    assert!(dir.path().join("texts").join("example_edu_new.txt").exists());

    let skipped =
        std::fs::read_to_string(dir.path().join("logs").join("skipped_pages.log")).unwrap();
    assert!(skipped.contains("already scraped: https://example.edu/hub"));
}

#[tokio::test]
async fn test_skip_extension_links_logged_not_fetched() {
    let dir = tempfile::tempdir().unwrap();

    let mock = MockFetcher::new().with_page(
        "https://example.edu/media",
        r#"<div><p>Media</p></div><a href="/clip.mp4">clip</a>"#,
    );

    run_crawl(test_config(&dir), &mock, seed("https://example.edu/media")).await;

    // The mp4 entered the frontier but was rejected at pop time, before
    // any fetch.
    assert_eq!(mock.fetch_log(), vec!["https://example.edu/media".to_string()]);

    let skipped =
        std::fs::read_to_string(dir.path().join("logs").join("skipped_pages.log")).unwrap();
    assert!(skipped.contains("ignored extension: https://example.edu/clip.mp4"));
}

#[tokio::test]
async fn test_seeds_partitioned_across_workers() {
    let dir = tempfile::tempdir().unwrap();

    let config = test_config(&dir).with_workers(2);
    let mock = MockFetcher::new()
        .with_page("https://one.example.edu/", "<div><p>One</p></div>")
        .with_page("https://two.example.edu/", "<div><p>Two</p></div>");

    let crawler = Crawler::new(config).unwrap();
    let report = crawler
        .run_with(
            vec![
                Url::parse("https://one.example.edu/").unwrap(),
                Url::parse("https://two.example.edu/").unwrap(),
            ],
            |_| {
                let fetcher = mock.clone();
                async move { Ok(fetcher) }
            },
        )
        .await
        .unwrap();

    assert_eq!(report.workers.len(), 2);
    assert_eq!(report.pages_saved(), 2);
    assert_eq!(mock.fetch_log().len(), 2);
}
