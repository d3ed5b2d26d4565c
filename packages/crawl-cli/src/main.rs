// Crawl entry point: seeds in, text/document artifacts out.

use anyhow::{Context, Result};
use clap::Parser;
use site_crawler::{seeds, Crawler, CrawlerConfig, DedupMode, SessionPolicy};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Crawl university sites into text artifacts for the embedding pipeline.
#[derive(Debug, Parser)]
#[command(name = "crawl", version, about)]
struct Args {
    /// CSV file with a `URL` column of seed pages (sitemap URLs allowed)
    seed_file: PathBuf,

    /// Restrict the crawl to one domain; defaults to each seed's host
    #[arg(long)]
    domain: Option<String>,

    /// Number of crawl workers; seeds are partitioned across them
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Directory for extracted text artifacts
    #[arg(long, default_value = "data/scraped_texts")]
    text_dir: PathBuf,

    /// Directory for downloaded documents
    #[arg(long, default_value = "data/scraped_docs")]
    document_dir: PathBuf,

    /// Directory for the error and skipped logs
    #[arg(long, default_value = "data/logs")]
    log_dir: PathBuf,

    /// Ignore robots.txt (polite mode is the default)
    #[arg(long)]
    ignore_robots: bool,

    /// Total attempts per URL before it is abandoned
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Attempt count at which the session/proxy rotates
    #[arg(long, default_value_t = 2)]
    rotate_threshold: u32,

    /// Minimum post-load delay in milliseconds
    #[arg(long, default_value_t = 1000)]
    min_delay_ms: u64,

    /// Maximum post-load delay in milliseconds
    #[arg(long, default_value_t = 3000)]
    max_delay_ms: u64,

    /// Page load timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Keep one browser session alive instead of restarting per page
    #[arg(long)]
    persistent_session: bool,

    /// Use flat heading/paragraph extraction instead of container dedup
    #[arg(long)]
    flat_extraction: bool,

    /// Proxy server to rotate through; repeatable, order matters
    #[arg(long = "proxy")]
    proxies: Vec<String>,

    /// URL substring to skip; repeatable
    #[arg(long = "deny-keyword")]
    deny_keywords: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,site_crawler=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = CrawlerConfig::new()
        .with_workers(args.workers)
        .with_max_retries(args.max_retries)
        .with_proxy_rotate_threshold(args.rotate_threshold)
        .with_delay_ms(args.min_delay_ms, args.max_delay_ms)
        .with_page_load_timeout_secs(args.timeout_secs)
        .with_polite_mode(!args.ignore_robots)
        .with_proxies(args.proxies)
        .with_path_deny_keywords(args.deny_keywords)
        .with_output_dirs(args.text_dir, args.document_dir, args.log_dir);
    if let Some(domain) = args.domain {
        config = config.with_allowed_domain(domain);
    }
    if args.persistent_session {
        config = config.with_session_policy(SessionPolicy::Persistent);
    }
    if args.flat_extraction {
        config = config.with_dedup_mode(DedupMode::Flat);
    }

    let seed_urls = seeds::load_seed_file(&args.seed_file)
        .with_context(|| format!("failed to load seeds from {}", args.seed_file.display()))?;
    anyhow::ensure!(
        !seed_urls.is_empty(),
        "no seed URLs found in {}",
        args.seed_file.display()
    );
    tracing::info!(count = seed_urls.len(), "Loaded seed URLs");

    let seed_urls = seeds::expand_sitemaps(seed_urls, &config.robots_user_agent).await;
    tracing::info!(count = seed_urls.len(), "Seeds after sitemap expansion");

    let crawler = Crawler::new(config).context("invalid crawl configuration")?;
    let report = crawler.run(seed_urls).await.context("crawl run failed")?;

    // Individual URL failures live in the logs; a finished loop is a
    // successful run.
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
