use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use feedfan::config::Config;
use feedfan::feed::{self, Article, ArticleFetcher, CollectError, CollectReport, FeedUrl};
use feedfan::util::{strip_control_chars, truncate_to_width};

/// Display width reserved for titles in plain output.
const TITLE_WIDTH: usize = 80;

/// Conventional exit status for a process stopped by SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "feedfan",
    version,
    about = "Fetch many RSS/Atom feeds at once and print their articles"
)]
struct Args {
    /// Feed URLs to fetch, after those from the config file and OPML
    #[arg(value_name = "URL")]
    urls: Vec<String>,

    /// Read additional feeds from an OPML file
    #[arg(long, value_name = "FILE")]
    opml: Option<PathBuf>,

    /// Config file (default: ~/.config/feedfan/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Per-feed timeout in seconds, overriding the config file
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Print one JSON object per article instead of plain lines
    #[arg(long)]
    json: bool,

    /// Print at most N articles
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            tracing::debug!("HOME not set, using default configuration");
            Config::default()
        }
    };
    if let Some(secs) = args.timeout {
        config.timeout_secs = secs;
    }

    let urls = gather_urls(&args, &config).await?;
    if urls.is_empty() {
        eprintln!("No feeds given.");
        eprintln!();
        eprintln!("Pass feed URLs as arguments, use --opml FILE, or list them under");
        eprintln!("`feeds` in ~/.config/feedfan/config.toml.");
        return Ok(ExitCode::FAILURE);
    }

    let fetcher = ArticleFetcher::http(config.transport_config(), config.cache_capacity)
        .context("Failed to build HTTP client")?;
    let filters = config.filter_chain();

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C, batch cannot be interrupted");
            std::future::pending::<()>().await;
        }
    };

    let report = match fetcher.collect_report(&urls, &filters, interrupted).await {
        Ok(report) => report,
        Err(CollectError::Cancelled) => {
            eprintln!("Interrupted.");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    print_report(&report, args.json, args.limit)?;
    Ok(ExitCode::SUCCESS)
}

/// Config feeds, then OPML feeds, then command-line URLs. Duplicates are kept.
async fn gather_urls(args: &Args, config: &Config) -> Result<Vec<FeedUrl>> {
    let mut urls = config.feed_urls()?;

    if let Some(path) = &args.opml {
        let listed = feed::opml::parse(path)
            .await
            .with_context(|| format!("Failed to read OPML file {}", path.display()))?;
        if listed.is_empty() {
            eprintln!("Warning: No valid feeds found in {}", path.display());
        }
        urls.extend(listed.into_iter().map(|f| f.url));
    }

    for raw in &args.urls {
        let url = FeedUrl::parse(raw).with_context(|| format!("Invalid feed URL '{raw}'"))?;
        urls.push(url);
    }

    Ok(urls)
}

fn print_report(report: &CollectReport, json: bool, limit: Option<usize>) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let shown = limit.unwrap_or(usize::MAX);

    for article in report.articles.iter().take(shown) {
        if json {
            serde_json::to_writer(&mut out, article)?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", plain_line(article))?;
        }
    }
    out.flush()?;

    for (url, cause) in &report.failures {
        eprintln!("failed: {} ({})", url, strip_control_chars(cause));
    }
    if !report.failures.is_empty() {
        eprintln!(
            "{} of {} feeds failed",
            report.failures.len(),
            report.failures.len() + report.succeeded
        );
    }
    Ok(())
}

fn plain_line(article: &Article) -> String {
    let title = strip_control_chars(&article.title);
    let title = truncate_to_width(&title, TITLE_WIDTH);
    match &article.link {
        Some(link) => format!("{}  {}", title, strip_control_chars(link)),
        None => title.into_owned(),
    }
}
