//! Concurrent feed collection.
//!
//! [`ArticleFetcher`] downloads every requested feed in its own tokio task,
//! parses and filters each one independently, and merges what survives into
//! a single shuffled list. A feed that fails (network, HTTP status, bad
//! payload, even a panic) is reported to the [`FailureSink`] and simply
//! contributes nothing; it never fails the batch.
//!
//! ```ignore
//! let fetcher = ArticleFetcher::http(TransportConfig::default(), 256)?;
//! let urls = vec![FeedUrl::parse("https://example.com/feed.xml")?];
//! let chain = FilterChain::new().with(RequireLink);
//! let articles = fetcher.collect(&urls, &chain).await?;
//! ```
use futures::FutureExt;
use rand::seq::SliceRandom;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

use super::cache::FeedInfoCache;
use super::parser::{parse_feed, ParseError};
use super::sink::{FailureSink, TracingSink};
use super::transport::{FeedTransport, FetchError, HttpTransport, TransportConfig};
use super::types::{Article, FeedUrl};
use crate::filter::FilterChain;

/// Why one feed produced no articles.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Transport(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The task panicked (transport, parser or a filter); the message is
    /// the panic payload when it was a string.
    #[error("Feed task panicked: {0}")]
    Panicked(String),
}

/// Failure of a whole batch. Feed failures never surface here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectError {
    #[error("Feed collection was cancelled")]
    Cancelled,
}

/// Lifecycle of one feed task.
///
/// `Pending → Fetching → (Parsing → Filtering → Succeeded) | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStage {
    Pending,
    Fetching,
    Parsing,
    Filtering,
    Succeeded,
    Failed,
}

impl fmt::Display for FeedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeedStage::Pending => "pending",
            FeedStage::Fetching => "fetching",
            FeedStage::Parsing => "parsing",
            FeedStage::Filtering => "filtering",
            FeedStage::Succeeded => "succeeded",
            FeedStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a feed task hands back to the collector, exactly once.
#[derive(Debug)]
pub struct FeedOutcome {
    pub url: FeedUrl,
    /// Accepted articles, or the reason the feed was dropped
    pub result: Result<Vec<Article>, FeedError>,
}

impl FeedOutcome {
    /// Terminal stage of the task.
    pub fn stage(&self) -> FeedStage {
        match self.result {
            Ok(_) => FeedStage::Succeeded,
            Err(_) => FeedStage::Failed,
        }
    }
}

/// Result of a batch with per-feed bookkeeping.
#[derive(Debug, Default)]
pub struct CollectReport {
    /// Accepted articles from every successful feed, shuffled
    pub articles: Vec<Article>,
    /// Number of feed tasks that succeeded
    pub succeeded: usize,
    /// Failed feeds with a printable cause, in completion order
    pub failures: Vec<(FeedUrl, String)>,
}

/// Downloads feeds concurrently and merges their filtered articles.
///
/// Each call builds its own [`JoinSet`] with one task per URL, so the degree
/// of parallelism equals the batch size and nothing outlives the call. The
/// transport and sink are shared by reference count between calls.
pub struct ArticleFetcher<T = HttpTransport> {
    transport: Arc<T>,
    sink: Arc<dyn FailureSink>,
}

impl ArticleFetcher<HttpTransport> {
    /// Production fetcher over HTTP with its own feed-metadata cache holding
    /// `cache_capacity` feeds. A capacity of 0 disables conditional GETs.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] if the HTTP client cannot be built.
    pub fn http(config: TransportConfig, cache_capacity: usize) -> Result<Self, FetchError> {
        let cache = (cache_capacity > 0).then(|| Arc::new(FeedInfoCache::new(cache_capacity)));
        Ok(Self::new(HttpTransport::new(config, cache)?))
    }
}

impl<T: FeedTransport> ArticleFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    pub fn from_shared(transport: Arc<T>) -> Self {
        Self {
            transport,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replaces the default [`TracingSink`].
    pub fn with_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Downloads `urls` in parallel and returns every article accepted by
    /// `filters`, in random order.
    ///
    /// Duplicate URLs are fetched independently. Failed feeds are reported
    /// to the sink and skipped; if every feed fails the result is empty.
    ///
    /// # Errors
    ///
    /// [`CollectError::Cancelled`] only if the runtime aborted the feed tasks.
    pub async fn collect(
        &self,
        urls: &[FeedUrl],
        filters: &FilterChain,
    ) -> Result<Vec<Article>, CollectError> {
        self.collect_until(urls, filters, std::future::pending::<()>())
            .await
    }

    /// Like [`collect`](Self::collect), but gives up as soon as `cancel`
    /// completes: outstanding tasks are aborted and awaited before
    /// [`CollectError::Cancelled`] is returned.
    pub async fn collect_until<C>(
        &self,
        urls: &[FeedUrl],
        filters: &FilterChain,
        cancel: C,
    ) -> Result<Vec<Article>, CollectError>
    where
        C: Future<Output = ()>,
    {
        self.collect_report(urls, filters, cancel)
            .await
            .map(|report| report.articles)
    }

    /// Full batch operation behind [`collect`](Self::collect) and
    /// [`collect_until`](Self::collect_until), also returning per-feed
    /// success and failure counts.
    pub async fn collect_report<C>(
        &self,
        urls: &[FeedUrl],
        filters: &FilterChain,
        cancel: C,
    ) -> Result<CollectReport, CollectError>
    where
        C: Future<Output = ()>,
    {
        let mut report = CollectReport::default();
        if urls.is_empty() {
            tracing::debug!("No feeds requested");
            return Ok(report);
        }

        // Dropping the set (e.g. when this future is dropped) aborts every task
        let mut tasks = JoinSet::new();
        for url in urls {
            let transport = Arc::clone(&self.transport);
            let filters = filters.clone();
            let url = url.clone();
            tasks.spawn(async move {
                let result = AssertUnwindSafe(fetch_feed(transport.as_ref(), &url, &filters))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        Err(FeedError::Panicked(panic_message(payload.as_ref())))
                    });
                FeedOutcome { url, result }
            });
        }
        tracing::debug!(feeds = urls.len(), "Spawned feed tasks");

        tokio::pin!(cancel);
        loop {
            tokio::select! {
                () = &mut cancel => {
                    let pending = tasks.len();
                    tasks.shutdown().await;
                    tracing::warn!(pending = pending, "Feed collection cancelled");
                    return Err(CollectError::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok(outcome)) => self.merge(outcome, &mut report),
                    Some(Err(err)) => {
                        // Panics are caught inside the task, so this is an abort
                        tracing::warn!(error = %err, "Feed task aborted, cancelling collection");
                        tasks.shutdown().await;
                        return Err(CollectError::Cancelled);
                    }
                    None => break,
                },
            }
        }

        report.articles.shuffle(&mut rand::rng());
        tracing::info!(
            articles = report.articles.len(),
            feeds = urls.len(),
            failed = report.failures.len(),
            "Downloaded articles"
        );
        Ok(report)
    }

    fn merge(&self, outcome: FeedOutcome, report: &mut CollectReport) {
        match outcome.result {
            Ok(articles) => {
                tracing::debug!(
                    feed = %outcome.url,
                    stage = %FeedStage::Succeeded,
                    accepted = articles.len(),
                    "Feed collected"
                );
                report.succeeded += 1;
                report.articles.extend(articles);
            }
            Err(cause) => {
                self.sink.report(&outcome.url, &cause);
                report.failures.push((outcome.url, cause.to_string()));
            }
        }
    }
}

impl<T> Clone for ArticleFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ArticleFetcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArticleFetcher")
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

/// Body of one feed task: fetch, parse, filter.
async fn fetch_feed<T: FeedTransport>(
    transport: &T,
    url: &FeedUrl,
    filters: &FilterChain,
) -> Result<Vec<Article>, FeedError> {
    tracing::trace!(feed = %url, stage = %FeedStage::Fetching, "Feed task started");
    let bytes = transport.fetch(url).await?;

    tracing::trace!(feed = %url, stage = %FeedStage::Parsing, bytes = bytes.len());
    let articles = parse_feed(&bytes, url)?;

    let parsed = articles.len();
    tracing::trace!(feed = %url, stage = %FeedStage::Filtering, parsed = parsed);
    let accepted: Vec<Article> = articles
        .into_iter()
        .filter(|article| filters.accepts(article))
        .collect();

    if accepted.len() < parsed {
        tracing::debug!(
            feed = %url,
            parsed = parsed,
            rejected = parsed - accepted.len(),
            "Articles rejected by filters"
        );
    }
    Ok(accepted)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
