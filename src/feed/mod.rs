//! Feed downloading, parsing and concurrent collection.
//!
//! - [`transport`] - one bounded HTTP GET per feed, with optional conditional GET
//! - [`cache`] - shared ETag / Last-Modified bookkeeping for the transport
//! - [`parser`] - RSS/Atom to [`Article`] conversion using `feed-rs`
//! - [`fetcher`] - fan-out over many feeds with per-feed failure isolation
//! - [`sink`] - where failed feeds are reported
//! - [`opml`] - reading feed lists from OPML exports
//!
//! # Example
//!
//! ```ignore
//! use feedfan::feed::{ArticleFetcher, FeedUrl, TransportConfig};
//! use feedfan::filter::FilterChain;
//!
//! let fetcher = ArticleFetcher::http(TransportConfig::default(), 256)?;
//! let urls = vec![FeedUrl::parse("https://example.com/rss")?];
//! let articles = fetcher.collect(&urls, &FilterChain::new()).await?;
//! ```

pub mod cache;
pub mod fetcher;
pub mod opml;
pub mod parser;
pub mod sink;
pub mod transport;
mod types;

pub use cache::{FeedInfo, FeedInfoCache, DEFAULT_CACHE_CAPACITY};
pub use fetcher::{ArticleFetcher, CollectError, CollectReport, FeedError, FeedOutcome, FeedStage};
pub use opml::{OpmlError, OpmlFeed};
pub use parser::{parse_feed, ParseError};
pub use sink::{FailureSink, TracingSink};
pub use transport::{
    FeedTransport, FetchError, HttpTransport, TransportConfig, DEFAULT_MAX_FEED_SIZE,
    DEFAULT_TIMEOUT,
};
pub use types::{Article, FeedUrl, UrlError};
