use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Errors produced when a string cannot be used as a feed locator.
#[derive(Debug, Error)]
pub enum UrlError {
    /// The string could not be parsed as a URL.
    #[error("Invalid URL: {0}")]
    Invalid(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Immutable locator of one feed source.
///
/// Identity is the normalized URL string, so two `FeedUrl`s built from the
/// same text compare equal. Cloning only bumps a reference count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedUrl(Arc<str>);

impl FeedUrl {
    /// Parses and normalizes a feed URL. Only `http` and `https` are accepted.
    ///
    /// ```
    /// use feedfan::feed::FeedUrl;
    ///
    /// let url = FeedUrl::parse("https://example.com/feed.xml").unwrap();
    /// assert_eq!(url.as_str(), "https://example.com/feed.xml");
    ///
    /// assert!(FeedUrl::parse("ftp://example.com/feed.xml").is_err());
    /// assert!(FeedUrl::parse("not a url").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let url = Url::parse(input.trim())?;
        match url.scheme() {
            "http" | "https" => Ok(Self(Arc::from(url.as_str()))),
            scheme => Err(UrlError::UnsupportedScheme(scheme.to_owned())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FeedUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for FeedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for FeedUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// One entry extracted from a feed.
///
/// Articles are produced by the parser and never modified afterwards; the
/// fetcher only moves them between collections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    /// Entry id from the feed, or a content hash when the feed has none
    pub guid: String,
    pub title: String,
    /// Summary, falling back to the entry body
    pub summary: Option<String>,
    /// Publication link
    pub link: Option<String>,
    /// Publication time, falling back to the last update time
    pub published: Option<DateTime<Utc>>,
    /// Feed this article was downloaded from
    pub feed: FeedUrl,
    /// Channel title of the source feed, when it declares one
    pub feed_title: Option<String>,
}
