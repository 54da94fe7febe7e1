use futures::StreamExt;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::StatusCode;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::cache::{FeedInfo, FeedInfoCache};
use super::types::FeedUrl;

/// Connect and read timeout applied when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors from a single feed download.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// No complete response within the configured bound
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the configured size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Used as connect timeout, read timeout and overall request bound
    pub timeout: Duration,
    pub max_feed_size: usize,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_feed_size: DEFAULT_MAX_FEED_SIZE,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
                .to_string(),
        }
    }
}

/// Downloads the raw bytes of one feed.
///
/// Implementations are shared between concurrently running fetch tasks, so
/// they must be `Send + Sync`. Failures are returned, never panicked.
pub trait FeedTransport: Send + Sync + 'static {
    fn fetch(&self, url: &FeedUrl) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// HTTP implementation of [`FeedTransport`] built on `reqwest`.
///
/// Every request is bounded by [`TransportConfig::timeout`]: reqwest's
/// connect and read timeouts catch dead hosts and stalled sockets, and an
/// outer `tokio::time::timeout` catches servers that trickle bytes forever.
///
/// When a [`FeedInfoCache`] is attached the transport performs conditional
/// GETs and answers `304 Not Modified` with the cached body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: TransportConfig,
    cache: Option<Arc<FeedInfoCache>>,
}

impl HttpTransport {
    /// Builds a transport with its own HTTP client configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] if the TLS backend or resolver cannot
    /// be initialized.
    pub fn new(
        config: TransportConfig,
        cache: Option<Arc<FeedInfoCache>>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            config,
            cache,
        })
    }

    async fn download(&self, url: &FeedUrl) -> Result<Vec<u8>, FetchError> {
        let cached = self.cache.as_ref().and_then(|cache| cache.get(url));

        let mut request = self.client.get(url.as_str());
        if let Some(info) = &cached {
            if let Some(etag) = &info.etag {
                request = request.header(IF_NONE_MATCH, etag.as_str());
            }
            if let Some(last_modified) = &info.last_modified {
                request = request.header(IF_MODIFIED_SINCE, last_modified.as_str());
            }
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            return match cached {
                Some(info) => {
                    tracing::debug!(feed = %url, "Feed not modified, using cached body");
                    Ok(info.body.to_vec())
                }
                // We never sent validators, so a 304 here is a server bug
                None => Err(FetchError::HttpStatus(status.as_u16())),
            };
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let etag = header_string(&response, ETAG);
        let last_modified = header_string(&response, LAST_MODIFIED);

        let bytes = self.read_limited_bytes(response).await?;

        if let Some(cache) = &self.cache {
            let info = FeedInfo {
                etag,
                last_modified,
                body: Arc::from(bytes.as_slice()),
            };
            if info.has_validators() {
                cache.put(url.clone(), info);
            }
        }

        Ok(bytes)
    }

    async fn read_limited_bytes(
        &self,
        response: reqwest::Response,
    ) -> Result<Vec<u8>, FetchError> {
        let limit = self.config.max_feed_size;
        let expected_length = response.content_length();

        // Fast path: check Content-Length header
        if let Some(len) = expected_length {
            if len > limit as u64 {
                return Err(FetchError::ResponseTooLarge(limit));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                // hyper reports a body cut short of Content-Length as a body error
                Err(e) if !e.is_timeout() && (e.is_body() || e.is_decode()) => {
                    return Err(match expected_length {
                        Some(expected) => FetchError::IncompleteResponse {
                            expected,
                            received: bytes.len(),
                        },
                        None => FetchError::Network(e),
                    });
                }
                Err(e) => return Err(self.classify(e)),
            };
            if bytes.len().saturating_add(chunk.len()) > limit {
                return Err(FetchError::ResponseTooLarge(limit));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(bytes)
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.config.timeout)
        } else {
            FetchError::Network(err)
        }
    }
}

impl FeedTransport for HttpTransport {
    async fn fetch(&self, url: &FeedUrl) -> Result<Vec<u8>, FetchError> {
        let bound = self.config.timeout;
        tokio::time::timeout(bound, self.download(url))
            .await
            .map_err(|_| FetchError::Timeout(bound))?
    }
}

fn header_string(
    response: &reqwest::Response,
    name: reqwest::header::HeaderName,
) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}
