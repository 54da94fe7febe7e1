use super::fetcher::FeedError;
use super::types::FeedUrl;

/// Receives every feed failure of a batch, exactly once per failed task.
///
/// Called from the collecting future, so implementations should return
/// quickly and must not block on the batch finishing.
pub trait FailureSink: Send + Sync {
    fn report(&self, url: &FeedUrl, cause: &FeedError);
}

/// Default sink: a structured `warn!` event per failed feed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl FailureSink for TracingSink {
    fn report(&self, url: &FeedUrl, cause: &FeedError) {
        tracing::warn!(
            feed = %url,
            error = %cause,
            "Feed failed, skipping its articles"
        );
    }
}
