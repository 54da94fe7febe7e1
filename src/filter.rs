//! Article acceptance filters.
//!
//! A filter is any `Send + Sync` predicate over [`Article`]. Filters are shared
//! between all fetch tasks of a batch and may be called from several threads
//! at once, so stateful filters must synchronize internally.
//!
//! Filters are combined with [`FilterChain`]: an article survives only if
//! every filter in the chain accepts it.
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;

use crate::feed::Article;

/// Decides whether an article is kept.
pub trait ArticleFilter: Send + Sync {
    fn accepts(&self, article: &Article) -> bool;
}

impl<F> ArticleFilter for F
where
    F: Fn(&Article) -> bool + Send + Sync,
{
    fn accepts(&self, article: &Article) -> bool {
        self(article)
    }
}

/// Ordered AND-combination of filters.
///
/// Filters run in insertion order and evaluation stops at the first
/// rejection. An empty chain accepts every article. Cloning is cheap; the
/// fetcher hands one clone to each feed task.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Arc<Vec<Arc<dyn ArticleFilter>>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a filter to the end of the chain.
    ///
    /// ```
    /// use feedfan::filter::{FilterChain, RequireLink};
    ///
    /// let chain = FilterChain::new()
    ///     .with(RequireLink)
    ///     .with(|a: &feedfan::feed::Article| !a.title.is_empty());
    /// assert_eq!(chain.len(), 2);
    /// ```
    pub fn with(self, filter: impl ArticleFilter + 'static) -> Self {
        self.with_shared(Arc::new(filter))
    }

    pub fn with_shared(mut self, filter: Arc<dyn ArticleFilter>) -> Self {
        Arc::make_mut(&mut self.filters).push(filter);
        self
    }

    pub fn accepts(&self, article: &Article) -> bool {
        self.filters.iter().all(|f| f.accepts(article))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl FromIterator<Arc<dyn ArticleFilter>> for FilterChain {
    fn from_iter<I: IntoIterator<Item = Arc<dyn ArticleFilter>>>(iter: I) -> Self {
        Self {
            filters: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.len())
            .finish()
    }
}

// ============================================================================
// Built-in Filters
// ============================================================================

/// Keeps articles published at or after a cutoff.
///
/// Undated articles are rejected: there is no way to tell whether they are
/// recent.
#[derive(Debug, Clone, Copy)]
pub struct PublishedSince {
    cutoff: DateTime<Utc>,
}

impl PublishedSince {
    pub fn new(cutoff: DateTime<Utc>) -> Self {
        Self { cutoff }
    }

    /// Cutoff `max_age` before now. The cutoff is fixed at construction so
    /// every feed in a batch is judged against the same instant.
    pub fn max_age(max_age: Duration) -> Self {
        let now = Utc::now();
        Self::new(now.checked_sub_signed(max_age).unwrap_or(DateTime::<Utc>::MIN_UTC))
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }
}

impl ArticleFilter for PublishedSince {
    fn accepts(&self, article: &Article) -> bool {
        article.published.is_some_and(|p| p >= self.cutoff)
    }
}

/// Keeps articles that carry a non-empty link.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireLink;

impl ArticleFilter for RequireLink {
    fn accepts(&self, article: &Article) -> bool {
        article.link.as_deref().is_some_and(|l| !l.trim().is_empty())
    }
}

/// Rejects articles whose title or summary mentions any of the given terms
/// (case-insensitive substring match).
#[derive(Debug, Clone)]
pub struct ExcludeTerms {
    terms: Vec<String>,
}

impl ExcludeTerms {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }
}

impl ArticleFilter for ExcludeTerms {
    fn accepts(&self, article: &Article) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        let title = article.title.to_lowercase();
        let summary = article
            .summary
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default();
        !self
            .terms
            .iter()
            .any(|t| title.contains(t.as_str()) || summary.contains(t.as_str()))
    }
}

/// Keeps articles whose trimmed title has at least this many characters.
#[derive(Debug, Clone, Copy)]
pub struct MinTitleChars(pub usize);

impl ArticleFilter for MinTitleChars {
    fn accepts(&self, article: &Article) -> bool {
        article.title.trim().chars().count() >= self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedUrl;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn article(title: &str) -> Article {
        Article {
            guid: title.to_string(),
            title: title.to_string(),
            summary: Some("A summary about things".to_string()),
            link: Some(format!("https://example.com/{title}")),
            published: Some(DateTime::from_timestamp(1_700_000_000, 0).unwrap()),
            feed: FeedUrl::parse("https://example.com/feed").unwrap(),
            feed_title: None,
        }
    }

    #[test]
    fn test_empty_chain_accepts_everything() {
        let chain = FilterChain::new();
        assert!(chain.is_empty());
        assert!(chain.accepts(&article("anything")));
    }

    #[test]
    fn test_chain_is_logical_and() {
        let chain = FilterChain::new()
            .with(|a: &Article| a.title.starts_with('a'))
            .with(|a: &Article| a.title.ends_with('z'));

        assert!(chain.accepts(&article("abcz")));
        assert!(!chain.accepts(&article("abc")));
        assert!(!chain.accepts(&article("bcz")));
    }

    #[test]
    fn test_chain_stops_at_first_rejection() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let chain = FilterChain::new()
            .with(|_: &Article| false)
            .with(move |_: &Article| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            });

        assert!(!chain.accepts(&article("x")));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clone_shares_filters() {
        let chain = FilterChain::new().with(RequireLink);
        let extended = chain.clone().with(MinTitleChars(3));
        assert_eq!(chain.len(), 1);
        assert_eq!(extended.len(), 2);
    }

    #[test]
    fn test_published_since() {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let filter = PublishedSince::new(at);
        assert!(filter.accepts(&article("on the cutoff")));

        let later = PublishedSince::new(at + Duration::seconds(1));
        assert!(!later.accepts(&article("too old")));

        let mut undated = article("undated");
        undated.published = None;
        assert!(!filter.accepts(&undated));
    }

    #[test]
    fn test_max_age_cutoff_in_past() {
        let filter = PublishedSince::max_age(Duration::hours(24));
        assert!(filter.cutoff() < Utc::now());
        assert!(!filter.accepts(&article("from 2023")));
    }

    #[test]
    fn test_require_link() {
        let mut a = article("linked");
        assert!(RequireLink.accepts(&a));
        a.link = Some("  ".to_string());
        assert!(!RequireLink.accepts(&a));
        a.link = None;
        assert!(!RequireLink.accepts(&a));
    }

    #[test]
    fn test_exclude_terms_case_insensitive() {
        let filter = ExcludeTerms::new(["Sponsored", "  "]);
        assert!(!filter.accepts(&article("SPONSORED: buy now")));
        assert!(filter.accepts(&article("Real news")));

        let mut in_summary = article("Plain title");
        in_summary.summary = Some("this post is sponsored".to_string());
        assert!(!filter.accepts(&in_summary));

        assert!(ExcludeTerms::new(Vec::<String>::new()).accepts(&article("x")));
    }

    #[test]
    fn test_min_title_chars() {
        assert!(MinTitleChars(3).accepts(&article("abc")));
        assert!(!MinTitleChars(4).accepts(&article(" abc ")));
    }

    proptest! {
        #[test]
        fn prop_chain_matches_every_filter(flags in proptest::collection::vec(any::<bool>(), 0..8)) {
            let chain: FilterChain = flags
                .iter()
                .map(|&keep| Arc::new(move |_: &Article| keep) as Arc<dyn ArticleFilter>)
                .collect();
            let expected = flags.iter().all(|&keep| keep);
            prop_assert_eq!(chain.accepts(&article("p")), expected);
        }

        #[test]
        fn prop_accept_all_filters_are_noops(extra in 0usize..6, title in "[a-z]{1,12}") {
            let mut chain = FilterChain::new();
            for _ in 0..extra {
                chain = chain.with(|_: &Article| true);
            }
            prop_assert!(chain.accepts(&article(&title)));
        }
    }
}
