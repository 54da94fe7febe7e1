use feed_rs::parser;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::types::{Article, FeedUrl};
use crate::util::sanitize_title;

/// The payload was not a recognizable RSS or Atom document.
#[derive(Debug, Error)]
#[error("Parse error: {0}")]
pub struct ParseError(String);

impl From<parser::ParseFeedError> for ParseError {
    fn from(err: parser::ParseFeedError) -> Self {
        Self(err.to_string())
    }
}

/// Parses RSS/Atom bytes into articles attributed to `source`.
pub fn parse_feed(bytes: &[u8], source: &FeedUrl) -> Result<Vec<Article>, ParseError> {
    let feed = parser::parse(bytes)?;
    let feed_title = feed.title.map(|t| sanitize_title(&t.content).into_owned());

    let articles = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone());
            let published = entry.published.or(entry.updated);
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));
            let title = entry
                .title
                .map(|t| sanitize_title(&t.content).into_owned())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());

            let existing_id = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id.as_str())
            };
            let guid = generate_guid(
                existing_id,
                link.as_deref(),
                &title,
                published.map(|dt| dt.timestamp()),
            );

            Article {
                guid,
                title,
                summary,
                link,
                published,
                feed: source.clone(),
                feed_title: feed_title.clone(),
            }
        })
        .collect();

    Ok(articles)
}

fn generate_guid(
    existing: Option<&str>,
    link: Option<&str>,
    title: &str,
    published: Option<i64>,
) -> String {
    if let Some(guid) = existing {
        let trimmed = guid.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!(
        "{}|{}|{}",
        link.unwrap_or(""),
        title,
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
