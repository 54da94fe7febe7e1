use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use thiserror::Error;

use super::types::FeedUrl;

/// Maximum allowed nesting depth for OPML outline elements.
const MAX_OPML_DEPTH: usize = 50;

/// Errors that can occur while reading an OPML feed list.
#[derive(Debug, Error)]
pub enum OpmlError {
    /// OPML nesting depth exceeds safety limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("Failed to read OPML file: {0}")]
    Io(#[from] std::io::Error),
}

/// A feed listed in an OPML file.
#[derive(Debug, Clone, PartialEq)]
pub struct OpmlFeed {
    /// `title` attribute, then `text`, then the URL itself
    pub title: String,
    pub url: FeedUrl,
}

/// Reads an OPML subscription export and returns the feeds it lists.
///
/// Every `<outline>` with an `xmlUrl` attribute is a feed, at any nesting
/// depth; folder outlines are walked but not returned. Outlines whose URL is
/// not http(s) are skipped with a warning.
pub async fn parse(path: &Path) -> Result<Vec<OpmlFeed>, OpmlError> {
    let content = tokio::fs::read_to_string(path).await?;
    let feeds = parse_opml_content(&content)?;
    tracing::debug!(path = %path.display(), feeds = feeds.len(), "Read OPML feed list");
    Ok(feeds)
}

/// Parses OPML text. See [`parse`].
pub fn parse_opml_content(content: &str) -> Result<Vec<OpmlFeed>, OpmlError> {
    // quick-xml 0.37 never expands <!ENTITY> declarations, so custom entities
    // fail to decode instead of resolving external content.
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feeds = Vec::new();
    let mut depth: usize = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                depth += 1;
                if depth > MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                feeds.extend(outline_feed(&e, &reader)?);
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                feeds.extend(outline_feed(&e, &reader)?);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
    }

    Ok(feeds)
}

/// `Some` for outlines carrying a usable `xmlUrl`, `None` for folders.
fn outline_feed(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Option<OpmlFeed>, OpmlError> {
    let decoder = reader.decoder();
    let mut xml_url = None;
    let mut title = None;
    let mut text = None;

    for attr in e.attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(err) => {
                tracing::warn!(error = %err, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let slot = match attr.key.as_ref() {
            b"xmlUrl" => &mut xml_url,
            b"title" => &mut title,
            b"text" => &mut text,
            _ => continue,
        };
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|err| OpmlError::XmlParse(err.to_string()))?;
        *slot = Some(value.into_owned());
    }

    let Some(raw_url) = xml_url else {
        return Ok(None);
    };

    match FeedUrl::parse(&raw_url) {
        Ok(url) => Ok(Some(OpmlFeed {
            title: title.or(text).unwrap_or_else(|| raw_url.clone()),
            url,
        })),
        Err(err) => {
            tracing::warn!(url = %raw_url, error = %err, "Skipping invalid feed URL in OPML");
            Ok(None)
        }
    }
}
