//! Configuration file parser for ~/.config/feedfan/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, but logged as warnings since they are
//! usually typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::{
    FeedUrl, TransportConfig, UrlError, DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_FEED_SIZE,
};
use crate::filter::{ExcludeTerms, FilterChain, MinTitleChars, PublishedSince, RequireLink};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid value for '{key}' in config file: {reason}")]
    InvalidValue { key: &'static str, reason: &'static str },

    #[error("Invalid feed URL '{url}' in config file: {source}")]
    InvalidFeedUrl {
        url: String,
        #[source]
        source: UrlError,
    },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connect/read timeout per feed, in seconds.
    pub timeout_secs: u64,

    /// Largest feed document accepted, in bytes.
    pub max_feed_size_bytes: usize,

    /// User-Agent header sent with every feed request.
    pub user_agent: String,

    /// Feeds remembered for conditional GETs. 0 disables the cache.
    pub cache_capacity: usize,

    /// Feed URLs fetched on every run, before any given on the command line.
    pub feeds: Vec<String>,

    pub filters: FilterConfig,
}

/// `[filters]` table. Every filter is off by default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Drop articles older than this many hours (and undated ones).
    pub max_age_hours: Option<u64>,

    /// Drop articles without a link.
    pub require_link: bool,

    /// Drop articles whose title or summary contains any of these terms.
    pub exclude_terms: Vec<String>,

    /// Drop articles with shorter titles.
    pub min_title_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        let transport = TransportConfig::default();
        Self {
            timeout_secs: transport.timeout.as_secs(),
            max_feed_size_bytes: DEFAULT_MAX_FEED_SIZE,
            user_agent: transport.user_agent,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            feeds: Vec::new(),
            filters: FilterConfig::default(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "timeout_secs",
        "max_feed_size_bytes",
        "user_agent",
        "cache_capacity",
        "feeds",
        "filters",
    ];

    const KNOWN_FILTER_KEYS: [&'static str; 4] = [
        "max_age_hours",
        "require_link",
        "exclude_terms",
        "min_title_chars",
    ];

    /// Default location: `$HOME/.config/feedfan/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("feedfan")
                .join("config.toml")
        })
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw, &Self::KNOWN_KEYS, "");
            if let Some(toml::Value::Table(filters)) = raw.get("filters") {
                warn_unknown_keys(filters, &Self::KNOWN_FILTER_KEYS, "filters.");
            }
        }

        let config: Config = toml::from_str(&content)?;
        if config.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_secs",
                reason: "must be at least 1",
            });
        }
        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            timeout_secs = config.timeout_secs,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout(),
            max_feed_size: self.max_feed_size_bytes,
            user_agent: self.user_agent.clone(),
        }
    }

    /// Parses `feeds`, failing on the first invalid entry.
    pub fn feed_urls(&self) -> Result<Vec<FeedUrl>, ConfigError> {
        self.feeds
            .iter()
            .map(|raw| {
                FeedUrl::parse(raw).map_err(|source| ConfigError::InvalidFeedUrl {
                    url: raw.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Builds the filter chain described by `[filters]`.
    pub fn filter_chain(&self) -> FilterChain {
        let f = &self.filters;
        let mut chain = FilterChain::new();
        if let Some(hours) = f.max_age_hours {
            let max_age = i64::try_from(hours)
                .ok()
                .and_then(chrono::Duration::try_hours)
                .unwrap_or(chrono::Duration::MAX);
            chain = chain.with(PublishedSince::max_age(max_age));
        }
        if f.require_link {
            chain = chain.with(RequireLink);
        }
        if !f.exclude_terms.is_empty() {
            chain = chain.with(ExcludeTerms::new(&f.exclude_terms));
        }
        if f.min_title_chars > 0 {
            chain = chain.with(MinTitleChars(f.min_title_chars));
        }
        chain
    }
}

fn warn_unknown_keys(table: &toml::Table, known: &[&str], prefix: &str) {
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            tracing::warn!(key = %format!("{prefix}{key}"), "Unknown key in config file, ignoring");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
