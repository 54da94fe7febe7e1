//! Concurrent RSS/Atom collection with per-feed failure isolation.
//!
//! [`feed::ArticleFetcher`] downloads every requested feed in parallel,
//! parses it into [`feed::Article`]s, keeps the ones a [`filter::FilterChain`]
//! accepts and returns them merged in shuffled order. A feed that fails to
//! download or parse is reported and skipped; the rest of the batch is
//! unaffected.

pub mod config;
pub mod feed;
pub mod filter;
pub mod util;
