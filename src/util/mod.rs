//! Text helpers for feed-supplied strings.
//!
//! Titles and summaries come straight off the network, so they are cleaned
//! of terminal escape sequences before they are stored in an
//! [`Article`](crate::feed::Article) or printed by the CLI.

mod text;

pub use text::{display_width, sanitize_title, strip_control_chars, truncate_to_width};
