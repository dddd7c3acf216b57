//! Feed module for feedbot.
//!
//! Feed identity and watermarks, new-item detection, and the sources that
//! fetch feed documents.

pub mod diff;
pub mod repository;
pub mod source;
pub mod types;

pub use diff::{diff_items, FeedDiff, MissingTimestamp};
pub use repository::FeedRepository;
pub use source::{parse_feed, validate_url, FeedSource, HttpFeedSource};
pub use types::{initial_watermark, Feed, FeedItem, MAX_CONTENT_LENGTH};
