//! New-item detection against a feed's watermark.
//!
//! Feeds are assumed to list entries newest first. The scan stops at the
//! first entry that is not newer than the watermark; anything below it is
//! treated as already delivered even if it carries a later timestamp.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::FeedItem;

/// A fetched entry had no publish timestamp, so ordering is ambiguous.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("entry {index} has no publish timestamp")]
pub struct MissingTimestamp {
    /// Position of the first offending entry in the fetched list.
    pub index: usize,
}

/// Items to deliver for one feed and the watermark to store afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDiff {
    /// New items, newest first.
    pub new_items: Vec<FeedItem>,
    /// Watermark to store once delivery has been attempted.
    pub watermark: DateTime<Utc>,
}

impl FeedDiff {
    fn unchanged(watermark: DateTime<Utc>) -> Self {
        Self {
            new_items: Vec::new(),
            watermark,
        }
    }

    /// Whether there is anything to deliver.
    pub fn has_new_items(&self) -> bool {
        !self.new_items.is_empty()
    }

    /// New items in delivery order (oldest first).
    pub fn oldest_first(&self) -> impl Iterator<Item = &FeedItem> {
        self.new_items.iter().rev()
    }
}

/// Compute the new items of a feed.
///
/// The new watermark is the timestamp of the first (top) entry, not the
/// maximum of the collected items, and is only adopted when it is newer than
/// the stored one.
pub fn diff_items(
    watermark: DateTime<Utc>,
    items: &[FeedItem],
) -> Result<FeedDiff, MissingTimestamp> {
    if let Some(index) = items.iter().position(|item| item.published_at.is_none()) {
        return Err(MissingTimestamp { index });
    }

    let top = match items.first().and_then(|item| item.published_at) {
        Some(top) => top,
        None => return Ok(FeedDiff::unchanged(watermark)),
    };

    if top <= watermark {
        return Ok(FeedDiff::unchanged(watermark));
    }

    let new_items = items
        .iter()
        .take_while(|item| item.published_at.is_some_and(|ts| ts > watermark))
        .cloned()
        .collect();

    Ok(FeedDiff {
        new_items,
        watermark: top,
    })
}
