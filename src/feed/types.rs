//! Feed types for feedbot.

use chrono::{DateTime, Utc};

/// Maximum length for an item's content summary.
pub const MAX_CONTENT_LENGTH: usize = 4000;

/// Watermark given to a feed that has never delivered anything.
pub fn initial_watermark() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// A polled feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    /// Feed ID.
    pub id: i64,
    /// Feed URI, unique across all feeds.
    pub uri: String,
    /// Publish time of the newest item already processed.
    pub watermark: DateTime<Utc>,
}

/// One entry of a fetched feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// Unique identifier (RSS guid or Atom id).
    pub guid: String,
    /// Item title.
    pub title: String,
    /// Link to the original article.
    pub link: Option<String>,
    /// Content summary (HTML tags stripped).
    pub content: Option<String>,
    /// Author name.
    pub author: Option<String>,
    /// When the item was published.
    pub published_at: Option<DateTime<Utc>>,
}

impl FeedItem {
    /// Create a new item with only an identifier and title.
    pub fn new(guid: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            title: title.into(),
            link: None,
            content: None,
            author: None,
            published_at: None,
        }
    }

    /// Set the link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Set the content, truncated to [`MAX_CONTENT_LENGTH`] characters.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        if content.chars().count() > MAX_CONTENT_LENGTH {
            self.content = Some(content.chars().take(MAX_CONTENT_LENGTH).collect());
        } else {
            self.content = Some(content);
        }
        self
    }

    /// Set the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the published date.
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }
}
