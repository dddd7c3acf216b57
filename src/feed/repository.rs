//! Feed repository for feedbot.

use chrono::{DateTime, Utc};

use super::types::{initial_watermark, Feed};
use crate::db::DbPool;
use crate::{FeedbotError, Result};

/// Row type for a feed from the database.
///
/// A watermark that does not decode fails the query instead of falling back
/// to the epoch, which would re-deliver the whole feed.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedRow {
    id: i64,
    uri: String,
    watermark: DateTime<Utc>,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: row.id,
            uri: row.uri,
            watermark: row.watermark,
        }
    }
}

/// Repository for feed rows and their watermarks.
pub struct FeedRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Get the feed for `uri`, inserting it with the initial watermark if absent.
    ///
    /// Concurrent calls for the same URI resolve to the same row: the insert
    /// is a no-op on conflict and the row is read back afterwards.
    pub async fn get_or_create(&self, uri: &str) -> Result<Feed> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(FeedbotError::Validation("feed URI is empty".to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO feeds (uri, watermark)
            VALUES ($1, $2)
            ON CONFLICT(uri) DO NOTHING
            "#,
        )
        .bind(uri)
        .bind(initial_watermark())
        .execute(self.pool)
        .await?;

        self.get_by_uri(uri)
            .await?
            .ok_or_else(|| FeedbotError::NotFound(format!("feed {uri}")))
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(
            "SELECT id, uri, watermark FROM feeds WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Feed::from))
    }

    /// Get a feed by URI.
    pub async fn get_by_uri(&self, uri: &str) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(
            "SELECT id, uri, watermark FROM feeds WHERE uri = $1",
        )
        .bind(uri)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Feed::from))
    }

    /// List all feeds (ordered by registration order).
    pub async fn list_all(&self) -> Result<Vec<Feed>> {
        let rows = sqlx::query_as::<_, FeedRow>(
            "SELECT id, uri, watermark FROM feeds ORDER BY id ASC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Set a feed's watermark.
    ///
    /// Fails with `NotFound` if the feed has been removed.
    pub async fn advance_watermark(&self, id: i64, watermark: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE feeds SET watermark = $1 WHERE id = $2")
            .bind(watermark)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(FeedbotError::NotFound(format!("feed #{id}")));
        }
        Ok(())
    }

    /// Count feeds.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feeds")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
