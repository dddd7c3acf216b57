//! Subscription repository for feedbot.

use super::policy::GuildDefaults;
use super::types::{Override, Subscription, SubscriptionEntry, Toggle};
use crate::db::DbPool;
use crate::{CreateOutcome, FeedbotError, Result};

/// Row type for a subscription from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    guild_id: String,
    channel_id: String,
    feed_id: i64,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Subscription {
            id: row.id,
            guild_id: row.guild_id,
            channel_id: row.channel_id,
            feed_id: row.feed_id,
        }
    }
}

/// Row type for an override from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct OverrideRow {
    id: i64,
    sub_id: i64,
    enable_embeds: Option<bool>,
    enable_webhooks: Option<bool>,
}

impl From<OverrideRow> for Override {
    fn from(row: OverrideRow) -> Self {
        Override {
            id: row.id,
            subscription_id: row.sub_id,
            embeds: Toggle::from_column(row.enable_embeds),
            webhooks: Toggle::from_column(row.enable_webhooks),
        }
    }
}

/// Row type for a subscription joined with its feed, guild and override.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EntryRow {
    id: i64,
    guild_id: String,
    channel_id: String,
    feed_id: i64,
    feed_uri: String,
    default_embeds: bool,
    default_webhooks: bool,
    override_id: i64,
    enable_embeds: Option<bool>,
    enable_webhooks: Option<bool>,
}

impl From<EntryRow> for SubscriptionEntry {
    fn from(row: EntryRow) -> Self {
        SubscriptionEntry {
            subscription: Subscription {
                id: row.id,
                guild_id: row.guild_id,
                channel_id: row.channel_id,
                feed_id: row.feed_id,
            },
            feed_uri: row.feed_uri,
            defaults: GuildDefaults {
                embeds: row.default_embeds,
                webhooks: row.default_webhooks,
            },
            overrides: Override {
                id: row.override_id,
                subscription_id: row.id,
                embeds: Toggle::from_column(row.enable_embeds),
                webhooks: Toggle::from_column(row.enable_webhooks),
            },
        }
    }
}

const ENTRY_SELECT: &str = r#"
    SELECT s.id, s.guild_id, s.channel_id, s.feed_id,
           f.uri AS feed_uri,
           g.enable_embeds AS default_embeds,
           g.enable_webhooks AS default_webhooks,
           o.id AS override_id, o.enable_embeds, o.enable_webhooks
    FROM subscriptions s
    INNER JOIN feeds f ON f.id = s.feed_id
    INNER JOIN guild_config g ON g.id = s.guild_id
    INNER JOIN subscription_overrides o ON o.sub_id = s.id
"#;

/// Repository for subscriptions and their overrides.
pub struct SubscriptionRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Subscribe a channel to a feed.
    ///
    /// Returns `AlreadyExists` with the existing row if the channel is already
    /// subscribed to the feed. A new subscription and its all-inherit override
    /// are inserted in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the guild has no configuration or the feed does
    /// not exist.
    pub async fn create(
        &self,
        channel_id: &str,
        feed_id: i64,
        guild_id: &str,
    ) -> Result<CreateOutcome<Subscription>> {
        let guild_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM guild_config WHERE id = $1)")
                .bind(guild_id)
                .fetch_one(self.pool)
                .await?;
        if !guild_exists {
            return Err(FeedbotError::NotFound(format!("guild config {guild_id}")));
        }

        let feed_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM feeds WHERE id = $1)")
                .bind(feed_id)
                .fetch_one(self.pool)
                .await?;
        if !feed_exists {
            return Err(FeedbotError::NotFound(format!("feed #{feed_id}")));
        }

        let mut tx = self.pool.begin().await?;

        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO subscriptions (guild_id, channel_id, feed_id)
            VALUES ($1, $2, $3)
            ON CONFLICT(channel_id, feed_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(guild_id)
        .bind(channel_id)
        .bind(feed_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = inserted else {
            let existing = sqlx::query_as::<_, SubscriptionRow>(
                r#"
                SELECT id, guild_id, channel_id, feed_id
                FROM subscriptions
                WHERE channel_id = $1 AND feed_id = $2
                "#,
            )
            .bind(channel_id)
            .bind(feed_id)
            .fetch_one(&mut *tx)
            .await?;
            tx.rollback().await?;
            return Ok(CreateOutcome::AlreadyExists(existing.into()));
        };

        sqlx::query("INSERT INTO subscription_overrides (sub_id) VALUES ($1)")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(CreateOutcome::Created(Subscription {
            id,
            guild_id: guild_id.to_string(),
            channel_id: channel_id.to_string(),
            feed_id,
        }))
    }

    /// Get a subscription by ID.
    pub async fn get(&self, id: i64) -> Result<Subscription> {
        sqlx::query_as::<_, SubscriptionRow>(
            "SELECT id, guild_id, channel_id, feed_id FROM subscriptions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(Subscription::from)
        .ok_or_else(|| FeedbotError::NotFound(format!("subscription #{id}")))
    }

    /// List every delivery target of a feed.
    pub async fn list_for_feed(&self, feed_id: i64) -> Result<Vec<SubscriptionEntry>> {
        let query = format!("{ENTRY_SELECT} WHERE s.feed_id = $1 ORDER BY s.id ASC");
        let rows = sqlx::query_as::<_, EntryRow>(&query)
            .bind(feed_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(SubscriptionEntry::from).collect())
    }

    /// List a guild's subscriptions.
    pub async fn list_for_guild(&self, guild_id: &str) -> Result<Vec<SubscriptionEntry>> {
        let query = format!("{ENTRY_SELECT} WHERE s.guild_id = $1 ORDER BY s.id ASC");
        let rows = sqlx::query_as::<_, EntryRow>(&query)
            .bind(guild_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(SubscriptionEntry::from).collect())
    }

    /// Delete a subscription; its override is removed by cascade.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(FeedbotError::NotFound(format!("subscription #{id}")));
        }
        Ok(())
    }

    /// Move a subscription to another channel.
    pub async fn set_channel(&self, id: i64, channel_id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE subscriptions SET channel_id = $1 WHERE id = $2")
            .bind(channel_id)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    FeedbotError::Validation(format!(
                        "channel {channel_id} is already subscribed to this feed"
                    ))
                }
                e => e.into(),
            })?;

        if result.rows_affected() == 0 {
            return Err(FeedbotError::NotFound(format!("subscription #{id}")));
        }
        Ok(())
    }

    /// Get the override of a subscription.
    pub async fn get_override(&self, subscription_id: i64) -> Result<Override> {
        sqlx::query_as::<_, OverrideRow>(
            r#"
            SELECT id, sub_id, enable_embeds, enable_webhooks
            FROM subscription_overrides
            WHERE sub_id = $1
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(self.pool)
        .await?
        .map(Override::from)
        .ok_or_else(|| FeedbotError::NotFound(format!("override for subscription #{subscription_id}")))
    }

    /// Set the embeds override of a subscription.
    pub async fn set_override_embeds(&self, subscription_id: i64, embeds: Toggle) -> Result<()> {
        self.set_override_column("enable_embeds", subscription_id, embeds)
            .await
    }

    /// Set the webhooks override of a subscription.
    pub async fn set_override_webhooks(&self, subscription_id: i64, webhooks: Toggle) -> Result<()> {
        self.set_override_column("enable_webhooks", subscription_id, webhooks)
            .await
    }

    async fn set_override_column(
        &self,
        column: &'static str,
        subscription_id: i64,
        value: Toggle,
    ) -> Result<()> {
        let query = format!("UPDATE subscription_overrides SET {column} = $1 WHERE sub_id = $2");
        let result = sqlx::query(&query)
            .bind(value.to_column())
            .bind(subscription_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(FeedbotError::NotFound(format!(
                "override for subscription #{subscription_id}"
            )));
        }
        Ok(())
    }
}
