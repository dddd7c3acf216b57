//! Guild configuration repository for feedbot.

use tracing::info;

use super::types::{GuildConfig, GuildPurge};
use crate::db::DbPool;
use crate::{CreateOutcome, FeedbotError, Result};

/// Row type for a guild configuration from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct GuildConfigRow {
    id: String,
    contact: String,
    enable_embeds: bool,
    enable_webhooks: bool,
}

impl From<GuildConfigRow> for GuildConfig {
    fn from(row: GuildConfigRow) -> Self {
        GuildConfig {
            guild_id: row.id,
            contact: row.contact,
            default_embeds: row.enable_embeds,
            default_webhooks: row.enable_webhooks,
        }
    }
}

/// Repository for per-guild configuration.
pub struct GuildConfigRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> GuildConfigRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create the configuration for a newly joined guild.
    ///
    /// Embeds and webhooks default to off. Returns `AlreadyExists` with the
    /// stored configuration if the guild is already known.
    pub async fn create(&self, guild_id: &str, contact: &str) -> Result<CreateOutcome<GuildConfig>> {
        let result = sqlx::query(
            r#"
            INSERT INTO guild_config (id, contact, enable_embeds, enable_webhooks)
            VALUES ($1, $2, 0, 0)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(guild_id)
        .bind(contact)
        .execute(self.pool)
        .await?;

        let config = self.get(guild_id).await?;
        if result.rows_affected() == 0 {
            Ok(CreateOutcome::AlreadyExists(config))
        } else {
            Ok(CreateOutcome::Created(config))
        }
    }

    /// Get a guild's configuration.
    pub async fn get(&self, guild_id: &str) -> Result<GuildConfig> {
        sqlx::query_as::<_, GuildConfigRow>(
            r#"
            SELECT id, contact, enable_embeds, enable_webhooks
            FROM guild_config
            WHERE id = $1
            "#,
        )
        .bind(guild_id)
        .fetch_optional(self.pool)
        .await?
        .map(GuildConfig::from)
        .ok_or_else(|| FeedbotError::NotFound(format!("guild config {guild_id}")))
    }

    /// Change the guild's emergency contact.
    pub async fn set_contact(&self, guild_id: &str, contact: &str) -> Result<()> {
        let result = sqlx::query("UPDATE guild_config SET contact = $1 WHERE id = $2")
            .bind(contact)
            .bind(guild_id)
            .execute(self.pool)
            .await?;
        expect_one_row(result.rows_affected(), guild_id)
    }

    /// Change the guild's default embeds setting.
    pub async fn set_default_embeds(&self, guild_id: &str, embeds: bool) -> Result<()> {
        let result = sqlx::query("UPDATE guild_config SET enable_embeds = $1 WHERE id = $2")
            .bind(embeds)
            .bind(guild_id)
            .execute(self.pool)
            .await?;
        expect_one_row(result.rows_affected(), guild_id)
    }

    /// Change the guild's default webhooks setting.
    pub async fn set_default_webhooks(&self, guild_id: &str, webhooks: bool) -> Result<()> {
        let result = sqlx::query("UPDATE guild_config SET enable_webhooks = $1 WHERE id = $2")
            .bind(webhooks)
            .bind(guild_id)
            .execute(self.pool)
            .await?;
        expect_one_row(result.rows_affected(), guild_id)
    }

    /// Remove everything stored for a guild.
    ///
    /// Deletes the guild's subscriptions (and by cascade their overrides),
    /// its configuration, and any feed those subscriptions referenced that no
    /// other subscription still uses. All or nothing.
    pub async fn destroy(&self, guild_id: &str) -> Result<GuildPurge> {
        let mut tx = self.pool.begin().await?;

        let mut feed_ids: Vec<i64> =
            sqlx::query_scalar("DELETE FROM subscriptions WHERE guild_id = $1 RETURNING feed_id")
                .bind(guild_id)
                .fetch_all(&mut *tx)
                .await?;
        let subscriptions = feed_ids.len() as u64;

        let deleted = sqlx::query("DELETE FROM guild_config WHERE id = $1")
            .bind(guild_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(FeedbotError::NotFound(format!("guild config {guild_id}")));
        }

        feed_ids.sort_unstable();
        feed_ids.dedup();

        let mut feeds = 0;
        for feed_id in feed_ids {
            let result = sqlx::query(
                r#"
                DELETE FROM feeds
                WHERE id = $1
                  AND NOT EXISTS (SELECT 1 FROM subscriptions WHERE feed_id = $1)
                "#,
            )
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;
            feeds += result.rows_affected();
        }

        tx.commit().await?;

        info!(
            "Destroyed guild {}: {} subscription(s), {} orphaned feed(s)",
            guild_id, subscriptions, feeds
        );
        Ok(GuildPurge {
            subscriptions,
            feeds,
        })
    }
}

fn expect_one_row(rows_affected: u64, guild_id: &str) -> Result<()> {
    if rows_affected == 0 {
        return Err(FeedbotError::NotFound(format!("guild config {guild_id}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedRepository;
    use crate::subscription::{owner_contact, SubscriptionRepository};
    use crate::Database;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    async fn count(db: &Database, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_guild_config() {
        let db = setup_db().await;
        let repo = GuildConfigRepository::new(db.pool());

        let outcome = repo.create("guild-1", &owner_contact("42")).await.unwrap();
        assert!(outcome.is_created());

        let config = outcome.into_inner();
        assert_eq!(config.guild_id, "guild-1");
        assert_eq!(config.contact, "u:42");
        assert!(!config.default_embeds);
        assert!(!config.default_webhooks);
    }

    #[tokio::test]
    async fn test_create_twice_reports_existing() {
        let db = setup_db().await;
        let repo = GuildConfigRepository::new(db.pool());

        repo.create("guild-1", "u:1").await.unwrap();
        let second = repo.create("guild-1", "u:2").await.unwrap();

        assert!(!second.is_created());
        // The original contact is kept.
        assert_eq!(second.get().contact, "u:1");
        assert_eq!(count(&db, "guild_config").await, 1);
    }

    #[tokio::test]
    async fn test_setters() {
        let db = setup_db().await;
        let repo = GuildConfigRepository::new(db.pool());
        repo.create("guild-1", "u:1").await.unwrap();

        repo.set_contact("guild-1", "c:999").await.unwrap();
        repo.set_default_embeds("guild-1", true).await.unwrap();
        repo.set_default_webhooks("guild-1", true).await.unwrap();

        let config = repo.get("guild-1").await.unwrap();
        assert_eq!(config.contact, "c:999");
        assert!(config.default_embeds);
        assert!(config.default_webhooks);

        repo.set_default_webhooks("guild-1", false).await.unwrap();
        let config = repo.get("guild-1").await.unwrap();
        // Changing webhooks leaves embeds alone.
        assert!(config.default_embeds);
        assert!(!config.default_webhooks);
    }

    #[tokio::test]
    async fn test_missing_guild_is_not_found() {
        let db = setup_db().await;
        let repo = GuildConfigRepository::new(db.pool());

        assert!(matches!(repo.get("nope").await, Err(FeedbotError::NotFound(_))));
        assert!(matches!(
            repo.set_contact("nope", "u:1").await,
            Err(FeedbotError::NotFound(_))
        ));
        assert!(matches!(
            repo.set_default_embeds("nope", true).await,
            Err(FeedbotError::NotFound(_))
        ));
        assert!(matches!(
            repo.set_default_webhooks("nope", true).await,
            Err(FeedbotError::NotFound(_))
        ));
        assert!(matches!(
            repo.destroy("nope").await,
            Err(FeedbotError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_destroy_removes_guild_data_and_orphaned_feeds() {
        let db = setup_db().await;
        let guilds = GuildConfigRepository::new(db.pool());
        let feeds = FeedRepository::new(db.pool());
        let subs = SubscriptionRepository::new(db.pool());

        guilds.create("guild-1", "u:1").await.unwrap();
        guilds.create("guild-2", "u:2").await.unwrap();

        let only_mine = feeds.get_or_create("https://example.com/mine.xml").await.unwrap();
        let shared = feeds.get_or_create("https://example.com/shared.xml").await.unwrap();

        subs.create("chan-1", only_mine.id, "guild-1").await.unwrap();
        subs.create("chan-1", shared.id, "guild-1").await.unwrap();
        subs.create("chan-2", shared.id, "guild-1").await.unwrap();
        subs.create("chan-9", shared.id, "guild-2").await.unwrap();

        let purge = guilds.destroy("guild-1").await.unwrap();
        assert_eq!(
            purge,
            GuildPurge {
                subscriptions: 3,
                feeds: 1
            }
        );

        assert!(matches!(guilds.get("guild-1").await, Err(FeedbotError::NotFound(_))));
        assert!(feeds.get_by_id(only_mine.id).await.unwrap().is_none());
        assert!(feeds.get_by_id(shared.id).await.unwrap().is_some());
        assert_eq!(count(&db, "subscriptions").await, 1);
        assert_eq!(count(&db, "subscription_overrides").await, 1);
        assert!(guilds.get("guild-2").await.is_ok());
    }
}
