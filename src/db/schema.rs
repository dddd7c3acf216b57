//! Database schema and migrations for feedbot.
//!
//! Migrations are applied in order; the schema_version table records how
//! many have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: Feeds, guild configuration, subscriptions and their overrides
    r#"
-- Feeds being polled. watermark is the publish time of the newest delivered item.
CREATE TABLE feeds (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    uri         TEXT NOT NULL UNIQUE,
    watermark   TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Per-guild defaults and emergency contact
CREATE TABLE guild_config (
    id              TEXT PRIMARY KEY,
    contact         TEXT NOT NULL,
    enable_embeds   INTEGER NOT NULL DEFAULT 0,
    enable_webhooks INTEGER NOT NULL DEFAULT 0
);

-- One row per (channel, feed) binding
CREATE TABLE subscriptions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    guild_id    TEXT NOT NULL REFERENCES guild_config(id),
    channel_id  TEXT NOT NULL,
    feed_id     INTEGER NOT NULL REFERENCES feeds(id),
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(channel_id, feed_id)
);

CREATE INDEX idx_subscriptions_feed_id ON subscriptions(feed_id);
CREATE INDEX idx_subscriptions_guild_id ON subscriptions(guild_id);

-- NULL in enable_* means inherit the guild default
CREATE TABLE subscription_overrides (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    sub_id          INTEGER NOT NULL UNIQUE REFERENCES subscriptions(id) ON DELETE CASCADE,
    enable_embeds   INTEGER,
    enable_webhooks INTEGER
);
"#,
];
