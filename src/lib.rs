//! feedbot - feed notification engine
//!
//! Polls RSS/Atom feeds, detects new items against a per-feed watermark and
//! fans them out to subscribed chat channels.

pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod feed;
pub mod logging;
pub mod subscription;

pub use config::Config;
pub use db::{Database, DbPool};
pub use dispatch::{
    start_feed_poller, CycleError, DeliveryError, Dispatcher, FeedPoller, LogNotifier, Notifier,
};
pub use error::{CreateOutcome, FeedbotError, Result};
pub use feed::{Feed, FeedItem, FeedRepository, FeedSource, HttpFeedSource};
pub use subscription::{
    DeliveryPolicy, GuildConfig, GuildConfigRepository, Override, Subscription,
    SubscriptionEntry, SubscriptionRepository, Toggle,
};
