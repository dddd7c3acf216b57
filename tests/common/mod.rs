//! Test helpers for poll cycle tests.
//!
//! Provides a scripted feed source, a recording notifier and database setup
//! helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use feedbot::config::PollerConfig;
use feedbot::{
    Database, DeliveryError, DeliveryPolicy, Dispatcher, FeedItem, FeedRepository, FeedSource,
    FeedbotError, GuildConfigRepository, Notifier, SubscriptionRepository,
};

/// Fetch timeout used by dispatchers built with [`dispatcher`].
pub const TEST_FETCH_TIMEOUT: Duration = Duration::from_millis(200);

/// Base time for test timestamps.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Timestamp `secs` seconds after [`t0`].
pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + chrono::Duration::seconds(secs)
}

/// Feed item with a publish timestamp.
pub fn item(guid: &str, published_at: DateTime<Utc>) -> FeedItem {
    FeedItem::new(guid, format!("Title {guid}"))
        .with_link(format!("https://example.com/{guid}"))
        .with_published_at(published_at)
}

/// What the scripted source returns for one URI.
#[derive(Debug, Clone)]
pub enum Script {
    Items(Vec<FeedItem>),
    Fail(String),
    Hang,
}

/// Feed source answering from a per-URI script.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<String, Script>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every fetch take `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set(&self, uri: &str, script: Script) {
        self.scripts.lock().unwrap().insert(uri.to_string(), script);
    }

    pub fn set_items(&self, uri: &str, items: Vec<FeedItem>) {
        self.set(uri, Script::Items(items));
    }

    /// Highest number of fetches observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for ScriptedSource {
    async fn fetch(&self, uri: &str, _timeout: Duration) -> feedbot::Result<Vec<FeedItem>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .unwrap_or(Script::Items(Vec::new()));

        let result = match script {
            Script::Items(items) => Ok(items),
            Script::Fail(reason) => Err(FeedbotError::Fetch(reason)),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// One recorded delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub channel_id: String,
    pub guid: String,
    pub policy: DeliveryPolicy,
}

/// Notifier that records deliveries and fails for configured channels.
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Delivery>>,
    failures: Mutex<HashMap<String, DeliveryError>>,
    attempts: AtomicUsize,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery to `channel_id` fail with `error`.
    pub fn fail_channel(&self, channel_id: &str, error: DeliveryError) {
        self.failures
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), error);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.delivered.lock().unwrap().clone()
    }

    /// Guids delivered to `channel_id`, in delivery order.
    pub fn guids_for(&self, channel_id: &str) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.channel_id == channel_id)
            .map(|d| d.guid.clone())
            .collect()
    }

    /// Number of deliver calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(
        &self,
        channel_id: &str,
        item: &FeedItem,
        policy: DeliveryPolicy,
    ) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.failures.lock().unwrap().get(channel_id) {
            return Err(error.clone());
        }

        self.delivered.lock().unwrap().push(Delivery {
            channel_id: channel_id.to_string(),
            guid: item.guid.clone(),
            policy,
        });
        Ok(())
    }
}

/// Open an in-memory database.
pub async fn setup_db() -> Database {
    Database::open_in_memory().await.unwrap()
}

/// Create a guild configuration.
pub async fn create_guild(db: &Database, guild_id: &str) {
    GuildConfigRepository::new(db.pool())
        .create(guild_id, &format!("u:owner-of-{guild_id}"))
        .await
        .unwrap();
}

/// Create a feed and return its ID.
pub async fn create_feed(db: &Database, uri: &str) -> i64 {
    FeedRepository::new(db.pool())
        .get_or_create(uri)
        .await
        .unwrap()
        .id
}

/// Subscribe a channel to a feed and return the subscription ID.
pub async fn subscribe(db: &Database, guild_id: &str, channel_id: &str, feed_id: i64) -> i64 {
    SubscriptionRepository::new(db.pool())
        .create(channel_id, feed_id, guild_id)
        .await
        .unwrap()
        .into_inner()
        .id
}

/// Stored watermark of a feed.
pub async fn watermark(db: &Database, feed_id: i64) -> DateTime<Utc> {
    FeedRepository::new(db.pool())
        .get_by_id(feed_id)
        .await
        .unwrap()
        .unwrap()
        .watermark
}

/// Build a dispatcher over the given mocks.
pub fn dispatcher(
    db: &Database,
    source: Arc<ScriptedSource>,
    notifier: Arc<RecordingNotifier>,
) -> Dispatcher {
    Dispatcher::new(db.clone(), source, notifier, &PollerConfig::default())
        .with_fetch_timeout(TEST_FETCH_TIMEOUT)
}
