//! Poll cycle.
//!
//! One cycle fetches every feed, works out which items are new, delivers them
//! to each subscribed channel and advances the feed's watermark. Failures of
//! a single feed or a single delivery are collected and returned; only
//! database failures abort the cycle.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use thiserror::Error;
use tracing::{debug, info};

use super::notifier::{DeliveryError, Notifier};
use crate::config::PollerConfig;
use crate::db::Database;
use crate::feed::{diff_items, Feed, FeedRepository, FeedSource};
use crate::subscription::SubscriptionRepository;
use crate::{FeedbotError, Result};

/// A non-fatal failure recorded during a poll cycle.
#[derive(Error, Debug)]
pub enum CycleError {
    /// The feed could not be fetched or parsed.
    #[error("feed #{feed_id} ({uri}): fetch failed: {reason}")]
    Fetch {
        feed_id: i64,
        uri: String,
        reason: String,
    },

    /// The fetch did not finish in time.
    #[error("feed #{feed_id} ({uri}): fetch timed out after {timeout:?}")]
    FetchTimeout {
        feed_id: i64,
        uri: String,
        timeout: Duration,
    },

    /// An entry had no publish timestamp; the feed was skipped.
    #[error("feed #{feed_id} ({uri}): entry {index} has no publish timestamp")]
    MissingTimestamp {
        feed_id: i64,
        uri: String,
        index: usize,
    },

    /// Delivering to one subscription failed.
    #[error("feed #{feed_id}: delivery to channel {channel_id} (guild {guild_id}) failed")]
    Delivery {
        feed_id: i64,
        subscription_id: i64,
        /// Guild whose contact should hear about the failure.
        guild_id: String,
        channel_id: String,
        #[source]
        source: DeliveryError,
    },

    /// The feed was deleted while the cycle was processing it.
    #[error("feed #{feed_id} disappeared during the cycle")]
    FeedVanished { feed_id: i64 },
}

impl CycleError {
    /// The feed this error belongs to.
    pub fn feed_id(&self) -> i64 {
        match self {
            CycleError::Fetch { feed_id, .. }
            | CycleError::FetchTimeout { feed_id, .. }
            | CycleError::MissingTimestamp { feed_id, .. }
            | CycleError::Delivery { feed_id, .. }
            | CycleError::FeedVanished { feed_id } => *feed_id,
        }
    }
}

/// Runs poll cycles over all stored feeds.
pub struct Dispatcher {
    db: Database,
    source: Arc<dyn FeedSource>,
    notifier: Arc<dyn Notifier>,
    fetch_timeout: Duration,
    max_concurrent_feeds: usize,
}

impl Dispatcher {
    /// Create a dispatcher using the poller's fetch timeout and concurrency.
    pub fn new(
        db: Database,
        source: Arc<dyn FeedSource>,
        notifier: Arc<dyn Notifier>,
        config: &PollerConfig,
    ) -> Self {
        Self {
            db,
            source,
            notifier,
            fetch_timeout: config.fetch_timeout(),
            max_concurrent_feeds: config.max_concurrent_feeds.max(1),
        }
    }

    /// Override the per-feed fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Override the number of feeds processed at once.
    pub fn with_max_concurrent_feeds(mut self, max: usize) -> Self {
        self.max_concurrent_feeds = max.max(1);
        self
    }

    /// Run one poll cycle.
    ///
    /// Returns every per-feed and per-delivery failure. Returns `Err` as soon
    /// as the database fails: feeds still in flight are cancelled and queued
    /// feeds are never started.
    pub async fn run_cycle(&self) -> Result<Vec<CycleError>> {
        let feeds = FeedRepository::new(self.db.pool()).list_all().await?;
        debug!("Poll cycle over {} feed(s)", feeds.len());

        let per_feed = stream::iter(feeds)
            .map(move |feed| self.process_feed(feed))
            .buffer_unordered(self.max_concurrent_feeds)
            .try_collect::<Vec<Vec<CycleError>>>()
            .await?;

        Ok(per_feed.into_iter().flatten().collect())
    }

    async fn process_feed(&self, feed: Feed) -> Result<Vec<CycleError>> {
        let fetch = self.source.fetch(&feed.uri, self.fetch_timeout);
        let items = match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(Ok(items)) => items,
            Ok(Err(e)) => {
                return Ok(vec![CycleError::Fetch {
                    feed_id: feed.id,
                    uri: feed.uri,
                    reason: e.to_string(),
                }])
            }
            Err(_) => {
                return Ok(vec![CycleError::FetchTimeout {
                    feed_id: feed.id,
                    uri: feed.uri,
                    timeout: self.fetch_timeout,
                }])
            }
        };

        let diff = match diff_items(feed.watermark, &items) {
            Ok(diff) => diff,
            Err(e) => {
                return Ok(vec![CycleError::MissingTimestamp {
                    feed_id: feed.id,
                    uri: feed.uri,
                    index: e.index,
                }])
            }
        };

        if !diff.has_new_items() {
            debug!("Feed {}: no new items", feed.id);
            return Ok(Vec::new());
        }

        let targets = SubscriptionRepository::new(self.db.pool())
            .list_for_feed(feed.id)
            .await?;

        let mut errors = Vec::new();
        for entry in &targets {
            let policy = entry.policy();
            let sub = &entry.subscription;

            for item in diff.oldest_first() {
                if let Err(e) = self.notifier.deliver(&sub.channel_id, item, policy).await {
                    let denied = e.is_permission_denied();
                    errors.push(CycleError::Delivery {
                        feed_id: feed.id,
                        subscription_id: sub.id,
                        guild_id: sub.guild_id.clone(),
                        channel_id: sub.channel_id.clone(),
                        source: e,
                    });
                    // Every later item would be refused as well.
                    if denied {
                        break;
                    }
                }
            }
        }

        match FeedRepository::new(self.db.pool())
            .advance_watermark(feed.id, diff.watermark)
            .await
        {
            Ok(()) => {}
            Err(FeedbotError::NotFound(_)) => {
                errors.push(CycleError::FeedVanished { feed_id: feed.id });
            }
            Err(e) => return Err(e),
        }

        info!(
            "Feed {}: {} new item(s) to {} subscription(s)",
            feed.id,
            diff.new_items.len(),
            targets.len()
        );
        Ok(errors)
    }
}
