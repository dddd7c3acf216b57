//! Delivery of feed items to channels.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::feed::FeedItem;
use crate::subscription::DeliveryPolicy;

/// Why a single delivery failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The bot may not post in the channel. Retrying will not help until a
    /// guild admin fixes the permissions.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Any other failure (network, rate limit, gateway outage).
    #[error("transient delivery failure: {0}")]
    Transient(String),
}

impl DeliveryError {
    /// Whether the guild contact should be told about this failure.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, DeliveryError::PermissionDenied(_))
    }
}

/// Posts one feed item to one channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `item` to `channel_id` according to `policy`.
    async fn deliver(
        &self,
        channel_id: &str,
        item: &FeedItem,
        policy: DeliveryPolicy,
    ) -> Result<(), DeliveryError>;
}

/// Notifier that only writes deliveries to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(
        &self,
        channel_id: &str,
        item: &FeedItem,
        policy: DeliveryPolicy,
    ) -> Result<(), DeliveryError> {
        info!(
            "Deliver to channel {} (embeds: {}, webhooks: {}): {} <{}>",
            channel_id,
            policy.embeds,
            policy.webhooks,
            item.title,
            item.link.as_deref().unwrap_or("no link")
        );
        Ok(())
    }
}
