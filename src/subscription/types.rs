//! Subscription types for feedbot.

use std::fmt;
use std::str::FromStr;

use super::policy::{resolve, DeliveryPolicy, GuildDefaults};
use crate::FeedbotError;

/// Subscription-level setting that may defer to the guild default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Toggle {
    /// Use the guild default.
    #[default]
    Inherit,
    /// Enabled regardless of the guild default.
    ForceOn,
    /// Disabled regardless of the guild default.
    ForceOff,
}

impl Toggle {
    /// Decode a nullable column; `NULL` means inherit.
    pub fn from_column(value: Option<bool>) -> Self {
        match value {
            None => Toggle::Inherit,
            Some(true) => Toggle::ForceOn,
            Some(false) => Toggle::ForceOff,
        }
    }

    /// Encode as a nullable column.
    pub fn to_column(self) -> Option<bool> {
        match self {
            Toggle::Inherit => None,
            Toggle::ForceOn => Some(true),
            Toggle::ForceOff => Some(false),
        }
    }
}

impl From<bool> for Toggle {
    fn from(value: bool) -> Self {
        if value {
            Toggle::ForceOn
        } else {
            Toggle::ForceOff
        }
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Toggle::Inherit => write!(f, "inherit"),
            Toggle::ForceOn => write!(f, "on"),
            Toggle::ForceOff => write!(f, "off"),
        }
    }
}

impl FromStr for Toggle {
    type Err = FeedbotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on" | "true" | "yes" => Ok(Toggle::ForceOn),
            "off" | "false" | "no" => Ok(Toggle::ForceOff),
            "inherit" | "default" | "unset" => Ok(Toggle::Inherit),
            other => Err(FeedbotError::Validation(format!(
                "expected on, off or inherit, got {other:?}"
            ))),
        }
    }
}

/// Contact string for a guild owner, used as the default emergency contact.
pub fn owner_contact(owner_id: &str) -> String {
    format!("u:{owner_id}")
}

/// Guild-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildConfig {
    /// Guild ID.
    pub guild_id: String,
    /// Who to notify when a feed or permission breaks.
    pub contact: String,
    /// Default embeds setting for the guild's subscriptions.
    pub default_embeds: bool,
    /// Default webhooks setting for the guild's subscriptions.
    pub default_webhooks: bool,
}

impl GuildConfig {
    /// Defaults inherited by this guild's overrides.
    pub fn defaults(&self) -> GuildDefaults {
        GuildDefaults {
            embeds: self.default_embeds,
            webhooks: self.default_webhooks,
        }
    }
}

/// A binding of one feed to one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: i64,
    pub guild_id: String,
    pub channel_id: String,
    pub feed_id: i64,
}

/// Per-subscription exceptions to the guild defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub id: i64,
    pub subscription_id: i64,
    pub embeds: Toggle,
    pub webhooks: Toggle,
}

/// A subscription joined with everything needed to deliver to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionEntry {
    pub subscription: Subscription,
    /// URI of the subscribed feed.
    pub feed_uri: String,
    /// Defaults of the owning guild at read time.
    pub defaults: GuildDefaults,
    pub overrides: Override,
}

impl SubscriptionEntry {
    /// Effective delivery policy for this subscription.
    pub fn policy(&self) -> DeliveryPolicy {
        resolve(self.defaults, &self.overrides)
    }
}

/// Rows removed when a guild's data is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuildPurge {
    /// Subscriptions deleted (overrides cascade with them).
    pub subscriptions: u64,
    /// Feeds deleted because nothing referenced them any more.
    pub feeds: u64,
}
