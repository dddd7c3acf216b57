//! Subscription module for feedbot.
//!
//! Guild defaults, per-channel subscriptions, their overrides, and the
//! resolution of the effective delivery policy.

pub mod guild;
pub mod policy;
pub mod repository;
pub mod types;

pub use guild::GuildConfigRepository;
pub use policy::{resolve, DeliveryPolicy, GuildDefaults};
pub use repository::SubscriptionRepository;
pub use types::{
    owner_contact, GuildConfig, GuildPurge, Override, Subscription, SubscriptionEntry, Toggle,
};
