//! Delivery policy resolution.
//!
//! A subscription's effective policy is its override where one is set and
//! the guild default otherwise.

use super::types::{Override, Toggle};

/// Guild-wide defaults that overrides inherit from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuildDefaults {
    pub embeds: bool,
    pub webhooks: bool,
}

/// How an item is delivered to one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryPolicy {
    /// Send the item as a rich embed.
    pub embeds: bool,
    /// Send the item through a channel webhook.
    pub webhooks: bool,
}

/// Resolve the effective policy for a subscription.
pub fn resolve(defaults: GuildDefaults, overrides: &Override) -> DeliveryPolicy {
    DeliveryPolicy {
        embeds: overrides.embeds.resolve(defaults.embeds),
        webhooks: overrides.webhooks.resolve(defaults.webhooks),
    }
}

impl Toggle {
    /// The override value if set, else `default`.
    pub fn resolve(self, default: bool) -> bool {
        match self {
            Toggle::Inherit => default,
            Toggle::ForceOn => true,
            Toggle::ForceOff => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(embeds: Toggle, webhooks: Toggle) -> Override {
        Override {
            id: 1,
            subscription_id: 1,
            embeds,
            webhooks,
        }
    }

    #[test]
    fn test_inherit_uses_guild_default() {
        let defaults = GuildDefaults {
            embeds: true,
            webhooks: false,
        };
        let policy = resolve(defaults, &overrides(Toggle::Inherit, Toggle::Inherit));
        assert_eq!(
            policy,
            DeliveryPolicy {
                embeds: true,
                webhooks: false
            }
        );
    }

    #[test]
    fn test_mixed_override() {
        let defaults = GuildDefaults {
            embeds: true,
            webhooks: false,
        };
        let policy = resolve(defaults, &overrides(Toggle::Inherit, Toggle::ForceOn));
        assert_eq!(
            policy,
            DeliveryPolicy {
                embeds: true,
                webhooks: true
            }
        );
    }

    #[test]
    fn test_force_off_beats_enabled_default() {
        let defaults = GuildDefaults {
            embeds: true,
            webhooks: true,
        };
        let policy = resolve(defaults, &overrides(Toggle::ForceOff, Toggle::ForceOff));
        assert_eq!(policy, DeliveryPolicy::default());
    }

    #[test]
    fn test_toggle_resolve_table() {
        for default in [true, false] {
            assert_eq!(Toggle::Inherit.resolve(default), default);
            assert!(Toggle::ForceOn.resolve(default));
            assert!(!Toggle::ForceOff.resolve(default));
        }
    }
}
