//! Dispatch module for feedbot.
//!
//! Poll cycles, the notifier seam, and the background poll loop.

pub mod dispatcher;
pub mod notifier;
pub mod poller;

pub use dispatcher::{CycleError, Dispatcher};
pub use notifier::{DeliveryError, LogNotifier, Notifier};
pub use poller::{start_feed_poller, FeedPoller, DEFAULT_POLL_INTERVAL_SECS};
