//! Background poll loop for feedbot.
//!
//! Drives [`Dispatcher::run_cycle`] on a fixed interval. A slow cycle delays
//! the next tick, so cycles never overlap.

use std::sync::Arc;
use std::time::Instant as StdInstant;

use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::dispatcher::{CycleError, Dispatcher};
use crate::config::PollerConfig;
use crate::Result;

/// Default poll interval in seconds (1 hour).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3600;

/// Feed poll loop.
pub struct FeedPoller {
    dispatcher: Arc<Dispatcher>,
    poll_interval: Duration,
    run_on_startup: bool,
}

impl FeedPoller {
    /// Create a poller from the poller configuration.
    pub fn new(dispatcher: Arc<Dispatcher>, config: &PollerConfig) -> Self {
        Self {
            dispatcher,
            poll_interval: config.interval(),
            run_on_startup: config.run_on_startup,
        }
    }

    /// Create a poller with a custom interval that runs a cycle immediately.
    pub fn with_interval(dispatcher: Arc<Dispatcher>, poll_interval: Duration) -> Self {
        Self {
            dispatcher,
            poll_interval,
            run_on_startup: true,
        }
    }

    /// Run the poll loop forever.
    pub async fn run(&self) {
        info!(
            "Feed poller started (interval: {} seconds, run on startup: {})",
            self.poll_interval.as_secs(),
            self.run_on_startup
        );

        let mut timer = if self.run_on_startup {
            interval(self.poll_interval)
        } else {
            interval_at(Instant::now() + self.poll_interval, self.poll_interval)
        };
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            if self.poll_once().await.is_err() {
                debug!("Retrying in {} seconds", self.poll_interval.as_secs());
            }
        }
    }

    /// Run a single cycle and log its outcome.
    pub async fn poll_once(&self) -> Result<Vec<CycleError>> {
        let started = StdInstant::now();

        match self.dispatcher.run_cycle().await {
            Ok(errors) => {
                for err in &errors {
                    warn!("Poll cycle: {}", err);
                }
                info!(
                    "Poll cycle finished in {} ms with {} error(s)",
                    started.elapsed().as_millis(),
                    errors.len()
                );
                Ok(errors)
            }
            Err(e) => {
                if e.is_fatal() {
                    error!("Poll cycle aborted, database unavailable: {}", e);
                } else {
                    error!("Poll cycle aborted: {}", e);
                }
                Err(e)
            }
        }
    }
}

/// Start the feed poller as a background task.
pub fn start_feed_poller(dispatcher: Arc<Dispatcher>, config: &PollerConfig) -> JoinHandle<()> {
    let poller = FeedPoller::new(dispatcher, config);
    tokio::spawn(async move {
        poller.run().await;
    })
}
