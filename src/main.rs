use std::sync::Arc;

use tracing::{error, info};

use feedbot::{start_feed_poller, Config, Database, Dispatcher, HttpFeedSource, LogNotifier};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = feedbot::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        feedbot::logging::init_console_only(&config.logging.level);
    }

    info!("feedbot {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let db = match Database::open(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let source = match HttpFeedSource::new(&config.fetch) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to create feed source: {}", e);
            std::process::exit(1);
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(
        db.clone(),
        Arc::new(source),
        Arc::new(LogNotifier),
        &config.poller,
    ));
    let poller = start_feed_poller(dispatcher, &config.poller);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    poller.abort();
    db.close().await;
}
