//! Concurrency tests for feedbot.
//!
//! These tests run against a file-backed database so that concurrent
//! callers really use separate connections.

use std::sync::Arc;

use feedbot::{Database, FeedRepository, GuildConfigRepository, SubscriptionRepository};

/// Open a fresh database inside a temporary directory.
async fn setup_file_db() -> (tempfile::TempDir, Arc<Database>) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("feedbot.db")).await.unwrap();
    (dir, Arc::new(db))
}

/// Concurrent get-or-create of the same URI yields a single feed.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_get_or_create_single_row() {
    let (_dir, db) = setup_file_db().await;

    const NUM_CALLERS: usize = 16;

    let mut handles = Vec::new();
    for _ in 0..NUM_CALLERS {
        let db_clone = Arc::clone(&db);
        handles.push(tokio::spawn(async move {
            FeedRepository::new(db_clone.pool())
                .get_or_create("https://example.com/feed.xml")
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }

    // Every caller sees the same feed
    ids.dedup();
    assert_eq!(ids.len(), 1, "All callers should get the same feed");

    let count = FeedRepository::new(db.pool()).count().await.unwrap();
    assert_eq!(count, 1, "Exactly one feed row should exist");
}

/// Concurrent subscription of the same channel to the same feed creates it once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_subscribe_single_row() {
    let (_dir, db) = setup_file_db().await;

    GuildConfigRepository::new(db.pool())
        .create("guild-1", "u:owner")
        .await
        .unwrap();
    let feed_id = FeedRepository::new(db.pool())
        .get_or_create("https://example.com/feed.xml")
        .await
        .unwrap()
        .id;

    const NUM_CALLERS: usize = 8;

    let mut handles = Vec::new();
    for _ in 0..NUM_CALLERS {
        let db_clone = Arc::clone(&db);
        handles.push(tokio::spawn(async move {
            SubscriptionRepository::new(db_clone.pool())
                .create("chan-1", feed_id, "guild-1")
                .await
        }));
    }

    let mut created = 0;
    let mut ids = Vec::new();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        if outcome.is_created() {
            created += 1;
        }
        ids.push(outcome.into_inner().id);
    }

    assert_eq!(created, 1, "Exactly one caller should create the subscription");
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let subs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions")
        .fetch_one(db.pool())
        .await
        .unwrap();
    let overrides: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscription_overrides")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(subs, 1);
    assert_eq!(overrides, 1, "Every subscription has exactly one override");
}

/// Destroying a guild while other guilds subscribe leaves no orphans.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_destroy_guild_during_subscribes() {
    let (_dir, db) = setup_file_db().await;

    let guilds = GuildConfigRepository::new(db.pool());
    guilds.create("guild-gone", "u:1").await.unwrap();
    guilds.create("guild-stays", "u:2").await.unwrap();

    let feeds = FeedRepository::new(db.pool());
    let shared = feeds
        .get_or_create("https://example.com/shared.xml")
        .await
        .unwrap()
        .id;
    let private = feeds
        .get_or_create("https://example.com/private.xml")
        .await
        .unwrap()
        .id;

    let subs = SubscriptionRepository::new(db.pool());
    subs.create("chan-x", shared, "guild-gone").await.unwrap();
    subs.create("chan-y", private, "guild-gone").await.unwrap();
    // Keeps the shared feed referenced whatever order the tasks run in.
    subs.create("chan-main", shared, "guild-stays").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..4 {
        let db_clone = Arc::clone(&db);
        handles.push(tokio::spawn(async move {
            SubscriptionRepository::new(db_clone.pool())
                .create(&format!("chan-{i}"), shared, "guild-stays")
                .await
                .map(|_| ())
        }));
    }
    let destroy = {
        let db_clone = Arc::clone(&db);
        tokio::spawn(async move {
            GuildConfigRepository::new(db_clone.pool())
                .destroy("guild-gone")
                .await
        })
    };

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    let purge = destroy.await.unwrap().unwrap();
    assert_eq!(purge.subscriptions, 2);
    assert_eq!(purge.feeds, 1);

    assert!(feeds.get_by_id(shared).await.unwrap().is_some());
    assert!(feeds.get_by_id(private).await.unwrap().is_none());
    assert_eq!(subs.list_for_guild("guild-stays").await.unwrap().len(), 5);
    assert!(subs.list_for_guild("guild-gone").await.unwrap().is_empty());

    let orphans: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM subscription_overrides o \
         LEFT JOIN subscriptions s ON s.id = o.sub_id WHERE s.id IS NULL",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(orphans, 0);
}
