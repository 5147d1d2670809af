//! End-to-end collection runs against a scripted search API.

use super::support::{credentials, full_tweet, BrokenStore, MockApi};
use std::sync::Arc;
use tweet_harvester::collector::{Collector, CollectorError};
use tweet_harvester::shutdown::ShutdownCoordinator;
use tweet_harvester::storage::memory::MemoryStore;
use tweet_harvester::storage::{StorageError, TweetStore};
use tweet_harvester::{GapRange, Tweet, TweetId};

fn feed(ids: impl IntoIterator<Item = TweetId>) -> Vec<Tweet> {
    ids.into_iter().map(full_tweet).collect()
}

#[tokio::test]
async fn live_range_paginates_to_exhaustion() {
    let shutdown = ShutdownCoordinator::shared();
    let creds = credentials(1);
    let api = Arc::new(MockApi::new(
        feed(1..=250),
        100,
        &creds,
        450,
        shutdown.clone(),
    ));
    let store = Arc::new(MemoryStore::new());

    let mut collector = Collector::new(
        api.clone(),
        store.clone(),
        creds,
        shutdown,
    )
    .unwrap();
    collector.init_state(false).await.unwrap();
    collector.run_once().await.unwrap();

    // Three full-or-partial pages plus the final empty page.
    assert_eq!(api.fetch_calls(), 4);
    assert_eq!(store.tweet_count(), 250);

    // The exhausted range leaves nothing behind to recover.
    assert!(store.persisted_ranges().is_empty());
    let last = *store.checkpoints().last().unwrap();
    assert!(last.2, "final checkpoint must mark the range exhausted");
}

#[tokio::test]
async fn pages_walk_backward_in_id_space() {
    let shutdown = ShutdownCoordinator::shared();
    let creds = credentials(1);
    let api = Arc::new(MockApi::new(
        feed(1..=250),
        100,
        &creds,
        450,
        shutdown.clone(),
    ));
    let store = Arc::new(MemoryStore::new());

    let mut collector =
        Collector::new(api.clone(), store.clone(), creds, shutdown).unwrap();
    collector.init_state(false).await.unwrap();
    collector.run_once().await.unwrap();

    let requests = api.requests();
    // First request is unbounded (live range); each following max_id is
    // min(previous page) - 1.
    assert_eq!(requests[0].0, TweetId::MAX);
    assert_eq!(requests[1].0, 150);
    assert_eq!(requests[2].0, 50);
    assert_eq!(requests[3].0, 0);
}

#[tokio::test]
async fn fatal_fault_checkpoints_cursor_before_surfacing() {
    let shutdown = ShutdownCoordinator::shared();
    let creds = credentials(1);
    let api = Arc::new(MockApi::new(
        feed(1..=250),
        100,
        &creds,
        450,
        shutdown.clone(),
    ));
    api.fail_at_fetch(3);
    let store = Arc::new(MemoryStore::new());

    let mut collector =
        Collector::new(api.clone(), store.clone(), creds, shutdown).unwrap();
    collector.init_state(false).await.unwrap();

    let err = collector.run_once().await.unwrap_err();
    assert!(matches!(err, CollectorError::Api(_)), "got {err:?}");

    // Pages 1 and 2 moved the cursor to 50; the fault on page 3 must not.
    assert_eq!(store.persisted_ranges(), vec![GapRange::new(50, 0)]);
    // Everything fetched before the fault is durably stored.
    assert_eq!(store.tweet_count(), 200);
}

#[tokio::test]
async fn io_write_failure_leaves_range_unexhausted() {
    let shutdown = ShutdownCoordinator::shared();
    let creds = credentials(1);
    let api = Arc::new(MockApi::new(
        feed(1..=50),
        100,
        &creds,
        450,
        shutdown.clone(),
    ));
    let store = Arc::new(BrokenStore::new());

    let mut collector =
        Collector::new(api.clone(), store.clone(), creds, shutdown).unwrap();
    collector.init_state(false).await.unwrap();

    let err = collector.run_once().await.unwrap_err();
    assert!(
        matches!(err, CollectorError::Storage(StorageError::Io(_))),
        "got {err:?}"
    );

    // Pagination finished, but none of the writes landed; the range must
    // stay queued un-exhausted at its last cursor.
    let last = *store.checkpoints().last().unwrap();
    assert_eq!(last, (0, 0, false));
    assert_eq!(store.persisted_ranges(), vec![GapRange::new(0, 0)]);
}

#[tokio::test]
async fn resume_drives_saved_gaps_before_live_range() {
    let shutdown = ShutdownCoordinator::shared();
    let creds = credentials(1);

    // Previous run: ids above 200 collected, a gap [0, 50] left behind.
    let store = Arc::new(MemoryStore::new());
    store.insert_tweet(&full_tweet(200), full_tweet(200).user.as_ref())
        .await
        .unwrap();
    store.save_collection_state(50, 0, false).await.unwrap();

    let mut tweets = feed(1..=50);
    tweets.extend(feed(201..=210));
    let api = Arc::new(MockApi::new(tweets, 100, &creds, 450, shutdown.clone()));

    let mut collector =
        Collector::new(api.clone(), store.clone(), creds, shutdown).unwrap();
    collector.init_state(true).await.unwrap();
    collector.run_once().await.unwrap();

    let requests = api.requests();
    // Gap first, bounded by its saved cursor; live range afterwards,
    // floored at the newest stored id.
    assert_eq!((requests[0].0, requests[0].1), (50, 0));
    let live = requests
        .iter()
        .find(|r| r.0 == TweetId::MAX)
        .expect("live range request");
    assert_eq!(live.1, 200);

    assert_eq!(store.tweet_count(), 61);
    assert!(store.persisted_ranges().is_empty());
}

#[tokio::test]
async fn shutdown_mid_range_checkpoints_and_cancels() {
    let shutdown = ShutdownCoordinator::shared();
    let creds = credentials(1);
    let api = Arc::new(MockApi::new(
        feed(1..=250),
        100,
        &creds,
        450,
        shutdown.clone(),
    ));
    api.shutdown_after_fetch(2);
    let store = Arc::new(MemoryStore::new());

    let mut collector =
        Collector::new(api.clone(), store.clone(), creds, shutdown).unwrap();
    collector.init_state(false).await.unwrap();

    let err = collector.run().await.unwrap_err();
    assert!(matches!(err, CollectorError::Cancelled), "got {err:?}");

    // Both served pages landed and the cursor points below them.
    assert_eq!(store.tweet_count(), 200);
    assert_eq!(store.persisted_ranges(), vec![GapRange::new(50, 0)]);
    // No fetch after the shutdown request.
    assert_eq!(api.fetch_calls(), 2);
}

#[tokio::test]
async fn empty_feed_exhausts_immediately() {
    let shutdown = ShutdownCoordinator::shared();
    let creds = credentials(1);
    let api = Arc::new(MockApi::new(Vec::new(), 100, &creds, 450, shutdown.clone()));
    let store = Arc::new(MemoryStore::new());

    let mut collector =
        Collector::new(api.clone(), store.clone(), creds, shutdown).unwrap();
    collector.init_state(false).await.unwrap();
    collector.run_once().await.unwrap();

    assert_eq!(api.fetch_calls(), 1);
    assert_eq!(store.tweet_count(), 0);
    assert!(store.persisted_ranges().is_empty());
}

#[tokio::test]
async fn empty_credential_list_is_a_startup_fault() {
    let shutdown = ShutdownCoordinator::shared();
    let api = Arc::new(MockApi::new(Vec::new(), 100, &[], 0, shutdown.clone()));
    let store = Arc::new(MemoryStore::new());

    let result = Collector::new(api, store, Vec::new(), shutdown);
    assert!(matches!(
        result.err(),
        Some(CollectorError::NoCredentials)
    ));
}
