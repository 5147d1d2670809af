//! JSONL backend durability across process restarts.

use super::support::full_tweet;
use tempfile::TempDir;
use tweet_harvester::storage::jsonl::JsonlStore;
use tweet_harvester::storage::TweetStore;
use tweet_harvester::GapRange;

#[tokio::test]
async fn reopen_rebuilds_max_id_and_dedup_sets() {
    let dir = TempDir::new().unwrap();

    {
        let store = JsonlStore::open(dir.path()).unwrap();
        for id in [10, 30, 20] {
            let tweet = full_tweet(id);
            store.insert_tweet(&tweet, tweet.user.as_ref()).await.unwrap();
        }
        assert_eq!(store.max_known_id().await.unwrap(), 30);
    }

    // Fresh process over the same directory.
    let store = JsonlStore::open(dir.path()).unwrap();
    assert_eq!(store.max_known_id().await.unwrap(), 30);

    // Redelivery after restart is a no-op.
    let tweet = full_tweet(20);
    store.insert_tweet(&tweet, tweet.user.as_ref()).await.unwrap();

    let lines = std::fs::read_to_string(dir.path().join("tweets.jsonl")).unwrap();
    assert_eq!(lines.lines().count(), 3);
}

#[tokio::test]
async fn collection_state_round_trips() {
    let dir = TempDir::new().unwrap();

    {
        let store = JsonlStore::open(dir.path()).unwrap();
        store.save_collection_state(500, 100, false).await.unwrap();
        store.save_collection_state(900, 700, false).await.unwrap();
        // Same floor again: an update, not a second range.
        store.save_collection_state(300, 100, false).await.unwrap();
    }

    let store = JsonlStore::open(dir.path()).unwrap();
    let mut ranges = store.load_collection_state().await.unwrap();
    ranges.sort_by_key(|r| r.floor);
    assert_eq!(
        ranges,
        vec![GapRange::new(300, 100), GapRange::new(900, 700)]
    );
}

#[tokio::test]
async fn exhausted_range_is_removed_from_state() {
    let dir = TempDir::new().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();

    store.save_collection_state(500, 100, false).await.unwrap();
    store.save_collection_state(100, 100, true).await.unwrap();

    assert!(store.load_collection_state().await.unwrap().is_empty());

    let reopened = JsonlStore::open(dir.path()).unwrap();
    assert!(reopened.load_collection_state().await.unwrap().is_empty());
}

#[tokio::test]
async fn torn_trailing_line_is_skipped_on_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store = JsonlStore::open(dir.path()).unwrap();
        let tweet = full_tweet(7);
        store.insert_tweet(&tweet, tweet.user.as_ref()).await.unwrap();
    }

    // Simulate a crash mid-append.
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(dir.path().join("tweets.jsonl"))
        .unwrap();
    file.write_all(b"{\"id\": 99, \"trunc").unwrap();

    let store = JsonlStore::open(dir.path()).unwrap();
    assert_eq!(store.max_known_id().await.unwrap(), 7);

    // The torn id was never committed, so it can still be written.
    let tweet = full_tweet(99);
    store.insert_tweet(&tweet, tweet.user.as_ref()).await.unwrap();
    assert_eq!(store.max_known_id().await.unwrap(), 99);
}

#[tokio::test]
async fn retweet_edges_persist_across_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store = JsonlStore::open(dir.path()).unwrap();
        let mut retweet = full_tweet(100);
        retweet.retweeted_id = Some(40);
        let user = retweet.user.take();
        store.insert_retweet(&retweet, user.as_ref()).await.unwrap();
    }

    let store = JsonlStore::open(dir.path()).unwrap();
    let mut retweet = full_tweet(100);
    retweet.retweeted_id = Some(40);
    let user = retweet.user.take();
    // Duplicate edge after restart: no second line.
    store.insert_retweet(&retweet, user.as_ref()).await.unwrap();

    let lines = std::fs::read_to_string(dir.path().join("retweets.jsonl")).unwrap();
    assert_eq!(lines.lines().count(), 1);
}

#[tokio::test]
async fn user_rows_keep_the_newest_observation() {
    let dir = TempDir::new().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();

    // Same author on two tweets, newest first.
    let mut newer = full_tweet(50);
    let mut older = full_tweet(10);
    if let Some(user) = older.user.as_mut() {
        user.id = newer.user.as_ref().unwrap().id;
    }
    if let Some(user) = newer.user.as_mut() {
        user.name = Some("Newer Name".to_string());
    }

    store.insert_tweet(&newer, newer.user.as_ref()).await.unwrap();
    store.insert_tweet(&older, older.user.as_ref()).await.unwrap();

    // The older observation must not add a row shadowing the newer one.
    let lines = std::fs::read_to_string(dir.path().join("users.jsonl")).unwrap();
    assert_eq!(lines.lines().count(), 1);
    assert!(lines.contains("Newer Name"));
}
