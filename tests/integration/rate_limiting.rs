//! Credential rotation and quota-window behavior.

use super::support::{credentials, full_tweet, now_ts, MockApi};
use std::sync::Arc;
use tweet_harvester::collector::Collector;
use tweet_harvester::shutdown::ShutdownCoordinator;
use tweet_harvester::storage::memory::MemoryStore;
use tweet_harvester::Tweet;

fn feed(count: u64) -> Vec<Tweet> {
    (1..=count).map(full_tweet).collect()
}

#[tokio::test]
async fn richest_credential_is_used_first() {
    let shutdown = ShutdownCoordinator::shared();
    let creds = credentials(2);
    let api = Arc::new(MockApi::new(feed(10), 100, &creds, 450, shutdown.clone()));
    // cred1 has more quota left than cred0.
    api.set_quota("cred0", 3, now_ts() + 900);
    api.set_quota("cred1", 100, now_ts() + 900);
    let store = Arc::new(MemoryStore::new());

    let mut collector =
        Collector::new(api.clone(), store.clone(), creds, shutdown).unwrap();
    collector.init_state(false).await.unwrap();
    collector.run_once().await.unwrap();

    for (_, _, label) in api.requests() {
        assert_eq!(label, "cred1");
    }
    assert_eq!(store.tweet_count(), 10);
}

#[tokio::test]
async fn rotation_moves_on_when_a_credential_runs_dry() {
    let shutdown = ShutdownCoordinator::shared();
    let creds = credentials(2);
    // 250 tweets at 100 per page need 4 fetches, but each credential only
    // has 2 calls in its window.
    let api = Arc::new(MockApi::new(feed(250), 100, &creds, 2, shutdown.clone()));
    let store = Arc::new(MemoryStore::new());

    let mut collector =
        Collector::new(api.clone(), store.clone(), creds, shutdown).unwrap();
    collector.init_state(false).await.unwrap();
    collector.run_once().await.unwrap();

    let labels: Vec<String> = api.requests().into_iter().map(|r| r.2).collect();
    assert!(labels.contains(&"cred0".to_string()));
    assert!(labels.contains(&"cred1".to_string()));
    assert_eq!(store.tweet_count(), 250);
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_quota_waits_out_the_earliest_reset() {
    let shutdown = ShutdownCoordinator::shared();
    let creds = credentials(2);
    let api = Arc::new(MockApi::new(feed(5), 100, &creds, 450, shutdown.clone()));
    // Both credentials are dry; the windows ended in the past so the wait
    // expires immediately and collection proceeds after re-refreshing.
    api.set_quota("cred0", 0, now_ts() - 30);
    api.set_quota("cred1", 0, now_ts() - 10);
    let store = Arc::new(MemoryStore::new());

    let mut collector =
        Collector::new(api.clone(), store.clone(), creds.clone(), shutdown).unwrap();
    collector.init_state(false).await.unwrap();

    // Refill on a side task once the first status round has been observed,
    // simulating the provider's window rollover.
    let api_refill = api.clone();
    let refill = tokio::spawn(async move {
        loop {
            if api_refill.status_calls() >= 2 {
                api_refill.set_quota("cred0", 450, now_ts() + 900);
                api_refill.set_quota("cred1", 450, now_ts() + 900);
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    });

    collector.run_once().await.unwrap();
    refill.await.unwrap();

    assert_eq!(store.tweet_count(), 5);
    // At least two status rounds: the dry snapshot and the refilled one.
    assert!(api.status_calls() >= 4);
}

#[tokio::test]
async fn missing_headers_fall_back_to_wholesale_refresh() {
    let shutdown = ShutdownCoordinator::shared();
    let creds = credentials(1);
    let api = Arc::new(MockApi::new(feed(150), 100, &creds, 450, shutdown.clone()));
    api.without_headers();
    let store = Arc::new(MemoryStore::new());

    let mut collector =
        Collector::new(api.clone(), store.clone(), creds, shutdown).unwrap();
    collector.init_state(false).await.unwrap();
    collector.run_once().await.unwrap();

    assert_eq!(store.tweet_count(), 150);
    // Every fetch that came back without quota headers forced a snapshot.
    assert!(api.status_calls() >= api.fetch_calls());
}
