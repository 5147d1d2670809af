use std::time::Duration;

use tweet_harvester::shutdown::ShutdownCoordinator;

#[tokio::test]
async fn shutdown_notifies_waiters() {
    let shutdown = ShutdownCoordinator::shared();
    let waiter = {
        let handle = shutdown.clone();
        tokio::spawn(async move {
            handle.wait_for_shutdown().await;
            true
        })
    };

    // Give the task time to start waiting
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.request_shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok());
}

/// Requests shutdown immediately before wait_for_shutdown() to verify no
/// deadlock occurs when the request lands between the check and the await.
#[tokio::test]
async fn shutdown_race_condition_no_deadlock() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let handle = shutdown.clone();
    let waiter = tokio::spawn(async move {
        handle.wait_for_shutdown().await;
        true
    });

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(
        result.is_ok(),
        "wait_for_shutdown() deadlocked despite shutdown already requested"
    );
}

/// Multiple tasks wait concurrently while another requests shutdown; every
/// waiter must be notified.
#[tokio::test]
async fn shutdown_concurrent_waiters_all_notified() {
    let shutdown = ShutdownCoordinator::shared();

    let mut waiters = Vec::new();
    for _ in 0..10 {
        let handle = shutdown.clone();
        waiters.push(tokio::spawn(async move {
            handle.wait_for_shutdown().await;
        }));
    }

    // Small delay to let all tasks start waiting
    tokio::time::sleep(Duration::from_millis(10)).await;

    shutdown.request_shutdown();

    for waiter in waiters {
        let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(result.is_ok(), "A waiter was not notified of shutdown");
    }
}

#[tokio::test]
async fn shutdown_wait_returns_immediately_when_already_set() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let start = tokio::time::Instant::now();
    shutdown.wait_for_shutdown().await;
    let elapsed = start.elapsed();

    assert!(
        elapsed < Duration::from_millis(10),
        "wait_for_shutdown took too long: {:?}",
        elapsed
    );
}

/// A shutdown request during a rate-limit wait aborts the wait instead of
/// sleeping out the window.
#[tokio::test]
async fn rate_limit_wait_aborts_on_shutdown() {
    use super::support::{credentials, now_ts, MockApi};
    use std::sync::Arc;
    use tweet_harvester::api::{ApiError, RateLimiter};

    let shutdown = ShutdownCoordinator::shared();
    let creds = credentials(1);
    let api = Arc::new(MockApi::new(Vec::new(), 100, &creds, 0, shutdown.clone()));
    let limiter = RateLimiter::new(api, creds).unwrap();

    let waiter = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            // A window ending far in the future.
            limiter.wait_for_reset(now_ts() + 600, &shutdown).await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.request_shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("wait did not abort")
        .unwrap();
    assert!(matches!(result, Err(ApiError::Cancelled)));
}
