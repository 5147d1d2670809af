//! Collector configuration constants.

use std::time::Duration;

/// Search API base URL.
pub const SEARCH_BASE_URL: &str = "https://api.twitter.com";

/// Tweets requested per page. 100 is the search endpoint's maximum.
pub const PAGE_SIZE: u32 = 100;

/// Delay between retries of an HTTP 503 response. Overload is transient and
/// recoverable, so the retry loop is unbounded with a fixed short delay.
pub const OVERLOAD_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Slack added to a credential's reset time before re-checking quota, so the
/// wait lands just after the provider's window actually refills.
pub const RESET_SLACK_SECS: i64 = 1;

/// Size of the ingestion worker pool: `max(1, cpus - 2)`. Two cores are left
/// for the driver thread and the runtime itself.
pub fn ingest_workers() -> usize {
    let cpus = num_cpus::get();
    if cpus > 2 {
        cpus - 2
    } else {
        1
    }
}
