//! Search API access: page fetching, quota status, and credential selection.
//!
//! The provider is reached through the [`SearchApi`] trait so the collector
//! and rate limiter can be driven against a scripted implementation in
//! tests. [`client::TwitterSearchClient`] is the production implementation.

use crate::auth::Credential;
use crate::model::Tweet;
use crate::TweetId;
use async_trait::async_trait;

pub mod client;
pub mod rate_limit;

pub use rate_limit::{RateLimitState, RateLimiter, Selection};

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-success HTTP status other than the retried 503. Fatal: the
    /// caller aborts the current range and checkpoints.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be deserialized
    #[error("parse error: {0}")]
    Parse(String),

    /// A shutdown request interrupted a blocking point
    #[error("shutdown requested")]
    Cancelled,
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Request parameters for one search page.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    /// Upper pagination bound (`max_id`); decremented after each page.
    pub max_id: TweetId,
    /// Lower bound (`since_id`); ids at or below this are already collected.
    pub since_id: TweetId,
}

/// One page of search results plus the quota hints that rode along with it.
#[derive(Debug)]
pub struct SearchPage {
    /// Tweets on this page, newest first.
    pub tweets: Vec<Tweet>,
    /// `min(id) - 1` over the page, the next `max_id`. `None` on an empty
    /// page (the cursor does not move).
    pub next_cursor: Option<TweetId>,
    /// True iff the page was empty: the provider signals end-of-range by
    /// returning nothing, not with an explicit flag.
    pub exhausted: bool,
    /// `x-rate-limit-remaining`, when the response carried it.
    pub remaining: Option<u32>,
    /// `x-rate-limit-reset` (epoch seconds), when the response carried it.
    pub reset_at: Option<i64>,
}

/// Provider access used by the collector and the rate limiter.
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Fetch one search page with the given credential.
    ///
    /// Implementations retry HTTP 503 indefinitely with a fixed short delay
    /// (overload is transient by definition) and fail fatally on any other
    /// non-success status.
    async fn fetch_page(
        &self,
        request: &PageRequest,
        credential: &Credential,
    ) -> ApiResult<SearchPage>;

    /// Query the provider's quota-status endpoint for one credential.
    ///
    /// Errors are fatal: quota state is unknowable without this endpoint.
    async fn rate_limit_status(&self, credential: &Credential) -> ApiResult<RateLimitState>;
}

/// Compute the next backward cursor for a page of tweets.
///
/// Pagination always moves strictly backward in id space: the next request's
/// `max_id` is one below the smallest id seen so far.
pub fn next_cursor(tweets: &[Tweet]) -> Option<TweetId> {
    tweets.iter().map(|t| t.id).min().map(|min| min.saturating_sub(1))
}
