//! Production search client backed by `reqwest`.
//!
//! One instance holds the fixed query and page size for the whole run; the
//! credential varies per call. HTTP 503 is retried indefinitely with a fixed
//! short delay, every other non-success status is fatal.

use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::api::{next_cursor, ApiError, ApiResult, PageRequest, SearchApi, SearchPage};
use crate::auth::Credential;
use crate::collector::config::{OVERLOAD_RETRY_DELAY, PAGE_SIZE, SEARCH_BASE_URL};
use crate::model::Tweet;
use crate::shutdown::SharedShutdown;
use crate::TweetId;
use async_trait::async_trait;

const SEARCH_PATH: &str = "/1.1/search/tweets.json";
const RATE_LIMIT_STATUS_PATH: &str = "/1.1/application/rate_limit_status.json";

/// Search response envelope: tweets live under `statuses`.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    statuses: Vec<Tweet>,
}

/// Quota-status response, narrowed to the search resource.
#[derive(Debug, Deserialize)]
struct RateLimitStatusResponse {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    search: HashMap<String, ResourceLimit>,
}

#[derive(Debug, Deserialize)]
struct ResourceLimit {
    remaining: u32,
    reset: i64,
}

/// Client for the v1.1 search and rate-limit-status endpoints.
pub struct TwitterSearchClient {
    http: reqwest::Client,
    base_url: String,
    query: String,
    page_size: u32,
    shutdown: SharedShutdown,
}

impl TwitterSearchClient {
    /// Create a client for the given query against the production base URL.
    pub fn new(query: impl Into<String>, shutdown: SharedShutdown) -> Self {
        Self::with_base_url(SEARCH_BASE_URL, query, shutdown)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(
        base_url: impl Into<String>,
        query: impl Into<String>,
        shutdown: SharedShutdown,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            query: query.into(),
            page_size: PAGE_SIZE,
            shutdown,
        }
    }

    /// Execute a GET, observing shutdown while the request is in flight.
    async fn get(
        &self,
        url: &str,
        params: &[(&str, String)],
        credential: &Credential,
    ) -> ApiResult<reqwest::Response> {
        let request = self
            .http
            .get(url)
            .query(params)
            .header(AUTHORIZATION, credential.authorization());

        tokio::select! {
            result = request.send() => result.map_err(|e| ApiError::Network(e.to_string())),
            _ = self.shutdown.wait_for_shutdown() => Err(ApiError::Cancelled),
        }
    }

    /// Sleep out an overload response, observing shutdown.
    async fn overload_backoff(&self) -> ApiResult<()> {
        tokio::select! {
            _ = tokio::time::sleep(OVERLOAD_RETRY_DELAY) => Ok(()),
            _ = self.shutdown.wait_for_shutdown() => Err(ApiError::Cancelled),
        }
    }

    fn parse_quota_headers(headers: &HeaderMap) -> (Option<u32>, Option<i64>) {
        let remaining = headers
            .get("x-rate-limit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let reset_at = headers
            .get("x-rate-limit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        (remaining, reset_at)
    }
}

#[async_trait]
impl SearchApi for TwitterSearchClient {
    async fn fetch_page(
        &self,
        request: &PageRequest,
        credential: &Credential,
    ) -> ApiResult<SearchPage> {
        let url = format!("{}{}", self.base_url, SEARCH_PATH);
        let mut params = vec![
            ("q", self.query.clone()),
            ("count", self.page_size.to_string()),
            ("tweet_mode", "extended".to_string()),
        ];
        if request.since_id > 0 {
            params.push(("since_id", request.since_id.to_string()));
        }
        // A live range has no upper bound yet; the sentinel stays off the wire.
        if request.max_id < TweetId::MAX {
            params.push(("max_id", request.max_id.to_string()));
        }

        loop {
            let response = self.get(&url, &params, credential).await?;
            let status = response.status();

            if status.as_u16() == 503 {
                warn!(
                    credential = %credential.label,
                    "search endpoint overloaded (503), retrying after fixed delay"
                );
                self.overload_backoff().await?;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ApiError::Http {
                    status: status.as_u16(),
                    body,
                });
            }

            let (remaining, reset_at) = Self::parse_quota_headers(response.headers());

            let parsed: SearchResponse = response
                .json()
                .await
                .map_err(|e| ApiError::Parse(e.to_string()))?;

            let tweets = parsed.statuses;
            debug!(
                count = tweets.len(),
                max_id = request.max_id,
                since_id = request.since_id,
                "fetched search page"
            );

            return Ok(SearchPage {
                next_cursor: next_cursor(&tweets),
                exhausted: tweets.is_empty(),
                tweets,
                remaining,
                reset_at,
            });
        }
    }

    async fn rate_limit_status(
        &self,
        credential: &Credential,
    ) -> ApiResult<crate::api::RateLimitState> {
        let url = format!("{}{}", self.base_url, RATE_LIMIT_STATUS_PATH);
        let params = [("resources", "search".to_string())];

        let response = self.get(&url, &params, credential).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: RateLimitStatusResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        let limit = parsed
            .resources
            .search
            .get("/search/tweets")
            .ok_or_else(|| {
                ApiError::Parse("quota status missing /search/tweets resource".to_string())
            })?;

        Ok(crate::api::RateLimitState {
            remaining: limit.remaining,
            reset_at: limit.reset,
        })
    }
}
