//! Tweet, user, and place payload types.
//!
//! These are pass-through payloads: the harvester only cares about the id
//! (ordering key), the one level of `retweeted_status` / `quoted_status`
//! nesting, and the fields the storage contract requires. Everything the
//! API sends beyond that is dropped at deserialization.

use crate::TweetId;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// `created_at` format used by the v1.1 API, e.g.
/// `"Wed Oct 10 20:19:24 +0000 2018"`.
pub const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Parse a `created_at` string into epoch seconds.
///
/// Returns `None` when the string does not match [`CREATED_AT_FORMAT`].
pub fn created_at_to_ts(created_at: &str) -> Option<i64> {
    DateTime::parse_from_str(created_at, CREATED_AT_FORMAT)
        .ok()
        .map(|dt| dt.timestamp())
}

/// A tweet as returned by the search endpoint.
///
/// `id` is the only field the collector itself depends on; the rest is
/// optional so that a sparse payload deserializes and is rejected later by
/// the storage validation rather than by serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    /// Tweet identifier (the pagination ordering key).
    pub id: TweetId,
    /// Creation time string in [`CREATED_AT_FORMAT`].
    pub created_at: Option<String>,
    /// Full tweet body (`tweet_mode=extended`).
    pub full_text: Option<String>,
    /// Embedded author payload.
    pub user: Option<User>,
    /// GeoJSON coordinates, when the tweet is geotagged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<serde_json::Value>,
    /// Place payload, when the tweet is tagged with one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<Place>,
    /// Id of the tweet this one replies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_status_id: Option<TweetId>,
    /// The retweeted original, present iff this tweet is a retweet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retweeted_status: Option<Box<Tweet>>,
    /// The quoted tweet, present iff this tweet quotes another.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_status: Option<Box<Tweet>>,
    /// Id of the quoted tweet. Attached by the ingestion dispatcher before
    /// the quoted payload is detached for its own write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_id: Option<TweetId>,
    /// Id of the retweeted original. Attached by the ingestion dispatcher
    /// before the original payload is detached for its own write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retweeted_id: Option<TweetId>,
}

impl Tweet {
    /// Minimal constructor used by tests and demos.
    pub fn bare(id: TweetId) -> Self {
        Self {
            id,
            created_at: None,
            full_text: None,
            user: None,
            coordinates: None,
            place: None,
            in_reply_to_status_id: None,
            retweeted_status: None,
            quoted_status: None,
            quoted_id: None,
            retweeted_id: None,
        }
    }
}

/// A tweet author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: Option<u64>,
    /// Handle (without the leading `@`).
    pub screen_name: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Free-form location string.
    pub location: Option<String>,
    /// Profile bio.
    pub description: Option<String>,
    /// HTTPS avatar URL.
    pub profile_image_url_https: Option<String>,
    /// Follower count at collection time.
    pub followers_count: Option<u64>,
    /// Following count at collection time.
    pub friends_count: Option<u64>,
    /// Lifetime tweet count at collection time.
    pub statuses_count: Option<u64>,
    /// Account creation time in [`CREATED_AT_FORMAT`].
    pub created_at: Option<String>,
}

/// A place payload attached to a geotagged tweet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    /// Place identifier (opaque string).
    pub id: Option<String>,
    /// Human-readable name, e.g. "Brooklyn, NY".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Country name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Place type, e.g. "city".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_type: Option<String>,
    /// GeoJSON bounding box, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<serde_json::Value>,
}
