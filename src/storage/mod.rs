//! Storage contract consumed by the collector.
//!
//! The collector is threaded at the ingestion boundary: the order of writes
//! cannot be predicted and the same id may be delivered more than once, so
//! every backend must be safe for concurrent use and must treat duplicate
//! ids as no-ops or idempotent updates.
//!
//! Required-field validation is one shared function ([`build_tweet_write`],
//! [`build_retweet_write`]) invoked by every backend before commit, failing
//! with [`StorageError::MissingAttributes`]; there is a single fixed
//! contract, so no dispatch polymorphism is involved.

use crate::model::{created_at_to_ts, Tweet, User};
use crate::state::GapRange;
use crate::TweetId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod jsonl;
pub mod memory;

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Required fields absent, null, or unparseable. Never retried; the
    /// write fails and siblings proceed.
    #[error("missing required attributes: {}", fields.join(", "))]
    MissingAttributes {
        /// Names of the missing fields, `tweet.*` / `user.*` prefixed.
        fields: Vec<String>,
    },

    /// Backend I/O failure
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Persisted collection state could not be decoded
    #[error("corrupt collection state: {0}")]
    CorruptState(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable store for tweets, authors, retweet edges, and collection state.
#[async_trait]
pub trait TweetStore: Send + Sync {
    /// Id of the newest stored tweet, or 0 when the store is empty. Seeds
    /// the live range's floor.
    async fn max_known_id(&self) -> StorageResult<TweetId>;

    /// Load the persisted gap ranges from the last run.
    async fn load_collection_state(&self) -> StorageResult<Vec<GapRange>>;

    /// Replace the checkpoint for the range currently being processed.
    ///
    /// `floor` identifies the range (it never changes while a range is
    /// driven). `exhausted` removes the range from the persisted state;
    /// otherwise its ceiling is updated (or a new entry added, for an
    /// aborted live range) so the next run resumes from `ceiling`.
    async fn save_collection_state(
        &self,
        ceiling: TweetId,
        floor: TweetId,
        exhausted: bool,
    ) -> StorageResult<()>;

    /// Insert a tweet and upsert its author. Duplicate tweet ids are no-ops.
    async fn insert_tweet(&self, tweet: &Tweet, user: Option<&User>) -> StorageResult<()>;

    /// Insert a retweet edge and upsert the retweeting author.
    async fn insert_retweet(&self, retweet: &Tweet, user: Option<&User>) -> StorageResult<()>;
}

/// Flattened tweet row as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetRecord {
    /// Tweet id.
    pub id: TweetId,
    /// Author id.
    pub user_id: u64,
    /// Original `created_at` string.
    pub created_at: String,
    /// Epoch seconds parsed from `created_at`.
    pub timestamp: i64,
    /// Tweet body.
    pub full_text: String,
    /// GeoJSON coordinates, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<serde_json::Value>,
    /// Place id, when the tweet carried a place payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    /// Replied-to tweet id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_status_id: Option<TweetId>,
    /// Quoted tweet id, attached by the dispatcher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_id: Option<TweetId>,
}

/// Flattened author row as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// User id.
    pub id: u64,
    /// Handle.
    pub screen_name: String,
    /// Display name.
    pub name: String,
    /// Location string.
    pub location: String,
    /// Bio.
    pub description: String,
    /// Avatar URL.
    pub profile_image_url_https: String,
    /// Follower count.
    pub followers_count: u64,
    /// Following count.
    pub friends_count: u64,
    /// Lifetime tweet count.
    pub statuses_count: u64,
    /// Account creation time string.
    pub created_at: String,
    /// Id of the newest tweet this row was observed on; backends keep the
    /// row from the newest observation.
    pub last_tweet_id: TweetId,
    /// Timestamp of that tweet.
    pub last_tweet_ts: i64,
}

/// Retweet edge row: a reference from the retweeting user to the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetweetRecord {
    /// Id of the retweet itself.
    pub id: TweetId,
    /// Id of the retweeted original.
    pub tweet_id: TweetId,
    /// Retweeting user's id.
    pub user_id: u64,
    /// Retweet `created_at` string.
    pub created_at: String,
    /// Epoch seconds parsed from `created_at`.
    pub timestamp: i64,
    /// Place id, when the retweet carried a place payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
}

/// Clone a required field, recording its name when absent.
fn require<T: Clone + Default>(
    value: &Option<T>,
    name: &'static str,
    missing: &mut Vec<String>,
) -> T {
    match value {
        Some(v) => v.clone(),
        None => {
            missing.push(name.to_string());
            T::default()
        }
    }
}

fn build_user_record(
    user: Option<&User>,
    last_tweet_id: TweetId,
    last_tweet_ts: i64,
    missing: &mut Vec<String>,
) -> UserRecord {
    let empty = User {
        id: None,
        screen_name: None,
        name: None,
        location: None,
        description: None,
        profile_image_url_https: None,
        followers_count: None,
        friends_count: None,
        statuses_count: None,
        created_at: None,
    };
    let user = match user {
        Some(u) => u,
        None => {
            missing.push("user".to_string());
            &empty
        }
    };

    UserRecord {
        id: require(&user.id, "user.id", missing),
        screen_name: require(&user.screen_name, "user.screen_name", missing),
        name: require(&user.name, "user.name", missing),
        location: require(&user.location, "user.location", missing),
        description: require(&user.description, "user.description", missing),
        profile_image_url_https: require(
            &user.profile_image_url_https,
            "user.profile_image_url_https",
            missing,
        ),
        followers_count: require(&user.followers_count, "user.followers_count", missing),
        friends_count: require(&user.friends_count, "user.friends_count", missing),
        statuses_count: require(&user.statuses_count, "user.statuses_count", missing),
        created_at: require(&user.created_at, "user.created_at", missing),
        last_tweet_id,
        last_tweet_ts,
    }
}

fn parse_timestamp(created_at: &Option<String>, missing: &mut Vec<String>) -> (String, i64) {
    let raw = require(created_at, "tweet.created_at", missing);
    match created_at_to_ts(&raw) {
        Some(ts) => (raw, ts),
        None => {
            if !raw.is_empty() {
                missing.push("tweet.created_at".to_string());
            }
            (raw, 0)
        }
    }
}

/// Validate and flatten a tweet write into its persisted rows.
///
/// All missing fields are collected into one [`StorageError::MissingAttributes`]
/// rather than failing on the first.
pub fn build_tweet_write(
    tweet: &Tweet,
    user: Option<&User>,
) -> StorageResult<(TweetRecord, UserRecord)> {
    let mut missing = Vec::new();

    let (created_at, timestamp) = parse_timestamp(&tweet.created_at, &mut missing);
    let full_text = require(&tweet.full_text, "tweet.full_text", &mut missing);
    let user_record = build_user_record(user, tweet.id, timestamp, &mut missing);

    if !missing.is_empty() {
        return Err(StorageError::MissingAttributes { fields: missing });
    }

    Ok((
        TweetRecord {
            id: tweet.id,
            user_id: user_record.id,
            created_at,
            timestamp,
            full_text,
            coordinates: tweet.coordinates.clone(),
            place_id: tweet.place.as_ref().and_then(|p| p.id.clone()),
            in_reply_to_status_id: tweet.in_reply_to_status_id,
            quoted_id: tweet.quoted_id,
        },
        user_record,
    ))
}

/// Validate and flatten a retweet-edge write into its persisted rows.
///
/// The edge only needs the retweet's timestamp, the original's id, and the
/// retweeting author; the retweet's truncated body is not persisted.
pub fn build_retweet_write(
    retweet: &Tweet,
    user: Option<&User>,
) -> StorageResult<(RetweetRecord, UserRecord)> {
    let mut missing = Vec::new();

    let (created_at, timestamp) = parse_timestamp(&retweet.created_at, &mut missing);
    let tweet_id = require(&retweet.retweeted_id, "tweet.retweeted_id", &mut missing);
    let user_record = build_user_record(user, retweet.id, timestamp, &mut missing);

    if !missing.is_empty() {
        return Err(StorageError::MissingAttributes { fields: missing });
    }

    Ok((
        RetweetRecord {
            id: retweet.id,
            tweet_id,
            user_id: user_record.id,
            created_at,
            timestamp,
            place_id: retweet.place.as_ref().and_then(|p| p.id.clone()),
        },
        user_record,
    ))
}
