//! In-memory store used by tests and dry runs.

use super::{
    build_retweet_write, build_tweet_write, RetweetRecord, StorageResult, TweetRecord, TweetStore,
    UserRecord,
};
use crate::model::{Tweet, User};
use crate::state::GapRange;
use crate::TweetId;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// A single committed write, in commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// A tweet row was inserted.
    Tweet(TweetId),
    /// A retweet edge was inserted.
    Retweet(TweetId),
}

#[derive(Default)]
struct Inner {
    tweets: BTreeMap<TweetId, TweetRecord>,
    users: BTreeMap<u64, UserRecord>,
    retweets: BTreeMap<TweetId, RetweetRecord>,
    state: Vec<GapRange>,
    ops: Vec<WriteOp>,
    checkpoints: Vec<(TweetId, TweetId, bool)>,
}

/// [`TweetStore`] backed by in-process maps.
///
/// Keeps a commit-order log of writes and checkpoints so tests can assert
/// ordering guarantees directly.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of stored tweets.
    pub fn tweet_count(&self) -> usize {
        self.lock().tweets.len()
    }

    /// Number of stored retweet edges.
    pub fn retweet_count(&self) -> usize {
        self.lock().retweets.len()
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    /// The stored tweet ids, ascending.
    pub fn tweet_ids(&self) -> Vec<TweetId> {
        self.lock().tweets.keys().copied().collect()
    }

    /// The commit-order log of writes.
    pub fn ops(&self) -> Vec<WriteOp> {
        self.lock().ops.clone()
    }

    /// Every checkpoint ever saved, in order, as `(ceiling, floor, exhausted)`.
    pub fn checkpoints(&self) -> Vec<(TweetId, TweetId, bool)> {
        self.lock().checkpoints.clone()
    }

    /// The currently persisted gap ranges.
    pub fn persisted_ranges(&self) -> Vec<GapRange> {
        self.lock().state.clone()
    }

    fn upsert_user(inner: &mut Inner, record: UserRecord) {
        match inner.users.get(&record.id) {
            Some(existing) if existing.last_tweet_id >= record.last_tweet_id => {}
            _ => {
                inner.users.insert(record.id, record);
            }
        }
    }
}

#[async_trait]
impl TweetStore for MemoryStore {
    async fn max_known_id(&self) -> StorageResult<TweetId> {
        let inner = self.lock();
        Ok(inner.tweets.keys().next_back().copied().unwrap_or(0))
    }

    async fn load_collection_state(&self) -> StorageResult<Vec<GapRange>> {
        Ok(self.lock().state.clone())
    }

    async fn save_collection_state(
        &self,
        ceiling: TweetId,
        floor: TweetId,
        exhausted: bool,
    ) -> StorageResult<()> {
        let mut inner = self.lock();
        inner.checkpoints.push((ceiling, floor, exhausted));
        if exhausted {
            inner.state.retain(|r| r.floor != floor);
        } else if let Some(range) = inner.state.iter_mut().find(|r| r.floor == floor) {
            range.ceiling = ceiling;
        } else {
            inner.state.push(GapRange::new(ceiling, floor));
        }
        Ok(())
    }

    async fn insert_tweet(&self, tweet: &Tweet, user: Option<&User>) -> StorageResult<()> {
        let (record, user_record) = build_tweet_write(tweet, user)?;
        let mut inner = self.lock();
        if inner.tweets.contains_key(&record.id) {
            return Ok(());
        }
        let id = record.id;
        inner.tweets.insert(id, record);
        Self::upsert_user(&mut inner, user_record);
        inner.ops.push(WriteOp::Tweet(id));
        Ok(())
    }

    async fn insert_retweet(&self, retweet: &Tweet, user: Option<&User>) -> StorageResult<()> {
        let (record, user_record) = build_retweet_write(retweet, user)?;
        let mut inner = self.lock();
        if inner.retweets.contains_key(&record.id) {
            return Ok(());
        }
        let id = record.id;
        inner.retweets.insert(id, record);
        Self::upsert_user(&mut inner, user_record);
        inner.ops.push(WriteOp::Retweet(id));
        Ok(())
    }
}
