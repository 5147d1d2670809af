//! Concurrent ingestion of fetched pages.
//!
//! Each tweet on a page becomes an independent storage write running on its
//! own task, bounded by a semaphore sized to the host. A failed write never
//! aborts its siblings; failures are logged and counted when the dispatcher
//! is drained.

use super::config::ingest_workers;
use crate::model::Tweet;
use crate::storage::{StorageError, StorageResult, TweetStore};
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Fans tweet writes out to bounded concurrent tasks.
pub struct IngestionDispatcher {
    store: Arc<dyn TweetStore>,
    permits: Arc<Semaphore>,
    pending: Vec<JoinHandle<StorageResult<()>>>,
}

impl IngestionDispatcher {
    /// Create a dispatcher sized by [`ingest_workers`].
    pub fn new(store: Arc<dyn TweetStore>) -> Self {
        Self::with_permits(store, ingest_workers())
    }

    /// Create a dispatcher with an explicit concurrency bound.
    pub fn with_permits(store: Arc<dyn TweetStore>, permits: usize) -> Self {
        Self {
            store,
            permits: Arc::new(Semaphore::new(permits.max(1))),
            pending: Vec::new(),
        }
    }

    /// Number of writes submitted but not yet drained.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Submit every tweet on a page for ingestion. Returns immediately;
    /// the writes complete on their own tasks.
    pub fn dispatch_page(&mut self, tweets: Vec<Tweet>) {
        for tweet in tweets {
            self.dispatch(tweet);
        }
    }

    /// Submit one tweet, unwrapping its embedded originals.
    ///
    /// A retweet carries the retweeted original, which may itself carry a
    /// quoted tweet; deeper nesting does not occur on the wire, so the
    /// unwrap loop is bounded at two levels rather than recursive. Wrapping
    /// items are held back on a stack and submitted after their embedded
    /// status, so the original's write always precedes the edge that
    /// references it.
    pub fn dispatch(&mut self, tweet: Tweet) {
        let mut wrappers: Vec<(Tweet, bool)> = Vec::new();
        let mut next = Some((tweet, false));
        let mut depth = 0;
        while let Some((mut tweet, is_retweet)) = next.take() {
            if depth < 2 {
                if let Some(original) = tweet.retweeted_status.take() {
                    tweet.retweeted_id = Some(original.id);
                    // The outer tweet is only an edge once it wraps another.
                    wrappers.push((tweet, true));
                    next = Some((*original, false));
                    depth += 1;
                    continue;
                }
                if let Some(quoted) = tweet.quoted_status.take() {
                    tweet.quoted_id = Some(quoted.id);
                    wrappers.push((tweet, is_retweet));
                    next = Some((*quoted, false));
                    depth += 1;
                    continue;
                }
            } else if tweet.retweeted_status.is_some() || tweet.quoted_status.is_some() {
                debug!(id = tweet.id, "Dropping embedded status beyond unwrap depth");
                tweet.retweeted_status = None;
                tweet.quoted_status = None;
            }
            self.submit(tweet, is_retweet);
        }
        while let Some((tweet, is_retweet)) = wrappers.pop() {
            self.submit(tweet, is_retweet);
        }
    }

    fn submit(&mut self, mut tweet: Tweet, is_retweet: bool) {
        let store = Arc::clone(&self.store);
        let permits = Arc::clone(&self.permits);
        let user = tweet.user.take();
        let handle = tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| StorageError::Io(e.to_string()))?;
            let result = if is_retweet {
                store.insert_retweet(&tweet, user.as_ref()).await
            } else {
                store.insert_tweet(&tweet, user.as_ref()).await
            };
            if let Err(error) = &result {
                warn!(id = tweet.id, %error, "Tweet write failed");
            }
            result
        });
        self.pending.push(handle);
    }

    /// Wait for every submitted write to finish.
    ///
    /// Payloads rejected for missing required fields are counted and
    /// skipped; they were already logged at write time. Anything else the
    /// store reports is surfaced, so the caller can checkpoint the range
    /// un-exhausted instead of advancing past data that never landed.
    pub async fn drain(&mut self) -> StorageResult<usize> {
        let results = join_all(self.pending.drain(..)).await;
        let mut skipped = 0;
        for joined in results {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(StorageError::MissingAttributes { .. })) => skipped += 1,
                Ok(Err(e)) => return Err(e),
                Err(e) => return Err(StorageError::Io(format!("ingest task panicked: {e}"))),
            }
        }
        Ok(skipped)
    }
}
