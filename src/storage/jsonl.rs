//! Append-only JSONL storage backend.
//!
//! Layout under the storage directory:
//!
//! ```text
//! tweets.jsonl    one TweetRecord per line
//! users.jsonl     one UserRecord per line, last line per id wins
//! retweets.jsonl  one RetweetRecord per line
//! state.json      gap ranges, replaced wholesale on every checkpoint
//! state.lock      fd-lock sidecar coordinating concurrent processes
//! ```
//!
//! Tweet and retweet ids seen in earlier runs are rebuilt from the data
//! files on open, so duplicate delivery across restarts stays a no-op.
//! `state.json` is written atomically (temp file + rename, fsync before and
//! after) under an exclusive lock, matching the crash-consistency contract:
//! a checkpoint either lands completely or the previous one survives.

use super::{
    build_retweet_write, build_tweet_write, StorageError, StorageResult, TweetRecord, TweetStore,
    UserRecord,
};
use crate::model::{Tweet, User};
use crate::state::GapRange;
use crate::TweetId;
use async_trait::async_trait;
use fd_lock::RwLock as FdLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Current state file schema version
const SCHEMA_VERSION: &str = "1.0.0";

const TWEETS_FILE: &str = "tweets.jsonl";
const USERS_FILE: &str = "users.jsonl";
const RETWEETS_FILE: &str = "retweets.jsonl";
const STATE_FILE: &str = "state.json";

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    schema_version: String,
    ranges: Vec<GapRange>,
    updated_at: i64,
}

struct Inner {
    tweets: File,
    users: File,
    retweets: File,
    seen_tweets: HashSet<TweetId>,
    seen_retweets: HashSet<TweetId>,
    // newest tweet each user row was observed on
    user_observations: HashMap<u64, TweetId>,
    max_tweet_id: TweetId,
    ranges: Vec<GapRange>,
}

/// [`TweetStore`] backed by append-only JSONL files in a directory.
pub struct JsonlStore {
    state_path: PathBuf,
    lock_path: PathBuf,
    inner: Mutex<Inner>,
}

impl JsonlStore {
    // A panicked writer leaves whole flushed lines only, so a poisoned
    // guard is safe to take over.
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open (or create) a store rooted at `dir`, rebuilding the seen-id
    /// sets and the persisted gap ranges from what is already on disk.
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| StorageError::Io(e.to_string()))?;

        let state_path = dir.join(STATE_FILE);
        let lock_path = dir.join("state.lock");

        let mut seen_tweets = HashSet::new();
        let mut max_tweet_id = 0;
        scan_lines(&dir.join(TWEETS_FILE), |record: TweetRecord| {
            max_tweet_id = max_tweet_id.max(record.id);
            seen_tweets.insert(record.id);
        })?;

        let mut seen_retweets = HashSet::new();
        scan_lines(&dir.join(RETWEETS_FILE), |record: super::RetweetRecord| {
            seen_retweets.insert(record.id);
        })?;

        let mut user_observations = HashMap::new();
        scan_lines(&dir.join(USERS_FILE), |record: UserRecord| {
            let entry = user_observations.entry(record.id).or_insert(0);
            *entry = (*entry).max(record.last_tweet_id);
        })?;

        let ranges = load_state_file(&state_path, &lock_path)?;

        info!(
            dir = %dir.display(),
            tweets = seen_tweets.len(),
            retweets = seen_retweets.len(),
            users = user_observations.len(),
            saved_ranges = ranges.len(),
            "Opened JSONL store"
        );

        let inner = Inner {
            tweets: open_append(&dir.join(TWEETS_FILE))?,
            users: open_append(&dir.join(USERS_FILE))?,
            retweets: open_append(&dir.join(RETWEETS_FILE))?,
            seen_tweets,
            seen_retweets,
            user_observations,
            max_tweet_id,
            ranges,
        };

        Ok(Self {
            state_path,
            lock_path,
            inner: Mutex::new(inner),
        })
    }

    fn append_user(inner: &mut Inner, record: &UserRecord) -> StorageResult<()> {
        match inner.user_observations.get(&record.id) {
            Some(&seen_on) if seen_on >= record.last_tweet_id => return Ok(()),
            _ => {}
        }
        append_line(&mut inner.users, record)?;
        inner.user_observations.insert(record.id, record.last_tweet_id);
        Ok(())
    }

    fn persist_state(&self, ranges: &[GapRange]) -> StorageResult<()> {
        let state = StateFile {
            schema_version: SCHEMA_VERSION.to_string(),
            ranges: ranges.to_vec(),
            updated_at: chrono::Utc::now().timestamp_millis(),
        };
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| StorageError::Io(e.to_string()))?;

        let lock_file = open_append(&self.lock_path)?;
        let mut lock = FdLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| StorageError::Io(format!("failed to acquire state lock: {e}")))?;

        let parent = self.state_path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| StorageError::Io(format!("failed to create temp file: {e}")))?;
        temp.write_all(json.as_bytes())
            .map_err(|e| StorageError::Io(format!("failed to write temp file: {e}")))?;
        temp.flush()
            .map_err(|e| StorageError::Io(format!("failed to flush temp file: {e}")))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| StorageError::Io(format!("failed to sync temp file: {e}")))?;
        temp.persist(&self.state_path)
            .map_err(|e| StorageError::Io(format!("failed to persist state file: {e}")))?;

        // Fsync the directory so the rename itself is durable
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }

        debug!(path = %self.state_path.display(), ranges = ranges.len(), "Collection state saved");
        Ok(())
    }
}

fn open_append(path: &Path) -> StorageResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StorageError::Io(format!("{}: {e}", path.display())))
}

fn scan_lines<T, F>(path: &Path, mut visit: F) -> StorageResult<()>
where
    T: serde::de::DeserializeOwned,
    F: FnMut(T),
{
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StorageError::Io(format!("{}: {e}", path.display()))),
    };
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| StorageError::Io(format!("{}: {e}", path.display())))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => visit(record),
            Err(e) => {
                // A torn trailing line from a crash is expected; skip it.
                warn!(
                    path = %path.display(),
                    line = line_no + 1,
                    error = %e,
                    "Skipping undecodable line"
                );
            }
        }
    }
    Ok(())
}

fn append_line<T: Serialize>(file: &mut File, record: &T) -> StorageResult<()> {
    let mut line = serde_json::to_string(record).map_err(|e| StorageError::Io(e.to_string()))?;
    line.push('\n');
    file.write_all(line.as_bytes())
        .map_err(|e| StorageError::Io(e.to_string()))?;
    file.flush().map_err(|e| StorageError::Io(e.to_string()))
}

fn load_state_file(state_path: &Path, lock_path: &Path) -> StorageResult<Vec<GapRange>> {
    if !state_path.exists() {
        return Ok(Vec::new());
    }

    let lock_file = open_append(lock_path)?;
    let lock = FdLock::new(lock_file);
    let _guard = lock
        .read()
        .map_err(|e| StorageError::Io(format!("failed to acquire state lock: {e}")))?;

    let contents =
        std::fs::read_to_string(state_path).map_err(|e| StorageError::Io(e.to_string()))?;
    let state: StateFile = serde_json::from_str(&contents)
        .map_err(|e| StorageError::CorruptState(e.to_string()))?;

    if state.schema_version != SCHEMA_VERSION {
        return Err(StorageError::CorruptState(format!(
            "unsupported state schema version {}",
            state.schema_version
        )));
    }

    Ok(state.ranges)
}

#[async_trait]
impl TweetStore for JsonlStore {
    async fn max_known_id(&self) -> StorageResult<TweetId> {
        Ok(self.lock().max_tweet_id)
    }

    async fn load_collection_state(&self) -> StorageResult<Vec<GapRange>> {
        Ok(self.lock().ranges.clone())
    }

    async fn save_collection_state(
        &self,
        ceiling: TweetId,
        floor: TweetId,
        exhausted: bool,
    ) -> StorageResult<()> {
        let ranges = {
            let mut inner = self.lock();
            if exhausted {
                inner.ranges.retain(|r| r.floor != floor);
            } else if let Some(range) = inner.ranges.iter_mut().find(|r| r.floor == floor) {
                range.ceiling = ceiling;
            } else {
                inner.ranges.push(GapRange::new(ceiling, floor));
            }
            inner.ranges.clone()
        };
        self.persist_state(&ranges)
    }

    async fn insert_tweet(&self, tweet: &Tweet, user: Option<&User>) -> StorageResult<()> {
        let (record, user_record) = build_tweet_write(tweet, user)?;
        let mut inner = self.lock();
        if inner.seen_tweets.contains(&record.id) {
            return Ok(());
        }
        append_line(&mut inner.tweets, &record)?;
        // Marked seen only once the line is on disk; a failed append
        // stays eligible for redelivery.
        inner.seen_tweets.insert(record.id);
        inner.max_tweet_id = inner.max_tweet_id.max(record.id);
        Self::append_user(&mut inner, &user_record)
    }

    async fn insert_retweet(&self, retweet: &Tweet, user: Option<&User>) -> StorageResult<()> {
        let (record, user_record) = build_retweet_write(retweet, user)?;
        let mut inner = self.lock();
        if inner.seen_retweets.contains(&record.id) {
            return Ok(());
        }
        append_line(&mut inner.retweets, &record)?;
        inner.seen_retweets.insert(record.id);
        Self::append_user(&mut inner, &user_record)
    }
}
