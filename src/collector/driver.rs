//! The collection driver.
//!
//! Drives one gap range at a time: pick a credential, page backward in id
//! space dispatching each page to the ingestion pool, and on exit (range
//! exhausted, fault, or shutdown) drain in-flight writes and checkpoint the
//! cursor. Pagination is strictly sequential per range; only storage writes
//! run concurrently.

use super::ingest::IngestionDispatcher;
use super::CollectorError;
use crate::api::{PageRequest, RateLimiter, SearchApi, Selection};
use crate::auth::Credential;
use crate::shutdown::SharedShutdown;
use crate::state::{CollectionState, GapRange};
use crate::storage::TweetStore;
use crate::TweetId;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Long-running harvester for one search query.
///
/// Construct, seed the work queue with [`init_state`](Self::init_state),
/// then either [`run`](Self::run) forever or drive one pass with
/// [`run_once`](Self::run_once).
pub struct Collector {
    api: Arc<dyn SearchApi>,
    store: Arc<dyn TweetStore>,
    limiter: RateLimiter,
    shutdown: SharedShutdown,
    state: CollectionState,
}

impl Collector {
    /// Create a collector. Fails with [`CollectorError::NoCredentials`]
    /// when the credential list is empty.
    pub fn new(
        api: Arc<dyn SearchApi>,
        store: Arc<dyn TweetStore>,
        credentials: Vec<Credential>,
        shutdown: SharedShutdown,
    ) -> Result<Self, CollectorError> {
        let limiter = RateLimiter::new(Arc::clone(&api), credentials)
            .ok_or(CollectorError::NoCredentials)?;
        Ok(Self {
            api,
            store,
            limiter,
            shutdown,
            state: CollectionState::default(),
        })
    }

    /// Build the work queue.
    ///
    /// With `resume` set, saved gap ranges from the previous run are loaded
    /// and queued ahead of the live range; otherwise only the live range is
    /// queued, starting above the newest stored tweet.
    pub async fn init_state(&mut self, resume: bool) -> Result<(), CollectorError> {
        let max_known = self.store.max_known_id().await?;
        self.state = if resume {
            let saved = self.store.load_collection_state().await?;
            info!(
                saved_ranges = saved.len(),
                max_known_id = max_known,
                "Resuming collection"
            );
            CollectionState::from_saved(saved, max_known)
        } else {
            info!(max_known_id = max_known, "Starting fresh collection");
            CollectionState::fresh(max_known)
        };
        Ok(())
    }

    /// The pending work queue.
    pub fn state(&self) -> &CollectionState {
        &self.state
    }

    /// Collect until shutdown.
    ///
    /// Each pass drains the queued ranges, then a new live range is opened
    /// above the newest stored tweet and the loop repeats. Returns
    /// [`CollectorError::Cancelled`] once a shutdown request lands; the
    /// cursor has been checkpointed by then.
    pub async fn run(&mut self) -> Result<(), CollectorError> {
        loop {
            self.run_once().await?;
            if self.shutdown.is_shutdown_requested() {
                return Err(CollectorError::Cancelled);
            }
            let floor = self.store.max_known_id().await?;
            debug!(floor, "Opening next live range");
            self.state.push_live(floor);
        }
    }

    /// Drain the currently queued ranges, oldest gap first, live range last.
    pub async fn run_once(&mut self) -> Result<(), CollectorError> {
        while let Some(range) = self.state.pop_next() {
            self.collect_range(range).await?;
        }
        Ok(())
    }

    /// Drive one range to exhaustion, draining and checkpointing on every
    /// exit path before the outcome is surfaced.
    async fn collect_range(&mut self, range: GapRange) -> Result<(), CollectorError> {
        let floor = range.floor;
        let mut cursor = range.ceiling;
        let mut dispatcher = IngestionDispatcher::new(Arc::clone(&self.store));

        info!(
            ceiling = range.ceiling,
            floor,
            live = range.is_live(),
            "Collecting range"
        );

        let span = info_span!("range", floor, live = range.is_live());
        let outcome = self
            .drive_range(&mut cursor, floor, &mut dispatcher)
            .instrument(span)
            .await;

        // Writes land before the cursor does; a checkpoint never points
        // past data that is still in flight. A drain fault keeps the range
        // queued un-exhausted at its last cursor.
        let drained = dispatcher.drain().await;
        let exhausted = outcome.is_ok() && drained.is_ok();
        self.store
            .save_collection_state(cursor, floor, exhausted)
            .await?;

        match drained {
            Ok(0) => {}
            Ok(skipped) => warn!(skipped, "Invalid payloads skipped during range"),
            Err(e) => return Err(e.into()),
        }
        outcome?;

        info!(floor, cursor, "Range exhausted");
        Ok(())
    }

    /// Page backward from `cursor` until the provider returns an empty page.
    async fn drive_range(
        &mut self,
        cursor: &mut TweetId,
        floor: TweetId,
        dispatcher: &mut IngestionDispatcher,
    ) -> Result<(), CollectorError> {
        loop {
            let index = self.select_credential(dispatcher).await?;
            let credential = self.limiter.credential(index).clone();

            while self.limiter.remaining(index) > 0 {
                if self.shutdown.is_shutdown_requested() {
                    return Err(CollectorError::Cancelled);
                }

                let request = PageRequest {
                    max_id: *cursor,
                    since_id: floor,
                };
                let page = self.api.fetch_page(&request, &credential).await?;

                match (page.remaining, page.reset_at) {
                    (Some(remaining), Some(reset_at)) => {
                        self.limiter.record(index, remaining, reset_at);
                    }
                    // Headers missing; a full snapshot is the only way to
                    // know where this credential stands.
                    _ => self.limiter.refresh().await?,
                }

                if page.exhausted {
                    return Ok(());
                }
                if let Some(next) = page.next_cursor {
                    *cursor = next;
                }
                dispatcher.dispatch_page(page.tweets);
            }
            debug!(credential = %credential.label, "Credential exhausted, rotating");
        }
    }

    /// Refresh quota and pick a credential, blocking until the earliest
    /// reset when every credential is exhausted.
    async fn select_credential(
        &mut self,
        dispatcher: &mut IngestionDispatcher,
    ) -> Result<usize, CollectorError> {
        loop {
            self.limiter.refresh().await?;
            match self.limiter.pick() {
                Selection::Ready { index } => return Ok(index),
                Selection::MustWait { index, until } => {
                    // Nothing should sit in flight while we sleep out a
                    // rate-limit window.
                    match dispatcher.drain().await {
                        Ok(0) => {}
                        Ok(skipped) => {
                            warn!(skipped, "Invalid payloads skipped before rate-limit wait")
                        }
                        Err(e) => return Err(e.into()),
                    }
                    info!(
                        credential = %self.limiter.credential(index).label,
                        until,
                        "All credentials exhausted, waiting for earliest reset"
                    );
                    self.limiter.wait_for_reset(until, &self.shutdown).await?;
                }
            }
        }
    }
}
