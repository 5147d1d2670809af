//! Gap ranges and the in-memory collection state.
//!
//! A gap range is a window of tweet ids not yet fully collected: `ceiling`
//! is the pagination cursor (the next `max_id`) and `floor` is the id at or
//! below which everything is already stored. The collection state is the
//! ordered queue of such ranges, loaded at startup and always terminated by
//! the synthetic live range covering new tweets as they appear.

use crate::TweetId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

/// A `[floor, ceiling]` window of not-yet-collected tweet ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapRange {
    /// Upper pagination cursor; the next request's `max_id`.
    pub ceiling: TweetId,
    /// Lower bound already collected in a prior run (`since_id`).
    pub floor: TweetId,
}

impl GapRange {
    /// A stored gap from a previous, interrupted run.
    pub fn new(ceiling: TweetId, floor: TweetId) -> Self {
        Self { ceiling, floor }
    }

    /// The synthetic live range covering everything newer than `floor`.
    pub fn live(floor: TweetId) -> Self {
        Self {
            ceiling: TweetId::MAX,
            floor,
        }
    }

    /// Whether this is the live head range.
    pub fn is_live(&self) -> bool {
        self.ceiling == TweetId::MAX
    }

    /// Invariant: `floor <= ceiling`.
    pub fn is_well_formed(&self) -> bool {
        self.floor <= self.ceiling
    }
}

/// Ordered queue of unfinished gap ranges, live range last.
#[derive(Debug, Default)]
pub struct CollectionState {
    ranges: VecDeque<GapRange>,
}

impl CollectionState {
    /// Build the startup state: saved ranges sorted by floor, malformed ones
    /// dropped with a warning, and the live range appended.
    pub fn from_saved(saved: Vec<GapRange>, max_known_id: TweetId) -> Self {
        let mut ranges: Vec<GapRange> = saved
            .into_iter()
            .filter(|range| {
                if !range.is_well_formed() {
                    warn!(
                        ceiling = range.ceiling,
                        floor = range.floor,
                        "dropping malformed saved gap range"
                    );
                    return false;
                }
                true
            })
            .collect();
        ranges.sort_by_key(|range| range.floor);

        let mut state = Self {
            ranges: ranges.into(),
        };
        state.push_live(max_known_id);
        state
    }

    /// State with no recovered gaps, just the live range.
    pub fn fresh(max_known_id: TweetId) -> Self {
        Self::from_saved(Vec::new(), max_known_id)
    }

    /// Append a live range with the given floor.
    pub fn push_live(&mut self, floor: TweetId) {
        self.ranges.push_back(GapRange::live(floor));
    }

    /// Pop the next range to process. Stored gaps drain first; the live
    /// range is always last.
    pub fn pop_next(&mut self) -> Option<GapRange> {
        self.ranges.pop_front()
    }

    /// Number of queued ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether no ranges remain queued.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The queued ranges in processing order.
    pub fn ranges(&self) -> impl Iterator<Item = &GapRange> {
        self.ranges.iter()
    }
}
