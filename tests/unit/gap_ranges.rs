//! Gap range queue semantics.

use tweet_harvester::{CollectionState, GapRange, TweetId};

#[test]
fn saved_gaps_drain_oldest_floor_first() {
    let saved = vec![
        GapRange::new(9_000, 8_000),
        GapRange::new(3_000, 1_000),
        GapRange::new(6_000, 4_000),
    ];
    let mut state = CollectionState::from_saved(saved, 10_000);

    let floors: Vec<TweetId> = std::iter::from_fn(|| state.pop_next())
        .map(|r| r.floor)
        .collect();
    assert_eq!(floors, vec![1_000, 4_000, 8_000, 10_000]);
}

#[test]
fn live_range_is_reappended_after_draining() {
    let mut state = CollectionState::fresh(100);
    assert!(state.pop_next().unwrap().is_live());
    assert!(state.is_empty());

    // The driver opens the next pass above the new high-water mark.
    state.push_live(250);
    let next = state.pop_next().unwrap();
    assert!(next.is_live());
    assert_eq!(next.floor, 250);
}

#[test]
fn malformed_saved_ranges_never_enter_the_queue() {
    let saved = vec![
        GapRange::new(10, 500), // floor above ceiling
        GapRange::new(700, 600),
    ];
    let state = CollectionState::from_saved(saved, 1_000);
    assert_eq!(state.len(), 2);
    assert!(state.ranges().all(GapRange::is_well_formed));
}

#[test]
fn zero_width_gap_is_well_formed() {
    // ceiling == floor: one id may still be uncollected at the cursor.
    let range = GapRange::new(42, 42);
    assert!(range.is_well_formed());
    assert!(!range.is_live());
}

#[test]
fn empty_store_live_range_covers_everything() {
    let mut state = CollectionState::fresh(0);
    let live = state.pop_next().unwrap();
    assert_eq!(live.floor, 0);
    assert_eq!(live.ceiling, TweetId::MAX);
}
