mod common;

use common::test_helpers::bucket_with;
use leaky::{
    BucketState, Clock, ConfigError, Decision, Fetch, InMemoryStore, StateStore, ThrottleManager,
};
use std::sync::Arc;
use std::time::Duration;

fn bucket(capacity: u32, per_minute: u32) -> (leaky::LeakyBucket<InMemoryStore>, leaky::ManualClock) {
    bucket_with(Arc::new(InMemoryStore::new()), capacity, per_minute)
}

#[tokio::test]
async fn zero_capacity_denies_first_request() {
    let (b, _) = bucket(0, 10);
    assert!(!b.add(1, "k").await);
    assert!(!b.add(5, "k").await);
}

#[tokio::test]
async fn first_request_for_new_client_is_allowed() {
    for capacity in [1, 2, 10, 1000] {
        let (b, _) = bucket(capacity, 0);
        assert!(b.add(1, "never-seen").await, "capacity {capacity}");
    }
}

#[tokio::test]
async fn zero_leak_allows_once_then_denies() {
    let (b, clock) = bucket(1, 0);
    assert!(b.add(1, "k").await);
    assert!(!b.add(1, "k").await);

    clock.advance(Duration::from_secs(60 * 59));
    assert!(!b.add(1, "k").await, "a non-leaking bucket stays full");
}

#[tokio::test]
async fn refills_after_leak_interval() {
    // 600/min = 10/s, so one drop leaks every 100ms.
    let (b, clock) = bucket(1, 600);
    assert!(b.add(1, "k").await);
    assert!(!b.add(1, "k").await);

    clock.advance(Duration::from_millis(99));
    assert!(!b.add(1, "k").await);

    clock.advance(Duration::from_millis(1));
    assert!(b.add(1, "k").await);
}

#[tokio::test]
async fn overflow_is_denied_even_when_full() {
    let (b, _) = bucket(10, 0);
    assert_eq!(b.acquire("k", 11).await, Decision::Denied { retry_after: None });
    assert!(b.add(10, "k").await, "the full capacity still fits afterwards");
}

#[tokio::test]
async fn overflow_is_denied_regardless_of_leak() {
    let (b, clock) = bucket(3, 6000);
    clock.advance(Duration::from_secs(3600));
    assert!(!b.add(4, "k").await);
    assert_eq!(b.acquire("k", 4).await.retry_after(), None);
}

#[tokio::test]
async fn stored_state_without_elapsed_time_reads_back_unchanged() {
    let store = Arc::new(InMemoryStore::new());
    let (b, clock) = bucket_with(store.clone(), 43, 0);

    let state = BucketState { last_update: clock.now(), space_remaining: 43.0 };
    store
        .set(&b.states().key("k"), state.to_vec().unwrap(), Duration::from_secs(60))
        .await
        .unwrap();

    let refreshed = b.refresh("k").await;
    assert_eq!(refreshed.space_remaining, 43.0);
}

#[tokio::test]
async fn denial_does_not_touch_stored_state() {
    let (b, clock) = bucket(2, 60);
    assert!(b.add(2, "k").await);
    let before = match b.states().fetch("k").await {
        Fetch::Found(s) => s,
        other => panic!("expected stored state, got {other:?}"),
    };

    clock.advance(Duration::from_millis(500));
    assert!(!b.add(1, "k").await);

    match b.states().fetch("k").await {
        Fetch::Found(after) => assert_eq!(after, before),
        other => panic!("expected stored state, got {other:?}"),
    }
}

#[tokio::test]
async fn leak_is_measured_from_last_admission_across_denials() {
    // One drop per second. Denials in between must not reset the leak clock.
    let (b, clock) = bucket(1, 60);
    assert!(b.add(1, "k").await);

    for _ in 0..9 {
        clock.advance(Duration::from_millis(100));
        assert!(!b.add(1, "k").await);
    }
    clock.advance(Duration::from_millis(100));
    assert!(b.add(1, "k").await, "a full second has passed since the admitted request");
}

#[tokio::test]
async fn remaining_grows_with_elapsed_time_up_to_capacity() {
    let (b, clock) = bucket(5, 60);
    assert!(b.add(5, "k").await);

    let mut last = 0.0;
    for step_ms in [0, 250, 750, 1000, 2000, 5000, 60_000] {
        clock.advance(Duration::from_millis(step_ms));
        let level = b.refresh("k").await.space_remaining;
        assert!(level >= last, "level dropped from {last} to {level}");
        assert!((0.0..=5.0).contains(&level));
        last = level;
    }
    assert_eq!(last, 5.0);
}

#[tokio::test]
async fn space_stays_within_bounds_under_mixed_traffic() {
    let (b, clock) = bucket(4, 120);
    let counts = [1, 3, 0, 2, 5, 1, 1, 4, 2, 1];
    for (i, count) in counts.iter().cycle().take(60).enumerate() {
        let _ = b.add(*count, "k").await;
        let level = b.refresh("k").await.space_remaining;
        assert!((0.0..=4.0).contains(&level), "step {i}: {level}");
        clock.advance(Duration::from_millis(137));
    }
}

#[tokio::test]
async fn sustained_overload_only_admits_the_leak_rate() {
    // 600/min, capacity 1: hammering every 10ms for ~1s should admit about ten.
    let (b, clock) = bucket(1, 600);
    assert!(b.add(1, "k").await);

    let mut admitted = 0;
    for _ in 0..=100 {
        if b.add(1, "k").await {
            admitted += 1;
        }
        clock.advance(Duration::from_millis(10));
    }
    assert!(admitted <= 10, "bucket leaked too many drops: {admitted}");
    assert!(admitted >= 9, "bucket leaked too few drops: {admitted}");
}

#[tokio::test]
async fn allowed_decision_reports_remaining() {
    let (b, _) = bucket(3, 0);
    assert_eq!(b.acquire("k", 2).await, Decision::Allowed { remaining: 1 });
    assert_eq!(b.acquire("k", 1).await, Decision::Allowed { remaining: 0 });
}

#[tokio::test]
async fn bucket_names_cannot_overlap_client_keys() {
    let store = Arc::new(InMemoryStore::new());
    let manager = ThrottleManager::from_shared(store.clone());

    // "a::b"/"c" would share a key with "a"/"b::c", and "x:"/"y" with "x"/":y".
    for name in ["a::b", "x:"] {
        assert!(matches!(manager.bucket(1, 0, name), Err(ConfigError::AmbiguousBucketName(_))));
    }

    let pairs = [("a", "b::c"), ("a:b", ":c"), ("a", "b:::c"), (":a", "b"), ("x", ":y")];
    for (bucket, client) in pairs {
        let b = manager.bucket(1, 0, bucket).unwrap();
        assert!(b.add(1, client).await, "{bucket}/{client} starts full");
    }
    assert_eq!(store.len(), pairs.len(), "every pair keeps its own state");
}
