#![allow(dead_code)]

use async_trait::async_trait;
use leaky::{
    BucketConfig, InMemoryStore, LeakyBucket, ManualClock, StateStore, StoreOptions,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestError(pub &'static str);

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TestError: {}", self.0)
    }
}

impl std::error::Error for TestError {}

/// In-memory store whose reads and writes can be switched off, or slowed down,
/// to simulate an outage.
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    reads_down: Arc<AtomicBool>,
    writes_down: Arc<AtomicBool>,
    stall: Arc<AtomicBool>,
    stall_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    pub fn fail_reads(&self, down: bool) {
        self.reads_down.store(down, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, down: bool) {
        self.writes_down.store(down, Ordering::SeqCst);
    }

    /// Make every call hang for an hour.
    pub fn stall(&self, stalled: bool) {
        self.stall.store(stalled, Ordering::SeqCst);
    }

    /// Make only writes hang for an hour; reads answer normally.
    pub fn stall_writes(&self, stalled: bool) {
        self.stall_writes.store(stalled, Ordering::SeqCst);
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn maybe_stall(&self, flag: &AtomicBool) {
        if self.stall.load(Ordering::SeqCst) || flag.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }
}

#[async_trait]
impl StateStore for FlakyStore {
    type Error = TestError;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        self.maybe_stall(&self.stall).await;
        if self.reads_down.load(Ordering::SeqCst) {
            return Err(TestError("connection refused"));
        }
        Ok(self.inner.get(key).await.unwrap_or_else(|never| match never {}))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), Self::Error> {
        self.maybe_stall(&self.stall_writes).await;
        if self.writes_down.load(Ordering::SeqCst) {
            return Err(TestError("connection refused"));
        }
        self.inner.set(key, value, ttl).await.unwrap_or_else(|never| match never {});
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Bucket named `test` over `store`, driven by a manual clock.
pub fn bucket_with<S: StateStore>(
    store: Arc<S>,
    capacity: u32,
    per_minute: u32,
) -> (LeakyBucket<S>, ManualClock) {
    let clock = ManualClock::starting_now();
    let bucket = LeakyBucket::with_clock(
        BucketConfig::new("test", capacity, per_minute).expect("valid config"),
        store,
        StoreOptions::default(),
        Arc::new(clock.clone()),
    );
    (bucket, clock)
}
