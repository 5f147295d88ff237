use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Abstract key-value cache holding serialized bucket state.
///
/// This is the narrow surface a shared cache (Redis, memcached, ...) has to
/// offer. Implementations must be safe to share across concurrent requests;
/// no additional locking happens on top of them, so two instances racing on
/// one key behave exactly as the backend does.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the raw value for a key.
    ///
    /// Returns `Ok(None)` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Overwrite the value for a key, expiring it after `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), Self::Error>;
}

#[async_trait]
impl<S> StateStore for Arc<S>
where
    S: StateStore + ?Sized,
{
    type Error = S::Error;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), Self::Error> {
        (**self).set(key, value, ttl).await
    }
}

#[derive(Clone, Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// Writes between two sweeps of expired entries in [`InMemoryStore`].
pub const PURGE_EVERY_WRITES: usize = 1024;

/// Simple in-memory store with per-key expiry.
///
/// Suitable for a single instance or for tests. An expired entry is dropped
/// when it is read, and every [`PURGE_EVERY_WRITES`] writes sweep the whole
/// map, so keys of clients that never come back do not pile up.
/// [`purge_expired`](Self::purge_expired) sweeps on demand.
/// Expiry follows `tokio::time`, so paused-time tests can skip over TTLs.
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    data: Arc<Mutex<HashMap<String, Entry>>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.data.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|_, entry| entry.expires_at > now);
        before - guard.len()
    }

    /// Remove a key, returning whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.data.lock().unwrap_or_else(PoisonError::into_inner).remove(key).is_some()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    type Error = std::convert::Infallible;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let now = Instant::now();
        let mut guard = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                guard.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), Self::Error> {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or_else(far_future);
        let mut guard = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % PURGE_EVERY_WRITES == 0 {
            guard.retain(|_, entry| entry.expires_at > now);
        }
        guard.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }
}

fn far_future() -> Instant {
    // Roughly 30 years, same trick tokio uses for "never".
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}
