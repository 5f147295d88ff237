//! Typed, fail-open access to bucket state held in a [`StateStore`].

use crate::config::StoreOptions;
use crate::error::StoreError;
use crate::state::BucketState;
use crate::store::StateStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Namespace prefix shared by every bucket key.
pub const KEY_NAMESPACE: &str = "leaky";

/// Separator between namespace, bucket name and client key.
pub const KEY_SEPARATOR: &str = "::";

/// Outcome of reading one client's state.
#[derive(Debug)]
pub enum Fetch<E> {
    /// A valid state was stored.
    Found(BucketState),
    /// Nothing stored (first visit or expired).
    Missing,
    /// The store failed, timed out, or held bytes that do not decode.
    Failed(StoreError<E>),
}

impl<E> Fetch<E> {
    /// Label used as the `outcome` field in logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::Missing => "missing",
            Self::Failed(e) => e.outcome(),
        }
    }
}

/// State as handed to the bucket after fail-open resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Loaded {
    /// Read back from the store; leak has not been applied yet.
    Stored(BucketState),
    /// Full bucket stamped now, because nothing usable was stored.
    Fresh(BucketState),
}

impl Loaded {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    pub fn into_inner(self) -> BucketState {
        match self {
            Self::Stored(s) | Self::Fresh(s) => s,
        }
    }
}

/// Reads and writes the state of one bucket, keyed per client.
///
/// Store trouble never blocks traffic: unreadable state is treated as a client
/// never seen before, and failed writes are logged and dropped. Logs name the
/// bucket and the outcome, never the client key, which may be a credential.
#[derive(Debug)]
pub struct BucketStateStore<S> {
    store: Arc<S>,
    bucket_name: String,
    options: StoreOptions,
}

impl<S> Clone for BucketStateStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bucket_name: self.bucket_name.clone(),
            options: self.options,
        }
    }
}

impl<S> BucketStateStore<S>
where
    S: StateStore,
{
    pub fn new(store: Arc<S>, bucket_name: impl Into<String>, options: StoreOptions) -> Self {
        Self { store, bucket_name: bucket_name.into(), options }
    }

    /// Cache key for a client of this bucket: `leaky::{bucket}::{client}`.
    pub fn key(&self, client_key: &str) -> String {
        format!("{KEY_NAMESPACE}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{client_key}", self.bucket_name)
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Read a client's state without collapsing failures.
    pub async fn fetch(&self, client_key: &str) -> Fetch<S::Error> {
        let key = self.key(client_key);
        let timeout = self.options.timeout();
        match tokio::time::timeout(timeout, self.store.get(&key)).await {
            Err(_) => Fetch::Failed(StoreError::Timeout(timeout)),
            Ok(Err(e)) => Fetch::Failed(StoreError::Backend(e)),
            Ok(Ok(None)) => Fetch::Missing,
            Ok(Ok(Some(bytes))) => match BucketState::from_slice(&bytes) {
                Ok(state) => Fetch::Found(state),
                Err(e) => Fetch::Failed(StoreError::Codec(e)),
            },
        }
    }

    /// Read a client's state, falling back to a full bucket stamped `now`
    /// when nothing usable is stored.
    pub async fn get(&self, client_key: &str, capacity: u32, now: DateTime<Utc>) -> Loaded {
        match self.fetch(client_key).await {
            Fetch::Found(state) => Loaded::Stored(state),
            Fetch::Missing => {
                debug!(
                    target: "leaky::store",
                    bucket = %self.bucket_name,
                    outcome = "missing",
                    "no stored bucket state; starting full"
                );
                Loaded::Fresh(BucketState::fresh(capacity, now))
            }
            Fetch::Failed(e) => {
                warn!(
                    target: "leaky::store",
                    bucket = %self.bucket_name,
                    outcome = e.outcome(),
                    error = %e,
                    "retrieving bucket state failed, resetting counters"
                );
                Loaded::Fresh(BucketState::fresh(capacity, now))
            }
        }
    }

    /// Write a client's state with the configured TTL, reporting failures.
    pub async fn try_set(
        &self,
        client_key: &str,
        state: &BucketState,
    ) -> Result<(), StoreError<S::Error>> {
        let key = self.key(client_key);
        let value = state.to_vec()?;
        let timeout = self.options.timeout();
        match tokio::time::timeout(timeout, self.store.set(&key, value, self.options.ttl())).await {
            Ok(result) => result.map_err(StoreError::Backend),
            Err(_) => Err(StoreError::Timeout(timeout)),
        }
    }

    /// Write a client's state; failures are logged and swallowed.
    pub async fn set(&self, client_key: &str, state: &BucketState) {
        if let Err(e) = self.try_set(client_key, state).await {
            warn!(
                target: "leaky::store",
                bucket = %self.bucket_name,
                outcome = e.outcome(),
                error = %e,
                "setting bucket state failed"
            );
        }
    }
}
