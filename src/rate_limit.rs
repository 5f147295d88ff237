//! Rate limiting seam between the middleware and the bucket logic.
//!
//! - [`RateLimiter`]: the core trait the middleware asks for a decision.
//! - [`Decision`]: the result of a check (Allowed/Denied).
//!
//! The middleware doesn't know *how* limiting works, only that it should ask a
//! `RateLimiter` on behalf of a client. [`LeakyBucket`](crate::LeakyBucket) does
//! the math, and a [`StateStore`](crate::StateStore) holds the state so that
//! several instances can share it.

use std::time::Duration;

/// The decision returned by a rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The drops fit and were recorded.
    Allowed {
        /// Whole drops still available after this admission.
        remaining: u32,
    },
    /// The drops do not fit; nothing was recorded.
    Denied {
        /// Upper bound on how long until the same request would fit, if it ever
        /// can by leaking alone.
        retry_after: Option<Duration>,
    },
}

impl Decision {
    /// Helper to check if allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    /// Wait hint carried by a denial.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Denied { retry_after } => *retry_after,
            Decision::Allowed { .. } => None,
        }
    }
}

/// Core interface for rate limiting logic.
///
/// Implementations fail open: infrastructure trouble yields a decision, never
/// an error.
#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    /// Attempt to add `drops` units for `client_key`.
    async fn acquire(&self, client_key: &str, drops: u32) -> Decision;
}

#[async_trait::async_trait]
impl<L> RateLimiter for std::sync::Arc<L>
where
    L: RateLimiter + ?Sized,
{
    async fn acquire(&self, client_key: &str, drops: u32) -> Decision {
        (**self).acquire(client_key, drops).await
    }
}
