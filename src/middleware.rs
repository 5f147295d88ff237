use crate::rate_limit::{Decision, RateLimiter};
use futures::future::BoxFuture;
use http::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER, X_CONTENT_TYPE_OPTIONS};
use http::{Request, Response, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower_layer::Layer;
use tower_service::Service;

/// Body sent with every throttled response.
pub const RATE_LIMIT_EXCEEDED: &str = "Rate Limit Exceeded";

/// A layer that throttles HTTP requests per client using a [`RateLimiter`].
///
/// `key_fn` maps each request to the client it is charged to (remote IP, API
/// token, user id, ...). It must return the same string for the same logical
/// client on every instance.
pub struct ThrottleLayer<L, K> {
    limiter: Arc<L>,
    key_fn: Arc<K>,
    retry_after: bool,
}

impl<L, K> ThrottleLayer<L, K> {
    /// Create a new throttle layer.
    pub fn new(limiter: L, key_fn: K) -> Self {
        Self::from_shared(Arc::new(limiter), key_fn)
    }

    /// Create a layer sharing an existing limiter.
    pub fn from_shared(limiter: Arc<L>, key_fn: K) -> Self {
        Self { limiter, key_fn: Arc::new(key_fn), retry_after: false }
    }

    /// Add a `Retry-After` header (whole seconds, rounded up) to throttled
    /// responses when the limiter can tell when the request would fit.
    pub fn with_retry_after(mut self, enabled: bool) -> Self {
        self.retry_after = enabled;
        self
    }

    pub fn limiter(&self) -> &Arc<L> {
        &self.limiter
    }
}

impl<L, K> Clone for ThrottleLayer<L, K> {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
            key_fn: self.key_fn.clone(),
            retry_after: self.retry_after,
        }
    }
}

impl<L: fmt::Debug, K> fmt::Debug for ThrottleLayer<L, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleLayer")
            .field("limiter", &self.limiter)
            .field("key_fn", &"<fn>")
            .field("retry_after", &self.retry_after)
            .finish()
    }
}

impl<S, L, K> Layer<S> for ThrottleLayer<L, K> {
    type Service = Throttle<S, L, K>;

    fn layer(&self, service: S) -> Self::Service {
        Throttle {
            inner: service,
            limiter: self.limiter.clone(),
            key_fn: self.key_fn.clone(),
            retry_after: self.retry_after,
        }
    }
}

/// Middleware service that admits each request as one drop, or answers
/// `429 Too Many Requests` without calling the inner service.
pub struct Throttle<S, L, K> {
    inner: S,
    limiter: Arc<L>,
    key_fn: Arc<K>,
    retry_after: bool,
}

impl<S, L, K> Throttle<S, L, K> {
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn limiter(&self) -> &Arc<L> {
        &self.limiter
    }
}

impl<S: Clone, L, K> Clone for Throttle<S, L, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: self.limiter.clone(),
            key_fn: self.key_fn.clone(),
            retry_after: self.retry_after,
        }
    }
}

impl<S: fmt::Debug, L: fmt::Debug, K> fmt::Debug for Throttle<S, L, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("inner", &self.inner)
            .field("limiter", &self.limiter)
            .field("key_fn", &"<fn>")
            .field("retry_after", &self.retry_after)
            .finish()
    }
}

impl<S, L, K, ReqBody, ResBody> Service<Request<ReqBody>> for Throttle<S, L, K>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    L: RateLimiter + 'static,
    K: Fn(&Request<ReqBody>) -> String + Send + Sync + 'static,
    ReqBody: Send + 'static,
    ResBody: From<&'static str> + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let limiter = self.limiter.clone();
        let client_key = (self.key_fn)(&req);
        let retry_after = self.retry_after;
        // Take the service that was driven to readiness and leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match limiter.acquire(&client_key, 1).await {
                Decision::Allowed { .. } => inner.call(req).await,
                Decision::Denied { retry_after: wait } => {
                    tracing::debug!(
                        target: "leaky::middleware",
                        method = %req.method(),
                        uri = %req.uri(),
                        "rate limit exceeded"
                    );
                    Ok(too_many_requests(if retry_after { wait } else { None }))
                }
            }
        })
    }
}

/// Build the plain-text 429 response.
pub fn too_many_requests<B>(retry_after: Option<Duration>) -> Response<B>
where
    B: From<&'static str>,
{
    let mut res = Response::new(B::from(RATE_LIMIT_EXCEEDED));
    *res.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    let headers = res.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    if let Some(wait) = retry_after {
        headers.insert(RETRY_AFTER, HeaderValue::from(whole_seconds(wait)));
    }
    res
}

fn whole_seconds(wait: Duration) -> u64 {
    wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
}
