use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tower_layer::Layer;
use tower_service::Service;

use crate::error::AdmissionError;
use crate::rate_limit::{Decision, RateLimiter};

/// A layer that gates requests through a [`RateLimiter`].
///
/// `extract` maps each request to the key it is charged against and its cost.
pub struct RateLimitLayer<L, F, K> {
    limiter: Arc<L>,
    extract: Arc<F>,
    _key: PhantomData<fn() -> K>,
}

impl<L, F, K> Clone for RateLimitLayer<L, F, K> {
    fn clone(&self) -> Self {
        Self { limiter: self.limiter.clone(), extract: self.extract.clone(), _key: PhantomData }
    }
}

impl<L, F, K> std::fmt::Debug for RateLimitLayer<L, F, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitLayer").finish_non_exhaustive()
    }
}

impl<L, F, K> RateLimitLayer<L, F, K> {
    /// Create a new rate limit layer.
    pub fn new(limiter: L, extract: F) -> Self {
        Self::shared(Arc::new(limiter), extract)
    }

    /// Create a layer around a limiter that is also used elsewhere.
    pub fn shared(limiter: Arc<L>, extract: F) -> Self {
        Self { limiter, extract: Arc::new(extract), _key: PhantomData }
    }
}

impl<S, L, F, K> Layer<S> for RateLimitLayer<L, F, K> {
    type Service = RateLimitService<S, L, F, K>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimitService {
            inner: service,
            limiter: self.limiter.clone(),
            extract: self.extract.clone(),
            _key: PhantomData,
        }
    }
}

/// Middleware service that enforces per-key quota.
pub struct RateLimitService<S, L, F, K> {
    inner: S,
    limiter: Arc<L>,
    extract: Arc<F>,
    _key: PhantomData<fn() -> K>,
}

impl<S: Clone, L, F, K> Clone for RateLimitService<S, L, F, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: self.limiter.clone(),
            extract: self.extract.clone(),
            _key: PhantomData,
        }
    }
}

impl<S: std::fmt::Debug, L, F, K> std::fmt::Debug for RateLimitService<S, L, F, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitService").field("inner", &self.inner).finish_non_exhaustive()
    }
}

impl<S, L, F, K, Req> Service<Req> for RateLimitService<S, L, F, K>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    L: RateLimiter<K> + 'static,
    F: Fn(&Req) -> (K, u64) + Send + Sync + 'static,
    K: Send + Sync + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = AdmissionError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(AdmissionError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let limiter = self.limiter.clone();
        let (key, cost) = (self.extract)(&req);
        // Take the service that was driven to readiness, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match limiter.acquire(&key, cost).await {
                Ok(Decision::Allowed { .. }) => inner.call(req).await.map_err(AdmissionError::Inner),
                Ok(Decision::Denied { wait, reason }) => {
                    tracing::debug!(target: "quotagate::rate_limit", ?wait, reason, "request rejected");
                    Err(AdmissionError::RateLimited { wait, reason })
                }
                Err(e) => Err(AdmissionError::Rejected(e)),
            }
        })
    }
}
