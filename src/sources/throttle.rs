use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub type Limiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Enforces a minimum interval between consecutive requests to one upstream.
///
/// A zero interval disables limiting entirely.
pub struct Throttle {
    name: &'static str,
    interval: Duration,
    limiter: Option<Limiter>,
}

impl Throttle {
    pub fn new(name: &'static str, interval: Duration) -> Self {
        let limiter = Quota::with_period(interval).map(|quota| Arc::new(RateLimiter::direct(quota)));
        Self {
            name,
            interval,
            limiter,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until the next request may be sent.
    pub async fn wait(&self) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        if limiter.check().is_err() {
            debug!(upstream = self.name, "Waiting for request interval");
            limiter.until_ready().await;
        }
    }
}
