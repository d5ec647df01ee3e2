use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter as GovernorRateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

// Idle client buckets are dropped once this many are tracked.
const PRUNE_ABOVE: usize = 10_000;

/// Per-client token bucket: each address gets `capacity` tokens, refilled one at a
/// time so a full bucket is restored every `window`.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<GovernorRateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>>,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(capacity.max(1)).unwrap_or(NonZeroU32::MIN);
        let interval = (window / burst.get()).max(Duration::from_millis(1));
        let quota = Quota::with_period(interval).unwrap_or_else(|| Quota::per_second(burst)).allow_burst(burst);
        RateLimiter { inner: Arc::new(GovernorRateLimiter::keyed(quota)) }
    }

    /// Take a token for `client` without waiting. `false` means its budget is exhausted.
    pub fn try_acquire(&self, client: IpAddr) -> bool {
        if self.inner.len() > PRUNE_ABOVE {
            self.inner.retain_recent();
        }
        self.inner.check_key(&client).is_ok()
    }
}
