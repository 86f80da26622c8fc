//! Per-client sliding-window rate limiter
//!
//! One bucket of request timestamps per client IP over a one-hour window.
//! Stale timestamps are pruned opportunistically: the touched bucket on
//! every check, the whole map every [`SWEEP_EVERY`] checks.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::service::clock::Clock;

/// Default requests allowed per client IP per sliding hour.
pub const DEFAULT_LIMIT_PER_HOUR: usize = 120;

const WINDOW_SECONDS: i64 = 3600;
const SWEEP_EVERY: u64 = 256;

struct Buckets {
    by_ip: HashMap<IpAddr, Vec<DateTime<Utc>>>,
    checks: u64,
}

pub struct RateLimiter {
    buckets: Mutex<Buckets>,
    limit: usize,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(limit: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Mutex::new(Buckets {
                by_ip: HashMap::new(),
                checks: 0,
            }),
            limit,
            clock,
        }
    }

    /// Record a request from `ip` and report whether it is allowed.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = self.clock.now();
        let cutoff = now - Duration::seconds(WINDOW_SECONDS);
        let mut buckets = self.buckets.lock();

        buckets.checks += 1;
        if buckets.checks % SWEEP_EVERY == 0 {
            buckets.by_ip.retain(|_, stamps| {
                stamps.retain(|t| *t > cutoff);
                !stamps.is_empty()
            });
        }

        let stamps = buckets.by_ip.entry(ip).or_default();
        stamps.retain(|t| *t > cutoff);

        if stamps.len() >= self.limit {
            tracing::debug!(ip = %ip, requests = stamps.len(), "Rate limit exceeded");
            return false;
        }

        stamps.push(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::clock::FixedClock;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    fn limiter_at(limit: usize, iso: &str) -> RateLimiter {
        RateLimiter::new(limit, Arc::new(FixedClock(iso.parse().unwrap())))
    }

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let limiter = limiter_at(3, "2024-06-01T00:00:00Z");
        assert!(limiter.check(ip(1)));
        assert!(limiter.check(ip(1)));
        assert!(limiter.check(ip(1)));
        assert!(!limiter.check(ip(1)));
    }

    #[test]
    fn buckets_are_per_ip() {
        let limiter = limiter_at(1, "2024-06-01T00:00:00Z");
        assert!(limiter.check(ip(1)));
        assert!(!limiter.check(ip(1)));
        assert!(limiter.check(ip(2)));
    }

    #[test]
    fn window_slides_after_an_hour() {
        let start: DateTime<Utc> = "2024-06-01T00:00:00Z".parse().unwrap();
        let clock = Arc::new(FixedClock(start));
        let limiter = RateLimiter::new(1, clock);
        assert!(limiter.check(ip(1)));
        assert!(!limiter.check(ip(1)));

        // Same buckets, one hour and a second later.
        let later = RateLimiter {
            buckets: Mutex::new(Buckets {
                by_ip: limiter.buckets.lock().by_ip.clone(),
                checks: 0,
            }),
            limit: 1,
            clock: Arc::new(FixedClock(start + Duration::seconds(WINDOW_SECONDS + 1))),
        };
        assert!(later.check(ip(1)));
    }

    #[test]
    fn default_limit_matches_contract() {
        assert_eq!(DEFAULT_LIMIT_PER_HOUR, 120);
    }
}
