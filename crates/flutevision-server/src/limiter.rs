//! Per-client rate limiting for prediction routes
//!
//! Sliding one-minute window keyed by client address.

use crate::config::RateLimitConfig;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited { retry_after: Duration },
}

/// Sliding-window request limiter
pub struct RateLimiter {
    enabled: bool,
    max_requests: usize,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_window(config, Duration::from_secs(60))
    }

    pub fn with_window(config: &RateLimitConfig, window: Duration) -> Self {
        Self {
            enabled: config.enabled,
            max_requests: config.requests_per_minute,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Requests allowed per window
    pub fn limit(&self) -> usize {
        self.max_requests
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check and record a request for `client`
    pub fn check(&self, client: &str) -> Decision {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> Decision {
        if !self.enabled {
            return Decision::Allowed;
        }

        let mut hits = self.hits.lock();

        // Bound memory when many clients come and go
        if hits.len() > 100_000 {
            let window = self.window;
            hits.retain(|_, times| {
                times.retain(|&t| now.duration_since(t) < window);
                !times.is_empty()
            });
        }

        let times = hits.entry(client.to_string()).or_default();
        while let Some(&oldest) = times.front() {
            if now.duration_since(oldest) < self.window {
                break;
            }
            times.pop_front();
        }

        if times.len() >= self.max_requests {
            let retry_after = times
                .front()
                .map(|&oldest| self.window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(self.window);
            return Decision::Limited { retry_after };
        }

        times.push_back(now);
        Decision::Allowed
    }

    /// Drop clients with no requests in the current window
    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = self.window;
        self.hits.lock().retain(|_, times| {
            times.retain(|&t| now.duration_since(t) < window);
            !times.is_empty()
        });
    }

    /// Number of tracked clients
    pub fn tracked_clients(&self) -> usize {
        self.hits.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: usize) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_minute: limit,
        })
    }

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = limiter(3);
        let now = Instant::now();
        for _ in 0..3 {
            assert_eq!(limiter.check_at("10.0.0.1", now), Decision::Allowed);
        }
        assert!(matches!(
            limiter.check_at("10.0.0.1", now),
            Decision::Limited { .. }
        ));
        // Other clients have their own window.
        assert_eq!(limiter.check_at("10.0.0.2", now), Decision::Allowed);
    }

    #[test]
    fn test_window_slides() {
        let limiter = limiter(2);
        let start = Instant::now();
        assert_eq!(limiter.check_at("a", start), Decision::Allowed);
        assert_eq!(
            limiter.check_at("a", start + Duration::from_secs(30)),
            Decision::Allowed
        );

        match limiter.check_at("a", start + Duration::from_secs(45)) {
            Decision::Limited { retry_after } => assert_eq!(retry_after, Duration::from_secs(15)),
            other => panic!("expected limit, got {:?}", other),
        }

        assert_eq!(
            limiter.check_at("a", start + Duration::from_secs(61)),
            Decision::Allowed
        );
    }

    #[test]
    fn test_disabled_never_limits() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: false,
            requests_per_minute: 1,
        });
        for _ in 0..10 {
            assert_eq!(limiter.check("a"), Decision::Allowed);
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_cleanup_drops_idle_clients() {
        let limiter = RateLimiter::with_window(
            &RateLimitConfig {
                enabled: true,
                requests_per_minute: 5,
            },
            Duration::ZERO,
        );
        limiter.check("a");
        limiter.cleanup();
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
