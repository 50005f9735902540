//! Per-IP rate limiting for auth endpoints.
//!
//! Credential-bearing routes (register, login, verify-email) get a stricter
//! ceiling than the rest. Counting is a fixed window per IP, kept in memory;
//! this service runs as a single instance behind the platform proxy.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitAction {
    Register,
    Login,
    VerifyEmail,
    Refresh,
    Logout,
    Me,
}

impl RateLimitAction {
    const fn sensitive(self) -> bool {
        matches!(self, Self::Register | Self::Login | Self::VerifyEmail)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision;
}

/// Limiter that allows everything. Used in tests.
#[derive(Debug, Default)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: Option<&str>, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

struct WindowSlot {
    started_at: Instant,
    count: u32,
}

pub struct WindowRateLimiter {
    window: Duration,
    max: u32,
    sensitive_max: u32,
    hits: Mutex<HashMap<(String, bool), WindowSlot>>,
}

impl WindowRateLimiter {
    #[must_use]
    pub fn new(window: Duration, max: u32, sensitive_max: u32) -> Self {
        Self {
            window,
            max,
            sensitive_max,
            hits: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for WindowRateLimiter {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision {
        // Without a client IP there is nothing to key on.
        let Some(ip) = ip else {
            return RateLimitDecision::Allowed;
        };

        let sensitive = action.sensitive();
        let limit = if sensitive { self.sensitive_max } else { self.max };
        let now = Instant::now();

        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);

        if hits.len() > 10_000 {
            let window = self.window;
            hits.retain(|_, slot| now.duration_since(slot.started_at) < window);
        }

        let slot = hits
            .entry((ip.to_string(), sensitive))
            .or_insert(WindowSlot {
                started_at: now,
                count: 0,
            });

        if now.duration_since(slot.started_at) >= self.window {
            slot.started_at = now;
            slot.count = 0;
        }

        slot.count += 1;
        if slot.count > limit {
            RateLimitDecision::Limited
        } else {
            RateLimitDecision::Allowed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_allows_everything() {
        let limiter = NoopRateLimiter;
        for _ in 0..1000 {
            assert_eq!(
                limiter.check_ip(Some("10.0.0.1"), RateLimitAction::Login),
                RateLimitDecision::Allowed
            );
        }
    }

    #[test]
    fn missing_ip_is_allowed() {
        let limiter = WindowRateLimiter::new(Duration::from_secs(60), 1, 1);
        for _ in 0..10 {
            assert_eq!(
                limiter.check_ip(None, RateLimitAction::Login),
                RateLimitDecision::Allowed
            );
        }
    }

    #[test]
    fn sensitive_routes_hit_the_lower_ceiling() {
        let limiter = WindowRateLimiter::new(Duration::from_secs(60), 100, 3);
        for _ in 0..3 {
            assert_eq!(
                limiter.check_ip(Some("10.0.0.1"), RateLimitAction::Login),
                RateLimitDecision::Allowed
            );
        }
        assert_eq!(
            limiter.check_ip(Some("10.0.0.1"), RateLimitAction::Login),
            RateLimitDecision::Limited
        );
        // The regular bucket for the same IP is untouched.
        assert_eq!(
            limiter.check_ip(Some("10.0.0.1"), RateLimitAction::Me),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn separate_ips_do_not_share_buckets() {
        let limiter = WindowRateLimiter::new(Duration::from_secs(60), 100, 1);
        assert_eq!(
            limiter.check_ip(Some("10.0.0.1"), RateLimitAction::Register),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(Some("10.0.0.1"), RateLimitAction::Register),
            RateLimitDecision::Limited
        );
        assert_eq!(
            limiter.check_ip(Some("10.0.0.2"), RateLimitAction::Register),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn window_resets_after_elapse() {
        let limiter = WindowRateLimiter::new(Duration::from_millis(20), 100, 1);
        assert_eq!(
            limiter.check_ip(Some("10.0.0.1"), RateLimitAction::VerifyEmail),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(Some("10.0.0.1"), RateLimitAction::VerifyEmail),
            RateLimitDecision::Limited
        );
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(
            limiter.check_ip(Some("10.0.0.1"), RateLimitAction::VerifyEmail),
            RateLimitDecision::Allowed
        );
    }
}
