//! Per-Caller Quota
//!
//! In-memory sliding-window limiter. Each caller owns an ordered list of
//! admission timestamps, pruned to the trailing 24 hours on every check.
//! The hourly cap is checked before the daily cap, and a refused check
//! records nothing.
//!
//! Callers whose windows have emptied are removed by a lazy sweep that runs
//! at most once per sweep interval, piggybacked on `check`.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::quota as quota_constants;
use crate::types::CallerId;

// =============================================================================
// Limits & Decisions
// =============================================================================

/// Caps applied to every caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaLimits {
    pub per_hour: usize,
    pub per_day: usize,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            per_hour: quota_constants::MAX_PER_HOUR,
            per_day: quota_constants::MAX_PER_DAY,
        }
    }
}

impl QuotaLimits {
    pub fn validate(&self) -> Result<(), String> {
        if self.per_hour == 0 || self.per_day == 0 {
            return Err("quota limits must be at least 1".to_string());
        }
        if self.per_hour > self.per_day {
            return Err("quota.per_hour must not exceed quota.per_day".to_string());
        }
        Ok(())
    }
}

/// Outcome of a quota check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    /// Which limit refused the request
    pub reason: Option<String>,
}

impl QuotaDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn refuse(reason: String) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Slots left in each window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaRemaining {
    pub hourly: usize,
    pub daily: usize,
}

// =============================================================================
// Rate Limiter
// =============================================================================

/// Thread-safe per-caller sliding-window limiter
pub struct RateLimiter {
    entries: DashMap<String, Vec<DateTime<Utc>>>,
    last_sweep: Mutex<DateTime<Utc>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn hour() -> TimeDelta {
    TimeDelta::seconds(quota_constants::HOUR_WINDOW_SECS)
}

fn day() -> TimeDelta {
    TimeDelta::seconds(quota_constants::DAY_WINDOW_SECS)
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            last_sweep: Mutex::new(Utc::now()),
        }
    }

    fn sweep_guard(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.last_sweep.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Quota sweep mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Admit or refuse one request for `caller`
    pub fn check(&self, caller: &CallerId, max_per_hour: usize, max_per_day: usize) -> QuotaDecision {
        self.check_at(caller, max_per_hour, max_per_day, Utc::now())
    }

    pub fn check_at(
        &self,
        caller: &CallerId,
        max_per_hour: usize,
        max_per_day: usize,
        now: DateTime<Utc>,
    ) -> QuotaDecision {
        // Must run before the entry guard below is taken
        self.maybe_sweep(now);

        let mut stamps = self.entries.entry(caller.as_str().to_string()).or_default();
        let day_start = now - day();
        stamps.retain(|t| *t > day_start);

        let hour_start = now - hour();
        let in_hour = stamps.iter().filter(|t| **t > hour_start).count();

        if in_hour >= max_per_hour {
            warn!(caller = %caller, limit = max_per_hour, "Hourly quota reached");
            return QuotaDecision::refuse(format!(
                "hourly limit of {} generations reached",
                max_per_hour
            ));
        }
        if stamps.len() >= max_per_day {
            warn!(caller = %caller, limit = max_per_day, "Daily quota reached");
            return QuotaDecision::refuse(format!(
                "daily limit of {} generations reached",
                max_per_day
            ));
        }

        stamps.push(now);
        QuotaDecision::allow()
    }

    /// Slots left for `caller` without recording anything
    pub fn remaining(&self, caller: &CallerId, limits: QuotaLimits) -> QuotaRemaining {
        self.remaining_at(caller, limits, Utc::now())
    }

    pub fn remaining_at(
        &self,
        caller: &CallerId,
        limits: QuotaLimits,
        now: DateTime<Utc>,
    ) -> QuotaRemaining {
        let (in_hour, in_day) = self
            .entries
            .get(caller.as_str())
            .map(|stamps| {
                let hour_start = now - hour();
                let day_start = now - day();
                (
                    stamps.iter().filter(|t| **t > hour_start).count(),
                    stamps.iter().filter(|t| **t > day_start).count(),
                )
            })
            .unwrap_or((0, 0));

        QuotaRemaining {
            hourly: limits.per_hour.saturating_sub(in_hour),
            daily: limits.per_day.saturating_sub(in_day),
        }
    }

    /// Number of callers currently holding state
    pub fn tracked_callers(&self) -> usize {
        self.entries.len()
    }

    fn maybe_sweep(&self, now: DateTime<Utc>) {
        {
            let mut last = self.sweep_guard();
            if now - *last < TimeDelta::seconds(quota_constants::SWEEP_INTERVAL_SECS) {
                return;
            }
            *last = now;
        }

        let day_start = now - day();
        let before = self.entries.len();
        self.entries.retain(|_, stamps| {
            stamps.retain(|t| *t > day_start);
            !stamps.is_empty()
        });
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Swept idle quota entries");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn caller(id: &str) -> CallerId {
        CallerId::new(id)
    }

    #[test]
    fn test_hourly_cap_then_recovery() {
        let limiter = RateLimiter::new();
        let alice = caller("alice");
        let start = Utc::now();

        for i in 0..3 {
            let now = start + TimeDelta::minutes(i);
            assert!(limiter.check_at(&alice, 3, 10, now).allowed);
        }

        let refused = limiter.check_at(&alice, 3, 10, start + TimeDelta::minutes(10));
        assert!(!refused.allowed);
        assert!(refused.reason.unwrap().contains("hourly"));

        let later = start + TimeDelta::minutes(61);
        assert!(limiter.check_at(&alice, 3, 10, later).allowed);
    }

    #[test]
    fn test_daily_cap() {
        let limiter = RateLimiter::new();
        let bob = caller("bob");
        let start = Utc::now();

        for i in 0..4 {
            let now = start + TimeDelta::hours(i * 2);
            assert!(limiter.check_at(&bob, 2, 4, now).allowed);
        }

        let refused = limiter.check_at(&bob, 2, 4, start + TimeDelta::hours(9));
        assert!(!refused.allowed);
        assert!(refused.reason.unwrap().contains("daily"));

        // First admission ages out of the 24h window
        assert!(
            limiter
                .check_at(&bob, 2, 4, start + TimeDelta::hours(24) + TimeDelta::seconds(1))
                .allowed
        );
    }

    #[test]
    fn test_hourly_checked_before_daily() {
        let limiter = RateLimiter::new();
        let carol = caller("carol");
        let now = Utc::now();
        assert!(limiter.check_at(&carol, 1, 1, now).allowed);
        let refused = limiter.check_at(&carol, 1, 1, now);
        assert!(refused.reason.unwrap().contains("hourly"));
    }

    #[test]
    fn test_refusal_records_nothing() {
        let limiter = RateLimiter::new();
        let dave = caller("dave");
        let now = Utc::now();
        let limits = QuotaLimits {
            per_hour: 1,
            per_day: 5,
        };

        assert!(limiter.check_at(&dave, 1, 5, now).allowed);
        for _ in 0..5 {
            assert!(!limiter.check_at(&dave, 1, 5, now).allowed);
        }
        let remaining = limiter.remaining_at(&dave, limits, now);
        assert_eq!(remaining.hourly, 0);
        assert_eq!(remaining.daily, 4);
    }

    #[test]
    fn test_callers_are_independent() {
        let limiter = RateLimiter::new();
        let now = Utc::now();
        assert!(limiter.check_at(&caller("a"), 1, 1, now).allowed);
        assert!(limiter.check_at(&caller("b"), 1, 1, now).allowed);
        assert!(!limiter.check_at(&caller("a"), 1, 1, now).allowed);
        assert_eq!(limiter.tracked_callers(), 2);
    }

    #[test]
    fn test_sweep_drops_idle_callers() {
        let limiter = RateLimiter::new();
        let now = Utc::now();
        assert!(limiter.check_at(&caller("idle"), 5, 5, now).allowed);
        assert_eq!(limiter.tracked_callers(), 1);

        let much_later = now + TimeDelta::days(2);
        assert!(limiter.check_at(&caller("active"), 5, 5, much_later).allowed);
        assert_eq!(limiter.tracked_callers(), 1);
    }

    #[test]
    fn test_limits_validation() {
        assert!(QuotaLimits::default().validate().is_ok());
        let inverted = QuotaLimits {
            per_hour: 10,
            per_day: 5,
        };
        assert!(inverted.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_never_more_than_hourly_cap_in_any_hour(
            mut offsets in prop::collection::vec(0i64..(3 * 3600), 1..60),
            cap in 1usize..6,
        ) {
            offsets.sort_unstable();
            let limiter = RateLimiter::new();
            let who = caller("prop");
            let start = Utc::now();
            let mut admitted = Vec::new();

            for secs in offsets {
                let now = start + TimeDelta::seconds(secs);
                if limiter.check_at(&who, cap, 1_000, now).allowed {
                    admitted.push(now);
                }
            }

            for (i, t) in admitted.iter().enumerate() {
                let window = admitted[i..].iter().filter(|u| **u - *t < hour()).count();
                prop_assert!(window <= cap);
            }
        }
    }
}
