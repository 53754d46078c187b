//! Per-user CV generation limits over sliding one-hour and one-day windows.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// The hourly limit, the one users hit first.
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
}

pub struct GenerationLimiter {
    per_hour: u32,
    per_day: u32,
    history: Mutex<HashMap<Uuid, Vec<DateTime<Utc>>>>,
}

impl GenerationLimiter {
    pub fn new(per_hour: u32, per_day: u32) -> Self {
        Self {
            per_hour,
            per_day,
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Checks and, when allowed, records a generation for `user_id`.
    pub fn try_acquire(&self, user_id: Uuid) -> RateLimitDecision {
        self.try_acquire_at(user_id, Utc::now())
    }

    pub fn try_acquire_at(&self, user_id: Uuid, now: DateTime<Utc>) -> RateLimitDecision {
        let mut history = match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let day_ago = now - Duration::days(1);
        history.retain(|_, stamps| stamps.last().is_some_and(|t| *t > day_ago));

        let stamps = history.entry(user_id).or_default();
        let decision = evaluate(stamps, now, self.per_hour, self.per_day);
        if decision.allowed {
            stamps.push(now);
        } else if stamps.is_empty() {
            history.remove(&user_id);
        }
        decision
    }

    /// Number of generations recorded for `user_id` since `since`.
    pub fn count_since(&self, user_id: Uuid, since: DateTime<Utc>) -> u32 {
        let history = match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        history
            .get(&user_id)
            .map(|stamps| stamps.iter().filter(|t| **t >= since).count() as u32)
            .unwrap_or(0)
    }

    pub fn forget(&self, user_id: Uuid) {
        if let Ok(mut history) = self.history.lock() {
            history.remove(&user_id);
        }
    }
}

/// Prunes stamps older than a day, then decides. `stamps` is kept sorted.
fn evaluate(
    stamps: &mut Vec<DateTime<Utc>>,
    now: DateTime<Utc>,
    per_hour: u32,
    per_day: u32,
) -> RateLimitDecision {
    let hour_ago = now - Duration::hours(1);
    let day_ago = now - Duration::days(1);
    stamps.retain(|t| *t > day_ago);

    let in_hour: Vec<DateTime<Utc>> = stamps.iter().copied().filter(|t| *t > hour_ago).collect();
    let in_day = stamps.len() as u32;
    let hour_used = in_hour.len() as u32;

    let hour_blocked = hour_used >= per_hour;
    let day_blocked = in_day >= per_day;

    // The earliest moment at which the blocking window frees a slot.
    let reset_time = if day_blocked {
        stamps
            .get((in_day - per_day) as usize)
            .map(|t| *t + Duration::days(1))
            .unwrap_or(now)
    } else if hour_blocked {
        in_hour
            .get((hour_used - per_hour) as usize)
            .map(|t| *t + Duration::hours(1))
            .unwrap_or(now)
    } else {
        in_hour
            .first()
            .map(|t| *t + Duration::hours(1))
            .unwrap_or(now + Duration::hours(1))
    };

    let remaining = per_hour
        .saturating_sub(hour_used)
        .min(per_day.saturating_sub(in_day));
    let allowed = !hour_blocked && !day_blocked;

    RateLimitDecision {
        allowed,
        limit: per_hour,
        remaining: if allowed { remaining - 1 } else { 0 },
        reset_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_allows_up_to_hourly_limit() {
        let limiter = GenerationLimiter::new(3, 10);
        let user = Uuid::new_v4();
        let remaining: Vec<u32> = (0..3)
            .map(|i| {
                let d = limiter.try_acquire_at(user, t0() + Duration::minutes(i));
                assert!(d.allowed);
                d.remaining
            })
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let blocked = limiter.try_acquire_at(user, t0() + Duration::minutes(10));
        assert!(!blocked.allowed);
        assert_eq!(blocked.remaining, 0);
        assert_eq!(blocked.limit, 3);
        // the first stamp leaves the window an hour after it was taken
        assert_eq!(blocked.reset_time, t0() + Duration::hours(1));
    }

    #[test]
    fn test_window_slides() {
        let limiter = GenerationLimiter::new(1, 10);
        let user = Uuid::new_v4();
        assert!(limiter.try_acquire_at(user, t0()).allowed);
        assert!(!limiter.try_acquire_at(user, t0() + Duration::minutes(59)).allowed);
        assert!(limiter.try_acquire_at(user, t0() + Duration::minutes(61)).allowed);
    }

    #[test]
    fn test_daily_limit() {
        let limiter = GenerationLimiter::new(5, 2);
        let user = Uuid::new_v4();
        assert!(limiter.try_acquire_at(user, t0()).allowed);
        assert!(limiter.try_acquire_at(user, t0() + Duration::hours(2)).allowed);
        let blocked = limiter.try_acquire_at(user, t0() + Duration::hours(5));
        assert!(!blocked.allowed);
        assert_eq!(blocked.reset_time, t0() + Duration::days(1));
    }

    #[test]
    fn test_blocked_attempts_are_not_recorded() {
        let limiter = GenerationLimiter::new(1, 10);
        let user = Uuid::new_v4();
        limiter.try_acquire_at(user, t0());
        limiter.try_acquire_at(user, t0() + Duration::minutes(1));
        assert_eq!(limiter.count_since(user, t0() - Duration::days(1)), 1);
    }

    #[test]
    fn test_users_are_independent() {
        let limiter = GenerationLimiter::new(1, 1);
        assert!(limiter.try_acquire_at(Uuid::new_v4(), t0()).allowed);
        assert!(limiter.try_acquire_at(Uuid::new_v4(), t0()).allowed);
    }

    #[test]
    fn test_forget_clears_history() {
        let limiter = GenerationLimiter::new(1, 1);
        let user = Uuid::new_v4();
        limiter.try_acquire_at(user, t0());
        limiter.forget(user);
        assert!(limiter.try_acquire_at(user, t0()).allowed);
    }

    #[test]
    fn test_idle_users_are_dropped() {
        let limiter = GenerationLimiter::new(5, 5);
        let idle = Uuid::new_v4();
        limiter.try_acquire_at(idle, t0());
        limiter.try_acquire_at(Uuid::new_v4(), t0() + Duration::days(2));

        let history = limiter.history.lock().unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history.contains_key(&idle));
    }

    #[test]
    fn test_zero_limit_leaves_no_entry() {
        let limiter = GenerationLimiter::new(0, 0);
        assert!(!limiter.try_acquire_at(Uuid::new_v4(), t0()).allowed);
        assert!(limiter.history.lock().unwrap().is_empty());
    }
}
