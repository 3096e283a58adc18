//! Per-user cooldown between accepted messages.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Remembers when each user was last let through.
///
/// The map is never pruned. Two concurrent requests from the same user can
/// both pass the check before either records its time; that is acceptable
/// for a soft throttle.
#[derive(Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    last_allowed: Mutex<HashMap<i64, Instant>>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_allowed: Mutex::new(HashMap::new()),
        }
    }

    pub fn allow(&self, user_id: i64) -> bool {
        self.allow_at(user_id, Instant::now())
    }

    /// Same as `allow` with an explicit clock. Rejections leave state untouched.
    pub fn allow_at(&self, user_id: i64, now: Instant) -> bool {
        let mut last_allowed = self.last_allowed.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(&last) = last_allowed.get(&user_id)
            && now.saturating_duration_since(last) < self.cooldown
        {
            debug!("Rate limited user {}", user_id);
            return false;
        }

        last_allowed.insert(user_id, now);
        true
    }

    pub fn reset(&self) {
        self.last_allowed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
