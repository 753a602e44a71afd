//! Rate limiting utilities

use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Limiter keyed by player id
pub type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Default externally submitted moves per second, per player
pub const MOVE_RATE_LIMIT: u32 = 5;

/// Per-player move rate limiter
#[derive(Clone)]
pub struct PlayerRateLimiter {
    limiter: Arc<KeyedLimiter>,
}

impl PlayerRateLimiter {
    pub fn new(per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Check if a move from this player is allowed (returns true if allowed)
    pub fn check(&self, player_id: &str) -> bool {
        self.limiter.check_key(&player_id.to_string()).is_ok()
    }

    /// Forget players that have not been seen recently
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }
}

impl Default for PlayerRateLimiter {
    fn default() -> Self {
        Self::new(MOVE_RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_is_limited_per_player() {
        let limiter = PlayerRateLimiter::new(2);
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        // Other players have their own bucket
        assert!(limiter.check("b"));
    }
}
