//! Idle hand decay.
//!
//! A hand that stops being tracked relaxes toward an open, unspread pose
//! through the normal smoothing path instead of freezing mid-gesture.

use std::time::{Duration, Instant};

use super::channels::{neutral_hand, ChannelStore, Side};
use super::smoothing::Resolver;

/// Per-hand last-seen bookkeeping
#[derive(Debug, Clone)]
pub struct IdleDecay {
    timeout: Duration,
    last_seen: [Instant; 2],
}

impl IdleDecay {
    /// Both hands count as seen at `now`
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_seen: [now, now],
        }
    }

    pub fn from_secs(timeout_secs: f32, now: Instant) -> Self {
        let timeout = Duration::try_from_secs_f32(timeout_secs.max(0.0)).unwrap_or(Duration::MAX);
        Self::new(timeout, now)
    }

    /// Record a real observation for `side`
    pub fn observe(&mut self, side: Side, now: Instant) {
        self.last_seen[side.index()] = now;
    }

    /// Whether `side` has gone unobserved for longer than the timeout
    pub fn is_idle(&self, side: Side, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen[side.index()]) > self.timeout
    }

    /// Relax `side` one smoothing step toward neutral if it is idle.
    ///
    /// Returns whether a decay step was applied.
    pub fn decay(
        &self,
        side: Side,
        now: Instant,
        store: &mut ChannelStore,
        resolver: &Resolver,
    ) -> bool {
        if !self.is_idle(side, now) {
            return false;
        }
        resolver.resolve_hand(store, &neutral_hand(side));
        true
    }
}
