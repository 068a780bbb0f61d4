//! Decode health tracking
//!
//! A decode failure never replaces the published frame, so consumers
//! would keep seeing the last good frame forever. These counters make that
//! staleness observable.

use std::time::{Duration, Instant};

/// Snapshot of the decode worker's health
#[derive(Debug, Clone, Default)]
pub struct PipelineHealth {
    /// Frames decoded and published
    pub decoded: u64,
    /// Frames that failed to decode
    pub decode_failures: u64,
    /// Failures since the last successful decode
    pub consecutive_failures: u32,
    /// Compressed frames replaced before the worker took them
    pub overwritten: u64,
    /// Time of the last successful decode
    pub last_decode: Option<Instant>,
}

impl PipelineHealth {
    /// True when nothing was decoded within `max_age`
    pub fn is_stale(&self, max_age: Duration) -> bool {
        match self.last_decode {
            Some(at) => at.elapsed() > max_age,
            None => true,
        }
    }

    pub(super) fn record_success(&mut self) {
        self.decoded += 1;
        self.consecutive_failures = 0;
        self.last_decode = Some(Instant::now());
    }

    pub(super) fn record_failure(&mut self) {
        self.decode_failures += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_streak_resets() {
        let mut health = PipelineHealth::default();
        assert!(health.is_stale(Duration::from_secs(3600)));

        health.record_failure();
        health.record_failure();
        assert_eq!(health.consecutive_failures, 2);

        health.record_success();
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.decode_failures, 2);
        assert!(!health.is_stale(Duration::from_secs(3600)));
    }
}
