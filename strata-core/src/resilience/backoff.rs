//! Restart throttling for crashed workers
//!
//! The first crash after a quiet period is restarted immediately. Crashes
//! that follow in quick succession wait exponentially longer (with jitter)
//! so a handler that panics on every task cannot spin the control thread.

use rand::Rng;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct RestartPolicy {
    /// Delay before the second restart of a crash burst
    pub initial_delay: Duration,
    /// Upper bound on any restart delay
    pub max_delay: Duration,
    /// Growth per consecutive crash (typically 2.0)
    pub multiplier: f64,
    /// Randomisation around the delay (0.0 to 1.0)
    pub jitter_factor: f64,
    /// A crash this long after the previous one starts a new burst
    pub quiet_period: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter_factor: 0.1,
            quiet_period: Duration::from_secs(5),
        }
    }
}

impl RestartPolicy {
    /// Restart every crash immediately (tests)
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_factor: 0.0,
            ..Default::default()
        }
    }
}

/// Backoff state for one worker slot
#[derive(Debug, Clone)]
pub struct RestartBackoff {
    policy: RestartPolicy,
    consecutive: u32,
    current_delay: Duration,
    last_crash: Option<Instant>,
}

impl RestartBackoff {
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            current_delay: policy.initial_delay,
            consecutive: 0,
            last_crash: None,
            policy,
        }
    }

    /// Record a crash at `now` and return how long to wait before restarting
    pub fn on_crash(&mut self, now: Instant) -> Duration {
        let quiet = self
            .last_crash
            .map_or(true, |t| now.saturating_duration_since(t) >= self.policy.quiet_period);
        if quiet {
            self.reset();
        }
        self.last_crash = Some(now);

        let delay = if self.consecutive == 0 {
            Duration::ZERO
        } else {
            let d = self.with_jitter(self.current_delay);
            self.current_delay = std::cmp::min(
                Duration::from_secs_f64(self.current_delay.as_secs_f64() * self.policy.multiplier),
                self.policy.max_delay,
            );
            d
        };
        self.consecutive += 1;
        delay.min(self.policy.max_delay)
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        if self.policy.jitter_factor == 0.0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen::<f64>() * self.policy.jitter_factor;
        let factor = 1.0 + (jitter - self.policy.jitter_factor / 2.0);
        Duration::from_secs_f64(delay.as_secs_f64() * factor)
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.current_delay = self.policy.initial_delay;
    }

    /// Crashes in the current burst
    pub fn consecutive_crashes(&self) -> u32 {
        self.consecutive
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }
}

impl Default for RestartBackoff {
    fn default() -> Self {
        Self::new(RestartPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RestartPolicy {
        RestartPolicy {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
            jitter_factor: 0.0,
            quiet_period: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_first_crash_restarts_immediately() {
        let mut backoff = RestartBackoff::new(no_jitter());
        assert_eq!(backoff.on_crash(Instant::now()), Duration::ZERO);
        assert_eq!(backoff.consecutive_crashes(), 1);
    }

    #[test]
    fn test_burst_grows_exponentially() {
        let mut backoff = RestartBackoff::new(no_jitter());
        let t0 = Instant::now();

        assert_eq!(backoff.on_crash(t0), Duration::ZERO);
        assert_eq!(backoff.on_crash(t0), Duration::from_millis(10));
        assert_eq!(backoff.on_crash(t0), Duration::from_millis(20));
        assert_eq!(backoff.on_crash(t0), Duration::from_millis(40));
    }

    #[test]
    fn test_capped_at_max_delay() {
        let mut backoff = RestartBackoff::new(no_jitter());
        let t0 = Instant::now();
        let mut last = Duration::ZERO;
        for _ in 0..12 {
            last = backoff.on_crash(t0);
            assert!(last <= Duration::from_millis(100));
        }
        assert_eq!(last, Duration::from_millis(100));
    }

    #[test]
    fn test_quiet_period_resets() {
        let mut backoff = RestartBackoff::new(no_jitter());
        let t0 = Instant::now();
        backoff.on_crash(t0);
        backoff.on_crash(t0);
        backoff.on_crash(t0);

        let later = t0 + Duration::from_secs(2);
        assert_eq!(backoff.on_crash(later), Duration::ZERO);
        assert_eq!(backoff.consecutive_crashes(), 1);
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = RestartPolicy {
            jitter_factor: 0.2,
            ..no_jitter()
        };
        let mut backoff = RestartBackoff::new(policy);
        let t0 = Instant::now();
        backoff.on_crash(t0);
        let d = backoff.on_crash(t0);
        assert!(d >= Duration::from_millis(9) && d <= Duration::from_millis(11));
    }

    #[test]
    fn test_immediate_policy() {
        let mut backoff = RestartBackoff::new(RestartPolicy::immediate());
        let t0 = Instant::now();
        for _ in 0..5 {
            assert_eq!(backoff.on_crash(t0), Duration::ZERO);
        }
    }
}
