//! Reconnect backoff with jitter.
//!
//! Multiplicative growth between a floor and a ceiling. A session that
//! stayed up past the reset threshold counts as evidence the prior
//! outage was transient, so growth starts over. Sleeps are randomized
//! into `[base/2, base)` so a fleet of clients doesn't reconnect in
//! lockstep.

use std::time::Duration;

use rand::Rng;

pub const FLOOR: Duration = Duration::from_millis(500);
pub const CEILING: Duration = Duration::from_secs(30);
pub const RESET_AFTER: Duration = Duration::from_secs(10);
const FACTOR: f64 = 1.6;

#[derive(Debug)]
pub struct Backoff {
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self { current: FLOOR }
    }

    /// The base wait for the next retry, before jitter.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Consume the current base and grow it for the next consecutive
    /// failure, up to the ceiling.
    pub fn next(&mut self) -> Duration {
        let base = self.current;
        self.current = self.current.mul_f64(FACTOR).min(CEILING);
        base
    }

    /// Record how long the last session lasted. A long-lived session
    /// resets growth to the floor.
    pub fn observe(&mut self, session: Duration) {
        if session >= RESET_AFTER {
            self.current = FLOOR;
        }
    }
}

/// Randomize a computed wait into `[base/2, base)`.
pub fn jitter(base: Duration) -> Duration {
    let millis = base.as_millis() as u64;
    if millis < 2 {
        return base;
    }
    Duration::from_millis(rand::thread_rng().gen_range(millis / 2..millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bases_grow_to_the_ceiling() {
        let mut backoff = Backoff::new();

        let mut bases = Vec::new();
        for _ in 0..16 {
            bases.push(backoff.next());
        }

        assert_eq!(bases[0], FLOOR);
        assert_eq!(bases[1], Duration::from_millis(800));
        assert_eq!(bases[2], Duration::from_millis(1280));
        for pair in bases.windows(2) {
            assert!(pair[1] >= pair[0], "bases must be non-decreasing");
        }
        assert_eq!(*bases.last().unwrap(), CEILING);
    }

    #[test]
    fn test_long_session_resets_growth() {
        let mut backoff = Backoff::new();
        for _ in 0..5 {
            backoff.next();
        }
        assert!(backoff.current() > FLOOR);

        backoff.observe(RESET_AFTER);
        assert_eq!(backoff.current(), FLOOR);
    }

    #[test]
    fn test_short_session_keeps_growth() {
        let mut backoff = Backoff::new();
        backoff.next();
        backoff.next();
        let before = backoff.current();

        backoff.observe(Duration::from_secs(1));
        assert_eq!(backoff.current(), before);
    }

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_millis(1000);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let d = jitter(base);
            assert!(d >= base / 2, "{d:?} below half of base");
            assert!(d < base, "{d:?} not below base");
            seen.insert(d.as_millis());
        }
        // Two hundred draws over a 500ms range: not all equal.
        assert!(seen.len() > 1, "jitter produced a constant");
    }

    #[test]
    fn test_jitter_passes_tiny_durations_through() {
        assert_eq!(jitter(Duration::from_millis(1)), Duration::from_millis(1));
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
    }
}
