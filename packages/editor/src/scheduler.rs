//! Coalescing scheduler for deferred work.
//!
//! Bursts of `schedule` calls collapse into a single pending item:
//!
//! - **Latest wins**: each `schedule` replaces the pending work
//! - **Debounced**: work becomes due `window` after the most recent schedule
//! - **Bounded latency**: never later than `max_wait` after the burst began
//!
//! There is no timer thread. The owner drives the scheduler with `poll(now)`
//! (typically once per frame) and calls `flush()` whenever staleness would be
//! observable.
//!
//! ```
//! use std::time::{Duration, Instant};
//! use storyboard_editor::{CoalesceConfig, Coalescer};
//!
//! let mut queue = Coalescer::new(CoalesceConfig::default());
//! let t0 = Instant::now();
//! queue.schedule(1, t0);
//! queue.schedule(2, t0 + Duration::from_millis(5));
//!
//! assert_eq!(queue.poll(t0 + Duration::from_millis(10)), None);
//! assert_eq!(queue.poll(t0 + Duration::from_millis(30)), Some(2));
//! ```

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalesceConfig {
    /// Quiet period after the last schedule before work is due
    pub window: Duration,

    /// Hard deadline measured from the first schedule of a burst
    pub max_wait: Duration,
}

impl CoalesceConfig {
    pub fn from_millis(window_ms: u64, max_wait_ms: u64) -> Self {
        Self {
            window: Duration::from_millis(window_ms),
            max_wait: Duration::from_millis(max_wait_ms),
        }
    }
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        // About one frame at 60fps
        Self::from_millis(16, 100)
    }
}

#[derive(Debug)]
pub struct Coalescer<W> {
    config: CoalesceConfig,
    pending: Option<W>,
    burst_started: Option<Instant>,
    last_scheduled: Option<Instant>,
    coalesced: u64,
}

impl<W> Coalescer<W> {
    pub fn new(config: CoalesceConfig) -> Self {
        Self {
            config,
            pending: None,
            burst_started: None,
            last_scheduled: None,
            coalesced: 0,
        }
    }

    pub fn config(&self) -> CoalesceConfig {
        self.config
    }

    /// Queue `work`, replacing anything pending. Returns true if it replaced
    /// earlier work.
    pub fn schedule(&mut self, work: W, now: Instant) -> bool {
        let replaced = self.pending.replace(work).is_some();
        if replaced {
            self.coalesced += 1;
        } else {
            self.burst_started = Some(now);
        }
        self.last_scheduled = Some(now);
        replaced
    }

    /// When the pending work becomes due
    pub fn due_at(&self) -> Option<Instant> {
        self.pending.as_ref()?;
        let quiet = self.last_scheduled? + self.config.window;
        let deadline = self.burst_started? + self.config.max_wait;
        Some(quiet.min(deadline))
    }

    /// Take the pending work if it is due at `now`
    pub fn poll(&mut self, now: Instant) -> Option<W> {
        match self.due_at() {
            Some(due) if now >= due => self.take(),
            _ => None,
        }
    }

    /// Take the pending work regardless of timing
    pub fn flush(&mut self) -> Option<W> {
        self.take()
    }

    /// Drop the pending work
    pub fn cancel(&mut self) -> Option<W> {
        self.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of schedules absorbed into already-pending work
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    fn take(&mut self) -> Option<W> {
        self.burst_started = None;
        self.last_scheduled = None;
        self.pending.take()
    }
}

impl<W> Default for Coalescer<W> {
    fn default() -> Self {
        Self::new(CoalesceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_latest_wins() {
        let mut queue = Coalescer::new(CoalesceConfig::from_millis(16, 100));
        let t0 = Instant::now();

        assert!(!queue.schedule("a", t0));
        assert!(queue.schedule("b", t0 + ms(1)));
        assert!(queue.schedule("c", t0 + ms(2)));

        assert_eq!(queue.poll(t0 + ms(18)), Some("c"));
        assert_eq!(queue.coalesced(), 2);
        assert!(!queue.is_pending());
    }

    #[test]
    fn test_window_resets_on_each_schedule() {
        let mut queue = Coalescer::new(CoalesceConfig::from_millis(16, 100));
        let t0 = Instant::now();

        queue.schedule(1, t0);
        queue.schedule(2, t0 + ms(10));
        assert_eq!(queue.poll(t0 + ms(20)), None);
        assert_eq!(queue.poll(t0 + ms(26)), Some(2));
    }

    #[test]
    fn test_max_wait_bounds_latency() {
        let mut queue = Coalescer::new(CoalesceConfig::from_millis(16, 40));
        let t0 = Instant::now();

        for i in 0..10 {
            queue.schedule(i, t0 + ms(i * 10));
        }
        // Still inside the debounce window, but past the hard deadline
        assert_eq!(queue.due_at(), Some(t0 + ms(40)));
        assert_eq!(queue.poll(t0 + ms(90)), Some(9));
    }

    #[test]
    fn test_flush_and_cancel() {
        let mut queue = Coalescer::new(CoalesceConfig::default());
        let t0 = Instant::now();

        queue.schedule("x", t0);
        assert_eq!(queue.flush(), Some("x"));
        assert_eq!(queue.flush(), None);

        queue.schedule("y", t0);
        assert_eq!(queue.cancel(), Some("y"));
        assert_eq!(queue.poll(t0 + ms(1000)), None);
    }

    #[test]
    fn test_new_burst_after_take() {
        let mut queue = Coalescer::new(CoalesceConfig::from_millis(16, 40));
        let t0 = Instant::now();

        queue.schedule(1, t0);
        queue.poll(t0 + ms(16));
        queue.schedule(2, t0 + ms(100));

        assert_eq!(queue.due_at(), Some(t0 + ms(116)));
    }
}
