//! Time utilities for the world simulation

use std::time::{Duration, Instant};

/// Reference tick rate of the world loop
pub const DEFAULT_TICK_RATE: u32 = 20;

/// Upper bound for a single tick's integration step (milliseconds)
pub const DEFAULT_MAX_TICK_DT_MS: u64 = 250;

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Length of one tick at the given rate
pub fn tick_interval(tick_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / tick_rate.max(1) as u64)
}

/// Convert the real time elapsed since the previous tick into an
/// integration step, clamped so a stall can't launch entities across the map.
pub fn clamp_dt(elapsed: Duration, max_dt: Duration) -> f32 {
    elapsed.min(max_dt).as_secs_f32()
}

/// How long to sleep before the next tick may start.
/// Zero when the tick already overran its budget.
pub fn remaining_budget(interval: Duration, spent: Duration) -> Duration {
    interval.saturating_sub(spent)
}

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Restart the timer, returning the time elapsed before the restart
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.start);
        self.start = now;
        elapsed
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_interval_at_reference_rate_is_50ms() {
        assert_eq!(tick_interval(DEFAULT_TICK_RATE), Duration::from_millis(50));
    }

    #[test]
    fn zero_tick_rate_does_not_divide_by_zero() {
        assert_eq!(tick_interval(0), Duration::from_secs(1));
    }

    #[test]
    fn dt_is_clamped_after_a_stall() {
        let max = Duration::from_millis(DEFAULT_MAX_TICK_DT_MS);
        assert_eq!(clamp_dt(Duration::from_secs(3), max), 0.25);
        assert_eq!(clamp_dt(Duration::from_millis(50), max), 0.05);
    }

    #[test]
    fn overrun_tick_never_sleeps() {
        let interval = Duration::from_millis(50);
        assert_eq!(
            remaining_budget(interval, Duration::from_millis(80)),
            Duration::ZERO
        );
        assert_eq!(
            remaining_budget(interval, Duration::from_millis(20)),
            Duration::from_millis(30)
        );
    }

    #[test]
    fn lap_restarts_the_timer() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(5));
        let first = timer.lap();
        assert!(first >= Duration::from_millis(5));
        assert!(timer.elapsed() < first);
    }
}
