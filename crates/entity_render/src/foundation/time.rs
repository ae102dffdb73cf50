//! Time management utilities
//!
//! Timestamps handed to renderers come from the host's frame callback as
//! milliseconds. The gates in this module only compare those timestamps, so
//! they are deterministic under test.

use std::time::{Duration, Instant};

/// Simple stopwatch for measuring elapsed wall-clock time
pub struct Stopwatch {
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    /// Create a new stopped stopwatch
    pub const fn new() -> Self {
        Self {
            start_time: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a new stopwatch and start it immediately
    pub fn start_new() -> Self {
        let mut stopwatch = Self::new();
        stopwatch.start();
        stopwatch
    }

    /// Start the stopwatch
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Stop the stopwatch and accumulate elapsed time
    pub fn stop(&mut self) {
        if let Some(start) = self.start_time.take() {
            self.elapsed += start.elapsed();
        }
    }

    /// Get the elapsed time
    pub fn elapsed(&self) -> Duration {
        let running = self.start_time.map_or(Duration::ZERO, |start| start.elapsed());
        self.elapsed + running
    }

    /// Get the elapsed time in milliseconds
    pub fn elapsed_millis(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// Check if the stopwatch is currently running
    pub const fn is_running(&self) -> bool {
        self.start_time.is_some()
    }
}

/// Throttle that lets an action through at most once per interval
#[derive(Debug, Clone)]
pub struct IntervalGate {
    interval_ms: f64,
    last: Option<f64>,
}

impl IntervalGate {
    /// Create a gate; the first call always passes
    pub const fn new(interval_ms: f64) -> Self {
        Self { interval_ms, last: None }
    }

    /// Configured interval
    pub const fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    /// Whether the interval has elapsed, without consuming it
    pub fn ready(&self, now_ms: f64) -> bool {
        self.last.map_or(true, |last| now_ms - last >= self.interval_ms)
    }

    /// Record a pass at `now_ms`
    pub fn mark(&mut self, now_ms: f64) {
        self.last = Some(now_ms);
    }

    /// Pass if ready, recording the pass
    pub fn try_pass(&mut self, now_ms: f64) -> bool {
        if self.ready(now_ms) {
            self.mark(now_ms);
            true
        } else {
            false
        }
    }

    /// Forget the last pass
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Debouncer: fires once `delay_ms` after the most recent trigger
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay_ms: f64,
    deadline: Option<f64>,
}

impl Debouncer {
    /// Create an idle debouncer
    pub const fn new(delay_ms: f64) -> Self {
        Self { delay_ms, deadline: None }
    }

    /// Push the deadline out to `now_ms + delay`
    pub fn trigger(&mut self, now_ms: f64) {
        self.deadline = Some(now_ms + self.delay_ms);
    }

    /// Whether a trigger is pending and its deadline has passed
    pub fn is_due(&self, now_ms: f64) -> bool {
        self.deadline.is_some_and(|deadline| now_ms >= deadline)
    }

    /// Whether a trigger is waiting
    pub const fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Drop any pending trigger
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// Fixed time step accumulator for physics integration
#[derive(Debug, Clone)]
pub struct FixedStepper {
    step: f64,
    accumulator: f64,
    max_steps: usize,
}

impl FixedStepper {
    /// Create a stepper with step length in seconds
    pub const fn new(step: f64, max_steps: usize) -> Self {
        Self {
            step,
            accumulator: 0.0,
            max_steps,
        }
    }

    /// Step length in seconds
    pub const fn step(&self) -> f64 {
        self.step
    }

    /// Feed `dt` seconds, returning how many whole steps to integrate
    ///
    /// Time beyond `max_steps` worth of steps is dropped so a long stall
    /// cannot cause a burst of catch-up work.
    pub fn advance(&mut self, dt: f64) -> usize {
        if self.step <= 0.0 || !dt.is_finite() || dt <= 0.0 {
            return 0;
        }
        self.accumulator += dt;
        // Tolerance keeps 0.5 / (1/60) from landing one step short
        let steps = ((self.accumulator + 1e-9) / self.step).floor() as usize;
        self.accumulator = (self.accumulator - steps as f64 * self.step).max(0.0);
        if steps > self.max_steps {
            self.accumulator = 0.0;
            return self.max_steps;
        }
        steps
    }

    /// Drop accumulated time
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}
