//! Simulation clock with play/pause/rate control and tick notifications

/// Tick listener receiving the new simulation time in seconds
pub type TickListener = Box<dyn FnMut(f64)>;

/// Simulation clock driven by real elapsed time
pub struct SimulationClock {
    current: f64,
    rate: f64,
    playing: bool,
    listeners: Vec<TickListener>,
}

impl SimulationClock {
    /// Create a paused clock at `start` seconds
    pub fn new(start: f64) -> Self {
        Self {
            current: start,
            rate: 1.0,
            playing: false,
            listeners: Vec::new(),
        }
    }

    /// Current simulation time in seconds
    pub const fn current_time(&self) -> f64 {
        self.current
    }

    /// Jump to a time
    pub fn set_time(&mut self, time: f64) {
        self.current = time;
        self.notify();
    }

    /// Start advancing
    pub fn play(&mut self) {
        self.playing = true;
    }

    /// Stop advancing
    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Whether the clock advances on `advance`
    pub const fn is_playing(&self) -> bool {
        self.playing
    }

    /// Simulation seconds per real second
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Change the playback rate
    pub fn set_rate(&mut self, rate: f64) {
        if rate.is_finite() {
            self.rate = rate;
        } else {
            log::warn!("Ignoring non-finite clock rate {}", rate);
        }
    }

    /// Register a tick listener
    pub fn on_tick(&mut self, listener: TickListener) {
        self.listeners.push(listener);
    }

    /// Advance by `real_dt` seconds; returns the new time
    pub fn advance(&mut self, real_dt: f64) -> f64 {
        if self.playing && real_dt > 0.0 {
            self.current += real_dt * self.rate;
            self.notify();
        }
        self.current
    }

    fn notify(&mut self) {
        let time = self.current;
        for listener in &mut self.listeners {
            listener(time);
        }
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_paused_clock_does_not_advance() {
        let mut clock = SimulationClock::new(10.0);
        assert!((clock.advance(1.0) - 10.0).abs() < f64::EPSILON);
        clock.play();
        clock.set_rate(2.0);
        assert!((clock.advance(1.5) - 13.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tick_listeners_receive_time() {
        let seen = Rc::new(Cell::new(0.0));
        let sink = Rc::clone(&seen);
        let mut clock = SimulationClock::new(0.0);
        clock.on_tick(Box::new(move |t| sink.set(t)));
        clock.play();
        clock.advance(0.25);
        assert!((seen.get() - 0.25).abs() < f64::EPSILON);
    }
}
