//! Running factory statistics

use super::strategy::Strategy;

/// Counters accumulated over every `render` call
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FactoryStats {
    /// Calls to `render`
    pub render_calls: u64,
    /// Records submitted across all calls
    pub total_entities: u64,
    /// Records rendered through the batched strategy
    pub batched_entities: u64,
    /// Records rendered through the instanced strategy
    pub instanced_entities: u64,
    /// Calls whose renderer returned an error
    pub failed_calls: u64,
    /// Duration of the last call
    pub last_render_ms: f64,
    /// Sum of all call durations
    pub total_render_ms: f64,
}

impl FactoryStats {
    /// Account for one call, successful or not
    pub fn record(&mut self, strategy: Strategy, count: usize, elapsed_ms: f64, failed: bool) {
        let count = count as u64;
        self.render_calls += 1;
        self.total_entities += count;
        match strategy {
            Strategy::Batched => self.batched_entities += count,
            Strategy::Instanced => self.instanced_entities += count,
            Strategy::Direct => {}
        }
        if failed {
            self.failed_calls += 1;
        }
        self.last_render_ms = elapsed_ms;
        self.total_render_ms += elapsed_ms;
    }

    /// Mean call duration
    pub fn average_render_ms(&self) -> f64 {
        if self.render_calls == 0 {
            0.0
        } else {
            self.total_render_ms / self.render_calls as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_record_accumulates_by_strategy() {
        let mut stats = FactoryStats::default();
        stats.record(Strategy::Direct, 3, 2.0, false);
        stats.record(Strategy::Instanced, 5, 4.0, false);
        stats.record(Strategy::Batched, 20, 6.0, true);
        assert_eq!(stats.render_calls, 3);
        assert_eq!(stats.total_entities, 28);
        assert_eq!(stats.instanced_entities, 5);
        assert_eq!(stats.batched_entities, 20);
        assert_eq!(stats.failed_calls, 1);
        assert_relative_eq!(stats.last_render_ms, 6.0);
        assert_relative_eq!(stats.average_render_ms(), 4.0);
    }
}
