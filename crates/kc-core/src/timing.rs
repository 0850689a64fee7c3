//! Per-loop cycle statistics.
//!
//! A control loop records how long each cycle's work took and whether the
//! cycle overran its update interval. The numbers feed the end-of-run
//! summary and the overrun warnings.

use crate::numeric::Real;

/// Accumulated timing for one control loop.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CycleStats {
    cycles: u64,
    overruns: u64,
    total_work_s: Real,
    max_work_s: Real,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycles: 0,
            overruns: 0,
            total_work_s: 0.0,
            max_work_s: 0.0,
        }
    }

    /// Record one completed cycle.
    pub fn record(&mut self, work_s: Real, overran: bool) {
        let work_s = work_s.max(0.0);
        self.cycles += 1;
        self.total_work_s += work_s;
        self.max_work_s = self.max_work_s.max(work_s);
        if overran {
            self.overruns += 1;
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn max_work_seconds(&self) -> Real {
        self.max_work_s
    }

    pub fn total_work_seconds(&self) -> Real {
        self.total_work_s
    }

    /// Average work time per cycle (in seconds).
    pub fn average_work_seconds(&self) -> Real {
        if self.cycles > 0 {
            self.total_work_s / self.cycles as Real
        } else {
            0.0
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_average_is_zero() {
        let stats = CycleStats::new();
        assert_eq!(stats.cycles(), 0);
        assert_eq!(stats.average_work_seconds(), 0.0);
    }

    #[test]
    fn records_work_and_overruns() {
        let mut stats = CycleStats::new();
        stats.record(0.5, false);
        stats.record(1.5, true);
        stats.record(-1.0, false);

        assert_eq!(stats.cycles(), 3);
        assert_eq!(stats.overruns(), 1);
        assert_eq!(stats.max_work_seconds(), 1.5);
        assert!((stats.average_work_seconds() - 2.0 / 3.0).abs() < 1e-12);

        stats.reset();
        assert_eq!(stats, CycleStats::new());
    }
}
