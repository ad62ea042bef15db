//! Counters for profiling the stages of a vehicle update.

use std::fmt::{Display, Formatter, Result};

pub use self::solver_counters::SolverCounters;
pub use self::timer::Timer;

mod solver_counters;
mod timer;

/// Aggregation of all the performance counters tracked by a vehicle.
#[derive(Clone, Copy, Debug)]
pub struct Counters {
    /// Whether these counters are enabled or not.
    pub enabled: bool,
    /// Timer for a whole vehicle update.
    pub step_time: Timer,
    /// Counters of the constraint resolution.
    pub solver: SolverCounters,
}

impl Default for Counters {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Counters {
    /// Create a new set of counters initialized to zero.
    pub fn new(enabled: bool) -> Self {
        Counters {
            enabled,
            step_time: Timer::new(),
            solver: SolverCounters::new(),
        }
    }

    /// Enable all the counters.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Return `true` if the counters are enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Disable all the counters.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Notify that a vehicle update has started.
    pub fn step_started(&mut self) {
        if self.enabled {
            self.step_time.start();
        }
    }

    /// Notify that a vehicle update has finished.
    pub fn step_completed(&mut self) {
        if self.enabled {
            self.step_time.pause();
        }
    }

    /// Total time spent by the last vehicle update, in milliseconds.
    pub fn step_time(&self) -> f64 {
        self.step_time.time()
    }

    /// Resets all the counters and timers.
    pub fn reset(&mut self) {
        if self.enabled {
            self.step_time.reset();
            self.solver.reset();
        }
    }
}

macro_rules! measure_method {
    ($started:ident, $stopped:ident, $time:ident, $info:ident. $timer:ident) => {
        impl Counters {
            /// Start this timer.
            pub fn $started(&mut self) {
                if self.enabled {
                    self.$info.$timer.start()
                }
            }

            /// Stop this timer.
            pub fn $stopped(&mut self) {
                if self.enabled {
                    self.$info.$timer.pause()
                }
            }

            /// Gets the time elapsed for this timer.
            pub fn $time(&self) -> f64 {
                if self.enabled {
                    self.$info.$timer.time()
                } else {
                    0.0
                }
            }
        }
    };
}

measure_method!(
    row_build_started,
    row_build_completed,
    row_build_time,
    solver.row_build_time
);
measure_method!(
    factorization_started,
    factorization_completed,
    factorization_time,
    solver.factorization_time
);
measure_method!(
    auxiliary_assembly_started,
    auxiliary_assembly_completed,
    auxiliary_assembly_time,
    solver.auxiliary_assembly_time
);
measure_method!(lcp_started, lcp_completed, lcp_time, solver.lcp_time);
measure_method!(
    writeback_started,
    writeback_completed,
    writeback_time,
    solver.writeback_time
);

impl Display for Counters {
    fn fmt(&self, f: &mut Formatter) -> Result {
        writeln!(f, "Total timestep time: {}", self.step_time)?;
        self.solver.fmt(f)
    }
}
