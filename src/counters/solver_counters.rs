use crate::counters::Timer;
use crate::math::Real;
use std::fmt::{Display, Formatter, Result};

/// Performance counters related to the constraint resolution of one vehicle update.
#[derive(Default, Clone, Copy, Debug)]
pub struct SolverCounters {
    /// Number of constraint rows generated by every joint.
    pub nrows: usize,
    /// Number of rows solved by the tree factorization.
    pub nprimary_rows: usize,
    /// Number of rows solved by the auxiliary system.
    pub nauxiliary_rows: usize,
    /// Size of the unbounded block of the auxiliary system, solved by Cholesky factorization.
    pub cholesky_block_size: usize,
    /// Number of projected SOR sweeps run on the bounded block.
    pub sor_iterations: usize,
    /// Sum of squared residuals of the unclamped rows after the last SOR sweep.
    pub sor_residual: Real,
    /// Time spent building the constraint rows of every joint.
    pub row_build_time: Timer,
    /// Time spent factorizing the tree mass matrix.
    pub factorization_time: Timer,
    /// Time spent assembling the auxiliary system.
    pub auxiliary_assembly_time: Timer,
    /// Time spent in the Cholesky factorization and the SOR iterations.
    pub lcp_time: Timer,
    /// Time spent writing forces back to bodies and joints.
    pub writeback_time: Timer,
}

impl SolverCounters {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        SolverCounters::default()
    }

    /// Reset all the counters to zero.
    pub fn reset(&mut self) {
        *self = SolverCounters::default();
    }
}

impl Display for SolverCounters {
    fn fmt(&self, f: &mut Formatter) -> Result {
        writeln!(f, "Number of rows: {}", self.nrows)?;
        writeln!(
            f,
            "Primary / auxiliary rows: {} / {}",
            self.nprimary_rows, self.nauxiliary_rows
        )?;
        writeln!(f, "Cholesky block size: {}", self.cholesky_block_size)?;
        writeln!(
            f,
            "SOR iterations: {} (residual {})",
            self.sor_iterations, self.sor_residual
        )?;
        writeln!(f, "Row build time: {}", self.row_build_time)?;
        writeln!(f, "Factorization time: {}", self.factorization_time)?;
        writeln!(
            f,
            "Auxiliary assembly time: {}",
            self.auxiliary_assembly_time
        )?;
        writeln!(f, "LCP time: {}", self.lcp_time)?;
        writeln!(f, "Writeback time: {}", self.writeback_time)
    }
}
