//! The blocked solver of the auxiliary system.
//!
//! The unbounded rows, stored first, are solved exactly with a Cholesky factorization. Their
//! effect is eliminated from the bounded rows, which are then solved by a projected
//! successive-over-relaxation (Gauss-Seidel) iteration.

use crate::dynamics::SolverParameters;
use crate::math::Real;
use crate::utils;
use na::{Cholesky, DMatrix, DVector};

/// What the bounds of an auxiliary row are multiplied by.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum BoundScale {
    /// The bounds are used as-is.
    Unit,
    /// The current force of another auxiliary row.
    Row(usize),
    /// A force known before the solve, e.g. from a primary row.
    Fixed(Real),
}

/// A friction ellipse coupling a (lateral) row with a longitudinal row.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct EllipseFriction {
    pub longitudinal_row: usize,
    pub longitudinal_coefficient: Real,
    pub lateral_coefficient: Real,
}

/// The bounds of one auxiliary row.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct LcpBounds {
    pub low: Real,
    pub high: Real,
    pub scale: BoundScale,
    pub ellipse: Option<EllipseFriction>,
}

/// Statistics of the last solve.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) struct LcpStats {
    pub cholesky_block: usize,
    pub iterations: usize,
    pub residual: Real,
}

/// The auxiliary system `A x = b`, with bounds on its trailing rows.
#[derive(Clone, Debug)]
pub(crate) struct BlockedLcp {
    pub matrix: DMatrix<Real>,
    pub rhs: DVector<Real>,
    /// The initial guess, then the solution.
    pub x: DVector<Real>,
    pub bounds: Vec<LcpBounds>,
    /// The number of leading unbounded rows.
    pub block: usize,
}

impl BlockedLcp {
    pub fn new(n: usize, block: usize) -> Self {
        Self {
            matrix: DMatrix::zeros(n, n),
            rhs: DVector::zeros(n),
            x: DVector::zeros(n),
            bounds: vec![
                LcpBounds {
                    low: 0.0,
                    high: 0.0,
                    scale: BoundScale::Unit,
                    ellipse: None,
                };
                n
            ],
            block,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// The factor the bounds of the row `i` are multiplied by, at the current iterate.
    #[inline]
    pub fn bound_scale(&self, i: usize) -> Real {
        match self.bounds[i].scale {
            BoundScale::Unit => 1.0,
            BoundScale::Row(j) => self.x[j],
            BoundScale::Fixed(val) => val,
        }
    }

    /// The interval the force of the row `i` must lie in, at the current iterate.
    pub fn current_bounds(&self, i: usize) -> [Real; 2] {
        let s = self.bound_scale(i);
        let bounds = &self.bounds[i];
        [bounds.low * s, bounds.high * s]
    }

    /// Solves the system. The matrix and the right-hand side are overwritten.
    pub fn solve(&mut self, params: &SolverParameters) -> LcpStats {
        let n = self.len();
        let mut block = self.block.min(n);
        let mut elimination = None;

        if block > 0 {
            let leading = self.matrix.view((0, 0), (block, block)).clone_owned();

            match Cholesky::new(leading) {
                Some(chol) => {
                    let x0 = chol.solve(&self.rhs.rows(0, block));
                    self.x.rows_mut(0, block).copy_from(&x0);

                    if block < n {
                        let m = n - block;
                        let a10 = self.matrix.view((block, 0), (m, block)).clone_owned();
                        let a01 = self.matrix.view((0, block), (block, m)).clone_owned();
                        // g = -A00⁻¹ A01
                        let g = -chol.solve(&a01);

                        let mut rhs1 = self.rhs.rows_mut(block, m);
                        rhs1 -= &a10 * x0;
                        let mut a11 = self.matrix.view_mut((block, block), (m, m));
                        a11 += &a10 * &g;
                        elimination = Some(g);
                    }
                }
                None => {
                    log::warn!(
                        "the unbounded block ({} rows) of the auxiliary system is not positive-definite, solving it iteratively",
                        block
                    );
                    block = 0;
                }
            }
        }

        let (iterations, residual) = self.solve_sor(block, params);

        if let Some(g) = elimination {
            let x1 = self.x.rows(block, n - block).clone_owned();
            let mut x0 = self.x.rows_mut(0, block);
            x0.gemv(1.0, &g, &x1, 1.0);
        }

        LcpStats {
            cholesky_block: block,
            iterations,
            residual,
        }
    }

    /// Projected SOR on the rows `block..n`, reading the rows `..block` only for bounds.
    fn solve_sor(&mut self, block: usize, params: &SolverParameters) -> (usize, Real) {
        let n = self.len();

        if block == n {
            return (0, 0.0);
        }

        let mut inv_diag = DVector::<Real>::zeros(n);
        for j in block..n {
            let [low, high] = self.current_bounds(j);
            self.x[j] = utils::clamp(self.x[j], low, high);
            inv_diag[j] = utils::inv(self.matrix[(j, j)]);
        }

        let mut tolerance = params.sor_tolerance * 2.0;
        let mut iterations = 0;

        while iterations < params.max_sor_iterations && tolerance > params.sor_tolerance {
            tolerance = 0.0;

            for j in block..n {
                let mut residual = self.rhs[j];
                for k in block..n {
                    residual -= self.matrix[(j, k)] * self.x[k];
                }

                let x = self.x[j];
                let diag = self.matrix[(j, j)];
                let f = x + ((residual + diag * x) * inv_diag[j] - x) * params.sor_factor;

                // Read the scaling row at its current value, updated earlier in this sweep.
                let [low, high] = self.current_bounds(j);
                self.x[j] = if f > high {
                    high
                } else if f < low {
                    low
                } else {
                    tolerance += residual * residual;
                    f
                };

                if let Some(ellipse) = self.bounds[j].ellipse {
                    self.apply_ellipse(j, &ellipse);
                }
            }

            iterations += 1;
            log::trace!("auxiliary SOR sweep {}: residual {}", iterations, tolerance);
        }

        (iterations, tolerance)
    }

    fn apply_ellipse(&mut self, j: usize, ellipse: &EllipseFriction) {
        let normal = self.bound_scale(j);
        let max_longitudinal = ellipse.longitudinal_coefficient * normal;
        let ratio = if max_longitudinal > 0.0 {
            utils::clamp(self.x[ellipse.longitudinal_row] / max_longitudinal, -1.0, 1.0)
        } else {
            1.0
        };
        let max_lateral =
            (ellipse.lateral_coefficient * normal).max(0.0) * (1.0 - ratio * ratio).sqrt();
        self.x[j] = utils::clamp(self.x[j], -max_lateral, max_lateral);
    }
}

#[cfg(test)]
mod test {
    use super::{BlockedLcp, BoundScale, EllipseFriction};
    use crate::dynamics::{SolverParameters, MAX_FRICTION_BOUND};
    use crate::math::Real;
    use approx::assert_relative_eq;
    use na::DMatrix;

    fn random_spd(n: usize, seed: u64) -> DMatrix<Real> {
        let mut rng = oorandom::Rand32::new(seed);
        let a = DMatrix::from_fn(n, n, |_, _| rng.rand_float() as Real - 0.5);
        &a * a.transpose() + DMatrix::identity(n, n) * (n as Real)
    }

    #[test]
    fn unbounded_system_is_solved_exactly() {
        let n = 4;
        let mut lcp = BlockedLcp::new(n, n);
        lcp.matrix = random_spd(n, 3);
        lcp.rhs = na::DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0]);
        let (a, b) = (lcp.matrix.clone(), lcp.rhs.clone());

        let stats = lcp.solve(&SolverParameters::default());
        assert_eq!(stats.cholesky_block, n);
        assert_eq!(stats.iterations, 0);
        assert_relative_eq!(a * &lcp.x, b, epsilon = 1.0e-4);
    }

    #[test]
    fn mixed_system_without_active_bounds_matches_the_exact_solution() {
        let n = 5;
        let mut lcp = BlockedLcp::new(n, 2);
        lcp.matrix = random_spd(n, 11);
        lcp.rhs = na::DVector::from_vec(vec![0.3, -0.2, 0.1, 0.4, -0.3]);
        for bounds in &mut lcp.bounds {
            bounds.low = -MAX_FRICTION_BOUND;
            bounds.high = MAX_FRICTION_BOUND;
        }
        let (a, b) = (lcp.matrix.clone(), lcp.rhs.clone());

        let params = SolverParameters {
            max_sor_iterations: 500,
            sor_tolerance: 1.0e-10,
            ..SolverParameters::default()
        };
        let stats = lcp.solve(&params);
        assert_eq!(stats.cholesky_block, 2);
        assert_relative_eq!(a * &lcp.x, b, epsilon = 1.0e-3);
    }

    #[test]
    fn final_iterate_satisfies_the_bounds() {
        let n = 6;
        let mut lcp = BlockedLcp::new(n, 0);
        lcp.matrix = random_spd(n, 5);
        lcp.rhs = na::DVector::from_vec(vec![10.0, 5.0, -8.0, 1.0, 20.0, -20.0]);

        // A normal row followed by its two friction rows, twice.
        for base in [0, 3] {
            lcp.bounds[base].low = 0.0;
            lcp.bounds[base].high = MAX_FRICTION_BOUND;
            for k in 1..3 {
                lcp.bounds[base + k].low = -0.5;
                lcp.bounds[base + k].high = 0.5;
                lcp.bounds[base + k].scale = BoundScale::Row(base);
            }
            lcp.bounds[base + 2].ellipse = Some(EllipseFriction {
                longitudinal_row: base + 1,
                longitudinal_coefficient: 0.5,
                lateral_coefficient: 0.5,
            });
        }

        lcp.solve(&SolverParameters::default());

        for i in 0..n {
            let [low, high] = lcp.current_bounds(i);
            assert!(lcp.x[i] >= low - 1.0e-6 && lcp.x[i] <= high + 1.0e-6);
        }

        for base in [0, 3] {
            let normal = lcp.x[base];
            let (lon, lat) = (lcp.x[base + 1], lcp.x[base + 2]);
            assert!(lon * lon + lat * lat <= 0.25 * normal * normal + 1.0e-4);
        }
    }

    #[test]
    fn fixed_bound_scale() {
        let mut lcp = BlockedLcp::new(1, 0);
        lcp.matrix[(0, 0)] = 1.0;
        lcp.rhs[0] = 100.0;
        lcp.bounds[0].low = -0.5;
        lcp.bounds[0].high = 0.5;
        lcp.bounds[0].scale = BoundScale::Fixed(10.0);
        lcp.solve(&SolverParameters::default());
        assert_eq!(lcp.x[0], 5.0);
    }
}
