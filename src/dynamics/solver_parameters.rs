use crate::math::{Real, Vector};

/// Parameters of the vehicle solver.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct SolverParameters {
    /// The gravity applied to every dynamic body at each update (default: `[0.0, -9.8, 0.0]`).
    pub gravity: Vector<Real>,

    /// The coefficient in `[0, 1)` applied to the forces of the last update before using them
    /// as the initial guess of the next one (default: `0.9`).
    pub warmstart_coefficient: Real,

    /// Each row is regularized by its own effective inverse mass scaled by this
    /// factor (default: `1.0e-6`).
    pub diag_damp_coefficient: Real,

    /// The fraction of a joint's positional or angular drift corrected at each update
    /// (default: `0.2`).
    pub joint_erp: Real,

    /// The regularizer added to the diagonal of rows built without an explicit one (default: `0.0`).
    ///
    /// Larger values make the constraints softer.
    pub default_regularizer: Real,

    /// The diagonal of the auxiliary system is scaled by `1.0 + aux_diag_damp_coefficient`
    /// (default: `1.0e-4`).
    pub aux_diag_damp_coefficient: Real,

    /// The smallest value allowed on the diagonal of the auxiliary system (default: `1.0e-6`).
    pub aux_min_diag: Real,

    /// The over-relaxation factor of the projected Gauss-Seidel iterations (default: `1.15`).
    pub sor_factor: Real,

    /// The maximum number of projected Gauss-Seidel sweeps over the bounded rows (default: `30`).
    ///
    /// Reaching this cap is not an error: the last iterate is used as the solution.
    pub max_sor_iterations: usize,

    /// The iterations stop once the sum of squared residuals of the unclamped rows falls below
    /// this value (default: `0.01`).
    pub sor_tolerance: Real,

    /// A joint mass matrix with a relative pivot smaller than this is considered singular when a
    /// vehicle is validated (default: `1.0e-5`).
    pub singular_pivot_tolerance: Real,
}

impl SolverParameters {
    /// The inverse of a time-step length, i.e. the steps per seconds (Hz).
    ///
    /// This is zero if `dt` is zero.
    #[inline(always)]
    pub fn inv_dt(dt: Real) -> Real {
        if dt == 0.0 {
            0.0
        } else {
            1.0 / dt
        }
    }
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            gravity: Vector::new(0.0, -9.8, 0.0),
            warmstart_coefficient: 0.9,
            diag_damp_coefficient: 1.0e-6,
            joint_erp: 0.2,
            default_regularizer: 0.0,
            aux_diag_damp_coefficient: 1.0e-4,
            aux_min_diag: 1.0e-6,
            sor_factor: 1.15,
            max_sor_iterations: 30,
            sor_tolerance: 0.01,
            singular_pivot_tolerance: 1.0e-5,
        }
    }
}
