use crate::dynamics::joint::{ConstraintRow, Jacobian, JacobianPair};
use crate::dynamics::{RigidBodyState, SolverParameters};
use crate::math::{Matrix, Point, Real, Vector, MAX_JOINT_ROWS};
use arrayvec::ArrayVec;

/// The context handed to a joint when it builds its constraint rows for one update.
///
/// Rows are appended with [`RowBuilder::add_linear_row`], [`RowBuilder::add_angular_row`] or
/// [`RowBuilder::add_row`], which return the row index; the row can then be tweaked (bounds,
/// bias, regularizer) through [`RowBuilder::row_mut`]. Every added row is unbounded and its bias
/// cancels the current relative velocity, plus a fraction of the given drift error.
pub struct RowBuilder<'a> {
    /// The timestep length.
    pub dt: Real,
    /// The inverse of the timestep length.
    pub inv_dt: Real,
    /// The first body: the child node for tree joints.
    pub body0: &'a RigidBodyState,
    /// The second body: the parent node for tree joints.
    pub body1: &'a RigidBodyState,
    com0: Point<Real>,
    com1: Point<Real>,
    inv_inertia0: Matrix<Real>,
    inv_inertia1: Matrix<Real>,
    erp: Real,
    default_regularizer: Real,
    rows: ArrayVec<ConstraintRow, MAX_JOINT_ROWS>,
    // Receives the modifications of rows added beyond the capacity, which are discarded.
    overflow: ConstraintRow,
    overflowed: bool,
}

impl<'a> RowBuilder<'a> {
    /// Creates an empty row builder for a joint between `body0` and `body1`.
    pub fn new(
        dt: Real,
        params: &SolverParameters,
        body0: &'a RigidBodyState,
        body1: &'a RigidBodyState,
    ) -> Self {
        Self {
            dt,
            inv_dt: SolverParameters::inv_dt(dt),
            body0,
            body1,
            com0: body0.world_com(),
            com1: body1.world_com(),
            inv_inertia0: body0.world_inv_inertia(),
            inv_inertia1: body1.world_inv_inertia(),
            erp: params.joint_erp,
            default_regularizer: params.default_regularizer,
            rows: ArrayVec::new(),
            overflow: ConstraintRow::default(),
            overflowed: false,
        }
    }

    /// The number of rows added so far.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if no row was added yet.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The rows added so far.
    pub fn rows(&self) -> &[ConstraintRow] {
        &self.rows
    }

    /// Did the joint try to add more than [`MAX_JOINT_ROWS`] rows?
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Adds a row with the given Jacobians.
    ///
    /// `error` is the current violation of the constraint: the solver targets a relative
    /// velocity that corrects a fraction of it at the next step.
    pub fn add_row(&mut self, jacobians: JacobianPair, error: Real) -> usize {
        let rel_vel = jacobians
            .jacobian0
            .dot(&self.body0.linvel, &self.body0.angvel)
            + jacobians
                .jacobian1
                .dot(&self.body1.linvel, &self.body1.angvel);

        let row = ConstraintRow {
            jacobians,
            coordinate_accel: -(rel_vel + error * self.erp * self.inv_dt) * self.inv_dt,
            regularizer: self.default_regularizer,
            ..ConstraintRow::default()
        };

        if self.rows.try_push(row).is_err() {
            self.overflowed = true;
            return MAX_JOINT_ROWS;
        }

        self.rows.len() - 1
    }

    /// Adds a row constraining the relative linear motion of the two bodies along `dir`, at the
    /// world-space `point`.
    ///
    /// `error` is the current signed distance between the two attachment points along `dir`
    /// (first body minus second body).
    pub fn add_linear_row(&mut self, point: &Point<Real>, dir: &Vector<Real>, error: Real) -> usize {
        let r0 = point - self.com0;
        let r1 = point - self.com1;
        let jacobians = JacobianPair {
            jacobian0: Jacobian::new(*dir, r0.cross(dir)),
            jacobian1: Jacobian::new(-dir, -r1.cross(dir)),
        };
        self.add_row(jacobians, error)
    }

    /// Adds a row constraining the relative rotation of the two bodies about `dir`.
    ///
    /// `error` is the current relative angle about `dir` (first body relative to the second).
    pub fn add_angular_row(&mut self, dir: &Vector<Real>, error: Real) -> usize {
        let jacobians = JacobianPair {
            jacobian0: Jacobian::new(Vector::zeros(), *dir),
            jacobian1: Jacobian::new(Vector::zeros(), -dir),
        };
        self.add_row(jacobians, error)
    }

    /// Mutable access to a row previously added.
    ///
    /// Indices returned for rows that did not fit map to a scratch row that is discarded.
    pub fn row_mut(&mut self, i: usize) -> &mut ConstraintRow {
        match self.rows.get_mut(i) {
            Some(row) => row,
            None => &mut self.overflow,
        }
    }

    /// The relative velocity of the two bodies along the given row.
    pub fn relative_velocity(&self, i: usize) -> Real {
        self.rows.get(i).map_or(0.0, |row| {
            row.relative(
                &self.body0.linvel,
                &self.body0.angvel,
                &self.body1.linvel,
                &self.body1.angvel,
            )
        })
    }

    /// The effective inverse mass `J M⁻¹ Jᵀ` of the given row, through both bodies.
    pub fn effective_inv_mass(&self, i: usize) -> Real {
        self.rows.get(i).map_or(0.0, |row| {
            effective_inv_mass(
                &row.jacobians,
                self.body0.inv_mass(),
                &self.inv_inertia0,
                self.body1.inv_mass(),
                &self.inv_inertia1,
            )
        })
    }

    pub(crate) fn into_rows(self) -> ArrayVec<ConstraintRow, MAX_JOINT_ROWS> {
        self.rows
    }
}

/// Computes `J0 M0⁻¹ J0ᵀ + J1 M1⁻¹ J1ᵀ`.
pub(crate) fn effective_inv_mass(
    jacobians: &JacobianPair,
    inv_mass0: Real,
    inv_inertia0: &Matrix<Real>,
    inv_mass1: Real,
    inv_inertia1: &Matrix<Real>,
) -> Real {
    let j0 = &jacobians.jacobian0;
    let j1 = &jacobians.jacobian1;
    j0.linear.norm_squared() * inv_mass0
        + j0.angular.dot(&(inv_inertia0 * j0.angular))
        + j1.linear.norm_squared() * inv_mass1
        + j1.angular.dot(&(inv_inertia1 * j1.angular))
}

#[cfg(test)]
mod test {
    use super::RowBuilder;
    use crate::dynamics::{RigidBodyState, SolverParameters};
    use crate::math::{Point, Real, Vector, MAX_JOINT_ROWS};
    use approx::assert_relative_eq;

    #[test]
    fn linear_row_jacobians_and_bias() {
        let body0 = RigidBodyState::dynamic(2.0, Vector::repeat(1.0))
            .with_translation(Vector::new(1.0, 0.0, 0.0))
            .with_velocity(Vector::new(0.0, 3.0, 0.0), Vector::zeros());
        let body1 = RigidBodyState::fixed();
        let params = SolverParameters::default();
        let dt: Real = 1.0 / 60.0;

        let mut builder = RowBuilder::new(dt, &params, &body0, &body1);
        let i = builder.add_linear_row(&Point::origin(), &Vector::y(), 0.0);
        let row = builder.rows()[i];

        assert_eq!(row.jacobians.jacobian0.linear, Vector::y());
        // (p - com0) x d = (-1, 0, 0) x (0, 1, 0)
        assert_relative_eq!(row.jacobians.jacobian0.angular, -Vector::z());
        assert_eq!(row.jacobians.jacobian1.linear, -Vector::y());
        assert_relative_eq!(row.coordinate_accel, -3.0 * 60.0, epsilon = 1.0e-2);
        assert!(row.is_unbounded());

        // 1/m + (r x d)·I⁻¹(r x d)
        assert_relative_eq!(builder.effective_inv_mass(i), 1.5, epsilon = 1.0e-5);
    }

    #[test]
    fn angular_row_corrects_drift() {
        let body0 = RigidBodyState::dynamic(1.0, Vector::repeat(1.0));
        let body1 = RigidBodyState::dynamic(1.0, Vector::repeat(1.0));
        let params = SolverParameters::default();
        let mut builder = RowBuilder::new(0.5, &params, &body0, &body1);
        let i = builder.add_angular_row(&Vector::z(), 0.1);
        let row = builder.rows()[i];

        assert_relative_eq!(
            row.coordinate_accel,
            -0.1 * params.joint_erp * 2.0 * 2.0,
            epsilon = 1.0e-6
        );
        assert_relative_eq!(builder.effective_inv_mass(i), 2.0, epsilon = 1.0e-6);
    }

    #[test]
    fn extra_rows_are_discarded() {
        let body = RigidBodyState::dynamic(1.0, Vector::repeat(1.0));
        let fixed = RigidBodyState::fixed();
        let params = SolverParameters::default();
        let mut builder = RowBuilder::new(0.1, &params, &body, &fixed);

        for _ in 0..MAX_JOINT_ROWS {
            let _ = builder.add_angular_row(&Vector::x(), 0.0);
        }
        assert!(!builder.overflowed());

        let extra = builder.add_angular_row(&Vector::x(), 0.0);
        builder.row_mut(extra).low = 0.0;
        assert!(builder.overflowed());
        assert_eq!(builder.len(), MAX_JOINT_ROWS);
        assert!(builder.rows().iter().all(|row| row.is_unbounded()));
    }
}
