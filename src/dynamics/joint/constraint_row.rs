use crate::math::{Real, SpatialVector, Vector};

/// The bound value standing for infinity.
///
/// A row whose `low` and `high` bounds are both at (or beyond) this value is unbounded: it
/// removes a true kinematic degree of freedom and is solved by the tree factorization. Any finite
/// bound below the sentinel, however large, makes the row a bounded one.
pub const MAX_FRICTION_BOUND: Real = 1.0e15;
/// The lower counterpart of [`MAX_FRICTION_BOUND`].
pub const MIN_FRICTION_BOUND: Real = -MAX_FRICTION_BOUND;

/// One half of a constraint Jacobian: the part acting on a single body.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Jacobian {
    /// Linear part, dotted with the linear velocity and mapped to a force.
    pub linear: Vector<Real>,
    /// Angular part, dotted with the angular velocity and mapped to a torque.
    pub angular: Vector<Real>,
}

impl Default for Jacobian {
    fn default() -> Self {
        Self::zeros()
    }
}

impl Jacobian {
    /// A Jacobian with only zero entries.
    pub fn zeros() -> Self {
        Self {
            linear: Vector::zeros(),
            angular: Vector::zeros(),
        }
    }

    /// Creates a Jacobian from its linear and angular parts.
    pub fn new(linear: Vector<Real>, angular: Vector<Real>) -> Self {
        Self { linear, angular }
    }

    /// This Jacobian as a spatial vector (linear part first).
    #[inline]
    pub fn as_spatial(&self) -> SpatialVector<Real> {
        SpatialVector::new(
            self.linear.x,
            self.linear.y,
            self.linear.z,
            self.angular.x,
            self.angular.y,
            self.angular.z,
        )
    }

    /// The dot product of this Jacobian with a pair of linear and angular vectors.
    #[inline]
    pub fn dot(&self, linear: &Vector<Real>, angular: &Vector<Real>) -> Real {
        self.linear.dot(linear) + self.angular.dot(angular)
    }

    /// The dot product of two Jacobians.
    #[inline]
    pub fn dot_jacobian(&self, other: &Jacobian) -> Real {
        self.linear.dot(&other.linear) + self.angular.dot(&other.angular)
    }

    /// Multiplies every entry of this Jacobian by `s`.
    #[inline]
    pub fn scaled(&self, s: Real) -> Self {
        Self::new(self.linear * s, self.angular * s)
    }
}

/// The Jacobians of a row with respect to the two bodies it connects.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct JacobianPair {
    /// The Jacobian of the first body (the child for tree joints).
    pub jacobian0: Jacobian,
    /// The Jacobian of the second body (the parent for tree joints).
    pub jacobian1: Jacobian,
}

/// A friction policy applied to a row after each of its projected Gauss-Seidel updates.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FrictionCallback {
    /// Combines this (lateral) row with a longitudinal row of the same joint into a friction
    /// ellipse: `(f_lat / (μ_lat N))² + (f_lon / (μ_lon N))² <= 1`, where `N` is the force of the
    /// row referenced by `normal_row` of this row.
    Ellipse {
        /// Index, within the same joint, of the longitudinal friction row.
        longitudinal_row: usize,
        /// The longitudinal friction coefficient `μ_lon`.
        longitudinal_coefficient: Real,
        /// The lateral friction coefficient `μ_lat`.
        lateral_coefficient: Real,
    },
}

/// One scalar constraint produced by a joint.
///
/// The solver enforces `J0·a0 + J1·a1 = coordinate_accel` in the unbounded case, and applies the
/// force `J0ᵀ f` to the first body and `J1ᵀ f` to the second one.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ConstraintRow {
    /// The Jacobians of this row.
    pub jacobians: JacobianPair,
    /// The relative acceleration this row must produce along its Jacobian.
    pub coordinate_accel: Real,
    /// Lower bound of the row force. Multiplied by the force of `normal_row` if it is set.
    pub low: Real,
    /// Upper bound of the row force. Multiplied by the force of `normal_row` if it is set.
    pub high: Real,
    /// Index, within the same joint, of the row whose force scales `low` and `high`.
    pub normal_row: Option<usize>,
    /// Regularization added to the diagonal of this row (softness).
    pub regularizer: Real,
    /// Optional friction policy applied during the iterative solve.
    pub friction_callback: Option<FrictionCallback>,
    pub(crate) diag_damp: Real,
    pub(crate) force: Real,
}

impl Default for ConstraintRow {
    fn default() -> Self {
        Self {
            jacobians: JacobianPair::default(),
            coordinate_accel: 0.0,
            low: MIN_FRICTION_BOUND,
            high: MAX_FRICTION_BOUND,
            normal_row: None,
            regularizer: 0.0,
            friction_callback: None,
            diag_damp: 0.0,
            force: 0.0,
        }
    }
}

impl ConstraintRow {
    /// Is this row unbounded in both directions?
    ///
    /// Unbounded rows of tree joints are the primary rows solved by the tree factorization.
    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.low <= MIN_FRICTION_BOUND && self.high >= MAX_FRICTION_BOUND
    }

    /// Sets the `[low, high]` bounds of this row.
    pub fn set_bounds(&mut self, low: Real, high: Real) {
        self.low = low;
        self.high = high;
    }

    /// The force solved for this row.
    pub fn force(&self) -> Real {
        self.force
    }

    /// The relative acceleration along this row produced by the given body velocities or
    /// accelerations.
    #[inline]
    pub fn relative(
        &self,
        linear0: &Vector<Real>,
        angular0: &Vector<Real>,
        linear1: &Vector<Real>,
        angular1: &Vector<Real>,
    ) -> Real {
        self.jacobians.jacobian0.dot(linear0, angular0)
            + self.jacobians.jacobian1.dot(linear1, angular1)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_sentinel_bounds_are_unbounded() {
        let mut row = ConstraintRow::default();
        assert!(row.is_unbounded());

        row.set_bounds(Real::NEG_INFINITY, Real::INFINITY);
        assert!(row.is_unbounded());

        row.set_bounds(-0.6 * MAX_FRICTION_BOUND, 0.6 * MAX_FRICTION_BOUND);
        assert!(!row.is_unbounded());

        row.set_bounds(MIN_FRICTION_BOUND, 0.999 * MAX_FRICTION_BOUND);
        assert!(!row.is_unbounded());

        row.set_bounds(0.0, MAX_FRICTION_BOUND);
        assert!(!row.is_unbounded());

        row.set_bounds(-10.0, 10.0);
        assert!(!row.is_unbounded());
    }

    #[test]
    fn spatial_layout_is_linear_then_angular() {
        let jac = Jacobian::new(Vector::new(1.0, 2.0, 3.0), Vector::new(4.0, 5.0, 6.0));
        let spatial = jac.as_spatial();
        assert_eq!(spatial.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(jac.dot_jacobian(&jac), spatial.norm_squared());
    }
}
