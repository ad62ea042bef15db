use crate::dynamics::joint::{RowBuilder, MAX_FRICTION_BOUND, MIN_FRICTION_BOUND};
use crate::math::{Isometry, Point, Real, UnitVector, Vector};
use crate::utils::OrthonormalBasis;

/// A velocity motor driving the free axis of a hinge.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HingeMotor {
    /// The target relative angular velocity about the hinge axis.
    pub target_velocity: Real,
    /// The maximum torque the motor can apply.
    pub max_torque: Real,
}

/// A joint allowing only a relative rotation about one axis.
///
/// Produces five unbounded rows (three linear, two angular) and, depending on the current
/// angle, limits, motor and friction, one bounded row about the hinge axis.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HingeJoint {
    /// Where the hinge is attached on the first body, in its local frame.
    pub local_anchor0: Point<Real>,
    /// Where the hinge is attached on the second body, in its local frame.
    pub local_anchor1: Point<Real>,
    /// The hinge axis, in the local frame of the first body.
    pub local_axis0: UnitVector<Real>,
    /// The hinge axis, in the local frame of the second body.
    pub local_axis1: UnitVector<Real>,
    /// The `[min, max]` allowed angles, if any.
    pub limits: Option<[Real; 2]>,
    /// A motor driving the hinge, if any. Ignored while a limit is reached.
    pub motor: Option<HingeMotor>,
    /// The dry friction torque about the axis. Ignored when a motor or limit is active.
    pub friction_torque: Real,
}

impl HingeJoint {
    /// A hinge at the given local anchors, rotating about the given local axes.
    pub fn new(
        local_anchor0: Point<Real>,
        local_anchor1: Point<Real>,
        local_axis0: UnitVector<Real>,
        local_axis1: UnitVector<Real>,
    ) -> Self {
        Self {
            local_anchor0,
            local_anchor1,
            local_axis0,
            local_axis1,
            limits: None,
            motor: None,
            friction_torque: 0.0,
        }
    }

    /// Sets the angular limits of this hinge.
    #[must_use]
    pub fn limits(mut self, limits: [Real; 2]) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Sets the motor of this hinge.
    #[must_use]
    pub fn motor(mut self, target_velocity: Real, max_torque: Real) -> Self {
        self.motor = Some(HingeMotor {
            target_velocity,
            max_torque,
        });
        self
    }

    /// Sets the friction torque of this hinge.
    #[must_use]
    pub fn friction_torque(mut self, friction_torque: Real) -> Self {
        self.friction_torque = friction_torque;
        self
    }

    /// The rotation angle of the first body relative to the second one about the hinge axis.
    ///
    /// The angle is zero when the reference directions orthogonal to both local axes coincide.
    pub fn angle(&self, pos0: &Isometry<Real>, pos1: &Isometry<Real>) -> Real {
        let axis1 = pos1 * self.local_axis1;
        let ref0 = pos0 * self.local_axis0.into_inner().orthonormal_basis()[0];
        let ref1 = pos1 * self.local_axis1.into_inner().orthonormal_basis()[0];
        axis1.dot(&ref1.cross(&ref0)).atan2(ref1.dot(&ref0))
    }

    pub(crate) fn build_rows(&self, builder: &mut RowBuilder) {
        let pos0 = builder.body0.position;
        let pos1 = builder.body1.position;
        let anchor0 = pos0 * self.local_anchor0;
        let anchor1 = pos1 * self.local_anchor1;
        let axis0 = (pos0 * self.local_axis0).into_inner();
        let axis1 = (pos1 * self.local_axis1).into_inner();

        let lin_err = anchor0 - anchor1;
        for dir in [Vector::x(), Vector::y(), Vector::z()] {
            builder.add_linear_row(&anchor0, &dir, lin_err.dot(&dir));
        }

        let misalignment = axis1.cross(&axis0);
        for dir in axis1.orthonormal_basis() {
            builder.add_angular_row(&dir, misalignment.dot(&dir));
        }

        let angle = self.angle(&pos0, &pos1);

        if let Some([min, max]) = self.limits {
            if angle <= min {
                let i = builder.add_angular_row(&axis0, angle - min);
                builder.row_mut(i).set_bounds(0.0, MAX_FRICTION_BOUND);
                return;
            } else if angle >= max {
                let i = builder.add_angular_row(&axis0, angle - max);
                builder.row_mut(i).set_bounds(MIN_FRICTION_BOUND, 0.0);
                return;
            }
        }

        if let Some(motor) = self.motor {
            let i = builder.add_angular_row(&axis0, 0.0);
            let rel_vel = builder.relative_velocity(i);
            let inv_dt = builder.inv_dt;
            let row = builder.row_mut(i);
            row.coordinate_accel = (motor.target_velocity - rel_vel) * inv_dt;
            row.set_bounds(-motor.max_torque, motor.max_torque);
        } else if self.friction_torque > 0.0 {
            let i = builder.add_angular_row(&axis0, 0.0);
            builder
                .row_mut(i)
                .set_bounds(-self.friction_torque, self.friction_torque);
        }
    }
}
