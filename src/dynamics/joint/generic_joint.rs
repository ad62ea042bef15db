use crate::dynamics::joint::RowBuilder;
use crate::math::{Isometry, Point, Real, DIM, SPATIAL_DIM};

bitflags::bitflags! {
    /// A bit mask identifying multiple degrees of freedom of a joint.
    #[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct JointAxesMask: u8 {
        /// The translational degree of freedom along the local X axis of a joint.
        const X = 1 << 0;
        /// The translational degree of freedom along the local Y axis of a joint.
        const Y = 1 << 1;
        /// The translational degree of freedom along the local Z axis of a joint.
        const Z = 1 << 2;
        /// The angular degree of freedom about the local X axis of a joint.
        const ANG_X = 1 << 3;
        /// The angular degree of freedom about the local Y axis of a joint.
        const ANG_Y = 1 << 4;
        /// The angular degree of freedom about the local Z axis of a joint.
        const ANG_Z = 1 << 5;
        /// All the translational degrees of freedom.
        const LIN_AXES = Self::X.bits() | Self::Y.bits() | Self::Z.bits();
        /// All the angular degrees of freedom.
        const ANG_AXES = Self::ANG_X.bits() | Self::ANG_Y.bits() | Self::ANG_Z.bits();
    }
}

/// A joint locking any subset of the six relative degrees of freedom of two bodies.
///
/// Each locked axis produces one unbounded row. Each free axis with a positive entry in
/// `friction` produces one row bounded by `[-friction, friction]`.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GenericJoint {
    /// The joint frame, in the local frame of the first body.
    pub local_frame0: Isometry<Real>,
    /// The joint frame, in the local frame of the second body.
    pub local_frame1: Isometry<Real>,
    /// The locked degrees of freedom, expressed in the joint frame.
    pub locked_axes: JointAxesMask,
    /// Friction force (linear axes) or torque (angular axes) applied on the free axes.
    pub friction: [Real; SPATIAL_DIM],
}

impl GenericJoint {
    /// A joint locking the given axes.
    pub fn new(locked_axes: JointAxesMask) -> Self {
        Self {
            local_frame0: Isometry::identity(),
            local_frame1: Isometry::identity(),
            locked_axes,
            friction: [0.0; SPATIAL_DIM],
        }
    }

    /// A joint locking all the relative motions.
    pub fn fixed() -> Self {
        Self::new(JointAxesMask::all())
    }

    /// Sets the joint frames attached to each body.
    #[must_use]
    pub fn local_frames(mut self, frame0: Isometry<Real>, frame1: Isometry<Real>) -> Self {
        self.local_frame0 = frame0;
        self.local_frame1 = frame1;
        self
    }

    /// Sets the friction of one free axis, given as its index in `[0, 6)` (linear axes first).
    #[must_use]
    pub fn axis_friction(mut self, axis: usize, friction: Real) -> Self {
        if let Some(f) = self.friction.get_mut(axis) {
            *f = friction;
        }
        self
    }

    pub(crate) fn build_rows(&self, builder: &mut RowBuilder) {
        let frame0 = builder.body0.position * self.local_frame0;
        let frame1 = builder.body1.position * self.local_frame1;
        let basis = frame1.rotation.to_rotation_matrix().into_inner();
        let anchor = Point::from(frame0.translation.vector);
        let lin_err = frame0.translation.vector - frame1.translation.vector;
        let ang_err = frame1.rotation * (frame1.rotation.inverse() * frame0.rotation).scaled_axis();

        for i in 0..DIM {
            let dir = basis.column(i).into_owned();
            if self.locked_axes.bits() & (1 << i) != 0 {
                builder.add_linear_row(&anchor, &dir, lin_err.dot(&dir));
            } else if self.friction[i] > 0.0 {
                let row = builder.add_linear_row(&anchor, &dir, 0.0);
                builder
                    .row_mut(row)
                    .set_bounds(-self.friction[i], self.friction[i]);
            }
        }

        for i in 0..DIM {
            let dir = basis.column(i).into_owned();
            if self.locked_axes.bits() & (1 << (i + DIM)) != 0 {
                builder.add_angular_row(&dir, ang_err.dot(&dir));
            } else if self.friction[i + DIM] > 0.0 {
                let row = builder.add_angular_row(&dir, 0.0);
                let friction = self.friction[i + DIM];
                builder.row_mut(row).set_bounds(-friction, friction);
            }
        }
    }
}
