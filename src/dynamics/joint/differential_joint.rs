use crate::dynamics::joint::{Jacobian, JacobianPair, RowBuilder, MAX_FRICTION_BOUND};
use crate::math::{Point, Real, Rotation, UnitVector, Vector};

/// How the two output shafts of a differential are allowed to turn relative to each other.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub enum DifferentialMode {
    /// The outputs turn freely relative to each other.
    #[default]
    Open,
    /// The outputs are coupled by a friction torque up to `max_torque`.
    LimitedSlip {
        /// The largest torque transferred between the outputs.
        max_torque: Real,
    },
    /// Both outputs turn at the same speed.
    Locked,
}

/// The joint between a differential body (first body) and the chassis (second body).
///
/// The differential keeps two rotational degrees of freedom relative to the chassis: the spin
/// about the chassis `spin_axis`, driven by the engine, and the tilt about `spin_axis ×
/// longitudinal_axis`, whose speed is the speed difference between the two outputs. The tilt is
/// what [`DifferentialMode`] locks or brakes.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DifferentialJoint {
    /// The differential center, in the chassis frame.
    pub local_anchor: Point<Real>,
    /// The spin axis of the differential, in the chassis frame.
    pub spin_axis: UnitVector<Real>,
    /// The chassis forward axis, in the chassis frame. Must be orthogonal to `spin_axis`.
    pub longitudinal_axis: UnitVector<Real>,
    /// The coupling between the two outputs.
    pub mode: DifferentialMode,
}

/// The three orthonormal differential axes, in world-space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DifferentialAxes {
    /// The spin axis.
    pub spin: Vector<Real>,
    /// The tilt axis.
    pub tilt: Vector<Real>,
    /// The longitudinal axis.
    pub longitudinal: Vector<Real>,
}

impl DifferentialAxes {
    pub(crate) fn new(
        rotation: &Rotation<Real>,
        spin_axis: &UnitVector<Real>,
        longitudinal_axis: &UnitVector<Real>,
    ) -> Self {
        let spin = rotation * spin_axis.into_inner();
        let longitudinal = rotation * longitudinal_axis.into_inner();
        Self {
            spin,
            tilt: spin.cross(&longitudinal),
            longitudinal,
        }
    }
}

impl DifferentialJoint {
    /// An open differential at `local_anchor`, spinning about `spin_axis` (chassis frame).
    pub fn new(
        local_anchor: Point<Real>,
        spin_axis: UnitVector<Real>,
        longitudinal_axis: UnitVector<Real>,
    ) -> Self {
        Self {
            local_anchor,
            spin_axis,
            longitudinal_axis,
            mode: DifferentialMode::Open,
        }
    }

    /// The world-space axes of this differential for the given chassis rotation.
    pub fn axes(&self, chassis_rotation: &Rotation<Real>) -> DifferentialAxes {
        DifferentialAxes::new(chassis_rotation, &self.spin_axis, &self.longitudinal_axis)
    }

    pub(crate) fn build_rows(&self, builder: &mut RowBuilder) {
        let chassis = builder.body1.position;
        let axes = self.axes(&chassis.rotation);
        let center = builder.body0.world_com();
        let error = center - chassis * self.local_anchor;

        for dir in [axes.spin, axes.tilt, axes.longitudinal] {
            builder.add_linear_row(&center, &dir, error.dot(&dir));
        }

        let diff_spin = builder.body0.position.rotation * self.spin_axis.into_inner();
        let misalignment = axes.spin.cross(&diff_spin);
        builder.add_angular_row(&axes.longitudinal, misalignment.dot(&axes.longitudinal));

        match self.mode {
            DifferentialMode::Open => {}
            DifferentialMode::LimitedSlip { max_torque } => {
                let i = builder.add_angular_row(&axes.tilt, 0.0);
                let max_torque = max_torque.clamp(0.0, MAX_FRICTION_BOUND * 0.5);
                builder.row_mut(i).set_bounds(-max_torque, max_torque);
            }
            DifferentialMode::Locked => {
                builder.add_angular_row(&axes.tilt, 0.0);
            }
        }
    }
}

/// The loop joint coupling the spin of a tire (first body) with a differential output (second
/// body).
///
/// Its single unbounded row enforces `ω_tire · pin = ω_diff · (spin + side · tilt)`.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DifferentialAxleJoint {
    /// The spin axis of the tire, in the tire frame.
    pub tire_axle: UnitVector<Real>,
    /// The spin axis of the differential, in the chassis frame.
    pub spin_axis: UnitVector<Real>,
    /// The chassis forward axis, in the chassis frame.
    pub longitudinal_axis: UnitVector<Real>,
    /// `1.0` for one output of the differential, `-1.0` for the other.
    pub side: Real,
    pub(crate) chassis_rotation: Rotation<Real>,
}

impl DifferentialAxleJoint {
    /// The axle joint of the tire on the given `side` of a differential.
    pub fn new(tire_axle: UnitVector<Real>, differential: &DifferentialJoint, side: Real) -> Self {
        Self {
            tire_axle,
            spin_axis: differential.spin_axis,
            longitudinal_axis: differential.longitudinal_axis,
            side: side.signum(),
            chassis_rotation: Rotation::identity(),
        }
    }

    pub(crate) fn build_rows(&self, builder: &mut RowBuilder) {
        let axes = DifferentialAxes::new(
            &self.chassis_rotation,
            &self.spin_axis,
            &self.longitudinal_axis,
        );
        let pin = builder.body0.position.rotation * self.tire_axle.into_inner();
        let output = axes.spin + axes.tilt * self.side;

        let jacobians = JacobianPair {
            jacobian0: Jacobian::new(Vector::zeros(), pin),
            jacobian1: Jacobian::new(Vector::zeros(), -output),
        };
        builder.add_row(jacobians, 0.0);
    }
}
