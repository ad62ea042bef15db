use crate::dynamics::joint::RowBuilder;
use crate::dynamics::RigidBodyState;
use crate::math::{Point, Real, Rotation, UnitVector, Vector};

/// Multiplies the tire spin inertia to get the minimum rolling resistance torque.
pub const FREE_ROLLING_TORQUE_COEFF: Real = 0.5;
/// Multiplies the tire load to get the load-dependent rolling resistance torque.
pub const LOAD_ROLLING_TORQUE_COEFF: Real = 0.01;

/// The acceleration of an implicit spring-damper after one step of length `dt`.
///
/// `ks` and `kd` are the stiffness and damping, already divided by the effective mass, `x` the
/// elongation and `v` the elongation speed.
pub fn spring_damper_acceleration(dt: Real, ks: Real, x: Real, kd: Real, v: Real) -> Real {
    let ksd = dt * ks;
    let num = ks * x + kd * v + ksd * v;
    let den = 1.0 + dt * kd + dt * ksd;
    -num / den
}

/// The state of a suspension along its axis.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct SuspensionState {
    /// The compression of the suspension: zero at full extension, `suspension_length` when fully
    /// compressed.
    pub position: Real,
    /// The compression speed.
    pub speed: Real,
}

/// The directions of a tire frame, in world-space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TireFrame {
    /// The axle (spin) axis, after steering.
    pub pin: Vector<Real>,
    /// The rolling direction, after steering.
    pub longitudinal: Vector<Real>,
    /// The suspension compression direction.
    pub suspension: Vector<Real>,
    /// The tire center at full suspension extension.
    pub hardpoint: Point<Real>,
}

/// The joint between a tire (first body) and the chassis (second body).
///
/// Produces six rows: two linear rows keeping the tire on its suspension axis, two angular rows
/// fixing camber and steering, the suspension spring-damper row, and a bounded row about the
/// axle modeling rolling resistance and brakes.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TireSuspensionJoint {
    /// The tire center at full suspension extension, in the chassis frame.
    pub hardpoint: Point<Real>,
    /// The axle direction before steering, in the chassis frame.
    pub axle: UnitVector<Real>,
    /// The suspension compression direction, in the chassis frame.
    pub suspension_axis: UnitVector<Real>,
    /// The axle direction in the tire frame.
    pub tire_axle: UnitVector<Real>,
    /// The suspension travel.
    pub suspension_length: Real,
    /// The spring stiffness of the suspension.
    pub spring_stiffness: Real,
    /// The damping of the suspension.
    pub damping_ratio: Real,
    /// The regularizer of the suspension row: larger values make the suspension softer.
    pub suspension_relaxation: Real,
    /// The current steering angle, about the suspension axis.
    pub steering_angle: Real,
    /// The brake torque applied at the next update.
    pub brake_torque: Real,
    pub(crate) contact_load: Real,
}

impl TireSuspensionJoint {
    /// A suspension at `hardpoint`, compressing along `suspension_axis`, with a tire spinning
    /// about `axle` (both in the chassis frame).
    pub fn new(
        hardpoint: Point<Real>,
        axle: UnitVector<Real>,
        suspension_axis: UnitVector<Real>,
    ) -> Self {
        Self {
            hardpoint,
            axle,
            suspension_axis,
            tire_axle: axle,
            suspension_length: 0.0,
            spring_stiffness: 0.0,
            damping_ratio: 0.0,
            suspension_relaxation: 0.0,
            steering_angle: 0.0,
            brake_torque: 0.0,
            contact_load: 0.0,
        }
    }

    /// The largest normal load applied on the tire by its contacts during the last update.
    pub fn contact_load(&self) -> Real {
        self.contact_load
    }

    /// The tire frame, in world-space, given the current chassis position.
    pub fn frame(&self, chassis: &RigidBodyState) -> TireFrame {
        let steering = Rotation::from_axis_angle(&self.suspension_axis, self.steering_angle);
        let rot = chassis.position.rotation;
        let pin = rot * (steering * self.axle.into_inner());
        let suspension = rot * self.suspension_axis.into_inner();

        TireFrame {
            pin,
            longitudinal: suspension.cross(&pin),
            suspension,
            hardpoint: chassis.position * self.hardpoint,
        }
    }

    /// The compression and compression speed of the suspension.
    ///
    /// A tire far outside of the suspension travel is reported as resting at the nearest end.
    pub fn suspension_state(&self, tire: &RigidBodyState, chassis: &RigidBodyState) -> SuspensionState {
        let frame = self.frame(chassis);
        let center = tire.world_com();
        let position = (center - frame.hardpoint).dot(&frame.suspension);
        let speed = (tire.linvel - chassis.velocity_at_point(&center)).dot(&frame.suspension);

        if position <= -self.suspension_length * 0.25 {
            SuspensionState::default()
        } else if position >= self.suspension_length * 1.25 {
            SuspensionState {
                position: self.suspension_length,
                speed: 0.0,
            }
        } else {
            SuspensionState { position, speed }
        }
    }

    /// The maximum torque the rolling resistance (or brake) row can apply.
    pub fn rolling_resistance(&self, tire: &RigidBodyState) -> Real {
        let spin_inertia = tire.principal_inertia().x;
        self.brake_torque
            .max(spin_inertia * FREE_ROLLING_TORQUE_COEFF)
            .max(self.contact_load * LOAD_ROLLING_TORQUE_COEFF)
    }

    pub(crate) fn build_rows(&self, builder: &mut RowBuilder) {
        let tire = builder.body0;
        let chassis = builder.body1;
        let frame = self.frame(chassis);
        let center = tire.world_com();
        let offset = center - frame.hardpoint;
        let tire_pin = tire.position.rotation * self.tire_axle.into_inner();
        let steering_error = frame.pin.cross(&tire_pin).dot(&frame.suspension);

        builder.add_linear_row(&center, &frame.pin, offset.dot(&frame.pin));
        builder.add_linear_row(&center, &frame.longitudinal, offset.dot(&frame.longitudinal));
        builder.add_angular_row(&frame.longitudinal, 0.0);
        builder.add_angular_row(&frame.suspension, steering_error);

        let suspension = builder.add_linear_row(&center, &frame.suspension, 0.0);
        let inv_mass = builder.effective_inv_mass(suspension);
        let state = self.suspension_state(tire, chassis);
        let ks = self.spring_stiffness * inv_mass;
        let dt = builder.dt;
        let row = builder.row_mut(suspension);

        if state.position < 0.0 || state.position >= self.suspension_length {
            let accel = spring_damper_acceleration(dt, ks, state.position, 0.0, state.speed);
            row.coordinate_accel += accel * 0.5;
        } else {
            let kd = self.damping_ratio * inv_mass;
            row.coordinate_accel =
                spring_damper_acceleration(dt, ks, state.position, kd, state.speed);
        }
        row.regularizer = self.suspension_relaxation;

        let rolling_resistance = self.rolling_resistance(tire);
        let rolling = builder.add_angular_row(&frame.pin, 0.0);
        builder
            .row_mut(rolling)
            .set_bounds(-rolling_resistance, rolling_resistance);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamics::SolverParameters;
    use approx::assert_relative_eq;

    fn suspension() -> TireSuspensionJoint {
        let mut joint =
            TireSuspensionJoint::new(Point::new(0.8, -0.4, 1.3), Vector::x_axis(), Vector::y_axis());
        joint.suspension_length = 0.2;
        joint.spring_stiffness = 100.0;
        joint.damping_ratio = 10.0;
        joint
    }

    #[test]
    fn spring_damper_pulls_back_to_rest() {
        assert_eq!(spring_damper_acceleration(0.1, 10.0, 0.0, 1.0, 0.0), 0.0);
        assert!(spring_damper_acceleration(0.1, 10.0, 0.5, 1.0, 0.0) < 0.0);
        assert!(spring_damper_acceleration(0.1, 10.0, -0.5, 1.0, 0.0) > 0.0);
        // Without stiffness, pure damping opposes the velocity.
        assert!(spring_damper_acceleration(0.1, 0.0, 0.0, 1.0, 2.0) < 0.0);
    }

    #[test]
    fn suspension_state_is_clamped_far_outside_travel() {
        let joint = suspension();
        let chassis = RigidBodyState::dynamic(800.0, Vector::repeat(100.0));
        let tire = RigidBodyState::dynamic(20.0, Vector::repeat(1.0))
            .with_translation(Vector::new(0.8, -0.3, 1.3));
        let state = joint.suspension_state(&tire, &chassis);
        assert_relative_eq!(state.position, 0.1, epsilon = 1.0e-5);

        let tire = tire.with_translation(Vector::new(0.8, 0.0, 1.3));
        assert_eq!(joint.suspension_state(&tire, &chassis).position, 0.2);

        let tire = tire.with_translation(Vector::new(0.8, -1.0, 1.3));
        assert_eq!(joint.suspension_state(&tire, &chassis).position, 0.0);
    }

    #[test]
    fn tire_rows_layout() {
        let joint = suspension();
        let chassis = RigidBodyState::dynamic(800.0, Vector::repeat(100.0));
        let tire = RigidBodyState::dynamic(20.0, Vector::repeat(1.2))
            .with_translation(Vector::new(0.8, -0.4, 1.3));
        let params = SolverParameters::default();
        let mut builder = RowBuilder::new(1.0 / 60.0, &params, &tire, &chassis);
        joint.build_rows(&mut builder);

        let rows = builder.rows();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows.iter().filter(|r| r.is_unbounded()).count(), 5);
        // The rolling resistance is at least half the spin inertia.
        assert_relative_eq!(rows[5].high, 0.6, epsilon = 1.0e-6);
        assert_eq!(rows[4].jacobians.jacobian0.linear, Vector::y());
    }

    #[test]
    fn steering_rotates_the_pin_about_the_suspension_axis() {
        let mut joint = suspension();
        joint.steering_angle = std::f32::consts::FRAC_PI_2 as Real;
        let frame = joint.frame(&RigidBodyState::fixed());
        assert_relative_eq!(frame.pin, -Vector::z(), epsilon = 1.0e-6);
        assert_relative_eq!(frame.longitudinal, -Vector::x(), epsilon = 1.0e-6);
    }
}
