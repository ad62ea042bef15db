use crate::math::{Isometry, Matrix, Point, Real, Vector};
use crate::utils;

/// The inertial and kinematic state of one rigid body, as seen by the solver.
///
/// The solver reads the mass properties, the position and the velocities, and writes the
/// accumulated `force` and `torque`. Integrating these forces is the job of the caller.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RigidBodyState {
    /// The world-space position of the body frame.
    pub position: Isometry<Real>,
    /// The center of mass, expressed in the body frame.
    pub local_com: Point<Real>,
    /// The linear velocity of the center of mass.
    pub linvel: Vector<Real>,
    /// The angular velocity.
    pub angvel: Vector<Real>,
    /// Accumulation of the forces applied during the last update (external and constraint forces).
    pub force: Vector<Real>,
    /// Accumulation of the torques applied during the last update (external and constraint torques).
    pub torque: Vector<Real>,
    /// Force applied by the user at every update.
    pub user_force: Vector<Real>,
    /// Torque applied by the user at every update.
    pub user_torque: Vector<Real>,
    /// Gravity is multiplied by this scaling factor before it's applied to this body.
    pub gravity_scale: Real,
    mass: Real,
    inv_mass: Real,
    principal_inertia: Vector<Real>,
    inv_principal_inertia: Vector<Real>,
}

impl Default for RigidBodyState {
    fn default() -> Self {
        Self::fixed()
    }
}

impl RigidBodyState {
    /// A body with infinite mass: it never moves under the effect of constraint forces.
    pub fn fixed() -> Self {
        Self {
            position: Isometry::identity(),
            local_com: Point::origin(),
            linvel: Vector::zeros(),
            angvel: Vector::zeros(),
            force: Vector::zeros(),
            torque: Vector::zeros(),
            user_force: Vector::zeros(),
            user_torque: Vector::zeros(),
            gravity_scale: 1.0,
            mass: 0.0,
            inv_mass: 0.0,
            principal_inertia: Vector::zeros(),
            inv_principal_inertia: Vector::zeros(),
        }
    }

    /// A dynamic body with the given mass and principal angular inertia (body frame).
    pub fn dynamic(mass: Real, principal_inertia: Vector<Real>) -> Self {
        let mut result = Self::fixed();
        result.set_mass_properties(mass, principal_inertia);
        result
    }

    /// Sets the position of this body.
    #[must_use]
    pub fn with_position(mut self, position: Isometry<Real>) -> Self {
        self.position = position;
        self
    }

    /// Sets the translation of this body.
    #[must_use]
    pub fn with_translation(mut self, translation: Vector<Real>) -> Self {
        self.position.translation.vector = translation;
        self
    }

    /// Sets the linear and angular velocities of this body.
    #[must_use]
    pub fn with_velocity(mut self, linvel: Vector<Real>, angvel: Vector<Real>) -> Self {
        self.linvel = linvel;
        self.angvel = angvel;
        self
    }

    /// Replaces the mass properties of this body.
    ///
    /// A zero mass makes the body fixed. A zero principal inertia locks the matching rotation.
    pub fn set_mass_properties(&mut self, mass: Real, principal_inertia: Vector<Real>) {
        self.mass = mass.max(0.0);
        self.inv_mass = utils::inv(self.mass);

        if self.inv_mass == 0.0 {
            self.principal_inertia = Vector::zeros();
            self.inv_principal_inertia = Vector::zeros();
        } else {
            self.principal_inertia = principal_inertia.map(|i| i.max(0.0));
            self.inv_principal_inertia = self.principal_inertia.map(utils::inv);
        }
    }

    /// The mass of this body, zero if it is fixed.
    pub fn mass(&self) -> Real {
        self.mass
    }

    /// The inverse mass of this body, zero if it is fixed.
    pub fn inv_mass(&self) -> Real {
        self.inv_mass
    }

    /// The principal angular inertia, in the body frame.
    pub fn principal_inertia(&self) -> &Vector<Real> {
        &self.principal_inertia
    }

    /// Is this body affected by forces?
    pub fn is_dynamic(&self) -> bool {
        self.inv_mass != 0.0
    }

    /// The world-space center of mass.
    pub fn world_com(&self) -> Point<Real> {
        self.position * self.local_com
    }

    /// The world-space angular inertia tensor.
    pub fn world_inertia(&self) -> Matrix<Real> {
        let rot = self.position.rotation.to_rotation_matrix();
        rot * Matrix::from_diagonal(&self.principal_inertia) * rot.transpose()
    }

    /// The world-space inverse angular inertia tensor.
    pub fn world_inv_inertia(&self) -> Matrix<Real> {
        let rot = self.position.rotation.to_rotation_matrix();
        rot * Matrix::from_diagonal(&self.inv_principal_inertia) * rot.transpose()
    }

    /// The velocity of the given world-space point, assumed attached to this body.
    pub fn velocity_at_point(&self, point: &Point<Real>) -> Vector<Real> {
        self.linvel + self.angvel.cross(&(point - self.world_com()))
    }

    /// Applies a user force at the given world-space point.
    pub fn apply_force_at_point(&mut self, force: Vector<Real>, point: &Point<Real>) {
        self.user_force += force;
        self.user_torque += (point - self.world_com()).cross(&force);
    }

    /// Clears the user force and torque.
    pub fn reset_user_forces(&mut self) {
        self.user_force = Vector::zeros();
        self.user_torque = Vector::zeros();
    }

    /// Resets the accumulated force and torque to the external ones: gravity, then user forces.
    pub fn reset_forces(&mut self, gravity: &Vector<Real>) {
        if self.is_dynamic() {
            self.force = self.user_force + gravity * (self.mass * self.gravity_scale);
            self.torque = self.user_torque;
        } else {
            self.force = Vector::zeros();
            self.torque = Vector::zeros();
        }
    }
}

#[cfg(test)]
mod test {
    use super::RigidBodyState;
    use crate::math::{Isometry, Point, Vector};
    use approx::assert_relative_eq;

    #[test]
    fn fixed_body_ignores_gravity_and_inertia() {
        let mut body = RigidBodyState::dynamic(0.0, Vector::new(1.0, 2.0, 3.0));
        assert!(!body.is_dynamic());
        assert_eq!(body.principal_inertia(), &Vector::zeros());

        body.user_force = Vector::x();
        body.reset_forces(&Vector::new(0.0, -9.8, 0.0));
        assert_eq!(body.force, Vector::zeros());
    }

    #[test]
    fn world_inertia_follows_rotation() {
        let body = RigidBodyState::dynamic(2.0, Vector::new(1.0, 2.0, 3.0)).with_position(
            Isometry::rotation(Vector::z() * std::f64::consts::FRAC_PI_2 as crate::math::Real),
        );
        let inertia = body.world_inertia();
        assert_relative_eq!(inertia.m11, 2.0, epsilon = 1.0e-5);
        assert_relative_eq!(inertia.m22, 1.0, epsilon = 1.0e-5);
        assert_relative_eq!(inertia.m33, 3.0, epsilon = 1.0e-5);
        assert_relative_eq!(
            body.world_inv_inertia() * inertia,
            na::Matrix3::identity(),
            epsilon = 1.0e-5
        );
    }

    #[test]
    fn force_at_point_produces_torque() {
        let mut body = RigidBodyState::dynamic(1.0, Vector::repeat(1.0))
            .with_translation(Vector::new(1.0, 0.0, 0.0));
        body.apply_force_at_point(Vector::y(), &Point::new(2.0, 0.0, 0.0));
        body.reset_forces(&Vector::zeros());
        assert_eq!(body.force, Vector::y());
        assert_relative_eq!(body.torque, Vector::z());
    }
}
