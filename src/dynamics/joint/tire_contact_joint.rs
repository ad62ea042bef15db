use crate::dynamics::joint::{FrictionCallback, RowBuilder, MAX_FRICTION_BOUND};
use crate::math::{Point, Real, UnitVector, Vector};
use crate::utils::OrthonormalBasis;

/// Squared norm under which `normal × pin` is too short to define the rolling direction.
const DEGENERATE_LONGITUDINAL: Real = 0.1;

/// How the longitudinal and lateral friction forces of a tire contact are bounded.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum TireFrictionModel {
    /// Each friction direction is bounded independently by `μ N`.
    Box,
    /// The friction force is bounded by the ellipse of radii `μ_lon N` and `μ_lat N`.
    #[default]
    Ellipse,
}

/// The loop joint between a tire (first body) and the body it touches (second body).
///
/// Produces a normal row with force in `[0, +∞)`, then a longitudinal and a lateral friction
/// row whose bounds scale with the normal force.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TireContactJoint {
    /// The contact point, in world-space.
    pub point: Point<Real>,
    /// The contact normal, pointing toward the tire.
    pub normal: UnitVector<Real>,
    /// The penetration depth, positive when the bodies overlap.
    pub penetration: Real,
    /// The penetration left uncorrected, avoiding jitter of resting contacts.
    pub allowed_penetration: Real,
    /// The friction coefficient along the rolling direction.
    pub longitudinal_friction: Real,
    /// The friction coefficient along the axle.
    pub lateral_friction: Real,
    /// How the two friction rows are coupled.
    pub friction_model: TireFrictionModel,
    pub(crate) pin: Vector<Real>,
    pub(crate) suspension: Vector<Real>,
}

impl TireContactJoint {
    /// A contact at `point` with the given `normal` and `penetration` depth.
    pub fn new(point: Point<Real>, normal: UnitVector<Real>, penetration: Real) -> Self {
        Self {
            point,
            normal,
            penetration,
            allowed_penetration: 1.0e-3,
            longitudinal_friction: 1.0,
            lateral_friction: 1.0,
            friction_model: TireFrictionModel::Ellipse,
            pin: Vector::x(),
            suspension: Vector::y(),
        }
    }

    /// The unit rolling direction of the tire at this contact.
    pub fn longitudinal_dir(&self) -> Vector<Real> {
        let normal = self.normal.into_inner();
        let dir = normal.cross(&self.pin);

        if dir.norm_squared() < DEGENERATE_LONGITUDINAL {
            // The axle is almost aligned with the normal (tire on its side).
            normal
                .cross(&self.suspension.cross(&normal))
                .try_normalize(Real::EPSILON)
                .unwrap_or_else(|| normal.orthonormal_basis()[0])
        } else {
            dir.normalize()
        }
    }

    pub(crate) fn build_rows(&self, builder: &mut RowBuilder) {
        let normal = self.normal.into_inner();
        let depth = (self.penetration - self.allowed_penetration).max(0.0);
        let normal_row = builder.add_linear_row(&self.point, &normal, -depth);
        builder.row_mut(normal_row).set_bounds(0.0, MAX_FRICTION_BOUND);

        let longitudinal = self.longitudinal_dir();
        let lateral = longitudinal.cross(&normal);

        let lon_row = builder.add_linear_row(&self.point, &longitudinal, 0.0);
        let row = builder.row_mut(lon_row);
        row.set_bounds(-self.longitudinal_friction, self.longitudinal_friction);
        row.normal_row = Some(normal_row);

        let lat_row = builder.add_linear_row(&self.point, &lateral, 0.0);
        let row = builder.row_mut(lat_row);
        row.set_bounds(-self.lateral_friction, self.lateral_friction);
        row.normal_row = Some(normal_row);

        if self.friction_model == TireFrictionModel::Ellipse {
            row.friction_callback = Some(FrictionCallback::Ellipse {
                longitudinal_row: lon_row,
                longitudinal_coefficient: self.longitudinal_friction,
                lateral_coefficient: self.lateral_friction,
            });
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamics::{RigidBodyState, SolverParameters};
    use approx::assert_relative_eq;

    #[test]
    fn contact_rows_reference_the_normal_row() {
        let tire = RigidBodyState::dynamic(20.0, Vector::repeat(1.0))
            .with_translation(Vector::new(0.0, 0.4, 0.0));
        let ground = RigidBodyState::fixed();
        let params = SolverParameters::default();
        let contact = TireContactJoint::new(Point::origin(), Vector::y_axis(), 0.01);

        let mut builder = RowBuilder::new(1.0 / 60.0, &params, &tire, &ground);
        contact.build_rows(&mut builder);
        let rows = builder.rows();

        assert_eq!(rows.len(), 3);
        assert_eq!((rows[0].low, rows[0].normal_row), (0.0, None));
        // The penetration beyond the allowed depth is pushed out.
        assert!(rows[0].coordinate_accel > 0.0);
        assert_eq!(rows[1].normal_row, Some(0));
        assert_eq!(rows[2].normal_row, Some(0));
        assert!(rows[1].friction_callback.is_none());
        assert!(rows[2].friction_callback.is_some());
        assert_relative_eq!(rows[1].jacobians.jacobian0.linear, -Vector::z());
    }

    #[test]
    fn rolling_direction_of_a_tire_on_its_side() {
        let mut contact = TireContactJoint::new(Point::origin(), Vector::y_axis(), 0.0);
        contact.pin = Vector::y();
        contact.suspension = -Vector::x();
        let dir = contact.longitudinal_dir();
        assert_relative_eq!(dir.norm(), 1.0, epsilon = 1.0e-6);
        assert_relative_eq!(dir.dot(&Vector::y()), 0.0, epsilon = 1.0e-6);
    }
}
