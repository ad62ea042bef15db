use crate::dynamics::{SuspensionState, TireFrictionModel};
use crate::math::{Point, Real, UnitVector, Vector};
use arrayvec::ArrayVec;

/// The maximum number of contacts solved per tire.
pub const MAX_TIRE_CONTACTS: usize = 4;

/// Contacts of a tire closer than the square root of this are merged.
const CONTACT_MERGE_DISTANCE_SQ: Real = 3.0e-2;

/// The description of a tire and of its suspension.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TireInfo {
    /// The tire center at full suspension extension, in the chassis frame.
    pub location: Point<Real>,
    /// The axle direction, in the chassis frame.
    pub axle: UnitVector<Real>,
    /// The suspension compression direction, in the chassis frame.
    pub suspension_axis: UnitVector<Real>,
    /// The mass of the tire.
    pub mass: Real,
    /// The radius of the tire.
    pub radius: Real,
    /// The width of the tire.
    pub width: Real,
    /// The suspension travel.
    pub suspension_length: Real,
    /// The spring stiffness of the suspension.
    pub spring_stiffness: Real,
    /// The damping of the suspension.
    pub damping_ratio: Real,
    /// The regularizer of the suspension row: larger values make the suspension softer.
    pub suspension_relaxation: Real,
    /// The friction coefficient along the rolling direction.
    pub longitudinal_friction: Real,
    /// The friction coefficient along the axle.
    pub lateral_friction: Real,
    /// How the two friction directions are coupled.
    pub friction_model: TireFrictionModel,
}

impl Default for TireInfo {
    fn default() -> Self {
        Self {
            location: Point::origin(),
            axle: Vector::x_axis(),
            suspension_axis: Vector::y_axis(),
            mass: 20.0,
            radius: 0.35,
            width: 0.2,
            suspension_length: 0.2,
            spring_stiffness: 100.0,
            damping_ratio: 15.0,
            suspension_relaxation: 0.1,
            longitudinal_friction: 1.0,
            lateral_friction: 1.0,
            friction_model: TireFrictionModel::Ellipse,
        }
    }
}

impl TireInfo {
    /// The principal inertia of the tire.
    ///
    /// The tire is a cylinder made isotropic by taking its largest principal inertia.
    pub fn principal_inertia(&self) -> Vector<Real> {
        let r2 = self.radius * self.radius;
        let axial = r2 * 0.5;
        let radial = (r2 * 3.0 + self.width * self.width) / 12.0;
        Vector::repeat(self.mass * axial.max(radial))
    }
}

/// A contact point of a tire, as computed by the collision detection.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TireContactPoint {
    /// The world-space contact point.
    pub point: Point<Real>,
    /// The contact normal, pointing toward the tire. It doesn't have to be normalized.
    pub normal: Vector<Real>,
    /// The penetration depth, positive when the tire and the other body overlap.
    pub penetration: Real,
}

impl TireContactPoint {
    /// A contact at `point` with the given `normal` and `penetration` depth.
    pub fn new(point: Point<Real>, normal: Vector<Real>, penetration: Real) -> Self {
        Self {
            point,
            normal,
            penetration,
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.point.coords.iter().all(|x| x.is_finite())
            && self.normal.iter().all(|x| x.is_finite())
            && self.penetration.is_finite()
            && self.normal.norm_squared() > Real::EPSILON
    }
}

/// What happened to a tire during the last update.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TireTelemetry {
    /// The suspension compression and compression speed at the beginning of the update.
    pub suspension: SuspensionState,
    /// The normal force of each contact slot.
    pub contact_loads: [Real; MAX_TIRE_CONTACTS],
    /// The number of contacts solved.
    pub num_contacts: usize,
    /// The bound of the rolling resistance (and brake) torque.
    pub rolling_resistance: Real,
    /// The force of the suspension row.
    pub suspension_force: Real,
}

/// Keeps at most [`MAX_TIRE_CONTACTS`] contacts, sorted by the alignment of their normal with the
/// suspension axis, and merges contacts that are too close to each other (the later one wins).
pub(crate) fn filter_contacts(
    contacts: &[TireContactPoint],
    suspension: &Vector<Real>,
) -> ArrayVec<TireContactPoint, MAX_TIRE_CONTACTS> {
    if contacts.len() > MAX_TIRE_CONTACTS {
        log::warn!(
            "{} tire contacts given, only the first {} are kept",
            contacts.len(),
            MAX_TIRE_CONTACTS
        );
    }

    let mut result: ArrayVec<_, MAX_TIRE_CONTACTS> =
        contacts.iter().take(MAX_TIRE_CONTACTS).copied().collect();
    result.sort_by(|a, b| {
        suspension
            .dot(&a.normal)
            .total_cmp(&suspension.dot(&b.normal))
    });

    let mut i = result.len();
    while i > 1 {
        i -= 1;
        let point = result[i].point;
        let close = (0..i).rev().find(|j| {
            na::distance_squared(&result[*j].point, &point) < CONTACT_MERGE_DISTANCE_SQ
        });

        if let Some(j) = close {
            let merged = result.remove(i);
            result[j] = merged;
        }
    }

    result
}

#[cfg(test)]
mod test {
    use super::{filter_contacts, TireContactPoint, TireInfo, MAX_TIRE_CONTACTS};
    use crate::math::{Point, Real, Vector};

    fn contact(x: Real, normal: Vector<Real>) -> TireContactPoint {
        TireContactPoint::new(Point::new(x, 0.0, 0.0), normal, 0.01)
    }

    #[test]
    fn contacts_are_truncated_sorted_and_merged() {
        let up = Vector::y();
        let tilted = Vector::new(0.5, 1.0, 0.0);
        let contacts = [
            contact(0.0, up),
            contact(1.0, tilted),
            contact(0.05, tilted),
            contact(3.0, -up),
            contact(4.0, up),
        ];

        let filtered = filter_contacts(&contacts, &up);
        // The last contact is dropped, the one at 0.05 replaces the one at 0.0.
        assert_eq!(filtered.len(), 3);
        assert_eq!(filtered[0].point.x, 3.0);
        assert!(filtered.iter().all(|c| c.point.x != 0.0));
        assert!(filtered.len() <= MAX_TIRE_CONTACTS);

        for pair in filtered.windows(2) {
            assert!(up.dot(&pair[0].normal) <= up.dot(&pair[1].normal));
        }
    }

    #[test]
    fn invalid_contacts_are_detected() {
        assert!(contact(0.0, Vector::y()).is_valid());
        assert!(!contact(0.0, Vector::zeros()).is_valid());
        assert!(!contact(Real::NAN, Vector::y()).is_valid());
    }

    #[test]
    fn tire_inertia_is_isotropic() {
        let info = TireInfo {
            mass: 2.0,
            radius: 1.0,
            width: 0.5,
            ..TireInfo::default()
        };
        assert_eq!(info.principal_inertia(), Vector::repeat(1.0));
    }
}
