use crate::dynamics::joint::{
    DifferentialAxleJoint, DifferentialJoint, GenericJoint, HingeJoint, RowBuilder,
    TireContactJoint, TireSuspensionJoint,
};
use crate::math::{Real, MAX_JOINT_ROWS};

/// The physics of a joint: every kind of joint known by the solver.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum JointKind {
    /// A hinge, with optional limits, motor and friction.
    Hinge(HingeJoint),
    /// A joint locking an arbitrary subset of the relative degrees of freedom.
    Generic(GenericJoint),
    /// The suspension of a tire, attached to the chassis.
    TireSuspension(TireSuspensionJoint),
    /// A differential, attached to the chassis.
    Differential(DifferentialJoint),
    /// A contact between a tire and another body.
    TireContact(TireContactJoint),
    /// The coupling between a tire spin and a differential output.
    DifferentialAxle(DifferentialAxleJoint),
}

impl JointKind {
    /// Appends the constraint rows of this joint for the current update to `builder`.
    pub fn build_rows(&self, builder: &mut RowBuilder) {
        match self {
            JointKind::Hinge(j) => j.build_rows(builder),
            JointKind::Generic(j) => j.build_rows(builder),
            JointKind::TireSuspension(j) => j.build_rows(builder),
            JointKind::Differential(j) => j.build_rows(builder),
            JointKind::TireContact(j) => j.build_rows(builder),
            JointKind::DifferentialAxle(j) => j.build_rows(builder),
        }
    }

    /// The tire suspension this joint is, if any.
    pub fn as_tire_suspension(&self) -> Option<&TireSuspensionJoint> {
        match self {
            JointKind::TireSuspension(j) => Some(j),
            _ => None,
        }
    }

    /// The mutable tire suspension this joint is, if any.
    pub fn as_tire_suspension_mut(&mut self) -> Option<&mut TireSuspensionJoint> {
        match self {
            JointKind::TireSuspension(j) => Some(j),
            _ => None,
        }
    }

    /// The differential this joint is, if any.
    pub fn as_differential(&self) -> Option<&DifferentialJoint> {
        match self {
            JointKind::Differential(j) => Some(j),
            _ => None,
        }
    }

    /// The mutable differential this joint is, if any.
    pub fn as_differential_mut(&mut self) -> Option<&mut DifferentialJoint> {
        match self {
            JointKind::Differential(j) => Some(j),
            _ => None,
        }
    }

    /// The tire contact this joint is, if any.
    pub fn as_tire_contact(&self) -> Option<&TireContactJoint> {
        match self {
            JointKind::TireContact(j) => Some(j),
            _ => None,
        }
    }

    /// The mutable tire contact this joint is, if any.
    pub fn as_tire_contact_mut(&mut self) -> Option<&mut TireContactJoint> {
        match self {
            JointKind::TireContact(j) => Some(j),
            _ => None,
        }
    }

    /// The mutable differential axle this joint is, if any.
    pub fn as_differential_axle_mut(&mut self) -> Option<&mut DifferentialAxleJoint> {
        match self {
            JointKind::DifferentialAxle(j) => Some(j),
            _ => None,
        }
    }
}

macro_rules! impl_from_joint(
    ($($joint: ident => $variant: ident),*) => {$(
        impl From<$joint> for JointKind {
            fn from(joint: $joint) -> Self {
                JointKind::$variant(joint)
            }
        }

        impl From<$joint> for BilateralJoint {
            fn from(joint: $joint) -> Self {
                BilateralJoint::new(joint)
            }
        }
    )*}
);

impl_from_joint!(
    HingeJoint => Hinge,
    GenericJoint => Generic,
    TireSuspensionJoint => TireSuspension,
    DifferentialJoint => Differential,
    TireContactJoint => TireContact,
    DifferentialAxleJoint => DifferentialAxle
);

/// A joint between two bodies, together with the solver bookkeeping of its rows.
///
/// The forces solved for its rows at the last update are kept as feedback: they seed the next
/// update and can be read back, e.g., for telemetry.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BilateralJoint {
    /// The physics of this joint.
    pub kind: JointKind,
    pub(crate) feedback: [Real; MAX_JOINT_ROWS],
    pub(crate) row_count: usize,
    pub(crate) primary_dof: usize,
    pub(crate) start: usize,
}

impl BilateralJoint {
    /// Wraps the given joint.
    pub fn new(kind: impl Into<JointKind>) -> Self {
        Self {
            kind: kind.into(),
            feedback: [0.0; MAX_JOINT_ROWS],
            row_count: 0,
            primary_dof: 0,
            start: 0,
        }
    }

    /// The force of each row produced at the last update, in production order.
    pub fn feedback(&self) -> &[Real] {
        &self.feedback[..self.row_count]
    }

    /// The number of rows produced at the last update.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// The number of unbounded rows produced at the last update.
    ///
    /// For a joint of the tree, these are solved by the tree factorization.
    pub fn primary_dof(&self) -> usize {
        self.primary_dof
    }

    /// The number of bounded rows produced at the last update.
    pub fn aux_dof(&self) -> usize {
        self.row_count - self.primary_dof
    }

    /// The offset of the first row of this joint in the row array of the last update.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Forgets the forces of the last update, so that the next one starts from zero.
    pub fn reset_feedback(&mut self) {
        self.feedback = [0.0; MAX_JOINT_ROWS];
    }

    pub(crate) fn build_rows(&self, builder: &mut RowBuilder) {
        self.kind.build_rows(builder)
    }
}

#[cfg(test)]
mod test {
    use super::{BilateralJoint, JointKind};
    use crate::dynamics::GenericJoint;

    #[test]
    fn feedback_is_limited_to_produced_rows() {
        let mut joint = BilateralJoint::from(GenericJoint::fixed());
        assert!(matches!(joint.kind, JointKind::Generic(_)));
        assert!(joint.feedback().is_empty());

        joint.row_count = 6;
        joint.primary_dof = 4;
        joint.feedback[5] = 2.0;
        assert_eq!(joint.feedback().len(), 6);
        assert_eq!(joint.aux_dof(), 2);

        joint.reset_feedback();
        assert!(joint.feedback().iter().all(|f| *f == 0.0));
        assert!(joint.kind.as_tire_suspension().is_none());
    }
}
