//! Joints and the constraint rows they produce.

pub use self::bilateral_joint::{BilateralJoint, JointKind};
pub use self::constraint_row::{
    ConstraintRow, FrictionCallback, Jacobian, JacobianPair, MAX_FRICTION_BOUND,
    MIN_FRICTION_BOUND,
};
pub use self::differential_joint::{
    DifferentialAxes, DifferentialAxleJoint, DifferentialJoint, DifferentialMode,
};
pub use self::generic_joint::{GenericJoint, JointAxesMask};
pub use self::hinge_joint::{HingeJoint, HingeMotor};
pub use self::row_builder::RowBuilder;
pub(crate) use self::row_builder::effective_inv_mass;
pub use self::tire_contact_joint::{TireContactJoint, TireFrictionModel};
pub use self::tire_suspension_joint::{
    spring_damper_acceleration, SuspensionState, TireFrame, TireSuspensionJoint,
    FREE_ROLLING_TORQUE_COEFF, LOAD_ROLLING_TORQUE_COEFF,
};

mod bilateral_joint;
mod constraint_row;
mod differential_joint;
mod generic_joint;
mod hinge_joint;
mod row_builder;
mod tire_contact_joint;
mod tire_suspension_joint;
