//! Errors reported while assembling a vehicle.
//!
//! Every structural or configuration problem is detected when the vehicle is built, so that
//! [`Vehicle::update`](crate::vehicle::Vehicle::update) never has to fail. Numerical trouble
//! during an update (an approximate LCP solution, a joint that became degenerate at runtime) is
//! reported through the `log` crate instead.

use crate::vehicle::{ExternalHandle, LoopJointHandle, NodeHandle};

/// Errors detected while assembling or editing a vehicle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VehicleError {
    /// The vehicle has no root node.
    #[error("the vehicle has no root node")]
    MissingRoot,
    /// A handle does not refer to any node of this vehicle.
    #[error("the node {0:?} does not exist")]
    InvalidNode(NodeHandle),
    /// A handle does not refer to any external body of this vehicle.
    #[error("the external body {0:?} does not exist")]
    InvalidExternalBody(ExternalHandle),
    /// A handle does not refer to any loop joint of this vehicle.
    #[error("the loop joint {0:?} does not exist")]
    InvalidLoopJoint(LoopJointHandle),
    /// The root node was given a parent or a joint.
    #[error("the root node {0:?} cannot have a parent joint")]
    RootHasJoint(NodeHandle),
    /// A node was attached to itself.
    #[error("the node {0:?} cannot be attached to itself")]
    SelfAttachment(NodeHandle),
    /// A node was attached twice.
    #[error("the node {0:?} is already attached to a parent")]
    AlreadyAttached(NodeHandle),
    /// A non-root node has no parent joint.
    #[error("the node {0:?} is not attached to any parent")]
    DetachedNode(NodeHandle),
    /// Following the parent links from this node loops forever.
    #[error("the parent chain of the node {0:?} contains a cycle")]
    Cycle(NodeHandle),
    /// This node has no path to the root.
    #[error("the node {0:?} cannot be reached from the root")]
    Unreachable(NodeHandle),
    /// A joint produced no constraint row.
    #[error("the joint attached to {0:?} produced no constraint row")]
    EmptyJoint(NodeHandle),
    /// A joint tried to produce more than [`MAX_JOINT_ROWS`](crate::math::MAX_JOINT_ROWS) rows.
    #[error("the joint attached to {0:?} produced too many constraint rows")]
    TooManyRows(NodeHandle),
    /// A loop joint tried to produce more than [`MAX_JOINT_ROWS`](crate::math::MAX_JOINT_ROWS) rows.
    #[error("the loop joint {0:?} produced too many constraint rows")]
    TooManyLoopRows(LoopJointHandle),
    /// A tree joint produced only bounded rows, so it does not remove any degree of freedom.
    #[error("the joint attached to {0:?} produced no unbounded row")]
    NoPrimaryRow(NodeHandle),
    /// The primary rows of a tree joint have a singular mass matrix (degenerate Jacobian).
    #[error("the joint attached to {0:?} has a degenerate Jacobian")]
    DegenerateJoint(NodeHandle),
    /// A loop joint produced no constraint row.
    #[error("the loop joint {0:?} produced no constraint row")]
    EmptyLoopJoint(LoopJointHandle),
    /// A loop joint connects a body to itself.
    #[error("the loop joint {0:?} connects a body to itself")]
    DegenerateLoopJoint(LoopJointHandle),
    /// The node is not a tire attached through a tire suspension joint.
    #[error("the node {0:?} is not a tire")]
    NotATire(NodeHandle),
    /// The node is not a differential.
    #[error("the node {0:?} is not a differential")]
    NotADifferential(NodeHandle),
    /// A tire contact has a zero or non-finite normal, or a non-finite point.
    #[error("a tire contact has an invalid point or normal")]
    InvalidContact,
}
