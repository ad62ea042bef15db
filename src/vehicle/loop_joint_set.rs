use crate::dynamics::BilateralJoint;
use crate::vehicle::{ExternalHandle, NodeHandle};
use std::ops::{Index, IndexMut};

/// The unique identifier of a loop joint.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct LoopJointHandle(pub(crate) usize);

impl LoopJointHandle {
    /// Converts this handle into its (index) raw part.
    pub fn into_raw(self) -> usize {
        self.0
    }

    /// Reconstructs a handle from its (index) raw part.
    pub fn from_raw(id: usize) -> Self {
        Self(id)
    }
}

/// A body a loop joint can be attached to.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BodyRef {
    /// A node of the vehicle tree.
    Node(NodeHandle),
    /// A body outside of the vehicle tree.
    External(ExternalHandle),
}

impl From<NodeHandle> for BodyRef {
    fn from(handle: NodeHandle) -> Self {
        BodyRef::Node(handle)
    }
}

impl From<ExternalHandle> for BodyRef {
    fn from(handle: ExternalHandle) -> Self {
        BodyRef::External(handle)
    }
}

/// A joint closing a loop in the vehicle tree, or connecting it to an external body.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LoopJoint {
    /// The first body attached to this joint.
    pub body0: BodyRef,
    /// The second body attached to this joint.
    pub body1: BodyRef,
    /// The joint physics.
    pub joint: BilateralJoint,
    /// Disabled joints produce no row and keep no feedback.
    pub enabled: bool,
}

impl LoopJoint {
    /// An enabled loop joint between `body0` and `body1`.
    pub fn new(body0: BodyRef, body1: BodyRef, joint: impl Into<BilateralJoint>) -> Self {
        Self {
            body0,
            body1,
            joint: joint.into(),
            enabled: true,
        }
    }
}

/// The set of loop joints of a vehicle.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default)]
pub struct LoopJointSet {
    joints: Vec<LoopJoint>,
}

impl LoopJointSet {
    /// Creates a new empty set of loop joints.
    pub fn new() -> Self {
        Self { joints: Vec::new() }
    }

    /// The number of loop joints on this set, enabled or not.
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// `true` if there are no loop joints in this set.
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Is the given handle valid?
    pub fn contains(&self, handle: LoopJointHandle) -> bool {
        handle.0 < self.joints.len()
    }

    /// Inserts a loop joint and retrieves its handle.
    pub fn insert(&mut self, joint: LoopJoint) -> LoopJointHandle {
        self.joints.push(joint);
        LoopJointHandle(self.joints.len() - 1)
    }

    /// Gets the loop joint with the given handle.
    pub fn get(&self, handle: LoopJointHandle) -> Option<&LoopJoint> {
        self.joints.get(handle.0)
    }

    /// Gets a mutable reference to the loop joint with the given handle.
    pub fn get_mut(&mut self, handle: LoopJointHandle) -> Option<&mut LoopJoint> {
        self.joints.get_mut(handle.0)
    }

    /// Iterates through all the loop joints on this set, in insertion order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (LoopJointHandle, &LoopJoint)> {
        self.joints
            .iter()
            .enumerate()
            .map(|(i, joint)| (LoopJointHandle(i), joint))
    }

    /// Iterates mutably through all the loop joints on this set, in insertion order.
    pub fn iter_mut(&mut self) -> impl ExactSizeIterator<Item = (LoopJointHandle, &mut LoopJoint)> {
        self.joints
            .iter_mut()
            .enumerate()
            .map(|(i, joint)| (LoopJointHandle(i), joint))
    }
}

impl Index<LoopJointHandle> for LoopJointSet {
    type Output = LoopJoint;

    fn index(&self, handle: LoopJointHandle) -> &LoopJoint {
        &self.joints[handle.0]
    }
}

impl IndexMut<LoopJointHandle> for LoopJointSet {
    fn index_mut(&mut self, handle: LoopJointHandle) -> &mut LoopJoint {
        &mut self.joints[handle.0]
    }
}
