use crate::dynamics::RigidBodyState;
use std::ops::{Index, IndexMut};

/// The unique identifier of a body that is not part of the vehicle tree (the ground, a trailer,
/// a ramp...) but that loop joints can connect to.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ExternalHandle(pub(crate) usize);

impl ExternalHandle {
    /// Converts this handle into its (index) raw part.
    pub fn into_raw(self) -> usize {
        self.0
    }

    /// Reconstructs a handle from its (index) raw part.
    pub fn from_raw(id: usize) -> Self {
        Self(id)
    }
}

/// The bodies outside of the vehicle tree.
///
/// They take part in the solve only through loop joints, and receive the constraint reactions of
/// these joints.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default)]
pub struct ExternalBodySet {
    bodies: Vec<RigidBodyState>,
}

impl ExternalBodySet {
    /// Creates a new empty set of external bodies.
    pub fn new() -> Self {
        Self { bodies: Vec::new() }
    }

    /// The number of bodies on this set.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// `true` if there are no bodies in this set.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Is the given handle valid?
    pub fn contains(&self, handle: ExternalHandle) -> bool {
        handle.0 < self.bodies.len()
    }

    /// Inserts a body and retrieves its handle.
    pub fn insert(&mut self, body: RigidBodyState) -> ExternalHandle {
        self.bodies.push(body);
        ExternalHandle(self.bodies.len() - 1)
    }

    /// Gets the body with the given handle.
    pub fn get(&self, handle: ExternalHandle) -> Option<&RigidBodyState> {
        self.bodies.get(handle.0)
    }

    /// Gets a mutable reference to the body with the given handle.
    pub fn get_mut(&mut self, handle: ExternalHandle) -> Option<&mut RigidBodyState> {
        self.bodies.get_mut(handle.0)
    }

    /// Iterates through all the bodies on this set, in insertion order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (ExternalHandle, &RigidBodyState)> {
        self.bodies
            .iter()
            .enumerate()
            .map(|(i, body)| (ExternalHandle(i), body))
    }

    /// Iterates mutably through all the bodies on this set, in insertion order.
    pub fn iter_mut(
        &mut self,
    ) -> impl ExactSizeIterator<Item = (ExternalHandle, &mut RigidBodyState)> {
        self.bodies
            .iter_mut()
            .enumerate()
            .map(|(i, body)| (ExternalHandle(i), body))
    }
}

impl Index<ExternalHandle> for ExternalBodySet {
    type Output = RigidBodyState;

    fn index(&self, handle: ExternalHandle) -> &RigidBodyState {
        &self.bodies[handle.0]
    }
}

impl IndexMut<ExternalHandle> for ExternalBodySet {
    fn index_mut(&mut self, handle: ExternalHandle) -> &mut RigidBodyState {
        &mut self.bodies[handle.0]
    }
}
