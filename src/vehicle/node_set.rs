use crate::dynamics::{BilateralJoint, RigidBodyState};
use crate::error::VehicleError;
use std::ops::{Index, IndexMut};

/// The unique identifier of a node of a vehicle.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeHandle(pub(crate) usize);

impl NodeHandle {
    /// Converts this handle into its (index) raw part.
    pub fn into_raw(self) -> usize {
        self.0
    }

    /// Reconstructs a handle from its (index) raw part.
    pub fn from_raw(id: usize) -> Self {
        Self(id)
    }

    /// An always-invalid node handle.
    pub fn invalid() -> Self {
        Self(usize::MAX)
    }
}

/// A rigid body of a vehicle, with the joint attaching it to its parent.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct VehicleNode {
    pub(crate) body: RigidBodyState,
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,
    pub(crate) joint: Option<BilateralJoint>,
    // Topological index assigned at the beginning of each update.
    pub(crate) index: usize,
}

impl VehicleNode {
    fn new(body: RigidBodyState) -> Self {
        Self {
            body,
            parent: None,
            children: Vec::new(),
            joint: None,
            index: usize::MAX,
        }
    }

    /// The rigid body of this node.
    pub fn body(&self) -> &RigidBodyState {
        &self.body
    }

    /// The mutable rigid body of this node.
    pub fn body_mut(&mut self) -> &mut RigidBodyState {
        &mut self.body
    }

    /// The parent of this node, `None` for the root.
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// The children of this node, in attachment order.
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    /// The joint attaching this node to its parent.
    pub fn joint(&self) -> Option<&BilateralJoint> {
        self.joint.as_ref()
    }

    /// The mutable joint attaching this node to its parent.
    pub fn joint_mut(&mut self) -> Option<&mut BilateralJoint> {
        self.joint.as_mut()
    }
}

/// The set of nodes of a vehicle, linked together as a tree by their parent joints.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default)]
pub struct NodeSet {
    nodes: Vec<VehicleNode>,
}

impl NodeSet {
    /// Creates a new empty set of nodes.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// The number of nodes on this set.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` if there are no nodes in this set.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Is the given node handle valid?
    pub fn contains(&self, handle: NodeHandle) -> bool {
        handle.0 < self.nodes.len()
    }

    /// Inserts a detached node and retrieves its handle.
    pub fn insert(&mut self, body: RigidBodyState) -> NodeHandle {
        self.nodes.push(VehicleNode::new(body));
        NodeHandle(self.nodes.len() - 1)
    }

    /// Attaches `child` to `parent` with the given joint.
    ///
    /// The joint's first body is the child, its second body is the parent.
    pub fn attach(
        &mut self,
        child: NodeHandle,
        parent: NodeHandle,
        joint: impl Into<BilateralJoint>,
    ) -> Result<(), VehicleError> {
        if !self.contains(parent) {
            return Err(VehicleError::InvalidNode(parent));
        }
        if child == parent {
            return Err(VehicleError::SelfAttachment(child));
        }

        let node = self.get_mut(child).ok_or(VehicleError::InvalidNode(child))?;
        if node.parent.is_some() {
            return Err(VehicleError::AlreadyAttached(child));
        }

        node.parent = Some(parent);
        node.joint = Some(joint.into());
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Gets the node with the given handle.
    pub fn get(&self, handle: NodeHandle) -> Option<&VehicleNode> {
        self.nodes.get(handle.0)
    }

    /// Gets a mutable reference to the node with the given handle.
    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut VehicleNode> {
        self.nodes.get_mut(handle.0)
    }

    /// Iterates through all the nodes on this set, in insertion order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (NodeHandle, &VehicleNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeHandle(i), node))
    }

    /// Iterates mutably through all the nodes on this set, in insertion order.
    pub fn iter_mut(&mut self) -> impl ExactSizeIterator<Item = (NodeHandle, &mut VehicleNode)> {
        self.nodes
            .iter_mut()
            .enumerate()
            .map(|(i, node)| (NodeHandle(i), node))
    }
}

impl Index<NodeHandle> for NodeSet {
    type Output = VehicleNode;

    fn index(&self, handle: NodeHandle) -> &VehicleNode {
        &self.nodes[handle.0]
    }
}

impl IndexMut<NodeHandle> for NodeSet {
    fn index_mut(&mut self, handle: NodeHandle) -> &mut VehicleNode {
        &mut self.nodes[handle.0]
    }
}

#[cfg(test)]
mod test {
    use super::{NodeHandle, NodeSet};
    use crate::dynamics::{GenericJoint, RigidBodyState};
    use crate::error::VehicleError;

    #[test]
    fn attachment_errors() {
        let mut nodes = NodeSet::new();
        let a = nodes.insert(RigidBodyState::fixed());
        let b = nodes.insert(RigidBodyState::fixed());

        assert_eq!(
            nodes.attach(a, a, GenericJoint::fixed()),
            Err(VehicleError::SelfAttachment(a))
        );
        assert_eq!(
            nodes.attach(NodeHandle::invalid(), a, GenericJoint::fixed()),
            Err(VehicleError::InvalidNode(NodeHandle::invalid()))
        );
        assert_eq!(
            nodes.attach(b, NodeHandle::from_raw(7), GenericJoint::fixed()),
            Err(VehicleError::InvalidNode(NodeHandle::from_raw(7)))
        );

        nodes.attach(b, a, GenericJoint::fixed()).unwrap();
        assert_eq!(
            nodes.attach(b, a, GenericJoint::fixed()),
            Err(VehicleError::AlreadyAttached(b))
        );
        assert_eq!(nodes[a].children(), &[b]);
        assert_eq!(nodes[b].parent(), Some(a));
        assert!(nodes[b].joint().is_some());
    }
}
