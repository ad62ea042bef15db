//! Ordering of the node tree.

use crate::error::VehicleError;
use crate::vehicle::{NodeHandle, NodeSet};
use bit_vec::BitVec;

/// Checks that the nodes form a single tree rooted at `root`.
///
/// Every node other than the root must have a parent and a joint, and its parent chain must end
/// at the root.
pub(crate) fn validate(nodes: &NodeSet, root: Option<NodeHandle>) -> Result<(), VehicleError> {
    let root = root.ok_or(VehicleError::MissingRoot)?;
    let root_node = nodes.get(root).ok_or(VehicleError::InvalidNode(root))?;

    if root_node.parent().is_some() || root_node.joint().is_some() {
        return Err(VehicleError::RootHasJoint(root));
    }

    let mut reaches_root = BitVec::from_elem(nodes.len(), false);
    let mut visiting = BitVec::from_elem(nodes.len(), false);
    reaches_root.set(root.into_raw(), true);

    for (handle, node) in nodes.iter() {
        if node.parent().is_none() || node.joint().is_none() {
            if handle == root {
                continue;
            }
            return Err(VehicleError::DetachedNode(handle));
        }

        visiting.clear();
        let mut curr = handle;

        while !reaches_root[curr.into_raw()] {
            if visiting[curr.into_raw()] {
                return Err(VehicleError::Cycle(handle));
            }

            visiting.set(curr.into_raw(), true);
            curr = nodes
                .get(curr)
                .and_then(|node| node.parent())
                .ok_or(VehicleError::Unreachable(handle))?;
        }

        reaches_root.or(&visiting);
    }

    Ok(())
}

/// Lists the nodes of the tree in post-order: every child precedes its parent and the root is
/// last. Children are visited in insertion order.
///
/// The tree must have been validated.
pub(crate) fn sort(nodes: &NodeSet, root: NodeHandle, order: &mut Vec<NodeHandle>) {
    order.clear();
    visit(nodes, root, order);
}

fn visit(nodes: &NodeSet, handle: NodeHandle, order: &mut Vec<NodeHandle>) {
    if let Some(node) = nodes.get(handle) {
        for child in node.children() {
            visit(nodes, *child, order);
        }
    }

    order.push(handle);
}

#[cfg(test)]
mod test {
    use super::{sort, validate};
    use crate::dynamics::{GenericJoint, RigidBodyState};
    use crate::error::VehicleError;
    use crate::math::Vector;
    use crate::vehicle::{NodeHandle, NodeSet};

    fn body() -> RigidBodyState {
        RigidBodyState::dynamic(1.0, Vector::repeat(1.0))
    }

    #[test]
    fn post_order_on_random_trees() {
        let mut rng = oorandom::Rand32::new(42);

        for _ in 0..50 {
            let mut nodes = NodeSet::new();
            let root = nodes.insert(body());
            let num_nodes = 1 + rng.rand_range(0..40) as usize;

            for i in 1..num_nodes {
                let child = nodes.insert(body());
                let parent = NodeHandle::from_raw(rng.rand_range(0..i as u32) as usize);
                nodes.attach(child, parent, GenericJoint::fixed()).unwrap();
            }

            validate(&nodes, Some(root)).unwrap();
            let mut order = vec![];
            sort(&nodes, root, &mut order);
            assert_eq!(order.len(), num_nodes);
            assert_eq!(order.last(), Some(&root));

            let mut index = vec![usize::MAX; num_nodes];
            for (i, handle) in order.iter().enumerate() {
                index[handle.into_raw()] = i;
            }

            for (handle, node) in nodes.iter() {
                let i = index[handle.into_raw()];
                if let Some(parent) = node.parent() {
                    assert!(i < index[parent.into_raw()]);
                }
                for child in node.children() {
                    assert!(index[child.into_raw()] < i);
                }
            }
        }
    }

    #[test]
    fn children_are_visited_in_insertion_order() {
        let mut nodes = NodeSet::new();
        let root = nodes.insert(body());
        let a = nodes.insert(body());
        let b = nodes.insert(body());
        let c = nodes.insert(body());
        nodes.attach(b, root, GenericJoint::fixed()).unwrap();
        nodes.attach(a, root, GenericJoint::fixed()).unwrap();
        nodes.attach(c, b, GenericJoint::fixed()).unwrap();

        let mut order = vec![];
        sort(&nodes, root, &mut order);
        assert_eq!(order, vec![c, b, a, root]);
    }

    #[test]
    fn broken_trees_are_rejected() {
        let mut nodes = NodeSet::new();
        let root = nodes.insert(body());
        let a = nodes.insert(body());
        let b = nodes.insert(body());
        assert_eq!(validate(&nodes, None), Err(VehicleError::MissingRoot));
        assert_eq!(
            validate(&nodes, Some(root)),
            Err(VehicleError::DetachedNode(a))
        );

        // a and b hold each other.
        nodes.attach(a, b, GenericJoint::fixed()).unwrap();
        nodes.attach(b, a, GenericJoint::fixed()).unwrap();
        assert_eq!(validate(&nodes, Some(root)), Err(VehicleError::Cycle(a)));
    }
}
