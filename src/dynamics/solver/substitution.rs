//! The two-pass tree solve on a factorized tree.
//!
//! These functions only read and write the buffers they are given and never allocate: they run
//! once for the open-loop forces and once per auxiliary row.

use super::workspace::{NodeFactor, NodeVector};

/// Forward pass, children to root.
///
/// Nodes below `start` are assumed to have a zero right-hand side: their forces are set to zero
/// and skipped.
pub(crate) fn solve_forward(
    children_offsets: &[usize],
    children: &[usize],
    factors: &[NodeFactor],
    accel: &[NodeVector],
    force: &mut [NodeVector],
    start: usize,
) {
    let num_nodes = factors.len();

    for f in &mut force[..start.min(num_nodes)] {
        *f = NodeVector::zero();
    }

    for i in start..num_nodes {
        let mut f = accel[i];

        for &c in &children[children_offsets[i]..children_offsets[i + 1]] {
            let child = &factors[c];
            let child_force = &force[c];
            for k in 0..child.dof {
                f.body -= child.joint_j[k] * child_force.joint[k];
            }
        }

        let factor = &factors[i];
        for k in 0..factor.dof {
            f.joint[k] -= factor.body_jt[k].dot(&f.body);
        }

        force[i] = f;
    }

    for i in start..num_nodes {
        let factor = &factors[i];
        let f = &mut force[i];
        f.body = factor.inv_body_mass * f.body;
        // The entries past `dof` of the joint force and of its inverse mass are zero.
        f.joint = factor.inv_joint_mass * f.joint;
    }
}

/// Backward pass, root to children.
pub(crate) fn solve_backward(
    parents: &[Option<usize>],
    factors: &[NodeFactor],
    force: &mut [NodeVector],
) {
    for i in (0..force.len()).rev() {
        let Some(parent) = parents[i] else {
            continue;
        };

        // Parents always come after their children.
        let (head, tail) = force.split_at_mut(parent);
        let parent_body = tail[0].body;
        let f = &mut head[i];
        let factor = &factors[i];

        for k in 0..factor.dof {
            f.joint[k] -= parent_body.dot(&factor.joint_j[k]);
        }

        for k in 0..factor.dof {
            f.body -= factor.body_jt[k] * f.joint[k];
        }
    }
}
