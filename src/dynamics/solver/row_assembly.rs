//! Snapshot of the bodies and construction of the constraint rows of one update.

use super::topology;
use super::workspace::{JointRows, SolverBody, SolverWorkspace};
use crate::dynamics::{
    effective_inv_mass, BilateralJoint, ConstraintRow, FrictionCallback, RigidBodyState,
    RowBuilder, SolverParameters,
};
use crate::error::VehicleError;
use crate::math::{Real, MAX_JOINT_ROWS};
use crate::utils;
use crate::vehicle::{BodyRef, ExternalBodySet, LoopJointSet, NodeHandle, NodeSet};
use arrayvec::ArrayVec;

/// Sorts the tree, assigns the topological indices, and takes a snapshot of every body.
pub(crate) fn prepare(
    ws: &mut SolverWorkspace,
    nodes: &mut NodeSet,
    root: NodeHandle,
    externals: &ExternalBodySet,
) {
    topology::sort(nodes, root, &mut ws.order);

    for (i, handle) in ws.order.iter().enumerate() {
        if let Some(node) = nodes.get_mut(*handle) {
            node.index = i;
        }
    }

    ws.parents.clear();
    ws.children_offsets.clear();
    ws.children.clear();
    ws.bodies.clear();

    for handle in &ws.order {
        let node = &nodes[*handle];
        ws.parents.push(node.parent().map(|p| nodes[p].index));
        ws.children_offsets.push(ws.children.len());
        ws.children
            .extend(node.children().iter().map(|c| nodes[*c].index));
        ws.bodies.push(SolverBody::from_state(node.body()));
    }

    ws.children_offsets.push(ws.children.len());
    ws.bodies
        .extend(externals.iter().map(|(_, body)| SolverBody::from_state(body)));
    ws.resize_nodes();
}

/// The index of a body in the solver body array, which must have been prepared.
pub(crate) fn body_index(
    nodes: &NodeSet,
    num_nodes: usize,
    body: BodyRef,
) -> Result<usize, VehicleError> {
    match body {
        BodyRef::Node(handle) => nodes
            .get(handle)
            .map(|node| node.index)
            .ok_or(VehicleError::InvalidNode(handle)),
        BodyRef::External(handle) => Ok(num_nodes + handle.into_raw()),
    }
}

fn body_state<'a>(
    nodes: &'a NodeSet,
    externals: &'a ExternalBodySet,
    body: BodyRef,
) -> Result<&'a RigidBodyState, VehicleError> {
    match body {
        BodyRef::Node(handle) => nodes
            .get(handle)
            .map(|node| node.body())
            .ok_or(VehicleError::InvalidNode(handle)),
        BodyRef::External(handle) => externals
            .get(handle)
            .ok_or(VehicleError::InvalidExternalBody(handle)),
    }
}

/// Builds the rows of every tree joint (in topological order) then of every enabled loop joint.
///
/// Problems are reported but never interrupt the update: rows beyond the capacity of a joint are
/// dropped and joints referencing unknown bodies are skipped. The first problem is returned.
pub(crate) fn build_rows(
    ws: &mut SolverWorkspace,
    dt: Real,
    params: &SolverParameters,
    nodes: &NodeSet,
    externals: &ExternalBodySet,
    loop_joints: &LoopJointSet,
) -> Option<VehicleError> {
    let mut first_error = None;
    let num_nodes = ws.num_nodes();

    ws.rows.clear();
    ws.tree_joints.clear();
    ws.tree_joints.resize(num_nodes, JointRows::default());
    ws.loop_joints.clear();

    for i in 0..num_nodes {
        let handle = ws.order[i];
        let node = &nodes[handle];
        let (Some(parent), Some(joint)) = (node.parent(), node.joint()) else {
            continue;
        };

        let parent_body = nodes[parent].body();
        let mut builder = RowBuilder::new(dt, params, node.body(), parent_body);
        joint.build_rows(&mut builder);

        if builder.overflowed() {
            first_error.get_or_insert(VehicleError::TooManyRows(handle));
        }

        let rows = builder.into_rows();
        let body1 = ws.parents[i].unwrap_or(i);
        let info = push_joint_rows(ws, params, joint, rows, i, body1);

        if info.count == 0 {
            first_error.get_or_insert(VehicleError::EmptyJoint(handle));
        } else if info.dof == 0 {
            first_error.get_or_insert(VehicleError::NoPrimaryRow(handle));
        }

        ws.tree_joints[i] = info;
    }

    for (handle, loop_joint) in loop_joints.iter() {
        if !loop_joint.enabled {
            ws.loop_joints.push(JointRows::default());
            continue;
        }

        let states = body_state(nodes, externals, loop_joint.body0).and_then(|b0| {
            body_state(nodes, externals, loop_joint.body1).map(|b1| (b0, b1))
        });
        let indices = body_index(nodes, num_nodes, loop_joint.body0).and_then(|b0| {
            body_index(nodes, num_nodes, loop_joint.body1).map(|b1| (b0, b1))
        });

        let ((state0, state1), (body0, body1)) = match (states, indices) {
            (Ok(states), Ok(indices)) => (states, indices),
            (Err(e), _) | (_, Err(e)) => {
                first_error.get_or_insert(e);
                ws.loop_joints.push(JointRows::default());
                continue;
            }
        };

        let mut builder = RowBuilder::new(dt, params, state0, state1);
        loop_joint.joint.build_rows(&mut builder);

        if builder.overflowed() {
            first_error.get_or_insert(VehicleError::TooManyLoopRows(handle));
        }

        let rows = builder.into_rows();
        let mut info = push_joint_rows(ws, params, &loop_joint.joint, rows, body0, body1);
        // Every row of a loop joint belongs to the auxiliary system.
        info.dof = 0;
        for (k, source) in info.source.iter_mut().enumerate() {
            *source = k;
        }

        if info.count == 0 {
            first_error.get_or_insert(VehicleError::EmptyLoopJoint(handle));
        }

        ws.loop_joints.push(info);
    }

    first_error
}

fn push_joint_rows(
    ws: &mut SolverWorkspace,
    params: &SolverParameters,
    joint: &BilateralJoint,
    mut rows: ArrayVec<ConstraintRow, MAX_JOINT_ROWS>,
    body0: usize,
    body1: usize,
) -> JointRows {
    let count = rows.len();
    let (b0, b1) = (&ws.bodies[body0], &ws.bodies[body1]);

    for (k, row) in rows.iter_mut().enumerate() {
        if row.normal_row.map_or(false, |n| n >= count || n == k) {
            row.normal_row = None;
        }

        if let Some(FrictionCallback::Ellipse {
            longitudinal_row, ..
        }) = row.friction_callback
        {
            if longitudinal_row >= count || longitudinal_row == k || row.normal_row.is_none() {
                row.friction_callback = None;
            }
        }

        let inv_mass = effective_inv_mass(
            &row.jacobians,
            b0.inv_mass,
            &b0.inv_inertia,
            b1.inv_mass,
            &b1.inv_inertia,
        );
        row.diag_damp = inv_mass * params.diag_damp_coefficient + row.regularizer;
    }

    seed_forces(&mut rows, &joint.feedback, params.warmstart_coefficient);

    let mut info = JointRows {
        start: ws.rows.len(),
        count,
        body0,
        body1,
        ..JointRows::default()
    };

    for (k, row) in rows.iter().enumerate() {
        if row.is_unbounded() {
            info.source[info.dof] = k;
            info.dof += 1;
        }
    }

    let mut next = info.dof;
    for (k, row) in rows.iter().enumerate() {
        if !row.is_unbounded() {
            info.source[next] = k;
            next += 1;
        }
    }

    ws.rows.extend(rows);
    info
}

/// Seeds the force of every row from the feedback of the last update, clamped to its bounds.
///
/// Rows without bound scaling are seeded first, so that the scaled bounds of the other rows read
/// the seed of the row they reference.
fn seed_forces(rows: &mut [ConstraintRow], feedback: &[Real; MAX_JOINT_ROWS], weight: Real) {
    for (row, feedback) in rows.iter_mut().zip(feedback.iter()) {
        if row.normal_row.is_none() {
            row.force = utils::clamp(feedback * weight, row.low, row.high);
        }
    }

    for k in 0..rows.len() {
        if let Some(n) = rows[k].normal_row {
            let scale = rows[n].force;
            let row = &mut rows[k];
            row.force = utils::clamp(feedback[k] * weight, row.low * scale, row.high * scale);
        }
    }
}

#[cfg(test)]
mod test {
    use super::seed_forces;
    use crate::dynamics::{ConstraintRow, MAX_FRICTION_BOUND};

    #[test]
    fn seeds_are_clamped_to_the_scaled_bounds() {
        let mut rows = [ConstraintRow::default(); 3];
        rows[0].set_bounds(0.0, MAX_FRICTION_BOUND);
        rows[1].set_bounds(-0.5, 0.5);
        rows[1].normal_row = Some(0);
        rows[2].set_bounds(-1.0, 2.0);

        let feedback = [-10.0, 300.0, 5.0, 0.0, 0.0, 0.0];
        seed_forces(&mut rows, &feedback, 0.5);
        assert_eq!(rows[0].force, 0.0);
        assert_eq!(rows[1].force, 0.0);
        assert_eq!(rows[2].force, 2.0);

        let feedback = [100.0, 300.0, -5.0, 0.0, 0.0, 0.0];
        seed_forces(&mut rows, &feedback, 0.5);
        assert_eq!(rows[0].force, 50.0);
        assert_eq!(rows[1].force, 25.0);
        assert_eq!(rows[2].force, -1.0);
    }
}
