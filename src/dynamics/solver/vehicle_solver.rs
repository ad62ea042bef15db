use super::auxiliary_assembly::{self, AuxiliarySystem};
use super::factorization;
use super::lcp::LcpStats;
use super::row_assembly;
use super::workspace::{JointRows, RowRef, SolverBody, SolverWorkspace};
use crate::counters::Counters;
use crate::dynamics::{BilateralJoint, ConstraintRow, SolverParameters};
use crate::error::VehicleError;
use crate::math::Real;
use crate::vehicle::{ExternalBodySet, LoopJointSet, NodeHandle, NodeSet};
use na::DVector;

/// Computes the constraint forces of a vehicle for one update of length `dt`.
///
/// The force and torque accumulators of every body must contain the external forces. Once this
/// returns, they contain the external forces plus the constraint reactions, and every joint
/// holds the forces of its rows as feedback. The tree must have been validated.
pub(crate) fn solve_constraints(
    dt: Real,
    params: &SolverParameters,
    nodes: &mut NodeSet,
    root: NodeHandle,
    externals: &mut ExternalBodySet,
    loop_joints: &mut LoopJointSet,
    counters: &mut Counters,
) {
    let mut ws = SolverWorkspace::default();

    counters.row_build_started();
    row_assembly::prepare(&mut ws, nodes, root, externals);
    if let Some(err) =
        row_assembly::build_rows(&mut ws, dt, params, nodes, externals, loop_joints)
    {
        log::warn!("invalid joint rows: {}", err);
    }
    counters.row_build_completed();

    counters.factorization_started();
    let report = factorization::factorize(&mut ws, Real::EPSILON);
    if let Some(i) = report.degenerate_body {
        log::warn!(
            "singular articulated mass at the node {:?}, it won't move during this update",
            ws.order[i]
        );
    }
    if let Some(i) = report.degenerate_joint {
        log::warn!(
            "singular joint mass at the node {:?}, its joint is treated as massless",
            ws.order[i]
        );
    }
    counters.factorization_completed();

    counters.auxiliary_assembly_started();
    auxiliary_assembly::partition_rows(&mut ws);
    auxiliary_assembly::open_loop_rhs(&mut ws);
    let mut forces = DVector::zeros(ws.primary.len());
    auxiliary_assembly::solve_tree(&mut ws, 0, forces.as_mut_slice());
    let system = (!ws.aux.is_empty())
        .then(|| auxiliary_assembly::assemble(&mut ws, params, &forces));
    counters.auxiliary_assembly_completed();

    counters.lcp_started();
    let (aux_forces, stats) = match system {
        Some(AuxiliarySystem { mut lcp, deltas }) => {
            let stats = lcp.solve(params);
            // Add the primary forces induced by the auxiliary forces.
            forces.gemv_tr(1.0, &deltas, &lcp.x, 1.0);
            (lcp.x, stats)
        }
        None => (DVector::zeros(0), LcpStats::default()),
    };
    counters.lcp_completed();

    counters.writeback_started();
    apply_forces(&mut ws.rows, &mut ws.bodies, &ws.primary, forces.as_slice());
    apply_forces(&mut ws.rows, &mut ws.bodies, &ws.aux, aux_forces.as_slice());
    write_back(&ws, nodes, externals, loop_joints);
    counters.writeback_completed();

    let solver = &mut counters.solver;
    solver.nrows = ws.rows.len();
    solver.nprimary_rows = ws.primary.len();
    solver.nauxiliary_rows = ws.aux.len();
    solver.cholesky_block_size = stats.cholesky_block;
    solver.sor_iterations = stats.iterations;
    solver.sor_residual = stats.residual;

    log::debug!(
        "vehicle update: {} nodes, {} rows ({} primary, {} auxiliary), Cholesky block {}, {} SOR iterations, residual {}",
        ws.num_nodes(),
        ws.rows.len(),
        ws.primary.len(),
        ws.aux.len(),
        stats.cholesky_block,
        stats.iterations,
        stats.residual
    );
}

/// Builds the rows and factorizes the tree once, without solving anything, and reports the first
/// configuration problem found.
///
/// The nodes' topological indices are updated, nothing else is modified.
pub(crate) fn check_constraints(
    dt: Real,
    params: &SolverParameters,
    nodes: &mut NodeSet,
    root: NodeHandle,
    externals: &ExternalBodySet,
    loop_joints: &LoopJointSet,
) -> Result<(), VehicleError> {
    let mut ws = SolverWorkspace::default();
    row_assembly::prepare(&mut ws, nodes, root, externals);

    if let Some(err) = row_assembly::build_rows(&mut ws, dt, params, nodes, externals, loop_joints)
    {
        return Err(err);
    }

    let report = factorization::factorize(&mut ws, params.singular_pivot_tolerance);
    match report.degenerate_joint {
        Some(i) => Err(VehicleError::DegenerateJoint(ws.order[i])),
        None => Ok(()),
    }
}

fn apply_forces(
    rows: &mut [ConstraintRow],
    bodies: &mut [SolverBody],
    refs: &[RowRef],
    forces: &[Real],
) {
    for (r, force) in refs.iter().zip(forces.iter()) {
        let row = &mut rows[r.row];
        row.force = *force;
        bodies[r.body0].apply(&row.jacobians.jacobian0, *force);
        bodies[r.body1].apply(&row.jacobians.jacobian1, *force);
    }
}

fn write_feedback(ws: &SolverWorkspace, info: &JointRows, joint: &mut BilateralJoint) {
    joint.reset_feedback();
    for (feedback, row) in joint.feedback.iter_mut().zip(&ws.rows[info.range()]) {
        *feedback = row.force;
    }
    joint.row_count = info.count;
    joint.primary_dof = info.dof;
    joint.start = info.start;
}

fn write_back(
    ws: &SolverWorkspace,
    nodes: &mut NodeSet,
    externals: &mut ExternalBodySet,
    loop_joints: &mut LoopJointSet,
) {
    for (i, handle) in ws.order.iter().enumerate() {
        let node = &mut nodes[*handle];
        let body = &ws.bodies[i];
        node.body.force = body.force;
        node.body.torque = body.torque;

        if let Some(joint) = &mut node.joint {
            write_feedback(ws, &ws.tree_joints[i], joint);
        }
    }

    let num_nodes = ws.num_nodes();
    for (i, (_, state)) in externals.iter_mut().enumerate() {
        let body = &ws.bodies[num_nodes + i];
        state.force = body.force;
        state.torque = body.torque;
    }

    for ((_, loop_joint), info) in loop_joints.iter_mut().zip(ws.loop_joints.iter()) {
        write_feedback(ws, info, &mut loop_joint.joint);
    }
}

#[cfg(test)]
mod test {
    use super::solve_constraints;
    use crate::counters::Counters;
    use crate::dynamics::{GenericJoint, HingeJoint, RigidBodyState, SolverParameters};
    use crate::math::{Point, Real, Vector};
    use crate::vehicle::{ExternalBodySet, LoopJointSet, NodeSet};
    use approx::assert_relative_eq;

    // A static body inside the tree holds its parent through the regularized rows of their
    // joint, so the parent keeps a small fraction of its applied force.
    #[cfg(feature = "f64")]
    const STATIC_MOUNT_TOLERANCE: Real = 1.0e-4;
    #[cfg(not(feature = "f64"))]
    const STATIC_MOUNT_TOLERANCE: Real = 1.0e-1;

    #[test]
    fn pendulum_hinge_force() {
        let mut nodes = NodeSet::new();
        let root = nodes.insert(RigidBodyState::fixed());
        let bob = nodes.insert(
            RigidBodyState::dynamic(1.0, Vector::repeat(1.0))
                .with_translation(Vector::new(1.0, 0.0, 0.0)),
        );
        let hinge = HingeJoint::new(
            Point::new(-1.0, 0.0, 0.0),
            Point::origin(),
            Vector::z_axis(),
            Vector::z_axis(),
        );
        nodes.attach(bob, root, hinge).unwrap();
        let tau: Real = 3.0;
        nodes[bob].body.torque = Vector::z() * tau;

        let params = SolverParameters {
            gravity: Vector::zeros(),
            ..SolverParameters::default()
        };
        let mut externals = ExternalBodySet::new();
        let mut loops = LoopJointSet::new();
        let mut counters = Counters::default();
        solve_constraints(
            1.0 / 60.0,
            &params,
            &mut nodes,
            root,
            &mut externals,
            &mut loops,
            &mut counters,
        );

        // With the pivot at unit distance from the center of mass, half of the torque goes into
        // the hinge reaction: (1 + m r² / I)⁻¹ τ.
        let body = nodes[bob].body();
        assert_relative_eq!(body.force, Vector::new(0.0, tau * 0.5, 0.0), epsilon = 1.0e-3);
        assert_relative_eq!(body.torque, Vector::new(0.0, 0.0, tau * 0.5), epsilon = 1.0e-3);

        let joint = nodes[bob].joint().unwrap();
        assert_eq!(joint.row_count(), 5);
        assert_eq!(joint.primary_dof(), 5);
        assert_relative_eq!(joint.feedback()[1], tau * 0.5, epsilon = 1.0e-3);
        assert_eq!(counters.solver.nauxiliary_rows, 0);
    }

    #[test]
    fn static_mount_inside_the_tree_pins_its_parent() {
        let mut nodes = NodeSet::new();
        let root = nodes.insert(RigidBodyState::dynamic(1.0, Vector::repeat(1.0)));
        let mount = nodes.insert(RigidBodyState::fixed());
        let bob = nodes.insert(
            RigidBodyState::dynamic(1.0, Vector::repeat(1.0))
                .with_translation(Vector::new(1.0, 0.0, 0.0)),
        );
        nodes.attach(mount, root, GenericJoint::fixed()).unwrap();
        let hinge = HingeJoint::new(
            Point::new(-1.0, 0.0, 0.0),
            Point::origin(),
            Vector::z_axis(),
            Vector::z_axis(),
        );
        nodes.attach(bob, mount, hinge).unwrap();

        let push: Real = 70.0;
        let tau: Real = 3.0;
        nodes[root].body.force = Vector::x() * push;
        nodes[bob].body.torque = Vector::z() * tau;

        let params = SolverParameters {
            gravity: Vector::zeros(),
            ..SolverParameters::default()
        };
        let mut counters = Counters::default();
        solve_constraints(
            1.0 / 60.0,
            &params,
            &mut nodes,
            root,
            &mut ExternalBodySet::new(),
            &mut LoopJointSet::new(),
            &mut counters,
        );

        // The mount reaction cancels the push on the root.
        let root_body = nodes[root].body();
        assert!(root_body.force.norm() <= push * STATIC_MOUNT_TOLERANCE);
        let reaction = nodes[mount].joint().unwrap().feedback();
        assert_eq!(reaction.len(), 6);

        // The bob swings about the mount as if it were hinged to the ground.
        let body = nodes[bob].body();
        assert_relative_eq!(body.force, Vector::new(0.0, tau * 0.5, 0.0), epsilon = 1.0e-3);
        assert_relative_eq!(body.torque, Vector::new(0.0, 0.0, tau * 0.5), epsilon = 1.0e-3);
    }

    #[test]
    fn zero_forces_give_zero_reactions() {
        let mut nodes = NodeSet::new();
        let root = nodes.insert(RigidBodyState::dynamic(10.0, Vector::repeat(3.0)));
        let mut parent = root;
        for i in 0..4 {
            let child = nodes.insert(
                RigidBodyState::dynamic(1.0, Vector::repeat(1.0))
                    .with_translation(Vector::new(i as Real + 1.0, 0.0, 0.0)),
            );
            let hinge = HingeJoint::new(
                Point::new(-0.5, 0.0, 0.0),
                Point::new(0.5, 0.0, 0.0),
                Vector::y_axis(),
                Vector::y_axis(),
            )
            .friction_torque(1.0);
            nodes.attach(child, parent, hinge).unwrap();
            parent = child;
        }

        let mut counters = Counters::default();
        solve_constraints(
            1.0 / 60.0,
            &SolverParameters::default(),
            &mut nodes,
            root,
            &mut ExternalBodySet::new(),
            &mut LoopJointSet::new(),
            &mut counters,
        );

        for (_, node) in nodes.iter() {
            assert_relative_eq!(node.body().force, Vector::zeros(), epsilon = 1.0e-5);
            assert_relative_eq!(node.body().torque, Vector::zeros(), epsilon = 1.0e-5);
        }

        // Partition: every tree row is either primary or auxiliary.
        let solver = counters.solver;
        assert_eq!(solver.nrows, 4 * 6);
        assert_eq!(solver.nprimary_rows, solver.nrows - solver.nauxiliary_rows);
        assert_eq!(solver.nauxiliary_rows, 4);
    }
}
