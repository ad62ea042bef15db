//! Assembly of the auxiliary system: the bounded rows of the tree joints and every row of the
//! loop joints, with the primary rows eliminated through the tree factorization.

use super::lcp::{BlockedLcp, BoundScale, EllipseFriction, LcpBounds};
use super::substitution::{solve_backward, solve_forward};
use super::workspace::{NodeVector, RowRef, RowSlot, SolverBody, SolverWorkspace};
use crate::dynamics::{ConstraintRow, FrictionCallback, SolverParameters};
use crate::math::Real;
use na::{DMatrix, DVector};

/// The auxiliary system of one update, and what is needed to map its solution back to the
/// primary rows.
pub(crate) struct AuxiliarySystem {
    pub lcp: BlockedLcp,
    /// The primary forces due to a unit force on each auxiliary row (one row per auxiliary row).
    pub deltas: DMatrix<Real>,
}

/// Splits the rows between the primary system and the auxiliary system.
///
/// The auxiliary rows are the bounded rows of the tree joints, in topological order, then the
/// rows of the loop joints. They are stably sorted so that unbounded rows come first.
pub(crate) fn partition_rows(ws: &mut SolverWorkspace) {
    let num_nodes = ws.num_nodes();
    ws.primary.clear();
    ws.primary_offsets.clear();
    ws.aux.clear();

    for i in 0..num_nodes {
        ws.primary_offsets.push(ws.primary.len());
        let joint = ws.tree_joints[i];
        let refs = joint.source[..joint.count].iter().map(|k| RowRef {
            row: joint.start + k,
            start: joint.start,
            body0: joint.body0,
            body1: joint.body1,
        });

        for (k, row) in refs.enumerate() {
            if k < joint.dof {
                ws.primary.push(row);
            } else {
                ws.aux.push(row);
            }
        }
    }
    ws.primary_offsets.push(ws.primary.len());

    for joint in &ws.loop_joints {
        ws.aux.extend(joint.range().map(|row| RowRef {
            row,
            start: joint.start,
            body0: joint.body0,
            body1: joint.body1,
        }));
    }

    let rows = &ws.rows;
    ws.aux.sort_by_key(|r| !rows[r.row].is_unbounded());
    ws.cholesky_block = ws
        .aux
        .iter()
        .take_while(|r| rows[r.row].is_unbounded())
        .count();

    ws.slots.clear();
    ws.slots.resize(ws.rows.len(), RowSlot::Primary(0));
    for (i, r) in ws.primary.iter().enumerate() {
        ws.slots[r.row] = RowSlot::Primary(i);
    }
    for (i, r) in ws.aux.iter().enumerate() {
        ws.slots[r.row] = RowSlot::Auxiliary(i);
    }
}

/// Sets the right-hand side of the open-loop tree solve: the external forces, and the bias
/// accelerations of the primary rows.
pub(crate) fn open_loop_rhs(ws: &mut SolverWorkspace) {
    for i in 0..ws.num_nodes() {
        let body = &ws.bodies[i];
        let joint = &ws.tree_joints[i];
        let accel = &mut ws.accel[i];
        *accel = NodeVector::zero();
        accel.body.fixed_rows_mut::<3>(0).copy_from(&body.force);
        accel.body.fixed_rows_mut::<3>(3).copy_from(&body.torque);

        for k in 0..joint.dof {
            accel.joint[k] = -ws.rows[joint.start + joint.source[k]].coordinate_accel;
        }
    }
}

/// Solves the tree for the current right-hand side and gathers the primary row forces.
pub(crate) fn solve_tree(ws: &mut SolverWorkspace, start: usize, out: &mut [Real]) {
    solve_forward(
        &ws.children_offsets,
        &ws.children,
        &ws.factors,
        &ws.accel,
        &mut ws.force,
        start,
    );
    solve_backward(&ws.parents, &ws.factors, &mut ws.force);

    for i in 0..ws.num_nodes() {
        let offset = ws.primary_offsets[i];
        for k in 0..ws.factors[i].dof {
            out[offset + k] = ws.force[i].joint[k];
        }
    }
}

/// The coupling `J_a M⁻¹ J_bᵀ` of two rows through the bodies they share.
fn coupling(bodies: &[SolverBody], rows: &[ConstraintRow], a: &RowRef, b: &RowRef) -> Real {
    let ja = &rows[a.row].jacobians;
    let jb = &rows[b.row].jacobians;
    let w0 = bodies[a.body0].inv_mass_times(&ja.jacobian0);
    let w1 = bodies[a.body1].inv_mass_times(&ja.jacobian1);
    let mut result = 0.0;

    if a.body0 == b.body0 {
        result += w0.dot_jacobian(&jb.jacobian0);
    } else if a.body0 == b.body1 {
        result += w0.dot_jacobian(&jb.jacobian1);
    }

    if a.body1 == b.body0 {
        result += w1.dot_jacobian(&jb.jacobian0);
    } else if a.body1 == b.body1 {
        result += w1.dot_jacobian(&jb.jacobian1);
    }

    result
}

/// Builds the auxiliary system, given the open-loop primary forces.
pub(crate) fn assemble(
    ws: &mut SolverWorkspace,
    params: &SolverParameters,
    open_loop: &DVector<Real>,
) -> AuxiliarySystem {
    let num_aux = ws.aux.len();
    let num_primary = ws.primary.len();
    let mut lcp = BlockedLcp::new(num_aux, ws.cholesky_block);
    let mut coupling_matrix = DMatrix::zeros(num_aux, num_primary);
    let mut deltas = DMatrix::zeros(num_aux, num_primary);

    for (i, a) in ws.aux.iter().enumerate() {
        let row = &ws.rows[a.row];
        let diag = coupling(&ws.bodies, &ws.rows, a, a) + row.diag_damp;
        lcp.matrix[(i, i)] = diag + row.diag_damp;

        for (j, b) in ws.aux.iter().enumerate().skip(i + 1) {
            let val = coupling(&ws.bodies, &ws.rows, a, b);
            lcp.matrix[(i, j)] = val;
            lcp.matrix[(j, i)] = val;
        }

        for (j, b) in ws.primary.iter().enumerate() {
            coupling_matrix[(i, j)] = coupling(&ws.bodies, &ws.rows, a, b);
        }
    }

    let mut delta = vec![0.0; num_primary];
    for i in 0..num_aux {
        for accel in &mut ws.accel {
            *accel = NodeVector::zero();
        }

        let mut start = None;
        for node in 0..ws.num_nodes() {
            let offset = ws.primary_offsets[node];
            for k in 0..ws.factors[node].dof {
                let val = coupling_matrix[(i, offset + k)];
                if val != 0.0 {
                    ws.accel[node].joint[k] = val;
                    start.get_or_insert(node);
                }
            }
        }

        // Rows coupled with no primary row do not affect the tree.
        if let Some(start) = start {
            solve_tree(ws, start, &mut delta);
            deltas.row_mut(i).copy_from_slice(&delta);
        }
    }

    for i in 0..num_aux {
        let coupling_i = coupling_matrix.row(i);
        let mut diag = lcp.matrix[(i, i)] + coupling_i.dot(&deltas.row(i));
        if diag <= 0.0 {
            log::warn!(
                "non-positive diagonal {} on the auxiliary row {} (constraint row {})",
                diag,
                i,
                ws.aux[i].row
            );
        }
        diag += diag * params.aux_diag_damp_coefficient;
        lcp.matrix[(i, i)] = diag.max(params.aux_min_diag);

        for j in i + 1..num_aux {
            let val = lcp.matrix[(i, j)] + coupling_i.dot(&deltas.row(j));
            lcp.matrix[(i, j)] = val;
            lcp.matrix[(j, i)] = val;
        }
    }

    for (i, a) in ws.aux.iter().enumerate() {
        let row = &ws.rows[a.row];
        let jacobians = &row.jacobians;
        let external_accel = ws.bodies[a.body0].external_accel(&jacobians.jacobian0)
            + ws.bodies[a.body1].external_accel(&jacobians.jacobian1);

        let open_loop_accel = coupling_matrix.row(i).transpose().dot(open_loop);
        lcp.rhs[i] = row.coordinate_accel - external_accel - open_loop_accel;
        lcp.x[i] = row.force;

        let scale = match row.normal_row.map(|n| ws.slots[a.start + n]) {
            None => BoundScale::Unit,
            Some(RowSlot::Auxiliary(p)) => BoundScale::Row(p),
            Some(RowSlot::Primary(p)) => BoundScale::Fixed(open_loop[p]),
        };

        let ellipse = match row.friction_callback {
            Some(FrictionCallback::Ellipse {
                longitudinal_row,
                longitudinal_coefficient,
                lateral_coefficient,
            }) => match ws.slots[a.start + longitudinal_row] {
                RowSlot::Auxiliary(p) => Some(EllipseFriction {
                    longitudinal_row: p,
                    longitudinal_coefficient,
                    lateral_coefficient,
                }),
                RowSlot::Primary(_) => None,
            },
            None => None,
        };

        lcp.bounds[i] = LcpBounds {
            low: row.low,
            high: row.high,
            scale,
            ellipse,
        };
    }

    AuxiliarySystem { lcp, deltas }
}

#[cfg(test)]
mod test {
    use super::{open_loop_rhs, solve_tree};
    use crate::dynamics::solver::test_util::chain_workspace;
    use crate::math::{Real, Vector};
    use approx::assert_relative_eq;

    #[test]
    fn tree_forces_produce_the_row_accelerations() {
        let mut ws = chain_workspace(4);
        let mut rng = oorandom::Rand32::new(7);
        for body in &mut ws.bodies {
            body.force = Vector::from_fn(|_, _| rng.rand_float() as Real - 0.5);
            body.torque = Vector::from_fn(|_, _| rng.rand_float() as Real - 0.5);
        }

        open_loop_rhs(&mut ws);
        let mut forces = vec![0.0; ws.primary.len()];
        solve_tree(&mut ws, 0, &mut forces);

        for (r, f) in ws.primary.iter().zip(&forces) {
            let row = &ws.rows[r.row];
            ws.bodies[r.body0].apply(&row.jacobians.jacobian0, *f);
            ws.bodies[r.body1].apply(&row.jacobians.jacobian1, *f);
        }

        for r in &ws.primary {
            let row = &ws.rows[r.row];
            let accel = ws.bodies[r.body0].external_accel(&row.jacobians.jacobian0)
                + ws.bodies[r.body1].external_accel(&row.jacobians.jacobian1);
            assert_relative_eq!(accel, row.coordinate_accel, epsilon = 1.0e-3);
        }
    }
}
