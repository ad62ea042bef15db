//! Bottom-up reduction of the tree mass matrix.

use super::spatial::{self, body_mass_matrix};
use super::workspace::SolverWorkspace;
use crate::math::{Real, SpatialMatrix, SpatialVector, MAX_JOINT_ROWS, SPATIAL_DIM};

/// The nodes whose matrices could not be inverted during a factorization.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct FactorizationReport {
    /// The first node (topological index) with a singular articulated body mass.
    pub degenerate_body: Option<usize>,
    /// The first node (topological index) whose parent joint has a singular joint mass.
    pub degenerate_joint: Option<usize>,
}

/// Factorizes every node, children first.
///
/// A matrix that cannot be inverted gets a zero inverse: the node (or joint) then behaves as
/// infinitely heavy for this update. The first such node is reported, except for the joints of
/// immovable nodes.
pub(crate) fn factorize(ws: &mut SolverWorkspace, tolerance: Real) -> FactorizationReport {
    let mut report = FactorizationReport::default();

    for i in 0..ws.num_nodes() {
        let body = ws.bodies[i];
        let mut mass = if body.is_dynamic() {
            body_mass_matrix(body.mass, &body.inertia)
        } else {
            SpatialMatrix::zeros()
        };

        let mut factor = ws.factors[i];
        factor.dof = 0;
        factor.joint_mass = SpatialMatrix::zeros();

        if ws.parents[i].is_some() {
            let joint = ws.tree_joints[i];
            factor.dof = joint.dof;

            for k in 0..joint.dof {
                let row = &ws.rows[joint.start + joint.source[k]];
                factor.joint_mass[(k, k)] = -row.diag_damp;
                factor.body_jt[k] = -row.jacobians.jacobian0.as_spatial();
                factor.joint_j[k] = -row.jacobians.jacobian1.as_spatial();
            }
        }

        if body.is_dynamic() {
            for &c in ws.children(i) {
                let child = &ws.factors[c];
                let dof = child.dof;

                // Recover the raw parent-side Jacobian rows, then fold J D⁻¹ Jᵀ in.
                let mut jacobians = [SpatialVector::zeros(); MAX_JOINT_ROWS];
                for (jj, jacobian) in jacobians.iter_mut().enumerate().take(dof) {
                    for k in 0..dof {
                        *jacobian += child.joint_j[k] * child.joint_mass[(k, jj)];
                    }
                }

                for k in 0..dof {
                    mass -= jacobians[k] * child.joint_j[k].transpose();
                }
            }

            factor.inv_body_mass = match spatial::inverse(&mass, SPATIAL_DIM, Real::EPSILON) {
                Some(inv) => inv,
                None => {
                    report.degenerate_body.get_or_insert(i);
                    SpatialMatrix::zeros()
                }
            };
        } else {
            factor.inv_body_mass = SpatialMatrix::zeros();
        }

        factor.body_mass = mass;

        if factor.dof > 0 {
            let dof = factor.dof;
            let mut tmp = [SpatialVector::zeros(); MAX_JOINT_ROWS];

            for k in 0..dof {
                factor.body_jt[k] = factor.inv_body_mass * factor.body_jt[k];
                tmp[k] = mass * factor.body_jt[k];
            }

            for k in 0..dof {
                factor.joint_mass[(k, k)] -= factor.body_jt[k].dot(&tmp[k]);
                for jj in k + 1..dof {
                    let val = -factor.body_jt[k].dot(&tmp[jj]);
                    factor.joint_mass[(k, jj)] = val;
                    factor.joint_mass[(jj, k)] = val;
                }
            }

            factor.inv_joint_mass = match spatial::inverse(&factor.joint_mass, dof, tolerance) {
                Some(inv) => inv,
                None => {
                    // A joint between two immovable bodies has no mass at all.
                    if body.is_dynamic() {
                        report.degenerate_joint.get_or_insert(i);
                    }
                    SpatialMatrix::zeros()
                }
            };

            let raw = factor.joint_j;
            for jj in 0..dof {
                factor.joint_j[jj] = SpatialVector::zeros();
                for k in 0..dof {
                    factor.joint_j[jj] += raw[k] * factor.inv_joint_mass[(k, jj)];
                }
            }
        }

        ws.factors[i] = factor;
    }

    report
}
