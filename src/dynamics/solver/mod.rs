//! The vehicle solver: tree factorization plus a blocked LCP for the auxiliary rows.

pub(crate) use self::vehicle_solver::{check_constraints, solve_constraints};

mod auxiliary_assembly;
mod factorization;
mod lcp;
mod row_assembly;
mod spatial;
mod substitution;
pub(crate) mod topology;
mod vehicle_solver;
mod workspace;

#[cfg(test)]
pub(crate) mod test_util {
    use super::workspace::SolverWorkspace;
    use super::{auxiliary_assembly, factorization, row_assembly};
    use crate::dynamics::{HingeJoint, RigidBodyState, SolverParameters};
    use crate::math::{Point, Real, Vector};
    use crate::vehicle::{ExternalBodySet, LoopJointSet, NodeSet};

    /// A factorized chain of `n` dynamic bodies linked by hinges with alternating axes.
    pub fn chain_workspace(n: usize) -> SolverWorkspace {
        let mut nodes = NodeSet::new();
        let root = nodes.insert(RigidBodyState::dynamic(2.0, Vector::new(1.0, 2.0, 3.0)));
        let mut parent = root;

        for i in 1..n {
            let child = nodes.insert(
                RigidBodyState::dynamic(1.0 + i as Real * 0.5, Vector::repeat(0.5))
                    .with_translation(Vector::new(i as Real, 0.0, 0.0)),
            );
            let axis = if i % 2 == 0 {
                Vector::y_axis()
            } else {
                Vector::z_axis()
            };
            let hinge = HingeJoint::new(
                Point::new(-0.5, 0.0, 0.0),
                Point::new(0.5, 0.0, 0.0),
                axis,
                axis,
            );
            nodes.attach(child, parent, hinge).unwrap();
            parent = child;
        }

        let mut ws = SolverWorkspace::default();
        let externals = ExternalBodySet::new();
        let params = SolverParameters::default();
        row_assembly::prepare(&mut ws, &mut nodes, root, &externals);
        assert!(row_assembly::build_rows(
            &mut ws,
            1.0 / 60.0,
            &params,
            &nodes,
            &externals,
            &LoopJointSet::new()
        )
        .is_none());
        auxiliary_assembly::partition_rows(&mut ws);
        let report = factorization::factorize(&mut ws, params.singular_pivot_tolerance);
        assert_eq!(report, factorization::FactorizationReport::default());
        ws
    }
}
