use crate::dynamics::{ConstraintRow, Jacobian, RigidBodyState};
use crate::math::{Matrix, Real, SpatialMatrix, SpatialVector, Vector, MAX_JOINT_ROWS};
use crate::vehicle::NodeHandle;

/// A force or an acceleration of one node, split between its body space and the joint space of
/// its parent joint.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct NodeVector {
    pub body: SpatialVector<Real>,
    pub joint: SpatialVector<Real>,
}

impl NodeVector {
    pub fn zero() -> Self {
        Self {
            body: SpatialVector::zeros(),
            joint: SpatialVector::zeros(),
        }
    }
}

/// The snapshot of a body taken at the beginning of an update.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct SolverBody {
    pub mass: Real,
    pub inertia: Matrix<Real>,
    pub inv_mass: Real,
    pub inv_inertia: Matrix<Real>,
    /// The external force: the input of the solve, then the output once reactions are added.
    pub force: Vector<Real>,
    pub torque: Vector<Real>,
}

impl SolverBody {
    pub fn from_state(state: &RigidBodyState) -> Self {
        Self {
            mass: state.mass(),
            inertia: state.world_inertia(),
            inv_mass: state.inv_mass(),
            inv_inertia: state.world_inv_inertia(),
            force: state.force,
            torque: state.torque,
        }
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.inv_mass != 0.0
    }

    /// `M⁻¹ Jᵀ`, as a Jacobian.
    #[inline]
    pub fn inv_mass_times(&self, jacobian: &Jacobian) -> Jacobian {
        Jacobian::new(
            jacobian.linear * self.inv_mass,
            self.inv_inertia * jacobian.angular,
        )
    }

    /// The acceleration due to the external force, projected on `jacobian`.
    #[inline]
    pub fn external_accel(&self, jacobian: &Jacobian) -> Real {
        self.inv_mass_times(jacobian).dot(&self.force, &self.torque)
    }

    /// Adds the reaction of a row force to the force accumulators.
    #[inline]
    pub fn apply(&mut self, jacobian: &Jacobian, force: Real) {
        self.force += jacobian.linear * force;
        self.torque += jacobian.angular * force;
    }
}

/// Where the rows of one joint live in the row array of an update.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub(crate) struct JointRows {
    pub start: usize,
    pub count: usize,
    /// The number of primary rows. Always zero for loop joints.
    pub dof: usize,
    /// Joint-local row indices, primary rows first.
    pub source: [usize; MAX_JOINT_ROWS],
    pub body0: usize,
    pub body1: usize,
}

impl JointRows {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.count
    }
}

/// A row taking part in the primary or auxiliary system.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct RowRef {
    pub row: usize,
    /// The first row of the joint this row belongs to.
    pub start: usize,
    pub body0: usize,
    pub body1: usize,
}

/// Where a row ended up after the rows were partitioned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RowSlot {
    Primary(usize),
    Auxiliary(usize),
}

/// The factorization of one node and of its parent joint.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct NodeFactor {
    pub dof: usize,
    pub body_mass: SpatialMatrix<Real>,
    pub inv_body_mass: SpatialMatrix<Real>,
    pub joint_mass: SpatialMatrix<Real>,
    pub inv_joint_mass: SpatialMatrix<Real>,
    /// Body-side Jacobians of the primary rows, premultiplied by the inverse body mass.
    pub body_jt: [SpatialVector<Real>; MAX_JOINT_ROWS],
    /// Parent-side Jacobians of the primary rows, multiplied by the inverse joint mass.
    pub joint_j: [SpatialVector<Real>; MAX_JOINT_ROWS],
}

impl Default for NodeFactor {
    fn default() -> Self {
        Self {
            dof: 0,
            body_mass: SpatialMatrix::zeros(),
            inv_body_mass: SpatialMatrix::zeros(),
            joint_mass: SpatialMatrix::zeros(),
            inv_joint_mass: SpatialMatrix::zeros(),
            body_jt: [SpatialVector::zeros(); MAX_JOINT_ROWS],
            joint_j: [SpatialVector::zeros(); MAX_JOINT_ROWS],
        }
    }
}

/// The scratch memory of one update, sized from the node and row counts of that update.
///
/// Nodes are addressed by their topological index. Bodies are the nodes followed by the external
/// bodies.
#[derive(Clone, Debug, Default)]
pub(crate) struct SolverWorkspace {
    pub order: Vec<NodeHandle>,
    pub parents: Vec<Option<usize>>,
    pub children_offsets: Vec<usize>,
    pub children: Vec<usize>,
    pub bodies: Vec<SolverBody>,
    pub rows: Vec<ConstraintRow>,
    /// The root entry is empty.
    pub tree_joints: Vec<JointRows>,
    pub loop_joints: Vec<JointRows>,
    pub factors: Vec<NodeFactor>,
    pub accel: Vec<NodeVector>,
    pub force: Vec<NodeVector>,
    pub primary: Vec<RowRef>,
    /// Offset of the first primary row of each node in `primary`.
    pub primary_offsets: Vec<usize>,
    pub aux: Vec<RowRef>,
    pub slots: Vec<RowSlot>,
    /// The number of unbounded auxiliary rows, stored first in `aux`.
    pub cholesky_block: usize,
}

impl SolverWorkspace {
    pub fn num_nodes(&self) -> usize {
        self.order.len()
    }

    pub fn children(&self, node: usize) -> &[usize] {
        &self.children[self.children_offsets[node]..self.children_offsets[node + 1]]
    }

    /// Resizes the per-node buffers once the topology is known.
    pub fn resize_nodes(&mut self) {
        let n = self.order.len();
        self.factors.clear();
        self.factors.resize(n, NodeFactor::default());
        self.accel.clear();
        self.accel.resize(n, NodeVector::zero());
        self.force.clear();
        self.force.resize(n, NodeVector::zero());
    }
}
