use crate::dynamics::solver::{check_constraints, topology};
use crate::dynamics::{BilateralJoint, RigidBodyState, SolverParameters};
use crate::error::VehicleError;
use crate::math::Real;
use crate::vehicle::vehicle::refresh_loop_joint_frames;
use crate::vehicle::{
    BodyRef, ExternalBodySet, ExternalHandle, LoopJoint, LoopJointHandle, LoopJointSet,
    NodeHandle, NodeSet, Vehicle,
};

/// The timestep the rows are built with when a vehicle is validated.
///
/// Jacobians don't depend on it, only the bias accelerations do.
const VALIDATION_DT: Real = 1.0 / 60.0;

/// The bodies and joints of a vehicle before it is validated.
///
/// Build the tree with [`VehicleAssembly::insert_body`], [`VehicleAssembly::set_root`] and
/// [`VehicleAssembly::attach`], add the bodies and joints outside of the tree, then call
/// [`VehicleAssembly::build`].
#[derive(Clone, Debug, Default)]
pub struct VehicleAssembly {
    /// The parameters of the solver of the vehicle.
    pub params: SolverParameters,
    nodes: NodeSet,
    root: Option<NodeHandle>,
    externals: ExternalBodySet,
    loop_joints: LoopJointSet,
}

impl VehicleAssembly {
    /// An empty assembly.
    pub fn new() -> Self {
        Self::default()
    }

    /// The nodes inserted so far.
    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    /// The external bodies inserted so far.
    pub fn external_bodies(&self) -> &ExternalBodySet {
        &self.externals
    }

    /// The loop joints inserted so far.
    pub fn loop_joints(&self) -> &LoopJointSet {
        &self.loop_joints
    }

    /// Inserts a detached node.
    pub fn insert_body(&mut self, body: RigidBodyState) -> NodeHandle {
        self.nodes.insert(body)
    }

    /// Sets the root of the tree, typically the chassis.
    pub fn set_root(&mut self, root: NodeHandle) -> Result<(), VehicleError> {
        if !self.nodes.contains(root) {
            return Err(VehicleError::InvalidNode(root));
        }

        self.root = Some(root);
        Ok(())
    }

    /// Attaches `child` to `parent` with the given joint.
    pub fn attach(
        &mut self,
        child: NodeHandle,
        parent: NodeHandle,
        joint: impl Into<BilateralJoint>,
    ) -> Result<(), VehicleError> {
        self.nodes.attach(child, parent, joint)
    }

    /// Inserts a body that is not part of the tree.
    pub fn insert_external_body(&mut self, body: RigidBodyState) -> ExternalHandle {
        self.externals.insert(body)
    }

    /// Inserts a joint between any two bodies, closing a loop in the tree or connecting it to an
    /// external body.
    pub fn insert_loop_joint(
        &mut self,
        body0: impl Into<BodyRef>,
        body1: impl Into<BodyRef>,
        joint: impl Into<BilateralJoint>,
    ) -> LoopJointHandle {
        self.loop_joints
            .insert(LoopJoint::new(body0.into(), body1.into(), joint))
    }

    /// Validates the assembly and turns it into a vehicle ready to be updated.
    ///
    /// The nodes must form a single tree and every joint must produce between one and
    /// [`MAX_JOINT_ROWS`](crate::math::MAX_JOINT_ROWS) rows, with a non-degenerate set of
    /// unbounded rows for the tree joints.
    pub fn build(mut self) -> Result<Vehicle, VehicleError> {
        topology::validate(&self.nodes, self.root)?;
        let root = self.root.ok_or(VehicleError::MissingRoot)?;

        for (handle, loop_joint) in self.loop_joints.iter() {
            for body in [loop_joint.body0, loop_joint.body1] {
                match body {
                    BodyRef::Node(node) if !self.nodes.contains(node) => {
                        return Err(VehicleError::InvalidNode(node))
                    }
                    BodyRef::External(external) if !self.externals.contains(external) => {
                        return Err(VehicleError::InvalidExternalBody(external))
                    }
                    _ => {}
                }
            }

            if loop_joint.body0 == loop_joint.body1 {
                return Err(VehicleError::DegenerateLoopJoint(handle));
            }
        }

        refresh_loop_joint_frames(&self.nodes, &mut self.loop_joints);
        check_constraints(
            VALIDATION_DT,
            &self.params,
            &mut self.nodes,
            root,
            &self.externals,
            &self.loop_joints,
        )?;

        log::debug!(
            "vehicle assembled: {} nodes, {} external bodies, {} loop joints",
            self.nodes.len(),
            self.externals.len(),
            self.loop_joints.len()
        );

        Ok(Vehicle::new(
            self.params,
            self.nodes,
            root,
            self.externals,
            self.loop_joints,
        ))
    }
}
