use crate::counters::Counters;
use crate::dynamics::solver::solve_constraints;
use crate::dynamics::{
    JointKind, RigidBodyState, SolverParameters, TireContactJoint, TireFrame,
    TireFrictionModel, TireSuspensionJoint,
};
use crate::error::VehicleError;
use crate::math::{Point, Real, UnitVector, Vector};
use crate::vehicle::tire::filter_contacts;
use crate::vehicle::{
    BodyRef, ExternalBodySet, ExternalHandle, LoopJoint, LoopJointHandle, LoopJointSet,
    NodeHandle, NodeSet, TireContactPoint, TireTelemetry, VehicleNode, MAX_TIRE_CONTACTS,
};
use arrayvec::ArrayVec;

/// Index of the suspension row among the rows of a tire suspension joint.
const SUSPENSION_ROW: usize = 4;

#[derive(Clone, Debug)]
struct TireSlots {
    node: NodeHandle,
    // Contact slots keep their loop joint, and its feedback, from one update to the next.
    contacts: ArrayVec<LoopJointHandle, MAX_TIRE_CONTACTS>,
    num_active: usize,
    // Friction settings copied into every contact of this tire.
    contact_template: TireContactJoint,
    telemetry: TireTelemetry,
}

#[derive(Copy, Clone, Debug)]
struct DifferentialSlot {
    node: NodeHandle,
    torque: Real,
}

/// An articulated vehicle: a tree of rigid bodies rooted at the chassis, the bodies it touches,
/// and the joints between all of them.
///
/// A vehicle is created by [`VehicleAssembly::build`](crate::vehicle::VehicleAssembly::build) or
/// [`VehicleBuilder::build`](crate::vehicle::VehicleBuilder::build), which validate it once and
/// for all: [`Vehicle::update`] never fails.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The parameters of the solver.
    pub params: SolverParameters,
    /// Timings and statistics of the last update.
    pub counters: Counters,
    nodes: NodeSet,
    root: NodeHandle,
    externals: ExternalBodySet,
    loop_joints: LoopJointSet,
    tires: Vec<TireSlots>,
    differentials: Vec<DifferentialSlot>,
}

impl Vehicle {
    pub(crate) fn new(
        params: SolverParameters,
        nodes: NodeSet,
        root: NodeHandle,
        externals: ExternalBodySet,
        loop_joints: LoopJointSet,
    ) -> Self {
        let mut tires = Vec::new();
        let mut differentials = Vec::new();

        for (handle, node) in nodes.iter() {
            let Some(joint) = node.joint() else {
                continue;
            };

            if joint.kind.as_tire_suspension().is_some() {
                tires.push(TireSlots {
                    node: handle,
                    contacts: ArrayVec::new(),
                    num_active: 0,
                    contact_template: TireContactJoint::new(
                        Point::origin(),
                        Vector::y_axis(),
                        0.0,
                    ),
                    telemetry: TireTelemetry::default(),
                });
            } else if joint.kind.as_differential().is_some() {
                differentials.push(DifferentialSlot {
                    node: handle,
                    torque: 0.0,
                });
            }
        }

        Self {
            params,
            counters: Counters::default(),
            nodes,
            root,
            externals,
            loop_joints,
            tires,
            differentials,
        }
    }

    /// The nodes of this vehicle.
    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    /// The root node of this vehicle, typically its chassis.
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    /// Gets the node with the given handle.
    pub fn node(&self, handle: NodeHandle) -> Option<&VehicleNode> {
        self.nodes.get(handle)
    }

    /// Gets the rigid body of the given node.
    pub fn body(&self, handle: NodeHandle) -> Option<&RigidBodyState> {
        self.nodes.get(handle).map(|node| node.body())
    }

    /// Gets the mutable rigid body of the given node.
    ///
    /// This is how the integrator writes back the new positions and velocities.
    pub fn body_mut(&mut self, handle: NodeHandle) -> Option<&mut RigidBodyState> {
        self.nodes.get_mut(handle).map(|node| node.body_mut())
    }

    /// The bodies outside of the vehicle tree.
    pub fn external_bodies(&self) -> &ExternalBodySet {
        &self.externals
    }

    /// Gets the mutable external body with the given handle.
    pub fn external_body_mut(&mut self, handle: ExternalHandle) -> Option<&mut RigidBodyState> {
        self.externals.get_mut(handle)
    }

    /// The loop joints of this vehicle, including the contact slots of its tires.
    pub fn loop_joints(&self) -> &LoopJointSet {
        &self.loop_joints
    }

    /// The forces of the rows of the joint attaching the given node to its parent, at the last
    /// update.
    pub fn joint_feedback(&self, handle: NodeHandle) -> Option<&[Real]> {
        self.nodes
            .get(handle)
            .and_then(|node| node.joint())
            .map(|joint| joint.feedback())
    }

    /// The forces of the rows of the given loop joint, at the last update.
    pub fn loop_joint_feedback(&self, handle: LoopJointHandle) -> Option<&[Real]> {
        self.loop_joints
            .get(handle)
            .map(|joint| joint.joint.feedback())
    }

    /// The nodes of the tires of this vehicle.
    pub fn tires(&self) -> impl ExactSizeIterator<Item = NodeHandle> + '_ {
        self.tires.iter().map(|slots| slots.node)
    }

    /// The nodes of the differentials of this vehicle.
    pub fn differentials(&self) -> impl ExactSizeIterator<Item = NodeHandle> + '_ {
        self.differentials.iter().map(|slot| slot.node)
    }

    /// What happened to the given tire during the last update.
    pub fn tire_telemetry(&self, tire: NodeHandle) -> Result<&TireTelemetry, VehicleError> {
        let i = self.tire_index(tire)?;
        Ok(&self.tires[i].telemetry)
    }

    /// The loop joints of the contacts of the given tire that are active for the next update.
    pub fn tire_contacts(&self, tire: NodeHandle) -> Result<&[LoopJointHandle], VehicleError> {
        let i = self.tire_index(tire)?;
        let slots = &self.tires[i];
        Ok(&slots.contacts[..slots.num_active])
    }

    /// The suspension joint of the given tire.
    pub fn tire_suspension(&self, tire: NodeHandle) -> Result<&TireSuspensionJoint, VehicleError> {
        self.nodes
            .get(tire)
            .and_then(|node| node.joint())
            .and_then(|joint| joint.kind.as_tire_suspension())
            .ok_or(VehicleError::NotATire(tire))
    }

    /// The mutable suspension joint of the given tire.
    pub fn tire_suspension_mut(
        &mut self,
        tire: NodeHandle,
    ) -> Result<&mut TireSuspensionJoint, VehicleError> {
        self.nodes
            .get_mut(tire)
            .and_then(|node| node.joint_mut())
            .and_then(|joint| joint.kind.as_tire_suspension_mut())
            .ok_or(VehicleError::NotATire(tire))
    }

    /// Sets the steering angle of the given tire, about its suspension axis.
    pub fn set_steering_angle(&mut self, tire: NodeHandle, angle: Real) -> Result<(), VehicleError> {
        self.tire_suspension_mut(tire)?.steering_angle = angle;
        Ok(())
    }

    /// Sets the brake torque applied on the given tire during the next update only.
    pub fn set_brake_torque(&mut self, tire: NodeHandle, torque: Real) -> Result<(), VehicleError> {
        self.tire_suspension_mut(tire)?.brake_torque = torque.abs();
        Ok(())
    }

    /// Sets the friction of the contacts of the given tire, used from the next call to
    /// [`Vehicle::set_tire_contacts`].
    pub fn set_tire_friction(
        &mut self,
        tire: NodeHandle,
        longitudinal_friction: Real,
        lateral_friction: Real,
        friction_model: TireFrictionModel,
    ) -> Result<(), VehicleError> {
        let i = self.tire_index(tire)?;
        let template = &mut self.tires[i].contact_template;
        template.longitudinal_friction = longitudinal_friction;
        template.lateral_friction = lateral_friction;
        template.friction_model = friction_model;
        Ok(())
    }

    /// Sets the engine torque driving the given differential about its spin axis.
    ///
    /// The torque is applied at every update until it is changed, and its reaction is applied
    /// on the parent of the differential.
    pub fn set_differential_torque(
        &mut self,
        differential: NodeHandle,
        torque: Real,
    ) -> Result<(), VehicleError> {
        let slot = self
            .differentials
            .iter_mut()
            .find(|slot| slot.node == differential)
            .ok_or(VehicleError::NotADifferential(differential))?;
        slot.torque = torque;
        Ok(())
    }

    /// Replaces the contacts of the given tire with `body`.
    ///
    /// At most [`MAX_TIRE_CONTACTS`] contacts are kept, sorted by the alignment of their normal
    /// with the suspension axis. Contacts closer than `sqrt(3.0e-2)` to another one are merged.
    /// The contact in the i-th slot starts from the force solved for the i-th slot at the last
    /// update.
    pub fn set_tire_contacts(
        &mut self,
        tire: NodeHandle,
        body: impl Into<BodyRef>,
        contacts: &[TireContactPoint],
    ) -> Result<(), VehicleError> {
        let body = body.into();
        match body {
            BodyRef::Node(node) if node == tire => return Err(VehicleError::SelfAttachment(tire)),
            BodyRef::Node(node) if !self.nodes.contains(node) => {
                return Err(VehicleError::InvalidNode(node))
            }
            BodyRef::External(external) if !self.externals.contains(external) => {
                return Err(VehicleError::InvalidExternalBody(external))
            }
            _ => {}
        }

        let i = self.tire_index(tire)?;
        if contacts.iter().any(|contact| !contact.is_valid()) {
            return Err(VehicleError::InvalidContact);
        }

        let frame = tire_frame(&self.nodes, tire).ok_or(VehicleError::NotATire(tire))?;
        let normalized: Vec<_> = contacts
            .iter()
            .map(|contact| TireContactPoint {
                normal: contact.normal.normalize(),
                ..*contact
            })
            .collect();
        let filtered = filter_contacts(&normalized, &frame.suspension);

        let slots = &mut self.tires[i];
        for (k, contact) in filtered.iter().enumerate() {
            let joint = TireContactJoint {
                point: contact.point,
                normal: UnitVector::new_unchecked(contact.normal),
                penetration: contact.penetration,
                pin: frame.pin,
                suspension: frame.suspension,
                ..slots.contact_template
            };

            match slots.contacts.get(k) {
                Some(handle) => {
                    let loop_joint = &mut self.loop_joints[*handle];
                    loop_joint.body1 = body;
                    loop_joint.enabled = true;
                    loop_joint.joint.kind = joint.into();
                }
                None => {
                    let handle = self.loop_joints.insert(LoopJoint::new(
                        BodyRef::Node(tire),
                        body,
                        joint,
                    ));
                    slots.contacts.push(handle);
                }
            }
        }

        for handle in &slots.contacts[filtered.len()..] {
            let loop_joint = &mut self.loop_joints[*handle];
            loop_joint.enabled = false;
            loop_joint.joint.reset_feedback();
        }

        slots.num_active = filtered.len();
        Ok(())
    }

    /// Removes every contact of the given tire.
    pub fn clear_tire_contacts(&mut self, tire: NodeHandle) -> Result<(), VehicleError> {
        let i = self.tire_index(tire)?;
        let slots = &mut self.tires[i];

        for handle in &slots.contacts {
            let loop_joint = &mut self.loop_joints[*handle];
            loop_joint.enabled = false;
            loop_joint.joint.reset_feedback();
        }

        slots.num_active = 0;
        Ok(())
    }

    /// Computes the constraint forces of this vehicle for a timestep of length `dt`.
    ///
    /// The force and torque accumulators of every body are reset to gravity plus the user forces
    /// (and the differential torques), then the constraint reactions are added to them. Positions
    /// and velocities are left untouched: integrating the resulting forces is up to the caller.
    pub fn update(&mut self, dt: Real) {
        self.counters.reset();
        self.counters.step_started();

        self.apply_external_forces();
        refresh_loop_joint_frames(&self.nodes, &mut self.loop_joints);
        self.record_suspensions();

        solve_constraints(
            dt,
            &self.params,
            &mut self.nodes,
            self.root,
            &mut self.externals,
            &mut self.loop_joints,
            &mut self.counters,
        );

        self.record_contact_loads();
        self.counters.step_completed();
    }

    fn tire_index(&self, tire: NodeHandle) -> Result<usize, VehicleError> {
        self.tires
            .iter()
            .position(|slots| slots.node == tire)
            .ok_or(VehicleError::NotATire(tire))
    }

    fn apply_external_forces(&mut self) {
        let gravity = self.params.gravity;

        for (_, node) in self.nodes.iter_mut() {
            node.body.reset_forces(&gravity);
        }

        for (_, body) in self.externals.iter_mut() {
            body.reset_forces(&gravity);
        }

        for slot in &self.differentials {
            let node = &self.nodes[slot.node];
            let (Some(parent), Some(differential)) = (
                node.parent(),
                node.joint().and_then(|joint| joint.kind.as_differential()),
            ) else {
                continue;
            };

            let chassis_rotation = self.nodes[parent].body.position.rotation;
            let torque = differential.axes(&chassis_rotation).spin * slot.torque;
            self.nodes[slot.node].body.torque += torque;
            self.nodes[parent].body.torque -= torque;
        }
    }

    fn record_suspensions(&mut self) {
        for slots in &mut self.tires {
            let node = &self.nodes[slots.node];
            let (Some(parent), Some(suspension)) = (
                node.parent(),
                node.joint().and_then(|joint| joint.kind.as_tire_suspension()),
            ) else {
                continue;
            };

            let chassis = self.nodes[parent].body();
            slots.telemetry.suspension = suspension.suspension_state(node.body(), chassis);
            slots.telemetry.rolling_resistance = suspension.rolling_resistance(node.body());
        }
    }

    fn record_contact_loads(&mut self) {
        for slots in &mut self.tires {
            let mut loads = [0.0; MAX_TIRE_CONTACTS];
            for (load, handle) in loads.iter_mut().zip(&slots.contacts[..slots.num_active]) {
                *load = self.loop_joints[*handle]
                    .joint
                    .feedback()
                    .first()
                    .copied()
                    .unwrap_or(0.0);
            }

            let max_load = loads.iter().copied().fold(0.0, Real::max);
            slots.telemetry.contact_loads = loads;
            slots.telemetry.num_contacts = slots.num_active;

            let node = &mut self.nodes[slots.node];
            let Some(joint) = node.joint.as_mut() else {
                continue;
            };
            slots.telemetry.suspension_force =
                joint.feedback().get(SUSPENSION_ROW).copied().unwrap_or(0.0);

            if let Some(suspension) = joint.kind.as_tire_suspension_mut() {
                suspension.contact_load = max_load;
                // Brakes only act during one update.
                suspension.brake_torque = 0.0;
            }
        }
    }
}

/// The frame of a tire, given the current position of its parent.
fn tire_frame(nodes: &NodeSet, tire: NodeHandle) -> Option<TireFrame> {
    let node = nodes.get(tire)?;
    let suspension = node.joint()?.kind.as_tire_suspension()?;
    let chassis = nodes.get(node.parent()?)?;
    Some(suspension.frame(chassis.body()))
}

/// Updates the loop joints whose rows depend on the current pose of bodies other than the two
/// they connect: tire contacts follow the frame of their tire, differential axles follow the
/// orientation of the chassis.
pub(crate) fn refresh_loop_joint_frames(nodes: &NodeSet, loop_joints: &mut LoopJointSet) {
    for (_, loop_joint) in loop_joints.iter_mut() {
        if !loop_joint.enabled {
            continue;
        }

        match (&mut loop_joint.joint.kind, loop_joint.body0, loop_joint.body1) {
            (JointKind::TireContact(contact), BodyRef::Node(tire), _) => {
                if let Some(frame) = tire_frame(nodes, tire) {
                    contact.pin = frame.pin;
                    contact.suspension = frame.suspension;
                }
            }
            (JointKind::DifferentialAxle(axle), _, BodyRef::Node(differential)) => {
                let chassis = nodes
                    .get(differential)
                    .and_then(|node| node.parent())
                    .and_then(|parent| nodes.get(parent));
                if let Some(chassis) = chassis {
                    axle.chassis_rotation = chassis.body().position.rotation;
                }
            }
            _ => {}
        }
    }
}
