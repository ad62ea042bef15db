use crate::dynamics::{
    DifferentialAxleJoint, DifferentialJoint, DifferentialMode, RigidBodyState, SolverParameters,
    TireSuspensionJoint,
};
use crate::error::VehicleError;
use crate::math::{Isometry, Point, Real, UnitVector, Vector};
use crate::vehicle::{ExternalHandle, NodeHandle, TireInfo, Vehicle, VehicleAssembly};

/// The description of a differential driving two tires.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DifferentialInfo {
    /// The differential center, in the chassis frame.
    pub location: Point<Real>,
    /// The mass of the differential.
    pub mass: Real,
    /// The principal inertia of the differential.
    pub principal_inertia: Vector<Real>,
    /// The coupling between the two outputs.
    pub mode: DifferentialMode,
    /// The spin axis, in the chassis frame.
    pub spin_axis: UnitVector<Real>,
    /// The chassis forward axis, in the chassis frame.
    pub longitudinal_axis: UnitVector<Real>,
}

impl Default for DifferentialInfo {
    fn default() -> Self {
        Self {
            location: Point::origin(),
            mass: 10.0,
            principal_inertia: Vector::repeat(0.5),
            mode: DifferentialMode::Open,
            spin_axis: Vector::x_axis(),
            longitudinal_axis: Vector::z_axis(),
        }
    }
}

/// A builder of ground vehicles: a chassis, tires on suspensions, and differentials.
///
/// Every body is created at its place relative to the chassis, with the chassis orientation.
#[derive(Clone, Debug)]
pub struct VehicleBuilder {
    assembly: VehicleAssembly,
    chassis: NodeHandle,
    tires: Vec<(NodeHandle, TireInfo)>,
}

impl VehicleBuilder {
    /// Starts a vehicle with the given chassis.
    pub fn new(chassis: RigidBodyState) -> Self {
        let mut assembly = VehicleAssembly::new();
        let chassis = assembly.insert_body(chassis);
        // The chassis was just inserted.
        let _ = assembly.set_root(chassis);

        Self {
            assembly,
            chassis,
            tires: Vec::new(),
        }
    }

    /// Sets the parameters of the solver of the vehicle.
    pub fn params(mut self, params: SolverParameters) -> Self {
        self.assembly.params = params;
        self
    }

    /// The node of the chassis.
    pub fn chassis(&self) -> NodeHandle {
        self.chassis
    }

    fn chassis_position(&self) -> Isometry<Real> {
        self.assembly.nodes()[self.chassis].body().position
    }

    /// Adds a tire, attached to the chassis by a suspension.
    pub fn add_tire(&mut self, info: TireInfo) -> Result<NodeHandle, VehicleError> {
        let chassis = self.chassis_position();
        let position = Isometry::from_parts(
            (chassis * info.location).coords.into(),
            chassis.rotation,
        );
        let body = RigidBodyState::dynamic(info.mass, info.principal_inertia())
            .with_position(position);

        let mut joint = TireSuspensionJoint::new(info.location, info.axle, info.suspension_axis);
        joint.suspension_length = info.suspension_length;
        joint.spring_stiffness = info.spring_stiffness;
        joint.damping_ratio = info.damping_ratio;
        joint.suspension_relaxation = info.suspension_relaxation;

        let tire = self.assembly.insert_body(body);
        self.assembly.attach(tire, self.chassis, joint)?;
        self.tires.push((tire, info));
        Ok(tire)
    }

    /// Adds a differential driving the `left` and `right` tires.
    pub fn add_differential(
        &mut self,
        info: DifferentialInfo,
        left: NodeHandle,
        right: NodeHandle,
    ) -> Result<NodeHandle, VehicleError> {
        let tire_axle = |tire: NodeHandle| {
            self.tires
                .iter()
                .find(|(node, _)| *node == tire)
                .map(|(_, info)| info.axle)
                .ok_or(VehicleError::NotATire(tire))
        };
        let left_axle = tire_axle(left)?;
        let right_axle = tire_axle(right)?;
        if left == right {
            return Err(VehicleError::SelfAttachment(left));
        }

        let chassis = self.chassis_position();
        let position = Isometry::from_parts(
            (chassis * info.location).coords.into(),
            chassis.rotation,
        );
        let body = RigidBodyState::dynamic(info.mass, info.principal_inertia)
            .with_position(position);

        let mut joint = DifferentialJoint::new(info.location, info.spin_axis, info.longitudinal_axis);
        joint.mode = info.mode;

        let differential = self.assembly.insert_body(body);
        self.assembly.attach(differential, self.chassis, joint)?;
        self.assembly.insert_loop_joint(
            left,
            differential,
            DifferentialAxleJoint::new(left_axle, &joint, 1.0),
        );
        self.assembly.insert_loop_joint(
            right,
            differential,
            DifferentialAxleJoint::new(right_axle, &joint, -1.0),
        );

        Ok(differential)
    }

    /// Adds a body outside of the vehicle, typically the ground its tires touch.
    pub fn insert_external_body(&mut self, body: RigidBodyState) -> ExternalHandle {
        self.assembly.insert_external_body(body)
    }

    /// Validates the vehicle.
    pub fn build(self) -> Result<Vehicle, VehicleError> {
        let mut vehicle = self.assembly.build()?;

        for (tire, info) in &self.tires {
            vehicle.set_tire_friction(
                *tire,
                info.longitudinal_friction,
                info.lateral_friction,
                info.friction_model,
            )?;
        }

        Ok(vehicle)
    }
}

#[cfg(test)]
mod test {
    use super::{DifferentialInfo, VehicleBuilder};
    use crate::dynamics::{DifferentialMode, RigidBodyState, TireFrictionModel};
    use crate::error::VehicleError;
    use crate::math::{Point, Real, Vector};
    use crate::vehicle::{ExternalHandle, NodeHandle, TireContactPoint, TireInfo, Vehicle};
    use approx::assert_relative_eq;

    const CHASSIS_MASS: Real = 800.0;
    const TIRE_MASS: Real = 20.0;
    const TIRE_RADIUS: Real = 0.35;

    struct Car {
        vehicle: Vehicle,
        ground: ExternalHandle,
        tires: Vec<NodeHandle>,
        differential: Option<NodeHandle>,
    }

    fn car(differential: Option<DifferentialMode>) -> Car {
        let m = CHASSIS_MASS;
        let chassis = RigidBodyState::dynamic(
            m,
            Vector::new(
                m * (0.36 + 16.0) / 12.0 * 3.0,
                m * (4.0 + 16.0) / 12.0,
                m * (4.0 + 0.36) / 12.0,
            ),
        );
        let mut builder = VehicleBuilder::new(chassis);
        let ground = builder.insert_external_body(RigidBodyState::fixed());

        let mut tires = Vec::new();
        for (x, z) in [(0.8, 1.3), (-0.8, 1.3), (0.8, -1.3), (-0.8, -1.3)] {
            let info = TireInfo {
                location: Point::new(x, -0.4, z),
                mass: TIRE_MASS,
                radius: TIRE_RADIUS,
                suspension_relaxation: 0.0,
                longitudinal_friction: 1000.0,
                lateral_friction: 1000.0,
                friction_model: TireFrictionModel::Box,
                ..TireInfo::default()
            };
            tires.push(builder.add_tire(info).unwrap());
        }

        let differential = differential.map(|mode| {
            let info = DifferentialInfo {
                location: Point::new(0.0, -0.4, -1.3),
                mode,
                ..DifferentialInfo::default()
            };
            builder.add_differential(info, tires[2], tires[3]).unwrap()
        });

        Car {
            vehicle: builder.build().unwrap(),
            ground,
            tires,
            differential,
        }
    }

    fn touch_ground(car: &mut Car) {
        for tire in &car.tires {
            let center = car.vehicle.body(*tire).unwrap().world_com();
            let contact = TireContactPoint::new(
                center - Vector::y() * TIRE_RADIUS,
                Vector::y() * 2.0,
                0.0,
            );
            car.vehicle
                .set_tire_contacts(*tire, car.ground, &[contact])
                .unwrap();
        }
    }

    #[test]
    fn car_at_rest_carries_its_weight() {
        let mut car = car(None);
        touch_ground(&mut car);
        car.vehicle.update(1.0 / 60.0);

        let g = 9.8;
        let load = (CHASSIS_MASS / 4.0 + TIRE_MASS) * g;
        for tire in &car.tires {
            let telemetry = car.vehicle.tire_telemetry(*tire).unwrap();
            assert_eq!(telemetry.num_contacts, 1);
            assert_relative_eq!(telemetry.contact_loads[0], load, max_relative = 1.0e-2);
            assert_relative_eq!(
                car.vehicle.tire_suspension(*tire).unwrap().contact_load(),
                telemetry.contact_loads[0]
            );
        }

        // The chassis is held up by its suspensions and doesn't slide.
        let weight = (CHASSIS_MASS + 4.0 * TIRE_MASS) * g;
        let chassis = car.vehicle.body(car.vehicle.root()).unwrap();
        assert!(chassis.force.x.abs() < weight * 1.0e-2);
        assert!(chassis.force.z.abs() < weight * 1.0e-2);
        assert!(chassis.force.y.abs() < weight * 1.0e-2);
    }

    #[test]
    fn warmstarted_updates_agree() {
        let mut car = car(None);
        touch_ground(&mut car);
        car.vehicle.update(1.0 / 60.0);
        let first: Vec<_> = car
            .tires
            .iter()
            .map(|tire| car.vehicle.tire_telemetry(*tire).unwrap().contact_loads[0])
            .collect();

        touch_ground(&mut car);
        car.vehicle.update(1.0 / 60.0);
        for (tire, load) in car.tires.iter().zip(first) {
            let telemetry = car.vehicle.tire_telemetry(*tire).unwrap();
            assert_relative_eq!(telemetry.contact_loads[0], load, max_relative = 1.0e-2);
        }
    }

    #[test]
    fn airborne_car_falls_freely() {
        let mut car = car(None);
        car.vehicle.update(1.0 / 60.0);

        for tire in &car.tires {
            let telemetry = car.vehicle.tire_telemetry(*tire).unwrap();
            assert_eq!(telemetry.num_contacts, 0);
            let body = car.vehicle.body(*tire).unwrap();
            assert_relative_eq!(body.force, Vector::y() * (-9.8 * TIRE_MASS), epsilon = 1.0e-2);
        }

        // Clearing the contacts of a tire drops its loads.
        touch_ground(&mut car);
        car.vehicle.update(1.0 / 60.0);
        car.vehicle.clear_tire_contacts(car.tires[0]).unwrap();
        assert!(car.vehicle.tire_contacts(car.tires[0]).unwrap().is_empty());
        car.vehicle.update(1.0 / 60.0);
        let telemetry = car.vehicle.tire_telemetry(car.tires[0]).unwrap();
        assert_eq!(telemetry.contact_loads, [0.0; 4]);
    }

    #[test]
    fn brake_torque_lasts_one_update() {
        let mut car = car(None);
        touch_ground(&mut car);
        car.vehicle.set_brake_torque(car.tires[0], -500.0).unwrap();
        assert_eq!(
            car.vehicle.tire_suspension(car.tires[0]).unwrap().brake_torque,
            500.0
        );

        car.vehicle.update(1.0 / 60.0);
        assert_eq!(car.vehicle.tire_telemetry(car.tires[0]).unwrap().rolling_resistance, 500.0);
        assert_eq!(
            car.vehicle.tire_suspension(car.tires[0]).unwrap().brake_torque,
            0.0
        );
    }

    #[test]
    fn locked_differential_couples_the_axle() {
        let mut car = car(Some(DifferentialMode::Locked));
        touch_ground(&mut car);
        let differential = car.differential.unwrap();
        car.vehicle.set_differential_torque(differential, 100.0).unwrap();
        car.vehicle.update(1.0 / 60.0);

        // Both axle joints are unbounded rows outside of the tree.
        assert!(car.vehicle.counters.solver.cholesky_block_size >= 2);
        assert_eq!(car.vehicle.differentials().count(), 1);
        assert_eq!(
            car.vehicle.set_differential_torque(car.tires[0], 1.0),
            Err(VehicleError::NotADifferential(car.tires[0]))
        );
    }

    // Drives the left rear tire of an airborne car and returns the spin accelerations of both
    // rear tires.
    fn rear_spin_accelerations(mode: DifferentialMode) -> (Car, [Real; 2]) {
        let mut car = car(Some(mode));
        car.vehicle.body_mut(car.tires[2]).unwrap().user_torque = Vector::x() * 50.0;
        car.vehicle.update(1.0 / 60.0);

        let spin = |tire: NodeHandle| {
            let body = car.vehicle.body(tire).unwrap();
            body.torque.x / body.principal_inertia().x
        };
        let result = [spin(car.tires[2]), spin(car.tires[3])];
        (car, result)
    }

    #[test]
    fn differential_modes_couple_the_rear_tires() {
        let (_, [left, right]) = rear_spin_accelerations(DifferentialMode::Locked);
        assert!(left > 0.0);
        assert_relative_eq!(left, right, max_relative = 2.0e-2);
        let locked = left;

        let (_, [left, right]) = rear_spin_accelerations(DifferentialMode::Open);
        assert!(left > locked * 1.5);
        assert!(right.abs() < left * 1.0e-2);

        let max_torque = 5.0;
        let (car, [left, right]) =
            rear_spin_accelerations(DifferentialMode::LimitedSlip { max_torque });
        assert!(right > left * 1.0e-2);
        assert!(right < locked * 0.5);
        assert!(left > right);

        // The slip row is the tilt row after the three linear rows and the alignment row.
        let inertia = car.vehicle.body(car.tires[3]).unwrap().principal_inertia().x;
        let slip = car.vehicle.joint_feedback(car.differential.unwrap()).unwrap()[4];
        assert!(slip.abs() <= max_torque * (1.0 + 1.0e-4));
        assert!(right * inertia <= max_torque);
    }

    #[cfg(feature = "serde-serialize")]
    #[test]
    fn vehicle_state_survives_serialization() {
        use crate::dynamics::GenericJoint;
        use crate::vehicle::{NodeSet, TireTelemetry};

        let mut car = car(Some(DifferentialMode::LimitedSlip { max_torque: 5.0 }));
        touch_ground(&mut car);
        car.vehicle.update(1.0 / 60.0);

        let bytes = bincode::serialize(car.vehicle.nodes()).unwrap();
        let nodes: NodeSet = bincode::deserialize(&bytes).unwrap();
        assert_eq!(nodes.len(), car.vehicle.nodes().len());
        for handle in car.tires.iter().chain(car.differential.iter()) {
            let node = car.vehicle.nodes().get(*handle).unwrap();
            let restored = nodes.get(*handle).unwrap();
            assert_eq!(restored.body(), node.body());
            assert_eq!(restored.joint(), node.joint());
            assert_eq!(restored.parent(), node.parent());
        }

        let telemetry = *car.vehicle.tire_telemetry(car.tires[0]).unwrap();
        let bytes = bincode::serialize(&telemetry).unwrap();
        let restored: TireTelemetry = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored, telemetry);

        let joint = GenericJoint::fixed();
        let bytes = bincode::serialize(&joint).unwrap();
        let restored: GenericJoint = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored, joint);
    }

    #[test]
    fn invalid_tire_operations_are_rejected() {
        let mut car = car(None);
        let chassis = car.vehicle.root();
        let tire = car.tires[0];
        let contact = TireContactPoint::new(Point::origin(), Vector::y(), 0.0);

        assert_eq!(
            car.vehicle.set_steering_angle(chassis, 0.1),
            Err(VehicleError::NotATire(chassis))
        );
        assert_eq!(
            car.vehicle.set_tire_contacts(tire, tire, &[contact]),
            Err(VehicleError::SelfAttachment(tire))
        );
        assert_eq!(
            car.vehicle.set_tire_contacts(
                tire,
                car.ground,
                &[TireContactPoint::new(Point::origin(), Vector::zeros(), 0.0)]
            ),
            Err(VehicleError::InvalidContact)
        );
        assert_eq!(
            car.vehicle
                .set_tire_contacts(tire, ExternalHandle::from_raw(7), &[contact]),
            Err(VehicleError::InvalidExternalBody(ExternalHandle::from_raw(7)))
        );
        assert!(car.vehicle.set_steering_angle(tire, 0.1).is_ok());
    }

    #[test]
    fn differential_requires_two_tires() {
        let mut builder = VehicleBuilder::new(RigidBodyState::dynamic(100.0, Vector::repeat(10.0)));
        let tire = builder.add_tire(TireInfo::default()).unwrap();
        let chassis = builder.chassis();
        assert_eq!(
            builder.add_differential(DifferentialInfo::default(), tire, chassis),
            Err(VehicleError::NotATire(chassis))
        );
        assert_eq!(
            builder.add_differential(DifferentialInfo::default(), tire, tire),
            Err(VehicleError::SelfAttachment(tire))
        );
    }
}
