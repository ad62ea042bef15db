//! Vehicles: the tree of bodies, the bodies it touches, and the joints between them.

pub use self::assembly::VehicleAssembly;
pub use self::external_body_set::{ExternalBodySet, ExternalHandle};
pub use self::loop_joint_set::{BodyRef, LoopJoint, LoopJointHandle, LoopJointSet};
pub use self::node_set::{NodeHandle, NodeSet, VehicleNode};
pub use self::tire::{TireContactPoint, TireInfo, TireTelemetry, MAX_TIRE_CONTACTS};
pub use self::vehicle::Vehicle;
pub use self::vehicle_builder::{DifferentialInfo, VehicleBuilder};

mod assembly;
mod external_body_set;
mod loop_joint_set;
mod node_set;
mod tire;
mod vehicle;
mod vehicle_builder;
