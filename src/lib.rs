//! # vehicle_solver
//!
//! `vehicle_solver` computes the constraint forces of an articulated vehicle: a chassis, its tires
//! and suspensions, and an optional differential, all connected as a tree of rigid bodies by
//! bilateral joints. Constraints that do not fit the tree (tire contacts, differential axles) are
//! handled as loop joints.
//!
//! Every step runs the same pipeline:
//! - each joint produces its constraint rows (Jacobians, bias accelerations, friction bounds),
//! - the tree part of the mass matrix is factorized in linear time (articulated-body reduction),
//! - the loop and bounded rows form a small dense auxiliary system, solved with a Cholesky
//!   factorization of its unbounded block followed by a projected SOR sweep of its bounded block,
//! - the resulting forces are accumulated on every body, ready for an external integrator.
//!
//! The crate never integrates positions or velocities and never detects collisions: contacts are
//! handed to [`vehicle::Vehicle::set_tire_contacts`] already resolved.

#![deny(bare_trait_objects)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)] // Index loops read better in the matrix code.
#![allow(clippy::module_inception)]

pub extern crate nalgebra as na;
#[cfg(feature = "serde-serialize")]
#[macro_use]
extern crate serde;

/// The string version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod counters;
pub mod dynamics;
pub mod error;
pub mod utils;
pub mod vehicle;

/// Elementary mathematical entities (vectors, matrices, isometries, etc).
pub mod math {
    /// The scalar type used throughout this crate.
    #[cfg(not(feature = "f64"))]
    pub type Real = f32;
    /// The scalar type used throughout this crate.
    #[cfg(feature = "f64")]
    pub type Real = f64;

    /// The vector type.
    pub type Vector<N> = na::Vector3<N>;
    /// The point type.
    pub type Point<N> = na::Point3<N>;
    /// The unit-length vector type.
    pub type UnitVector<N> = na::UnitVector3<N>;
    /// The rotation type.
    pub type Rotation<N> = na::UnitQuaternion<N>;
    /// The transformation (rotation followed by translation) type.
    pub type Isometry<N> = na::Isometry3<N>;
    /// The 3x3 matrix type, used for angular inertia tensors.
    pub type Matrix<N> = na::Matrix3<N>;

    /// A spatial vector: 3 linear components followed by 3 angular components.
    pub type SpatialVector<N> = na::Vector6<N>;
    /// A 6x6 spatial matrix (mass matrices, Jacobian transforms).
    pub type SpatialMatrix<N> = na::Matrix6<N>;

    /// The dimension of the space.
    pub const DIM: usize = 3;
    /// The maximum number of possible rotations and translations of a rigid body.
    pub const SPATIAL_DIM: usize = 6;
    /// The maximum number of constraint rows a single joint can produce.
    pub const MAX_JOINT_ROWS: usize = SPATIAL_DIM;
}

/// Prelude containing the common types defined by this crate.
pub mod prelude {
    pub use crate::dynamics::*;
    pub use crate::error::VehicleError;
    pub use crate::math::*;
    pub use crate::vehicle::*;
    pub use na::{point, vector, DMatrix, DVector};
    pub extern crate nalgebra;
}
