//! Structures related to dynamics: bodies, joints, and the vehicle solver.

pub use self::joint::*;
pub use self::rigid_body_state::RigidBodyState;
pub use self::solver_parameters::SolverParameters;

pub mod joint;
mod rigid_body_state;
pub(crate) mod solver;
mod solver_parameters;
