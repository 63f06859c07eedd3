//! A unified position-based dynamics solver: SPH fluids, rigid bodies via
//! shape matching, and granular solids, all projected on one spatial-hash
//! grid and one particle arena.
//!
//! See [`solver::Solver`] for the external entry point: construct one with
//! a [`config::PhysicsConfig`], admit fluid/granular/rigid particles through
//! its `admit_*` methods, then call `step` once per frame.

pub mod config;
pub mod constraints;
pub mod error;
pub mod fluids;
pub mod grid;
pub mod integrator;
pub mod kernels;
pub mod materials;
pub mod particle;
pub mod solver;
pub mod storage;

pub use error::{Result, SolverError};
pub use solver::{PickedParticle, Solver};
