//! Error taxonomy for the solver's admission and construction APIs.
//!
//! `step` itself never fails on this CPU-hosted implementation (there is no
//! device-side fault class to surface), so only admission and construction
//! return `Result`. The variants mirror the taxonomy a GPU-backed
//! implementation would need, so a future device-backed version can reuse
//! this type without widening it.

use thiserror::Error;

/// Errors the solver can report synchronously to a caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Admission beyond a configured capacity (particles, rigid bodies, or
    /// particles within a single rigid body cluster).
    #[error("capacity exceeded for {resource}: requested {requested}, capacity {capacity}")]
    CapacityExceeded {
        resource: &'static str,
        requested: usize,
        capacity: usize,
    },

    /// A precondition the caller was responsible for upholding did not hold,
    /// e.g. a rigid body's rest offsets were not centred on the origin.
    #[error("precondition violated: {reason}")]
    PreconditionViolated { reason: String },

    /// A host-side buffer allocation failed. Fatal for the solver instance:
    /// existing state remains internally consistent but no further
    /// operation on this instance is valid.
    #[error("device allocation failed: {detail}")]
    DeviceAllocationFailed { detail: String },
}

/// Convenience alias for results returned by admission/construction APIs.
pub type Result<T> = std::result::Result<T, SolverError>;
