//! Fluid-only force/field passes that run after the PBF density constraint
//! (component G) but still inside the same sub-step: vorticity confinement,
//! XSPH viscosity, and Akinci cohesion/curvature surface tension.

pub mod cohesion;
pub mod viscosity;
pub mod vorticity;
