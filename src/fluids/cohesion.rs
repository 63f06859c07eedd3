//! Akinci surface tension: cohesion + curvature (component I).
//!
//! Reference: "Versatile Surface Tension and Adhesion for SPH Fluids"
//! (Akinci, Akinci & Teschner, 2013). Cohesion pulls particles together
//! along the line between them, weighted by the Akinci spline; curvature
//! pulls particles toward the local mean surface by matching their normal
//! field. Both are scaled by `k_ij = 2 * rho_0 / (rho_i + rho_j)` so the
//! force stays independent of local density.
//!
//! This is the counterpart to the sCorr anti-clustering term in
//! `constraints::fluid`; enabling `use_akinci_cohesion_tension` runs this
//! module instead of sCorr, never alongside it.

use glam::Vec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::grid::SpatialGrid;
use crate::kernels::SphKernels;
use crate::particle::ParticleSet;

/// Estimate each fluid particle's inward surface normal from the spiky
/// gradient field, scaled by the smoothing radius as in the reference.
pub fn compute_normals(
    particles: &mut ParticleSet,
    grid: &SpatialGrid,
    kernels: &SphKernels,
    search_radius_cells: i32,
    max_per_cell: usize,
) {
    let count = particles.count;
    let h = kernels.h();
    let positions = &particles.new_position;
    let densities = &particles.density;
    let phase = &particles.phase;

    let compute_one = |i: usize| -> Vec3 {
        if phase[i] >= 0 {
            return Vec3::ZERO;
        }
        let pos_i = positions[i];
        let mut n = Vec3::ZERO;

        grid.query_neighbors(pos_i, search_radius_cells, max_per_cell, |j| {
            let j = j as usize;
            if j == i || phase[j] >= 0 {
                return;
            }
            let r = pos_i - positions[j];
            let rho_j = densities[j].max(1e-6);
            n += kernels.spiky_gradient(r, r.length()) * (1.0 / rho_j);
        });

        n * h
    };

    #[cfg(feature = "parallel")]
    let normals: Vec<Vec3> = (0..count).into_par_iter().map(compute_one).collect();
    #[cfg(not(feature = "parallel"))]
    let normals: Vec<Vec3> = (0..count).map(compute_one).collect();

    for i in 0..count {
        if particles.is_fluid(i) {
            particles.normal[i] = normals[i];
        }
    }
}

/// Apply the combined cohesion + curvature force as a velocity change
/// (an acceleration integrated over `dt`), written through a scratch buffer
/// so one particle's update never affects another's within this pass.
pub fn apply_cohesion(
    particles: &mut ParticleSet,
    grid: &SpatialGrid,
    kernels: &SphKernels,
    rest_density: f32,
    surface_tension: f32,
    dt: f32,
    search_radius_cells: i32,
    max_per_cell: usize,
    velocity_scratch: &mut [Vec3],
) {
    let count = particles.count;
    for slot in velocity_scratch.iter_mut().take(count) {
        *slot = Vec3::ZERO;
    }

    let positions = &particles.new_position;
    let masses = &particles.mass;
    let densities = &particles.density;
    let normal_field = &particles.normal;
    let phase = &particles.phase;

    let compute_one = |i: usize| -> Vec3 {
        if phase[i] >= 0 {
            return Vec3::ZERO;
        }
        let pos_i = positions[i];
        let mass_i = masses[i];
        let rho_i = densities[i].max(1e-6);
        let normal_i = normal_field[i];
        let mut accel = Vec3::ZERO;

        grid.query_neighbors(pos_i, search_radius_cells, max_per_cell, |j| {
            let j = j as usize;
            if j == i || phase[j] >= 0 {
                return;
            }
            let delta = pos_i - positions[j];
            let r_len = delta.length();
            if r_len <= 1e-8 || r_len >= kernels.h() {
                return;
            }
            let rho_j = densities[j].max(1e-6);
            let k_ij = 2.0 * rest_density / (rho_i + rho_j);

            let cohesion_dir = -delta / r_len;
            let cohesion = cohesion_dir * (surface_tension * mass_i * masses[j] * kernels.akinci(r_len));
            let curvature = -surface_tension * mass_i * (normal_i - normal_field[j]);

            accel += (cohesion + curvature) * k_ij;
        });

        (accel / mass_i.max(1e-6)) * dt
    };

    #[cfg(feature = "parallel")]
    velocity_scratch[..count]
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, slot)| *slot = compute_one(i));
    #[cfg(not(feature = "parallel"))]
    for (i, slot) in velocity_scratch.iter_mut().take(count).enumerate() {
        *slot = compute_one(i);
    }

    for i in 0..count {
        if particles.is_fluid(i) {
            particles.velocity[i] += velocity_scratch[i];
        }
    }
}
