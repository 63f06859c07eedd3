//! XSPH viscosity (component I).
//!
//! Blends each fluid particle's velocity toward the poly6-weighted average
//! of its neighbours' velocities:
//! `v_i += c * sum_j (v_j - v_i) * W_poly6(|x_i - x_j|)`.
//! Runs after velocities are reconstructed from the position delta, so it
//! reads `particles.velocity` and writes it back through a scratch buffer
//! to avoid a particle seeing another's already-smoothed velocity.

use glam::Vec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::grid::SpatialGrid;
use crate::kernels::SphKernels;
use crate::particle::ParticleSet;

pub fn apply_xsph_viscosity(
    particles: &mut ParticleSet,
    grid: &SpatialGrid,
    kernels: &SphKernels,
    viscosity: f32,
    search_radius_cells: i32,
    max_per_cell: usize,
    velocity_scratch: &mut [Vec3],
) {
    let count = particles.count;
    for slot in velocity_scratch.iter_mut().take(count) {
        *slot = Vec3::ZERO;
    }

    let positions = &particles.new_position;
    let velocities = &particles.velocity;
    let phase = &particles.phase;

    let compute_one = |i: usize| -> Vec3 {
        if phase[i] >= 0 {
            return Vec3::ZERO;
        }
        let pos_i = positions[i];
        let vel_i = velocities[i];
        let mut correction = Vec3::ZERO;

        grid.query_neighbors(pos_i, search_radius_cells, max_per_cell, |j| {
            let j = j as usize;
            if j == i {
                return;
            }
            let r2 = (pos_i - positions[j]).length_squared();
            let w = kernels.poly6(r2);
            if w <= 0.0 {
                return;
            }
            correction += (velocities[j] - vel_i) * w;
        });

        correction * viscosity
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
