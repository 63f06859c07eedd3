//! Vorticity confinement (component I).
//!
//! Counteracts the numerical damping inherent in a discrete solver by
//! feeding a small corrective force back along each particle's vorticity
//! gradient. Two passes: curl of the velocity field, then force from the
//! gradient of the curl's magnitude.

use glam::Vec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::grid::SpatialGrid;
use crate::kernels::SphKernels;
use crate::particle::ParticleSet;

pub fn apply_vorticity_confinement(
    particles: &mut ParticleSet,
    grid: &SpatialGrid,
    kernels: &SphKernels,
    vorticity_strength: f32,
    dt: f32,
    search_radius_cells: i32,
    max_per_cell: usize,
) {
    let count = particles.count;
    let h = kernels.h();

    let positions = &particles.new_position;
    let velocities = &particles.velocity;
    let phase = &particles.phase;

    let compute_curl = |i: usize| -> Vec3 {
        if phase[i] >= 0 {
            return Vec3::ZERO;
        }
        let pos_i = positions[i];
        let vel_i = velocities[i];
        let mut omega = Vec3::ZERO;

        grid.query_neighbors(pos_i, search_radius_cells, max_per_cell, |j| {
            let j = j as usize;
            if j == i || phase[j] >= 0 {
                return;
            }
            let r = pos_i - positions[j];
            let r_len = r.length();
            if r_len < h && r_len > 1e-6 {
                let vel_diff = velocities[j] - vel_i;
                let grad = kernels.spiky_gradient(r, r_len);
                omega += vel_diff.cross(grad);
            }
        });

        omega
    };

    #[cfg(feature = "parallel")]
    let omegas: Vec<Vec3> = (0..count).into_par_iter().map(compute_curl).collect();
    #[cfg(not(feature = "parallel"))]
    let omegas: Vec<Vec3> = (0..count).map(compute_curl).collect();

    for i in 0..count {
        if particles.is_fluid(i) {
            particles.omega[i] = omegas[i];
        }
    }

    let positions = &particles.new_position;
    let omega_field = &particles.omega;
    let phase = &particles.phase;

    let compute_force = |i: usize| -> Vec3 {
        if phase[i] >= 0 {
            return Vec3::ZERO;
        }
        let pos_i = positions[i];
        let omega_i = omega_field[i];
        let omega_len = omega_i.length();
        if omega_len < 1e-6 {
            return Vec3::ZERO;
        }

        let mut eta = Vec3::ZERO;
        grid.query_neighbors(pos_i, search_radius_cells, max_per_cell, |j| {
            let j = j as usize;
            if j == i || phase[j] >= 0 {
                return;
            }
            let r = pos_i - positions[j];
            let r_len = r.length();
            if r_len < h && r_len > 1e-6 {
                let grad = kernels.spiky_gradient(r, r_len);
                eta += omega_field[j].length() * grad;
            }
        });

        let eta_len = eta.length();
        if eta_len < 1e-6 {
            return Vec3::ZERO;
        }

        let n = eta / eta_len;
        n.cross(omega_i) * vorticity_strength
    };

    #[cfg(feature = "parallel")]
    let forces: Vec<Vec3> = (0..count).into_par_iter().map(compute_force).collect();
    #[cfg(not(feature = "parallel"))]
    let forces: Vec<Vec3> = (0..count).map(compute_force).collect();

    for i in 0..count {
        particles.velocity[i] += forces[i] * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::FLUID_PHASE;

    #[test]
    fn swirling_pair_gains_vorticity() {
        let kernels = SphKernels::new(0.2);
        let mut grid = SpatialGrid::new(Vec3::new(-1.0, -1.0, -1.0), 0.1, (32, 32, 32), 2);
        let positions = vec![Vec3::ZERO, Vec3::new(0.05, 0.0, 0.0)];
        let mut particles = ParticleSet::with_capacity(2);
        for (i, &p) in positions.iter().enumerate() {
            particles.new_position[i] = p;
            particles.phase[i] = FLUID_PHASE;
        }
        particles.velocity[0] = Vec3::new(0.0, 1.0, 0.0);
        particles.velocity[1] = Vec3::new(0.0, -1.0, 0.0);
        particles.count = 2;
        grid.update(&particles.new_position, 2);

        apply_vorticity_confinement(&mut particles, &grid, &kernels, 0.001, 0.01, 2, 64);
        assert!(particles.omega[0].length() > 0.0 || particles.omega[1].length() > 0.0);
    }
}
