//! Position-based fluids (component G).
//!
//! Reference: "Position Based Fluids", Macklin & Muller, SIGGRAPH 2013. Two
//! passes per outer iteration: a density/lambda pass, then a position
//! correction pass. The position pass writes into a scratch accumulation
//! buffer and is applied in a second loop, so a particle late in the index
//! order never reads a neighbour's already-corrected position within the
//! same pass (Jacobi, not Gauss-Seidel).
//!
//! `use_akinci_cohesion_tension` switches the anti-clustering term: when
//! off, the classic sCorr tensile-instability correction is added to the
//! position pass; when on, the density constraint is clamped to its
//! compressive half (`C_i = max(rho_i/rho_0 - 1, 0)`) and sCorr is omitted
//! entirely, leaving surface tension to the Akinci cohesion constraint
//! (component I) instead. Running both at once double-counts attraction.

use glam::Vec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::grid::SpatialGrid;
use crate::kernels::SphKernels;
use crate::particle::ParticleSet;

/// Phase 1: estimate density at every fluid particle's predicted position.
///
/// Each particle's density only depends on the grid (built once, read-only
/// for the rest of the sub-step) and on other particles' positions/masses,
/// never on another particle's density, so the per-particle work can run
/// concurrently behind the `parallel` feature.
pub fn compute_density(
    particles: &mut ParticleSet,
    grid: &SpatialGrid,
    kernels: &SphKernels,
    search_radius_cells: i32,
    max_per_cell: usize,
) {
    let count = particles.count;
    let positions = &particles.new_position;
    let masses = &particles.mass;
    let phase = &particles.phase;

    let compute_one = |i: usize| -> f32 {
        if phase[i] >= 0 {
            return 0.0;
        }
        let pos_i = positions[i];
        let mut rho = 0.0_f32;
        grid.query_neighbors(pos_i, search_radius_cells, max_per_cell, |j| {
            let j = j as usize;
            let r2 = (pos_i - positions[j]).length_squared();
            rho += masses[j] * kernels.poly6(r2);
        });
        rho
    };

    #[cfg(feature = "parallel")]
    let densities: Vec<f32> = (0..count).into_par_iter().map(compute_one).collect();
    #[cfg(not(feature = "parallel"))]
    let densities: Vec<f32> = (0..count).map(compute_one).collect();

    for i in 0..count {
        if particles.is_fluid(i) {
            particles.density[i] = densities[i];
        }
    }
}

/// Phase 2: compute each fluid particle's Lagrange multiplier from the
/// density constraint `C_i = rho_i / rho_0 - 1`.
pub fn compute_lambda(
    particles: &mut ParticleSet,
    grid: &SpatialGrid,
    kernels: &SphKernels,
    rest_density: f32,
    relaxation_epsilon: f32,
    use_akinci_cohesion_tension: bool,
    search_radius_cells: i32,
    max_per_cell: usize,
) {
    let count = particles.count;
    let inv_rho0 = 1.0 / rest_density;
    let positions = &particles.new_position;
    let densities = &particles.density;
    let phase = &particles.phase;

    let compute_one = |i: usize| -> f32 {
        if phase[i] >= 0 {
            return 0.0;
        }
        let pos_i = positions[i];
        let mut c_i = densities[i] * inv_rho0 - 1.0;
        if use_akinci_cohesion_tension {
            c_i = c_i.max(0.0);
        }

        let mut grad_sum_sq = 0.0_f32;
        let mut grad_self = Vec3::ZERO;

        grid.query_neighbors(pos_i, search_radius_cells, max_per_cell, |j| {
            let j = j as usize;
            if j == i {
                return;
            }
            let r = pos_i - positions[j];
            let grad_j = kernels.spiky_gradient(r, r.length()) * inv_rho0;
            grad_sum_sq += grad_j.length_squared();
            grad_self += grad_j;
        });
        grad_sum_sq += grad_self.length_squared();

        -c_i / (grad_sum_sq + relaxation_epsilon)
    };

    #[cfg(feature = "parallel")]
    let lambdas: Vec<f32> = (0..count).into_par_iter().map(compute_one).collect();
    #[cfg(not(feature = "parallel"))]
    let lambdas: Vec<f32> = (0..count).map(compute_one).collect();

    for i in 0..count {
        if particles.is_fluid(i) {
            particles.lambda[i] = lambdas[i];
        }
    }
}

/// Phase 3: turn lambdas into position corrections, with the optional
/// sCorr anti-clustering term when Akinci cohesion is not in play.
pub fn solve_fluid_positions(
    particles: &mut ParticleSet,
    grid: &SpatialGrid,
    kernels: &SphKernels,
    rest_density: f32,
    s_corr_k: f32,
    s_corr_n: i32,
    use_akinci_cohesion_tension: bool,
    search_radius_cells: i32,
    max_per_cell: usize,
    correction_scratch: &mut [Vec3],
) {
    let count = particles.count;
    let inv_rho0 = 1.0 / rest_density;

    let poly6_dq = if use_akinci_cohesion_tension {
        1.0
    } else {
        kernels.poly6((kernels.h() * 0.03).powi(2))
    };

    for slot in correction_scratch.iter_mut().take(count) {
        *slot = Vec3::ZERO;
    }

    let positions = &particles.new_position;
    let lambda = &particles.lambda;
    let phase = &particles.phase;

    let compute_one = |i: usize| -> Vec3 {
        if phase[i] >= 0 {
            return Vec3::ZERO;
        }
        let pos_i = positions[i];
        let lambda_i = lambda[i];
        let mut delta_p = Vec3::ZERO;

        grid.query_neighbors(pos_i, search_radius_cells, max_per_cell, |j| {
            let j = j as usize;
            if j == i {
                return;
            }
            let r = pos_i - positions[j];
            let r_len = r.length();
            if r_len >= kernels.h() {
                return;
            }

            let lambda_j = if phase[j] < 0 { lambda[j] } else { 0.0 };

            let s_corr = if use_akinci_cohesion_tension || s_corr_k <= 0.0 {
                0.0
            } else {
                let r2 = r_len * r_len;
                let ratio = kernels.poly6(r2) / poly6_dq;
                -s_corr_k * ratio.powi(s_corr_n)
            };

            delta_p += (lambda_i + lambda_j + s_corr) * kernels.spiky_gradient(r, r_len) * inv_rho0;
        });

        delta_p
    };

    #[cfg(feature = "parallel")]
    correction_scratch[..count]
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, slot)| *slot = compute_one(i));
    #[cfg(not(feature = "parallel"))]
    for (i, slot) in correction_scratch.iter_mut().take(count).enumerate() {
        *slot = compute_one(i);
    }

    for i in 0..count {
        if particles.is_fluid(i) {
            particles.new_position[i] += correction_scratch[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::FLUID_PHASE;

    fn make_fluid(positions: &[Vec3]) -> ParticleSet {
        let mut particles = ParticleSet::with_capacity(positions.len());
        for (i, &p) in positions.iter().enumerate() {
            particles.position[i] = p;
            particles.new_position[i] = p;
            particles.mass[i] = 1.0;
            particles.inv_mass[i] = 1.0;
            particles.phase[i] = FLUID_PHASE;
        }
        particles.count = positions.len();
        particles
    }

    #[test]
    fn density_is_highest_at_cluster_center() {
        let kernels = SphKernels::new(0.2);
        let mut grid = SpatialGrid::new(Vec3::new(-1.0, -1.0, -1.0), 0.1, (32, 32, 32), 16);
        let positions = vec![
            Vec3::ZERO,
            Vec3::new(0.05, 0.0, 0.0),
            Vec3::new(-0.05, 0.0, 0.0),
            Vec3::new(0.0, 0.05, 0.0),
            Vec3::new(5.0, 5.0, 5.0),
        ];
        let mut particles = make_fluid(&positions);
        grid.update(&particles.new_position, particles.count);

        compute_density(&mut particles, &grid, &kernels, 2, 64);

        assert!(particles.density[0] > particles.density[4]);
    }

    #[test]
    fn isolated_particle_has_near_zero_lambda_pull() {
        let kernels = SphKernels::new(0.1);
        let mut grid = SpatialGrid::new(Vec3::new(-5.0, -5.0, -5.0), 0.2, (64, 64, 64), 4);
        let positions = vec![Vec3::ZERO];
        let mut particles = make_fluid(&positions);
        grid.update(&particles.new_position, particles.count);

        compute_density(&mut particles, &grid, &kernels, 2, 64);
        compute_lambda(&mut particles, &grid, &kernels, 1000.0, 300.0, false, 2, 64);

        let mut scratch = vec![Vec3::ZERO; 1];
        solve_fluid_positions(
            &mut particles, &grid, &kernels, 1000.0, 1e-4, 4, false, 2, 64, &mut scratch,
        );
        assert_eq!(particles.new_position[0], positions[0]);
    }

    #[test]
    fn akinci_mode_clamps_negative_constraint() {
        let kernels = SphKernels::new(0.2);
        let mut grid = SpatialGrid::new(Vec3::new(-5.0, -5.0, -5.0), 0.1, (100, 100, 100), 2);
        // Two far-apart particles: density well below rest, C_i very negative.
        let positions = vec![Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0)];
        let mut particles = make_fluid(&positions);
        grid.update(&particles.new_position, particles.count);

        compute_density(&mut particles, &grid, &kernels, 2, 64);
        compute_lambda(&mut particles, &grid, &kernels, 1000.0, 300.0, true, 2, 64);
        // Clamped constraint means lambda should be non-positive (C clamped >= 0
        // means -C/(denom) <= 0), unlike the unclamped case which would be positive.
        assert!(particles.lambda[0] <= 0.0);
    }
}
