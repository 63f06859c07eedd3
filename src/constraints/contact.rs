//! Particle-particle contact constraint (component F).
//!
//! Runs after the grid rebuild, using the same uniform grid fluids query
//! against so contacts and SPH neighbours share one data structure. Two
//! particles collide only when their phase tags differ: equal phases mean
//! either the same rigid/granular body (no self-collision by construction)
//! or both fluid (handled by the PBF density constraint instead).
//!
//! Corrections are accumulated into a scratch buffer and only written back
//! to `new_position` once the whole contact set has been read, so a contact
//! later in the list never sees a position a contact earlier in the list
//! already moved (Jacobi, not Gauss-Seidel). Normal corrections are summed;
//! friction corrections are averaged across the constraints touching a
//! particle, since summing friction impulses the way normal impulses are
//! summed makes the friction pass diverge under many simultaneous contacts.

use glam::Vec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::grid::SpatialGrid;
use crate::particle::ParticleSet;

/// A detected contact between two particles.
#[derive(Clone, Copy)]
pub struct ContactConstraint {
    pub i: u32,
    pub j: u32,
}

/// Scratch accumulation buffers reused across sub-steps. Grows monotonically.
pub struct ContactScratch {
    normal_correction: Vec<Vec3>,
    friction_correction: Vec<Vec3>,
    friction_count: Vec<u32>,
}

impl ContactScratch {
    pub fn new(capacity: usize) -> Self {
        Self {
            normal_correction: vec![Vec3::ZERO; capacity],
            friction_correction: vec![Vec3::ZERO; capacity],
            friction_count: vec![0; capacity],
        }
    }

    fn reserve_and_clear(&mut self, count: usize) {
        if count > self.normal_correction.len() {
            self.normal_correction.resize(count, Vec3::ZERO);
            self.friction_correction.resize(count, Vec3::ZERO);
            self.friction_count.resize(count, 0);
        }
        for i in 0..count {
            self.normal_correction[i] = Vec3::ZERO;
            self.friction_correction[i] = Vec3::ZERO;
            self.friction_count[i] = 0;
        }
    }
}

/// Find all particle pairs within `2 * particle_radius` of each other whose
/// phases differ, via the uniform grid's neighbourhood walk. Each particle's
/// local scan is independent of every other's, so behind the `parallel`
/// feature the per-particle scans run concurrently and their contact lists
/// are flattened afterward.
pub fn detect_contacts(
    grid: &SpatialGrid,
    positions: &[Vec3],
    phase: &[i32],
    count: usize,
    search_radius_cells: i32,
    max_per_cell: usize,
) -> Vec<ContactConstraint> {
    let scan_one = |i: usize| -> Vec<ContactConstraint> {
        let mut local = Vec::new();
        grid.query_neighbors(positions[i], search_radius_cells, max_per_cell, |j| {
            let j = j as usize;
            if j <= i || phase[i] == phase[j] {
                return;
            }
            local.push(ContactConstraint {
                i: i as u32,
                j: j as u32,
            });
        });
        local
    };

    #[cfg(feature = "parallel")]
    {
        (0..count).into_par_iter().map(scan_one).flatten().collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..count).flat_map(scan_one).collect()
    }
}

/// Solve every detected contact, writing the averaged/summed corrections
/// directly into `particles.new_position`.
pub fn solve_contacts(
    contacts: &[ContactConstraint],
    particles: &mut ParticleSet,
    scratch: &mut ContactScratch,
    particle_radius: f32,
    friction_static: f32,
    friction_dynamic: f32,
) {
    let count = particles.count;
    scratch.reserve_and_clear(count);

    let diameter = 2.0 * particle_radius;
    let negligible_correction_sq = (0.001 * particle_radius) * (0.001 * particle_radius);

    for c in contacts {
        let i = c.i as usize;
        let j = c.j as usize;

        // Height-scaled weights rather than plain inv_mass, so a particle
        // lower in a granular stack resists displacement more than one
        // near the top and the pile does not invert itself under gravity.
        let w_i = particles.inv_scaled_mass[i];
        let w_j = particles.inv_scaled_mass[j];
        let w_sum = w_i + w_j;
        if w_sum < 1.0e-10 {
            continue;
        }

        let delta = particles.new_position[j] - particles.new_position[i];
        let d = delta.length();
        if d >= diameter || d <= 1.0e-8 {
            continue;
        }

        let normal = delta / d;
        let p = delta * (diameter / d - 1.0);
        let s_i = w_i / w_sum;
        let s_j = w_j / w_sum;

        scratch.normal_correction[i] -= p * s_i;
        scratch.normal_correction[j] += p * s_j;

        // Skip friction entirely once the normal correction this contact
        // would apply to particle i is negligible, rather than testing the
        // tangential displacement: a contact barely touching has nothing
        // meaningful to stick or slip against.
        if (p * w_i).length_squared() <= negligible_correction_sq {
            continue;
        }

        // Tangential relative displacement over the sub-step, used to stick
        // or slip the pair (Coulomb friction on position corrections rather
        // than velocities).
        let dx_i = particles.new_position[i] - particles.position[i];
        let dx_j = particles.new_position[j] - particles.position[j];
        let rel = dx_i - dx_j;
        let rel_n = rel.dot(normal) * normal;
        let rel_t = rel - rel_n;
        let rel_t_len_sq = rel_t.length_squared();
        if rel_t_len_sq < 1.0e-16 {
            continue;
        }

        let normal_mag = p.length();
        let rel_t_len = rel_t_len_sq.sqrt();
        let max_slip = friction_dynamic * normal_mag;
        let static_limit = friction_static * normal_mag;
        let friction_correction = if rel_t_len <= static_limit {
            // Stick: remove the full tangential relative displacement.
            rel_t
        } else {
            rel_t * (max_slip.min(rel_t_len) / rel_t_len)
        };

        scratch.friction_correction[i] -= friction_correction * s_i;
        scratch.friction_correction[j] += friction_correction * s_j;
        scratch.friction_count[i] += 1;
        scratch.friction_count[j] += 1;
    }

    for i in 0..count {
        let friction = if scratch.friction_count[i] > 0 {
            scratch.friction_correction[i] / scratch.friction_count[i] as f32
        } else {
            Vec3::ZERO
        };
        particles.new_position[i] += scratch.normal_correction[i] + friction;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::FLUID_PHASE;

    fn make_particles(positions: &[Vec3], phases: &[i32]) -> ParticleSet {
        let mut particles = ParticleSet::with_capacity(positions.len());
        for (i, (&p, &ph)) in positions.iter().zip(phases).enumerate() {
            particles.position[i] = p;
            particles.new_position[i] = p;
            particles.mass[i] = 1.0;
            particles.inv_mass[i] = 1.0;
            particles.inv_scaled_mass[i] = 1.0;
            particles.phase[i] = ph;
        }
        particles.count = positions.len();
        particles
    }

    #[test]
    fn detect_skips_same_phase_pairs() {
        let mut grid = SpatialGrid::new(Vec3::ZERO, 1.0, (8, 8, 8), 8);
        let positions = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.05, 0.0, 0.0)];
        grid.update(&positions, 2);
        let phases = vec![FLUID_PHASE, FLUID_PHASE];
        let contacts = detect_contacts(&grid, &positions, &phases, 2, 1, 64);
        assert!(contacts.is_empty());
    }

    #[test]
    fn detect_finds_differing_phase_overlap() {
        let mut grid = SpatialGrid::new(Vec3::ZERO, 1.0, (8, 8, 8), 8);
        let positions = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.05, 0.0, 0.0)];
        grid.update(&positions, 2);
        let phases = vec![0, 1];
        let contacts = detect_contacts(&grid, &positions, &phases, 2, 1, 64);
        assert_eq!(contacts.len(), 1);
    }

    #[test]
    fn solve_separates_overlapping_pair() {
        let positions = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.05, 0.0, 0.0)];
        let phases = vec![0, 1];
        let mut particles = make_particles(&positions, &phases);
        let contacts = vec![ContactConstraint { i: 0, j: 1 }];
        let mut scratch = ContactScratch::new(2);

        solve_contacts(&contacts, &mut particles, &mut scratch, 0.05, 0.3, 0.2);

        let d = (particles.new_position[1] - particles.new_position[0]).length();
        assert!(d > 0.05, "particles should separate, d={}", d);
    }

    #[test]
    fn solve_ignores_two_static_particles() {
        let positions = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.05, 0.0, 0.0)];
        let phases = vec![0, 1];
        let mut particles = make_particles(&positions, &phases);
        particles.inv_mass[0] = 0.0;
        particles.inv_mass[1] = 0.0;
        particles.inv_scaled_mass[0] = 0.0;
        particles.inv_scaled_mass[1] = 0.0;
        let contacts = vec![ContactConstraint { i: 0, j: 1 }];
        let mut scratch = ContactScratch::new(2);

        solve_contacts(&contacts, &mut particles, &mut scratch, 0.05, 0.3, 0.2);

        assert_eq!(particles.new_position[0], positions[0]);
        assert_eq!(particles.new_position[1], positions[1]);
    }
}
