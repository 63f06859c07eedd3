//! Solver-owned particle and rigid-body storage, plus admission (component A).
//!
//! `SolverStorage` owns the single `ParticleSet` arena shared by fluids,
//! granular solids, and rigid bodies, along with the list of rigid body
//! clusters used by shape matching. All admission happens through the
//! `admit_*` methods here: they append into the arena (never delete) and
//! validate the preconditions the caller is responsible for upholding.

use glam::Vec3;

use crate::error::{Result, SolverError};
use crate::particle::{ParticleSet, FLUID_PHASE};

/// A rigid body tracked for shape matching (component H).
///
/// Granular particles (`admit_granulars`) never occupy a cluster: each grain
/// gets its own phase id and is simulated as a one-particle body with no
/// rest shape. `granular` exists so a future cluster with no rest shape to
/// match back to can still be excluded from the shape-matching pass without
/// removing it from this list.
pub struct RigidBodyCluster {
    /// Range of indices into the shared `ParticleSet` arena for this body's particles.
    pub particle_range: std::ops::Range<usize>,
    /// Per-particle offset from the body's centre of mass at rest, in body space.
    pub rest_offsets: Vec<Vec3>,
    /// Current centre of mass (world space), updated every sub-step.
    pub center_of_mass: Vec3,
    /// Current orientation relative to rest pose.
    pub rotation: glam::Quat,
    /// If true, this cluster is excluded from shape matching (component H)
    /// and only exists to share a non-colliding phase id among its particles.
    pub granular: bool,
}

impl RigidBodyCluster {
    pub fn particle_count(&self) -> usize {
        self.particle_range.len()
    }
}

/// Owns every particle and rigid body the solver knows about.
pub struct SolverStorage {
    pub particles: ParticleSet,
    pub clusters: Vec<RigidBodyCluster>,
    max_particles_per_rigid_body: usize,
    next_phase: i32,
}

impl SolverStorage {
    pub fn new(capacity: usize, max_particles_per_rigid_body: usize) -> Self {
        Self {
            particles: ParticleSet::with_capacity(capacity),
            clusters: Vec::new(),
            max_particles_per_rigid_body,
            next_phase: 0,
        }
    }

    fn check_capacity(&self, additional: usize) -> Result<()> {
        let needed = self.particles.count + additional;
        if needed > self.particles.capacity() {
            log::warn!(
                "rejecting admission of {} particles: would need {} of {} available",
                additional,
                needed,
                self.particles.capacity()
            );
            return Err(SolverError::CapacityExceeded {
                resource: "particles",
                requested: needed,
                capacity: self.particles.capacity(),
            });
        }
        Ok(())
    }

    /// Append `positions.len()` fluid particles. All share the sentinel
    /// `FLUID_PHASE` tag, so fluid particles always collide with each other.
    pub fn admit_fluid(&mut self, positions: &[Vec3], mass: f32) -> Result<std::ops::Range<usize>> {
        self.check_capacity(positions.len())?;
        let start = self.particles.count;
        for &p in positions {
            self.push_particle(p, mass, FLUID_PHASE);
        }
        Ok(start..self.particles.count)
    }

    /// Append `positions.len()` granular particles, each its own body: every
    /// particle gets a distinct fresh phase id, so a pile of grains admitted
    /// in one call still collides with itself (equal non-negative phase
    /// means shared rigid/granular body and no pairwise collision, which
    /// would be wrong for grains that are not rigidly connected). No cluster
    /// is registered and no per-rigid-body cap applies, since each particle
    /// is its own one-particle body rather than a member of a shared one.
    pub fn admit_granulars(&mut self, positions: &[Vec3], mass: f32) -> Result<std::ops::Range<usize>> {
        self.check_capacity(positions.len())?;
        let start = self.particles.count;
        for &p in positions {
            let phase = self.allocate_phase();
            self.push_particle(p, mass, phase);
        }
        Ok(start..self.particles.count)
    }

    /// Append a rigid body from world-space initial positions whose rest
    /// offsets (`initial_positions - centroid`) must already be centred on
    /// the origin to within `epsilon`. Returns `PreconditionViolated`
    /// otherwise, since a mis-centred rest shape would bias every rotation
    /// extraction (component H) silently.
    pub fn admit_rigid_body(
        &mut self,
        initial_positions_cm_origin: &[Vec3],
        world_offset: Vec3,
        mass: f32,
        epsilon: f32,
    ) -> Result<std::ops::Range<usize>> {
        self.check_capacity(initial_positions_cm_origin.len())?;
        if initial_positions_cm_origin.len() > self.max_particles_per_rigid_body {
            return Err(SolverError::CapacityExceeded {
                resource: "particles_per_rigid_body",
                requested: initial_positions_cm_origin.len(),
                capacity: self.max_particles_per_rigid_body,
            });
        }

        let rest_centroid = centroid(initial_positions_cm_origin);
        if rest_centroid.length_squared() > epsilon * epsilon {
            log::warn!(
                "rejecting rigid body admission: rest centroid {:?} is not centred on the origin",
                rest_centroid
            );
            return Err(SolverError::PreconditionViolated {
                reason: format!(
                    "rest offsets must be centred on the origin, centroid was {:?}",
                    rest_centroid
                ),
            });
        }

        let phase = self.allocate_phase();
        let start = self.particles.count;
        for &offset in initial_positions_cm_origin {
            self.push_particle(world_offset + offset, mass, phase);
        }
        let range = start..self.particles.count;

        self.clusters.push(RigidBodyCluster {
            particle_range: range.clone(),
            rest_offsets: initial_positions_cm_origin.to_vec(),
            center_of_mass: world_offset,
            rotation: glam::Quat::IDENTITY,
            granular: false,
        });
        Ok(range)
    }

    fn allocate_phase(&mut self) -> i32 {
        let phase = self.next_phase;
        self.next_phase += 1;
        phase
    }

    fn push_particle(&mut self, position: Vec3, mass: f32, phase: i32) {
        let i = self.particles.count;
        self.particles.position[i] = position;
        self.particles.new_position[i] = position;
        self.particles.velocity[i] = Vec3::ZERO;
        self.particles.mass[i] = mass;
        self.particles.inv_mass[i] = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        self.particles.inv_scaled_mass[i] = self.particles.inv_mass[i];
        self.particles.phase[i] = phase;
        self.particles.omega[i] = Vec3::ZERO;
        self.particles.lambda[i] = 0.0;
        self.particles.density[i] = 0.0;
        self.particles.normal[i] = Vec3::ZERO;
        self.particles.count += 1;
    }
}

fn centroid(points: &[Vec3]) -> Vec3 {
    if points.is_empty() {
        return Vec3::ZERO;
    }
    let sum: Vec3 = points.iter().copied().sum();
    sum / points.len() as f32
}
