use glam::Vec3;

/// Flat, struct-of-arrays particle storage.
///
/// `phase` is a signed tag rather than an enum: negative values mean fluid,
/// non-negative values identify a solid phase group (two particles with
/// equal non-negative phase belong to the same rigid/granular body and
/// never collide with each other). Kernels test this inline; there is no
/// virtual dispatch in the inner loop.
pub struct ParticleSet {
    pub count: usize,
    /// Current committed position.
    pub position: Vec<Vec3>,
    /// Predicted/projected position for the current sub-step.
    pub new_position: Vec<Vec3>,
    /// Velocity at the step boundary.
    pub velocity: Vec<Vec3>,
    pub mass: Vec<f32>,
    /// `0.0` means pinned (infinite mass).
    pub inv_mass: Vec<f32>,
    /// Height-scaled inverse mass used for mass-scaled stacking stability.
    pub inv_scaled_mass: Vec<f32>,
    /// Negative: fluid. Non-negative: solid phase group id.
    pub phase: Vec<i32>,
    /// Cached vorticity vector (fluid only).
    pub omega: Vec<Vec3>,

    // Fluid scratch (components G, I).
    /// PBF density-constraint Lagrange multiplier.
    pub lambda: Vec<f32>,
    /// SPH density estimate.
    pub density: Vec<f32>,
    /// Akinci surface normal.
    pub normal: Vec<Vec3>,
}

/// Sentinel phase value assigned to every particle admitted via `admit_fluid`.
pub const FLUID_PHASE: i32 = -1;

impl ParticleSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            count: 0,
            position: vec![Vec3::ZERO; capacity],
            new_position: vec![Vec3::ZERO; capacity],
            velocity: vec![Vec3::ZERO; capacity],
            mass: vec![1.0; capacity],
            inv_mass: vec![1.0; capacity],
            inv_scaled_mass: vec![1.0; capacity],
            phase: vec![0; capacity],
            omega: vec![Vec3::ZERO; capacity],
            lambda: vec![0.0; capacity],
            density: vec![0.0; capacity],
            normal: vec![Vec3::ZERO; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.position.len()
    }

    #[inline]
    pub fn is_fluid(&self, i: usize) -> bool {
        self.phase[i] < 0
    }

    #[inline]
    pub fn is_solid(&self, i: usize) -> bool {
        self.phase[i] >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_particles_default_to_unit_mass_and_zero_phase() {
        let particles = ParticleSet::with_capacity(4);
        assert_eq!(particles.count, 0);
        for i in 0..4 {
            assert_eq!(particles.inv_mass[i], 1.0);
            assert_eq!(particles.phase[i], 0);
        }
    }

    #[test]
    fn fluid_phase_is_negative() {
        let mut particles = ParticleSet::with_capacity(1);
        particles.phase[0] = FLUID_PHASE;
        assert!(particles.is_fluid(0));
        assert!(!particles.is_solid(0));
    }
}
