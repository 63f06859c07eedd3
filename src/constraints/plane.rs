//! Static plane collision (component E).
//!
//! A `Plane` is a boundary collider: `origin` is any point on the plane,
//! `normal` points into the allowed half-space. Two passes per sub-step use
//! it differently:
//!
//! - `stabilize` runs before prediction, nudging both `position` and
//!   `new_position` out of penetration so a large single sub-step does not
//!   tunnel a fast particle through the boundary. Called twice per
//!   sub-step (see the solver's stabilization pass count).
//! - `solve_collision` runs during the projection loop against `new_position`
//!   only, then applies stick/slip Coulomb friction tangent to the plane.

use glam::Vec3;

use crate::particle::ParticleSet;

#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub origin: Vec3,
    pub normal: Vec3,
}

impl Plane {
    pub fn new(origin: Vec3, normal: Vec3) -> Self {
        Self {
            origin,
            normal: normal.normalize(),
        }
    }

    /// Push a penetrating particle's `position` and `new_position` out by
    /// the same amount, so the stabilization pass does not itself introduce
    /// a velocity change (velocity is reconstructed from the position delta
    /// after prediction, not before).
    pub fn stabilize(&self, particles: &mut ParticleSet, particle_radius: f32) {
        for i in 0..particles.count {
            if particles.inv_mass[i] == 0.0 {
                continue;
            }
            let d = (self.origin - particles.position[i]).dot(self.normal) + particle_radius;
            if d > 0.0 {
                let push = self.normal * d;
                particles.position[i] += push;
                particles.new_position[i] += push;
            }
        }
    }

    /// Project `new_position` out of penetration, then apply stick/slip
    /// friction against the tangential component of this sub-step's
    /// displacement.
    pub fn solve_collision(
        &self,
        particles: &mut ParticleSet,
        particle_radius: f32,
        friction_static: f32,
        friction_dynamic: f32,
    ) {
        for i in 0..particles.count {
            if particles.inv_mass[i] == 0.0 {
                continue;
            }
            let d = (self.origin - particles.new_position[i]).dot(self.normal) + particle_radius;
            if d <= 0.0 {
                continue;
            }

            particles.new_position[i] += self.normal * d;

            let displacement = particles.new_position[i] - particles.position[i];
            let normal_component = displacement.dot(self.normal) * self.normal;
            let tangential = displacement - normal_component;
            let tangential_len = tangential.length();
            if tangential_len < 1.0e-8 {
                continue;
            }

            let static_limit = friction_static * d;
            let corrected = if tangential_len <= static_limit {
                tangential
            } else {
                let dynamic_limit = friction_dynamic * d;
                tangential * (dynamic_limit.min(tangential_len) / tangential_len)
            };
            particles.new_position[i] -= corrected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ground() -> Plane {
        Plane::new(Vec3::ZERO, Vec3::Y)
    }

    #[test]
    fn stabilize_pushes_penetrating_particle_up() {
        let mut particles = ParticleSet::with_capacity(1);
        particles.position[0] = Vec3::new(0.0, -0.02, 0.0);
        particles.new_position[0] = Vec3::new(0.0, -0.02, 0.0);
        particles.inv_mass[0] = 1.0;
        particles.count = 1;

        ground().stabilize(&mut particles, 0.05);
        assert!(particles.position[0].y > -0.02);
        assert!(particles.new_position[0].y > -0.02);
    }

    #[test]
    fn solve_collision_resolves_penetration_along_normal() {
        let mut particles = ParticleSet::with_capacity(1);
        particles.position[0] = Vec3::new(0.0, 0.05, 0.0);
        particles.new_position[0] = Vec3::new(0.0, -0.02, 0.0);
        particles.inv_mass[0] = 1.0;
        particles.count = 1;

        ground().solve_collision(&mut particles, 0.05, 0.3, 0.2);
        assert!(particles.new_position[0].y >= 0.049);
    }

    #[test]
    fn pinned_particles_are_unaffected() {
        let mut particles = ParticleSet::with_capacity(1);
        particles.position[0] = Vec3::new(0.0, -1.0, 0.0);
        particles.new_position[0] = Vec3::new(0.0, -1.0, 0.0);
        particles.inv_mass[0] = 0.0;
        particles.count = 1;

        ground().solve_collision(&mut particles, 0.05, 0.3, 0.2);
        assert_eq!(particles.new_position[0], Vec3::new(0.0, -1.0, 0.0));
    }
}
