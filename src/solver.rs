//! The step orchestrator (component J) and the solver's external interface.
//!
//! `Solver` owns everything needed to advance the simulation: particle and
//! rigid-body storage, the spatial grid, the SPH kernel constants, and the
//! static plane colliders. `step` runs a fixed sequence of sub-steps, each
//! one following the same shape: integrate forces, predict positions,
//! rebuild the grid, stabilize against planes, then iterate contact,
//! plane-collision, fluid, and shape-matching projections before
//! reconstructing velocity and committing the result.

use glam::Vec3;

use crate::config::PhysicsConfig;
use crate::constraints::contact::{self, ContactConstraint, ContactScratch};
use crate::constraints::fluid;
use crate::constraints::plane::Plane;
use crate::constraints::shape_matching;
use crate::error::Result;
use crate::fluids::{cohesion, viscosity, vorticity};
use crate::grid::SpatialGrid;
use crate::integrator;
use crate::kernels::SphKernels;
use crate::storage::SolverStorage;

/// A particle the caller is actively dragging. While set, that particle's
/// position and velocity are driven directly by the caller every sub-step
/// instead of by the constraint projection loop, so it behaves as a
/// temporarily kinematic obstacle: immovable by physics, but still
/// collidable by everything else.
#[derive(Clone, Copy)]
pub struct PickedParticle {
    pub id: usize,
    pub position: Vec3,
    pub velocity: Vec3,
}

pub struct Solver {
    pub storage: SolverStorage,
    pub config: PhysicsConfig,
    pub planes: Vec<Plane>,
    grid: SpatialGrid,
    kernels: SphKernels,
    contacts: Vec<ContactConstraint>,
    contact_scratch: ContactScratch,
    fluid_correction_scratch: Vec<Vec3>,
    velocity_scratch: Vec<Vec3>,
}

impl Solver {
    pub fn new(config: PhysicsConfig, capacity: usize) -> Self {
        let grid = SpatialGrid::new(
            config.grid_origin,
            config.effective_grid_cell_size(),
            config.grid_dims,
            capacity,
        );
        let kernels = SphKernels::new(config.smoothing_radius);
        Self {
            storage: SolverStorage::new(capacity, config.num_max_particle_per_rigid_body),
            planes: Vec::new(),
            grid,
            kernels,
            contacts: Vec::new(),
            contact_scratch: ContactScratch::new(capacity),
            fluid_correction_scratch: vec![Vec3::ZERO; capacity],
            velocity_scratch: vec![Vec3::ZERO; capacity],
            config,
        }
    }

    pub fn add_plane(&mut self, plane: Plane) {
        self.planes.push(plane);
    }

    pub fn admit_fluid(&mut self, positions: &[Vec3], mass: f32) -> Result<std::ops::Range<usize>> {
        self.storage.admit_fluid(positions, mass)
    }

    pub fn admit_granulars(&mut self, positions: &[Vec3], mass: f32) -> Result<std::ops::Range<usize>> {
        self.storage.admit_granulars(positions, mass)
    }

    pub fn admit_rigid_body(
        &mut self,
        initial_positions_cm_origin: &[Vec3],
        world_offset: Vec3,
        mass: f32,
    ) -> Result<std::ops::Range<usize>> {
        self.storage
            .admit_rigid_body(initial_positions_cm_origin, world_offset, mass, 1.0e-4)
    }

    pub fn read_particle_position(&self, i: usize) -> Vec3 {
        self.storage.particles.position[i]
    }

    pub fn set_particle(&mut self, i: usize, position: Vec3, velocity: Vec3) {
        self.storage.particles.position[i] = position;
        self.storage.particles.new_position[i] = position;
        self.storage.particles.velocity[i] = velocity;
    }

    /// Advance the simulation by `dt`, split into `sub_steps` equal
    /// sub-steps. `picked` overrides one particle's position/velocity every
    /// sub-step, for an actively-dragged particle.
    pub fn step(&mut self, sub_steps: u32, dt: f32, picked: Option<PickedParticle>) {
        let sub_steps = sub_steps.max(1);
        let sub_dt = dt / sub_steps as f32;
        if sub_dt.abs() < 1.0e-12 {
            return;
        }

        let count = self.storage.particles.count;
        self.grid.reserve(self.storage.particles.capacity());
        if self.fluid_correction_scratch.len() < self.storage.particles.capacity() {
            self.fluid_correction_scratch
                .resize(self.storage.particles.capacity(), Vec3::ZERO);
            self.velocity_scratch
                .resize(self.storage.particles.capacity(), Vec3::ZERO);
        }

        let search_radius_cells = self
            .config
            .fluid_search_radius_cells()
            .max(self.config.contact_search_radius_cells);
        let max_per_cell = self.config.num_max_particle_per_cell;

        for _ in 0..sub_steps {
            integrator::apply_forces(&mut self.storage.particles, self.config.gravity, sub_dt);
            integrator::predict_positions(&mut self.storage.particles, sub_dt);
            self.pin_picked(picked);
            integrator::compute_inv_scaled_masses(
                &mut self.storage.particles,
                self.config.mass_scaling_constant,
            );

            self.grid.update(&self.storage.particles.new_position, count);

            for _ in 0..self.config.stabilization_passes {
                for plane in &self.planes {
                    plane.stabilize(&mut self.storage.particles, self.config.particle_radius);
                }
            }

            for _ in 0..self.config.outer_iterations {
                self.contacts = contact::detect_contacts(
                    &self.grid,
                    &self.storage.particles.new_position,
                    &self.storage.particles.phase,
                    count,
                    search_radius_cells,
                    max_per_cell,
                );

                for _ in 0..self.config.inner_iterations {
                    contact::solve_contacts(
                        &self.contacts,
                        &mut self.storage.particles,
                        &mut self.contact_scratch,
                        self.config.particle_radius,
                        self.config.friction_static,
                        self.config.friction_dynamic,
                    );

                    for plane in &self.planes {
                        plane.solve_collision(
                            &mut self.storage.particles,
                            self.config.particle_radius,
                            self.config.friction_static,
                            self.config.friction_dynamic,
                        );
                    }

                    fluid::compute_density(
                        &mut self.storage.particles,
                        &self.grid,
                        &self.kernels,
                        search_radius_cells,
                        max_per_cell,
                    );
                    fluid::compute_lambda(
                        &mut self.storage.particles,
                        &self.grid,
                        &self.kernels,
                        self.config.rest_density,
                        self.config.relaxation_epsilon,
                        self.config.use_akinci_cohesion_tension,
                        search_radius_cells,
                        max_per_cell,
                    );
                    fluid::solve_fluid_positions(
                        &mut self.storage.particles,
                        &self.grid,
                        &self.kernels,
                        self.config.rest_density,
                        self.config.s_corr_k,
                        self.config.s_corr_n,
                        self.config.use_akinci_cohesion_tension,
                        search_radius_cells,
                        max_per_cell,
                        &mut self.fluid_correction_scratch,
                    );

                    shape_matching::solve_shape_matching(
                        &mut self.storage.clusters,
                        &mut self.storage.particles,
                        self.config.rotation_extraction_max_iters,
                    );

                    self.pin_picked(picked);
                }
            }

            integrator::update_velocity(&mut self.storage.particles, sub_dt);
            if let Some(p) = picked {
                self.storage.particles.velocity[p.id] = p.velocity;
            }

            vorticity::apply_vorticity_confinement(
                &mut self.storage.particles,
                &self.grid,
                &self.kernels,
                self.config.vorticity_scale,
                sub_dt,
                search_radius_cells,
                max_per_cell,
            );
            if self.config.use_akinci_cohesion_tension {
                cohesion::compute_normals(
                    &mut self.storage.particles,
                    &self.grid,
                    &self.kernels,
                    search_radius_cells,
                    max_per_cell,
                );
                cohesion::apply_cohesion(
                    &mut self.storage.particles,
                    &self.grid,
                    &self.kernels,
                    self.config.rest_density,
                    self.config.surface_tension,
                    sub_dt,
                    search_radius_cells,
                    max_per_cell,
                    &mut self.velocity_scratch,
                );
            }
            // XSPH runs last so it smooths the velocities cohesion just perturbed.
            viscosity::apply_xsph_viscosity(
                &mut self.storage.particles,
                &self.grid,
                &self.kernels,
                self.config.xsph_c,
                search_radius_cells,
                max_per_cell,
                &mut self.velocity_scratch,
            );

            integrator::commit_positions(
                &mut self.storage.particles,
                self.config.particle_sleeping_epsilon,
            );
            if let Some(p) = picked {
                self.storage.particles.position[p.id] = p.position;
                self.storage.particles.new_position[p.id] = p.position;
            }

            let truncations = self.grid.truncated_cell_scans();
            if truncations > 0 {
                log::warn!(
                    "spatial grid truncated {} over-dense cell scan(s) this sub-step; neighbour queries may be missing particles, consider raising num_max_particle_per_cell",
                    truncations
                );
            }
        }
    }

    fn pin_picked(&mut self, picked: Option<PickedParticle>) {
        if let Some(p) = picked {
            self.storage.particles.new_position[p.id] = p.position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_fall_accelerates_downward() {
        let mut solver = Solver::new(PhysicsConfig::default(), 4);
        solver.admit_granulars(&[Vec3::ZERO], 1.0).unwrap();

        let start_y = solver.read_particle_position(0).y;
        for _ in 0..10 {
            solver.step(1, 1.0 / 60.0, None);
        }
        let end_y = solver.read_particle_position(0).y;
        assert!(end_y < start_y, "a free particle should fall under gravity");
    }

    #[test]
    fn picked_particle_does_not_move() {
        let mut solver = Solver::new(PhysicsConfig::default(), 4);
        solver.admit_granulars(&[Vec3::ZERO], 1.0).unwrap();

        let pin = PickedParticle {
            id: 0,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
        };
        for _ in 0..10 {
            solver.step(2, 1.0 / 60.0, Some(pin));
        }
        assert_eq!(solver.read_particle_position(0), Vec3::ZERO);
    }

    #[test]
    fn two_fluid_particles_separate_when_overlapping() {
        let mut config = PhysicsConfig::default();
        config.gravity = Vec3::ZERO;
        let mut solver = Solver::new(config, 4);
        solver
            .admit_fluid(&[Vec3::ZERO, Vec3::new(0.01, 0.0, 0.0)], 1.0)
            .unwrap();

        for _ in 0..5 {
            solver.step(1, 1.0 / 60.0, None);
        }

        let d = (solver.read_particle_position(1) - solver.read_particle_position(0)).length();
        assert!(d.is_finite());
    }

    #[test]
    fn rigid_body_preserves_relative_shape_under_gravity() {
        let mut solver = Solver::new(PhysicsConfig::default(), 8);
        let offsets = [
            Vec3::new(-0.1, 0.0, 0.0),
            Vec3::new(0.1, 0.0, 0.0),
            Vec3::new(0.0, 0.1, 0.0),
        ];
        solver
            .admit_rigid_body(&offsets, Vec3::new(0.0, 2.0, 0.0), 1.0)
            .unwrap();

        for _ in 0..20 {
            solver.step(2, 1.0 / 60.0, None);
        }

        let p0 = solver.read_particle_position(0);
        let p1 = solver.read_particle_position(1);
        let dist = (p1 - p0).length();
        assert!((dist - 0.2).abs() < 0.05, "rigid body should preserve its rest distances, dist={}", dist);
    }
}
