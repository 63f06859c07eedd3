use glam::Vec3;

/// All tunable scalars for the unified PBD solver.
///
/// Every field here corresponds to a named knob in the solver's external
/// configuration surface; defaults match the values the step orchestrator
/// (`solver::Solver::step`) assumes when nothing else is specified.
#[derive(Clone, Copy, Debug)]
pub struct PhysicsConfig {
    /// Gravitational acceleration applied to every sub-step.
    pub gravity: Vec3,
    /// SPH smoothing kernel radius h.
    pub smoothing_radius: f32,
    /// Rest density for fluid particles (rho_0, kg/m^3).
    pub rest_density: f32,
    /// Uniform particle collision radius r.
    pub particle_radius: f32,

    /// Static Coulomb friction coefficient (mu_s).
    pub friction_static: f32,
    /// Dynamic Coulomb friction coefficient (mu_d).
    pub friction_dynamic: f32,

    /// Mass-scaling exponent `k` in `invScaledMass = 1 / (mass * exp(-k*y))`.
    pub mass_scaling_constant: f32,
    /// Commit threshold for solids: a solid's position is only committed
    /// when the squared predicted displacement exceeds this squared value.
    pub particle_sleeping_epsilon: f32,

    /// Grid cell cap during neighbour scans (component B's correctness/speed knob).
    pub num_max_particle_per_cell: usize,
    /// Per-cluster particle cap for rigid shape matching.
    pub num_max_particle_per_rigid_body: usize,

    /// Relaxation parameter (epsilon) in the PBF lambda denominator.
    pub relaxation_epsilon: f32,
    /// sCorr anti-clustering coefficient K.
    pub s_corr_k: f32,
    /// sCorr anti-clustering exponent N.
    pub s_corr_n: i32,

    /// Vorticity confinement strength (epsilon_v).
    pub vorticity_scale: f32,
    /// Akinci cohesion/curvature surface tension coefficient (sigma).
    pub surface_tension: f32,
    /// XSPH viscosity coefficient (c).
    pub xsph_c: f32,
    /// Switches the fluid solver between sCorr anti-clustering (off) and
    /// Akinci cohesion/tension (on). Never both: see `constraints::fluid`.
    pub use_akinci_cohesion_tension: bool,

    /// Number of sub-steps per `step` call unless overridden by the caller.
    pub default_sub_steps: u32,
    /// Outer grid-rebuild/projection iterations per sub-step.
    pub outer_iterations: u32,
    /// Inner projection passes per outer iteration.
    pub inner_iterations: u32,
    /// Stabilization passes (plane pre-solve) per sub-step.
    pub stabilization_passes: u32,
    /// Maximum iterations of the Müller rotation extraction in shape matching.
    pub rotation_extraction_max_iters: u32,
    /// Neighbour-cell search radius used by particle-particle contacts (in cells).
    pub contact_search_radius_cells: i32,

    /// Grid origin in world space.
    pub grid_origin: Vec3,
    /// Grid cell size s (0 = auto-compute as `max(2*particle_radius, smoothing_radius)`).
    pub grid_cell_size: f32,
    /// Grid dimensions (Gx, Gy, Gz).
    pub grid_dims: (u32, u32, u32),
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.8, 0.0),
            smoothing_radius: 0.1,
            rest_density: 1000.0,
            particle_radius: 0.05,

            friction_static: 0.3,
            friction_dynamic: 0.2,

            mass_scaling_constant: 0.5,
            particle_sleeping_epsilon: 0.0,

            num_max_particle_per_cell: 64,
            num_max_particle_per_rigid_body: 64,

            relaxation_epsilon: 300.0,
            s_corr_k: 1.0e-4,
            s_corr_n: 4,

            vorticity_scale: 1.0e-3,
            surface_tension: 0.6,
            xsph_c: 2.0e-4,
            use_akinci_cohesion_tension: false,

            default_sub_steps: 2,
            outer_iterations: 1,
            inner_iterations: 2,
            stabilization_passes: 2,
            rotation_extraction_max_iters: 20,
            contact_search_radius_cells: 1,

            grid_origin: Vec3::ZERO,
            grid_cell_size: 0.0,
            grid_dims: (128, 64, 128),
        }
    }
}

impl PhysicsConfig {
    /// Effective grid cell size: explicit override, or `max(2r, h)`.
    pub fn effective_grid_cell_size(&self) -> f32 {
        if self.grid_cell_size > 0.0 {
            self.grid_cell_size
        } else {
            (2.0 * self.particle_radius).max(self.smoothing_radius)
        }
    }

    /// Neighbour-cell search radius for the SPH kernel, `ceil(h / s)`.
    pub fn fluid_search_radius_cells(&self) -> i32 {
        (self.smoothing_radius / self.effective_grid_cell_size()).ceil() as i32
    }
}
