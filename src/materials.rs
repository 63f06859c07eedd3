use crate::config::PhysicsConfig;

/// Material preset for quick configuration of fluid/granular behavior.
///
/// Rigid bodies have no material-level tuning here: their stiffness comes
/// entirely from the shape-matching rotation extraction, not from a
/// density/viscosity profile.
#[derive(Clone, Copy, Debug)]
pub struct MaterialPreset {
    pub rest_density: f32,
    pub xsph_c: f32,
    pub vorticity_scale: f32,
    pub surface_tension: f32,
    pub particle_radius: f32,
    pub friction_static: f32,
    pub friction_dynamic: f32,
    pub use_akinci_cohesion_tension: bool,
}

impl MaterialPreset {
    /// Water: medium density, low viscosity, moderate vorticity, sCorr
    /// anti-clustering rather than Akinci cohesion.
    pub const WATER: Self = Self {
        rest_density: 1000.0,
        xsph_c: 2.0e-4,
        vorticity_scale: 1.0e-3,
        surface_tension: 0.0,
        particle_radius: 0.04,
        friction_static: 0.1,
        friction_dynamic: 0.08,
        use_akinci_cohesion_tension: false,
    };

    /// Gas/Smoke: very low density, very low viscosity, high vorticity.
    pub const GAS: Self = Self {
        rest_density: 10.0,
        xsph_c: 1.0e-5,
        vorticity_scale: 5.0e-3,
        surface_tension: 0.0,
        particle_radius: 0.08,
        friction_static: 0.0,
        friction_dynamic: 0.0,
        use_akinci_cohesion_tension: false,
    };

    /// Honey: high density, high viscosity, Akinci cohesion for the
    /// characteristic surface tension over sCorr's anti-clustering.
    pub const HONEY: Self = Self {
        rest_density: 1400.0,
        xsph_c: 5.0e-2,
        vorticity_scale: 1.0e-4,
        surface_tension: 1.2,
        particle_radius: 0.03,
        friction_static: 0.4,
        friction_dynamic: 0.3,
        use_akinci_cohesion_tension: true,
    };

    /// Sand/Granular: high friction, no fluid fields used (granular
    /// particles never enter the density constraint).
    pub const SAND: Self = Self {
        rest_density: 1600.0,
        xsph_c: 0.0,
        vorticity_scale: 0.0,
        surface_tension: 0.0,
        particle_radius: 0.03,
        friction_static: 0.8,
        friction_dynamic: 0.6,
        use_akinci_cohesion_tension: false,
    };

    /// Apply this preset's fields to a physics config.
    pub fn apply_to(&self, config: &mut PhysicsConfig) {
        config.rest_density = self.rest_density;
        config.xsph_c = self.xsph_c;
        config.vorticity_scale = self.vorticity_scale;
        config.surface_tension = self.surface_tension;
        config.particle_radius = self.particle_radius;
        config.friction_static = self.friction_static;
        config.friction_dynamic = self.friction_dynamic;
        config.use_akinci_cohesion_tension = self.use_akinci_cohesion_tension;
    }
}
