//! SPH kernel library (component C).
//!
//! All kernels are parameterised by a single smoothing radius `h`. The seven
//! process-wide constants the spec calls for (poly6 coefficient, spiky
//! gradient coefficient, the two Akinci coefficients, h^2, h/2, h) are
//! precomputed once in [`SphKernels::new`] rather than recomputed per call.

use glam::Vec3;
use std::f32::consts::PI;

/// Precomputed SPH kernel constants for a fixed smoothing radius `h`.
#[derive(Clone, Copy, Debug)]
pub struct SphKernels {
    h: f32,
    h2: f32,
    h_half: f32,
    /// Poly6 normalization: `315 / (64 * PI * h^9)`.
    poly6_coeff: f32,
    /// Spiky gradient normalization: `-45 / (PI * h^6)`.
    spiky_coeff: f32,
    /// Akinci high-branch normalization: `32 / (PI * h^9)`.
    akinci_high_coeff: f32,
    /// Akinci low-branch offset: `h^6 / 64`.
    akinci_low_offset: f32,
}

impl SphKernels {
    pub fn new(h: f32) -> Self {
        let h2 = h * h;
        let h6 = h2 * h2 * h2;
        let h9 = h6 * h2 * h;
        Self {
            h,
            h2,
            h_half: h * 0.5,
            poly6_coeff: 315.0 / (64.0 * PI * h9),
            spiky_coeff: -45.0 / (PI * h6),
            akinci_high_coeff: 32.0 / (PI * h9),
            akinci_low_offset: h6 / 64.0,
        }
    }

    #[inline]
    pub fn h(&self) -> f32 {
        self.h
    }

    /// `W_poly6(r^2) = C1 * (h^2 - r^2)^3` for `r^2 <= h^2`, else `0`.
    #[inline]
    pub fn poly6(&self, r2: f32) -> f32 {
        if r2 > self.h2 {
            return 0.0;
        }
        let diff = self.h2 - r2;
        self.poly6_coeff * diff * diff * diff
    }

    /// `grad W_spiky(v, r) = C2 * (h - r)^2 * v / r` for `0 < r <= h`, else `0`.
    #[inline]
    pub fn spiky_gradient(&self, v: Vec3, r: f32) -> Vec3 {
        if r <= 1e-8 || r > self.h {
            return Vec3::ZERO;
        }
        let diff = self.h - r;
        (v / r) * (self.spiky_coeff * diff * diff)
    }

    /// `grad W_poly6(v) = -6 * C1 * (h^2 - r^2)^2 * v` for `r^2 <= h^2`, else `0`.
    ///
    /// Used to estimate the surface normal field that Akinci cohesion needs,
    /// separately from the density estimate itself.
    #[inline]
    pub fn poly6_gradient(&self, v: Vec3, r2: f32) -> Vec3 {
        if r2 > self.h2 {
            return Vec3::ZERO;
        }
        let diff = self.h2 - r2;
        v * (-6.0 * self.poly6_coeff * diff * diff)
    }

    /// Akinci cohesion spline, piecewise over `[0, h)`.
    ///
    /// For `h/2 <= r < h`: `C3 * ((h-r)*r)^3`.
    /// For `0 < r < h/2`: `2*C3*((h-r)*r)^3 - C4`.
    /// Else `0`.
    #[inline]
    pub fn akinci(&self, r: f32) -> f32 {
        if r <= 0.0 || r >= self.h {
            return 0.0;
        }
        let term = (self.h - r) * r;
        let cubed = term * term * term;
        if r >= self.h_half {
            self.akinci_high_coeff * cubed
        } else {
            2.0 * self.akinci_high_coeff * cubed - self.akinci_low_offset
        }
    }
}
