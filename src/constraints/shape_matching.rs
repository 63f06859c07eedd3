//! Rigid shape matching (component H).
//!
//! Reference: "Meshless Deformations Based on Shape Matching" (Muller et al.,
//! 2005) for the goal-position derivation, with the rotation itself
//! extracted by the quaternion iteration from "A Robust Method to Extract
//! the Rotational Part of Deformations" (Muller et al., 2016) rather than
//! polar decomposition of the moment matrix. The quaternion method avoids
//! ever inverting a (possibly near-singular) 3x3 matrix and warm-starts from
//! the previous sub-step's rotation, which is both cheaper and more stable
//! under fast spin.

use glam::{Mat3, Quat, Vec3};

use crate::particle::ParticleSet;
use crate::storage::RigidBodyCluster;

/// Extract the rotational part of a moment matrix `a_pq` via the iterative
/// quaternion method, warm-started from `initial`.
///
/// Each iteration computes the angular velocity `omega` that would rotate
/// the current estimate `R` closer to `a_pq`'s columns, from the cross and
/// dot products of `R`'s columns against `a_pq`'s columns, then composes a
/// small axis-angle rotation of `omega` onto the running quaternion. Stops
/// early once `omega` is negligible, or after `max_iters` iterations.
pub fn extract_rotation(a_pq: Mat3, initial: Quat, max_iters: u32) -> Quat {
    let mut q = initial;
    for _ in 0..max_iters {
        let r = Mat3::from_quat(q);
        let r_cols = [r.x_axis, r.y_axis, r.z_axis];
        let a_cols = [a_pq.x_axis, a_pq.y_axis, a_pq.z_axis];

        let mut numerator = Vec3::ZERO;
        let mut denominator = 0.0_f32;
        for k in 0..3 {
            numerator += r_cols[k].cross(a_cols[k]);
            denominator += r_cols[k].dot(a_cols[k]);
        }

        let omega = numerator / (denominator.abs() + 1.0e-9);
        let omega_len_sq = omega.length_squared();
        if omega_len_sq < 1.0e-9 {
            break;
        }

        let angle = omega_len_sq.sqrt();
        let axis = omega / angle;
        q = (Quat::from_axis_angle(axis, angle) * q).normalize();
    }
    q
}

/// Outer product of two `Vec3`: returns a `Mat3` where `M = a * b^T`.
fn mat3_outer(a: Vec3, b: Vec3) -> Mat3 {
    Mat3::from_cols(a * b.x, a * b.y, a * b.z)
}

/// Run shape matching for every non-granular cluster, moving each
/// particle's `new_position` toward its rotated rest offset about the
/// cluster's current center of mass.
///
/// Granular clusters share a phase id purely to suppress mutual collision
/// and have no rest shape to match back to, so they are skipped entirely.
pub fn solve_shape_matching(
    clusters: &mut [RigidBodyCluster],
    particles: &mut ParticleSet,
    max_iters: u32,
) {
    for cluster in clusters.iter_mut() {
        if cluster.granular || cluster.particle_count() == 0 {
            continue;
        }

        let mut com = Vec3::ZERO;
        let mut total_mass = 0.0_f32;
        for i in cluster.particle_range.clone() {
            if particles.inv_mass[i] == 0.0 {
                continue;
            }
            let mass = particles.mass[i];
            com += particles.new_position[i] * mass;
            total_mass += mass;
        }
        if total_mass < 1.0e-10 {
            continue;
        }
        com /= total_mass;

        let mut a_pq = Mat3::ZERO;
        for (k, i) in cluster.particle_range.clone().enumerate() {
            if particles.inv_mass[i] == 0.0 {
                continue;
            }
            let mass = particles.mass[i];
            let current = particles.new_position[i] - com;
            let rest = cluster.rest_offsets[k];
            a_pq += mat3_outer(current * mass, rest);
        }

        let rotation = extract_rotation(a_pq, cluster.rotation, max_iters);
        cluster.rotation = rotation;
        cluster.center_of_mass = com;

        for (k, i) in cluster.particle_range.clone().enumerate() {
            if particles.inv_mass[i] == 0.0 {
                continue;
            }
            let goal = com + rotation * cluster.rest_offsets[k];
            particles.new_position[i] = goal;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_moment_matrix_keeps_identity_rotation() {
        let q = extract_rotation(Mat3::IDENTITY, Quat::IDENTITY, 20);
        assert!((q.dot(Quat::IDENTITY)).abs() > 0.999);
    }

    #[test]
    fn extracts_a_known_rotation() {
        let expected = Quat::from_axis_angle(Vec3::Y, 0.6);
        let r = Mat3::from_quat(expected);
        // A perfect rotation's moment matrix is R itself (rest = identity basis).
        let q = extract_rotation(r, Quat::IDENTITY, 20);
        let dot = q.dot(expected).abs();
        assert!(dot > 0.99, "dot={}", dot);
    }

    #[test]
    fn solve_shape_matching_rotates_cluster_rigidly() {
        let mut particles = ParticleSet::with_capacity(4);
        let rest_offsets = vec![
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
        ];
        for (i, &offset) in rest_offsets.iter().enumerate() {
            particles.new_position[i] = offset;
            particles.mass[i] = 1.0;
            particles.inv_mass[i] = 1.0;
        }
        particles.count = 4;

        let mut clusters = vec![RigidBodyCluster {
            particle_range: 0..4,
            rest_offsets: rest_offsets.clone(),
            center_of_mass: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            granular: false,
        }];

        // Perturb one particle's predicted position to simulate drift, the
        // rest stay on their rest offsets: the solver should pull it back.
        particles.new_position[0] = Vec3::new(1.2, 0.3, 0.0);

        solve_shape_matching(&mut clusters, &mut particles, 20);

        let dist = (particles.new_position[0] - rest_offsets[0]).length();
        assert!(dist < 0.3, "particle should move back toward rest offset, dist={}", dist);
    }

    #[test]
    fn granular_clusters_are_skipped() {
        let mut particles = ParticleSet::with_capacity(2);
        particles.new_position[0] = Vec3::new(5.0, 5.0, 5.0);
        particles.mass[0] = 1.0;
        particles.inv_mass[0] = 1.0;
        particles.count = 1;

        let mut clusters = vec![RigidBodyCluster {
            particle_range: 0..1,
            rest_offsets: vec![Vec3::ZERO],
            center_of_mass: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            granular: true,
        }];

        solve_shape_matching(&mut clusters, &mut particles, 20);
        assert_eq!(particles.new_position[0], Vec3::new(5.0, 5.0, 5.0));
    }
}
