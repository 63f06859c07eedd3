use glam::Vec3;
use pbd_core::config::PhysicsConfig;
use pbd_core::constraints::plane::Plane;
use pbd_core::{PickedParticle, Solver};

fn ground_plane() -> Plane {
    Plane::new(Vec3::ZERO, Vec3::Y)
}

/// Scenario tests run real sub-step counts, so the solver's `log::warn!`
/// calls (grid truncation, rejected admission) can fire. Route them through
/// env_logger so `RUST_LOG=pbd_core=warn cargo test -- --nocapture` shows
/// them instead of silently dropping the log crate's output.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn free_fall_lands_on_ground_plane() {
    init_logging();
    let config = PhysicsConfig::default();
    let mut solver = Solver::new(config, 4);
    solver.add_plane(ground_plane());
    solver
        .admit_granulars(&[Vec3::new(0.0, 2.0, 0.0)], 1.0)
        .unwrap();

    for _ in 0..240 {
        solver.step(2, 1.0 / 60.0, None);
    }

    let y = solver.read_particle_position(0).y;
    assert!(y >= -0.01, "particle should rest at or above the ground, y={}", y);
    assert!(y < 2.0, "particle should have fallen from its start height");
}

#[test]
fn two_body_collision_separates_overlapping_granular_particles() {
    let mut config = PhysicsConfig::default();
    config.gravity = Vec3::ZERO;
    let mut solver = Solver::new(config, 4);
    // Two distinct granular clusters (different phases) placed overlapping.
    solver.admit_granulars(&[Vec3::new(0.0, 0.0, 0.0)], 1.0).unwrap();
    solver.admit_granulars(&[Vec3::new(0.03, 0.0, 0.0)], 1.0).unwrap();

    let start_d = (solver.read_particle_position(1) - solver.read_particle_position(0)).length();
    for _ in 0..20 {
        solver.step(2, 1.0 / 60.0, None);
    }
    let end_d = (solver.read_particle_position(1) - solver.read_particle_position(0)).length();

    assert!(end_d > start_d, "overlapping bodies should separate, start={} end={}", start_d, end_d);
}

#[test]
fn rigid_body_rotates_and_keeps_rest_distances() {
    let mut config = PhysicsConfig::default();
    config.gravity = Vec3::new(0.0, -9.8, 0.0);
    let mut solver = Solver::new(config, 8);

    let offsets = [
        Vec3::new(-0.1, 0.0, 0.0),
        Vec3::new(0.1, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 0.1),
        Vec3::new(0.0, 0.0, -0.1),
    ];
    solver
        .admit_rigid_body(&offsets, Vec3::new(0.0, 3.0, 0.0), 1.0)
        .unwrap();

    for _ in 0..60 {
        solver.step(2, 1.0 / 60.0, None);
    }

    for a in 0..4 {
        for b in (a + 1)..4 {
            let rest = (offsets[a] - offsets[b]).length();
            let now = (solver.read_particle_position(a) - solver.read_particle_position(b)).length();
            assert!(
                (now - rest).abs() < 0.05,
                "rigid pair {}-{} should keep its rest distance: rest={} now={}",
                a, b, rest, now
            );
        }
    }
}

#[test]
fn fluid_column_settles_without_exploding() {
    let config = PhysicsConfig::default();
    let mut solver = Solver::new(config, 64);
    solver.add_plane(ground_plane());

    let mut positions = Vec::new();
    for x in 0..3 {
        for y in 0..3 {
            for z in 0..3 {
                positions.push(Vec3::new(
                    x as f32 * 0.05,
                    1.0 + y as f32 * 0.05,
                    z as f32 * 0.05,
                ));
            }
        }
    }
    solver.admit_fluid(&positions, 1.0).unwrap();

    for _ in 0..120 {
        solver.step(2, 1.0 / 60.0, None);
    }

    for i in 0..positions.len() {
        let p = solver.read_particle_position(i);
        assert!(p.is_finite(), "fluid particle {} diverged: {:?}", i, p);
        assert!(p.y < 1.5, "fluid particle {} should have fallen, y={}", i, p.y);
    }
}

#[test]
fn shape_matching_is_deterministic_given_identical_input() {
    let config = PhysicsConfig::default();
    let offsets = [
        Vec3::new(-0.1, 0.0, 0.0),
        Vec3::new(0.1, 0.0, 0.0),
        Vec3::new(0.0, 0.1, 0.0),
    ];

    let run = || {
        let mut solver = Solver::new(config, 8);
        solver
            .admit_rigid_body(&offsets, Vec3::new(0.0, 5.0, 0.0), 1.0)
            .unwrap();
        for _ in 0..30 {
            solver.step(2, 1.0 / 60.0, None);
        }
        (0..3).map(|i| solver.read_particle_position(i)).collect::<Vec<_>>()
    };

    let a = run();
    let b = run();
    for i in 0..3 {
        assert_eq!(a[i], b[i], "identical input should produce identical output at particle {}", i);
    }
}

#[test]
fn picked_particle_stays_put_while_neighbours_still_move() {
    let mut config = PhysicsConfig::default();
    config.gravity = Vec3::new(0.0, -9.8, 0.0);
    let mut solver = Solver::new(config, 8);
    solver
        .admit_granulars(&[Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 1.0, 0.0)], 1.0)
        .unwrap();

    let pin = PickedParticle {
        id: 0,
        position: Vec3::new(0.0, 1.0, 0.0),
        velocity: Vec3::ZERO,
    };
    for _ in 0..30 {
        solver.step(2, 1.0 / 60.0, Some(pin));
    }

    assert_eq!(solver.read_particle_position(0), Vec3::new(0.0, 1.0, 0.0));
    assert!(solver.read_particle_position(1).y < 1.0, "unpinned particle should have fallen");
}
