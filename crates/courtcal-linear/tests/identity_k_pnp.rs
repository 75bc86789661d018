//! Closed-form pose and homography recovery on a court-sized scene with an
//! identity camera matrix.

use courtcal_core::{Iso3, Pt2, Pt3};
use courtcal_linear::{HomographySolver, PnpSolver};
use nalgebra::{Translation3, UnitQuaternion};

/// World → camera for a camera 12 m behind the sideline, 6 m up.
fn pose() -> Iso3 {
    Iso3::from_parts(Translation3::identity(), UnitQuaternion::from_euler_angles(2.0, 0.05, 0.1))
        * Iso3::translation(-9.0, 12.0, -6.0)
}

fn project(pose: &Iso3, world: &[Pt3]) -> Vec<Pt2> {
    world
        .iter()
        .map(|p| {
            let c = pose.transform_point(p);
            Pt2::new(c.x / c.z, c.y / c.z)
        })
        .collect()
}

fn assert_pose_close(est: &Iso3, gt: &Iso3, tol: f64) {
    let dt = (est.translation.vector - gt.translation.vector).norm();
    let dr = est.rotation.angle_to(&gt.rotation);
    assert!(dt < tol, "translation error {dt}");
    assert!(dr < tol, "rotation error {dr}");
}

#[test]
fn four_floor_points_recover_the_pose() {
    let world = vec![
        Pt3::new(0.0, 0.0, 0.0),
        Pt3::new(18.0, 0.0, 0.0),
        Pt3::new(18.0, 9.0, 0.0),
        Pt3::new(0.0, 9.0, 0.0),
    ];
    let est = PnpSolver::initial_pose(&world, &project(&pose(), &world)).unwrap();
    assert_pose_close(&est, &pose(), 1e-6);
}

#[test]
fn general_position_points_recover_the_pose() {
    let world = vec![
        Pt3::new(0.0, 0.0, 0.0),
        Pt3::new(18.0, 0.0, 0.0),
        Pt3::new(18.0, 9.0, 0.0),
        Pt3::new(0.0, 9.0, 0.0),
        Pt3::new(9.0, -0.5, 2.43),
        Pt3::new(9.0, 9.5, 2.43),
        Pt3::new(18.0, 4.5, 1.2),
        Pt3::new(4.0, 6.0, 3.0),
    ];
    let est = PnpSolver::initial_pose(&world, &project(&pose(), &world)).unwrap();
    assert_pose_close(&est, &pose(), 1e-6);
}

#[test]
fn floor_homography_round_trips() {
    let world: Vec<Pt2> = [(0.0, 0.0), (18.0, 0.0), (18.0, 9.0), (0.0, 9.0), (9.0, 4.5), (6.0, 2.0)]
        .into_iter()
        .map(|(x, y)| Pt2::new(x, y))
        .collect();
    let floor: Vec<Pt3> = world.iter().map(|p| Pt3::new(p.x, p.y, 0.0)).collect();
    let image = project(&pose(), &floor);

    let h = HomographySolver::dlt(&image, &world).unwrap();
    for e in HomographySolver::transfer_errors(&h, &image, &world) {
        assert!(e < 1e-8, "transfer error {e}");
    }
    let h_inv = h.try_inverse().unwrap();
    for e in HomographySolver::transfer_errors(&h_inv, &world, &image) {
        assert!(e < 1e-10, "inverse transfer error {e}");
    }
}
