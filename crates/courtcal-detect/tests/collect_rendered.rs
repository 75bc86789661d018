use courtcal_core::synthetic::project_points;
use courtcal_core::{BrownConrady5, ImageSize};
use courtcal_detect::synthetic::{render_board_view, small_camera, tilted_board_pose};
use courtcal_detect::{
    collect_observations, ChessGridFinder, CollectionPolicy, GrayImage, PatternSize,
    SubPixParams,
};

#[test]
fn rendered_sequence_yields_refined_views() {
    let pattern = PatternSize::new(7, 5);
    let camera = small_camera(BrownConrady5 {
        k1: -0.1,
        ..Default::default()
    });
    let size = ImageSize::new(640, 480);
    let poses = [
        tilted_board_pose(pattern, 0.15, 0.1, 14.0),
        tilted_board_pose(pattern, -0.2, 0.05, 15.0),
        tilted_board_pose(pattern, 0.05, -0.25, 13.0),
    ];

    let blank = GrayImage::from_pixel(size.width, size.height, image::Luma([180]));
    let mut frames = vec![blank.clone(); 11];
    for (k, pose) in poses.iter().enumerate() {
        frames[5 * k] = render_board_view(&camera, size, pose, pattern);
    }

    let policy = CollectionPolicy {
        min_count: 3,
        ..CollectionPolicy::spanning()
    };
    let views = collect_observations(
        &frames,
        pattern,
        &ChessGridFinder::default(),
        &policy,
        &SubPixParams::default(),
    )
    .unwrap();

    assert_eq!(views.len(), 3);
    for (view, pose) in views.iter().zip(&poses) {
        assert_eq!(view.object_points, pattern.object_points());
        let truth = project_points(&camera, pose, &view.object_points).unwrap();
        for (p, t) in view.image_points.iter().zip(&truth) {
            assert!((p - t).norm() < 0.3, "{p} vs {t}");
        }
    }
}
