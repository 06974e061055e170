use mandelscry::scry::{judge, Verdict};
use mandelscry::{
    boundary_sides, density_profile, export_frames, plan_trajectory, Evaluator, IterationPolicy,
    OutputSettings, ScryConfig, Scryer, TargetPoint, TrajectoryConfig, TrajectoryPlanner, Viewport,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn quick_search() -> ScryConfig {
    ScryConfig {
        width: 40,
        height: 30,
        target_level_base: 8,
        target_level_spread: 2,
        max_restarts: 4,
        ..ScryConfig::default()
    }
}

#[test]
fn seeded_search_is_reproducible() {
    let first = Scryer::new(quick_search(), StdRng::seed_from_u64(7)).find_target();
    let second = Scryer::new(quick_search(), StdRng::seed_from_u64(7)).find_target();
    assert_eq!(first, second);
}

/// The whole set framed on a 5x5 block grid: the centre block sits inside the
/// main cardioid, the outer column and the top and bottom corners are clear,
/// and no edge touches the set.
fn framed_set() -> ScryConfig {
    ScryConfig {
        width: 50,
        height: 50,
        start_x: -0.2,
        // half a pixel off the real axis
        start_y: 0.03125,
        scale_exponent: 4,
        target_level_base: 0,
        target_level_spread: 0,
        grainy_threshold: 0.5,
        max_restarts: 1,
        ..ScryConfig::default()
    }
}

#[test]
fn framed_set_is_accepted_by_the_driver() {
    let mut scryer = Scryer::new(framed_set(), StdRng::seed_from_u64(0));
    let target = scryer.find_target().unwrap();
    assert!(scryer.attempts() >= scryer.config().refine_tries);
    assert!(target.level >= 0);

    let config = scryer.config();
    let viewport = Viewport::new(
        target.x,
        target.y,
        config.scale_at(target.level),
        config.width,
        config.height,
        target.depth,
    )
    .unwrap();
    let grid = config.evaluator().evaluate(&viewport);
    let density = density_profile(&grid, config.block_size);
    assert!(density.max_proportion() > config.potential_threshold);
    assert!(density.clear_fraction() > config.clear_threshold);
    assert!(matches!(
        judge(config, &grid),
        Verdict::Focus {
            potential: true,
            ..
        }
    ));
}

#[test]
fn framed_set_first_view_is_a_candidate() {
    let config = framed_set();
    let viewport = Viewport::new(-0.2, 0.03125, 1.0 / 16.0, 50, 50, 500).unwrap();
    let grid = config.evaluator().evaluate(&viewport);
    let density = density_profile(&grid, 10);
    // centre block lies inside the main cardioid
    assert_eq!(density.get(2, 2), 1.0);
    assert!(!boundary_sides(&grid, config.side_threshold).any());
    assert!(matches!(
        judge(&config, &grid),
        Verdict::Focus {
            potential: true,
            ..
        }
    ));
}

#[test]
fn main_cardioid_is_mostly_bounded() {
    let viewport = Viewport::new(-0.25, 0.0, 0.01, 60, 40, 200).unwrap();
    let grid = Evaluator::new(IterationPolicy::SeededWithC).evaluate(&viewport);
    // the whole view sits inside the main cardioid
    assert_eq!(grid.bounded_count(), 60 * 40);
}

#[test]
fn trajectory_onto_seahorse_valley_point() {
    let target = TargetPoint {
        x: -0.302,
        y: 0.662,
        level: 10,
        depth: 1500,
    };
    let frames = plan_trajectory(&TrajectoryConfig::default(), &target, 10);
    assert_eq!(frames.len(), 10);
    for pair in frames.windows(2) {
        assert!(pair[1].scale < pair[0].scale);
        assert_eq!(pair[1].depth, pair[0].depth + 100);
        let d0 = (pair[0].center_x - target.x).hypot(pair[0].center_y - target.y);
        let d1 = (pair[1].center_x - target.x).hypot(pair[1].center_y - target.y);
        assert!(d1 <= d0);
    }
}

#[test]
fn export_writes_keyframes_and_frames() {
    let dir = tempfile::tempdir().unwrap();
    let settings = OutputSettings {
        width: 24,
        height: 16,
        oversample: 2,
        frames_per_level: 2,
        levels: Some(3),
        out_dir: dir.path().to_path_buf(),
        smooth_orphans: false,
    };
    let target = TargetPoint {
        x: -0.75,
        y: 0.1,
        level: 3,
        depth: 800,
    };
    let planner = TrajectoryPlanner::new(TrajectoryConfig::default(), &target, 3);
    let evaluator = Evaluator::new(IterationPolicy::default());

    let paths = export_frames(&planner, &settings, &evaluator, dir.path()).unwrap();
    assert_eq!(paths.len(), 6);
    for i in 0..3 {
        let key = image::open(dir.path().join(format!("key-{i}.png"))).unwrap();
        assert_eq!((key.width(), key.height()), (48, 32));
    }
    for (i, path) in paths.iter().enumerate() {
        assert_eq!(path, &dir.path().join(format!("{:03}.png", i)));
        let frame = image::open(path).unwrap();
        assert_eq!((frame.width(), frame.height()), (24, 16));
    }
}
