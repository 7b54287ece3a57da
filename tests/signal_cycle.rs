use std::time::{Duration, Instant};

use smart_signal::config::SignalConfig;
use smart_signal::density::DensityThresholds;
use smart_signal::feed::{CountSource, DirectorySource};
use smart_signal::{
    Direction, DirectionCount, EmergencyFlag, Observation, SignalMode, SignalPolicy,
    SmartIntersection, density_percentage, green_time,
};

fn intersection(emergency_duration: u32) -> SmartIntersection {
    let policy = SignalPolicy::new(SignalConfig {
        min_green_time: 30,
        max_green_time: 60,
        max_capacity_per_road: 4,
        emergency_duration,
        ..SignalConfig::default()
    });
    SmartIntersection::new(policy, Duration::from_secs(60))
}

#[test]
fn test_density_and_green_time_reference_points() {
    assert_eq!(density_percentage(0, 4), 0.0);
    assert_eq!(density_percentage(4, 4), 100.0);
    assert_eq!(density_percentage(8, 4), 100.0);
    assert_eq!(green_time(0.0, 30, 60), 30);
    assert_eq!(green_time(100.0, 30, 60), 60);
    assert_eq!(green_time(50.0, 30, 60), 45);
}

#[test]
fn test_full_cycle_rotation_emergency_override() {
    let ix = intersection(5);
    let t0 = Instant::now();

    // Rotation picks the busiest road and holds it for the whole phase.
    ix.ingest_at(
        Observation::from_counts(DirectionCount::new(1, 5, 2, 0)),
        t0,
    );
    let first = ix.tick_at(t0);
    assert_eq!(first.state.active_direction, Direction::East);
    assert_eq!(first.state.time_remaining, 60);

    ix.ingest_at(
        Observation::from_counts(DirectionCount::new(4, 0, 0, 0)),
        t0,
    );
    for remaining in (50..60).rev() {
        let report = ix.tick_at(t0);
        assert_eq!(report.state.active_direction, Direction::East);
        assert_eq!(report.state.time_remaining, remaining);
        assert!(!report.changed);
    }

    // An ambulance on the west road preempts immediately.
    ix.ingest_at(
        Observation::from_counts(DirectionCount::new(4, 0, 0, 1))
            .with_emergency(EmergencyFlag::Raised(Some(Direction::West)), 1),
        t0,
    );
    let preempted = ix.tick_at(t0);
    assert_eq!(preempted.state.mode(), SignalMode::Emergency);
    assert_eq!(preempted.state.active_direction, Direction::West);
    assert_eq!(preempted.state.time_remaining, 5);

    // Operator override wins over the running emergency.
    ix.force(Direction::South);
    let forced = ix.tick_at(t0);
    assert_eq!(forced.state.mode(), SignalMode::Overridden);
    assert_eq!(forced.state.active_direction, Direction::South);

    // Reset goes back to rotation on the latest counts, not to the
    // interrupted emergency.
    ix.reset();
    ix.ingest_at(
        Observation::from_counts(DirectionCount::new(0, 2, 0, 3)),
        t0,
    );
    let resumed = ix.tick_at(t0);
    assert_eq!(resumed.state.mode(), SignalMode::Rotating);
    assert_eq!(resumed.state.active_direction, Direction::West);
    assert_eq!(resumed.state.time_remaining, 52);

    let stats = ix.stats();
    assert_eq!(stats.emergency_preemptions, 1);
    assert_eq!(stats.override_ticks, 1);
    assert_eq!(stats.phases_started[Direction::East.index()], 1);
    assert_eq!(stats.phases_started[Direction::West.index()], 1);
}

#[test]
fn test_emergency_expiry_recomputes_from_latest_counts() {
    let ix = intersection(2);
    let t0 = Instant::now();
    ix.ingest_at(
        Observation::from_counts(DirectionCount::new(1, 1, 1, 1))
            .with_emergency(EmergencyFlag::Raised(None), 1),
        t0,
    );
    assert!(ix.tick_at(t0).state.is_emergency);

    ix.ingest_at(
        Observation::from_counts(DirectionCount::new(0, 0, 2, 0)),
        t0,
    );
    assert_eq!(ix.tick_at(t0).state.time_remaining, 1);
    assert_eq!(ix.tick_at(t0).state.time_remaining, 0);

    let rotated = ix.tick_at(t0);
    assert_eq!(rotated.state.mode(), SignalMode::Rotating);
    assert_eq!(rotated.state.active_direction, Direction::South);
    assert_eq!(rotated.state.time_remaining, 45);
}

#[test]
fn test_batched_reports_keep_emergency() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("a.json"),
        r#"{"counts": {"N": 1, "E": 0, "S": 0, "W": 2}, "emergency": "W", "ambulances": 1}"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("b.json"),
        r#"{"counts": {"N": 3, "E": 0, "S": 0, "W": 0}}"#,
    )
    .unwrap();

    let mut source = DirectorySource::new(dir.path(), 0.5, DensityThresholds::default());
    let ix = intersection(5);
    let t0 = Instant::now();
    for observation in source.poll().unwrap() {
        ix.ingest_at(observation, t0);
    }

    let report = ix.tick_at(t0);
    assert_eq!(report.state.mode(), SignalMode::Emergency);
    assert_eq!(report.state.active_direction, Direction::West);
    assert_eq!(ix.stats().observations, 2);
}
