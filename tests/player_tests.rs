//! Integration tests for the stream player.

use std::sync::Arc;

use alembic_stream::prelude::*;
use glam::{DMat4, DVec3, Vec3};

fn xform_schema(ctx: &Arc<Context>) -> Schema<XformCooker> {
    let samples = (0..4)
        .map(|i| xform_sample_bytes(&DMat4::from_translation(DVec3::new(i as f64 * 2.0, 0.0, 0.0))))
        .collect();
    let reader = Arc::new(MemoryProperty::new("xform", TimeSampling::uniform(1.0, 0.0), samples));
    Schema::new(Arc::clone(ctx), reader, XformCooker).unwrap()
}

fn points_schema(ctx: &Arc<Context>) -> Schema<PointsCooker> {
    let ts = TimeSampling::acyclic(vec![0.5, 1.0, 2.0, 5.0]);
    let positions: Vec<Vec<Vec3>> = (0..4).map(|i| vec![Vec3::splat(i as f32); 3]).collect();
    let visible = [1i8, 1, 0, 1];
    Schema::new(
        Arc::clone(ctx),
        Arc::new(MemoryProperty::from_pods("points", ts.clone(), &positions)),
        PointsCooker,
    )
    .unwrap()
    .with_visibility(Arc::new(MemoryProperty::from_scalars("visible", ts, &visible)))
}

fn player(config: StreamConfig) -> StreamPlayer {
    let ctx = Context::with_config(config);
    let mut player = StreamPlayer::new(Arc::clone(&ctx));
    player.add_schema(Box::new(xform_schema(&ctx)));
    player.add_schema(Box::new(points_schema(&ctx)));
    player
}

#[test]
fn test_media_range_covers_all_schemas() {
    let player = player(StreamConfig::default());
    assert_eq!(player.num_schemas(), 2);
    assert_eq!(player.media_start_time(), 0.0);
    assert_eq!(player.media_end_time(), 5.0);
    assert_eq!(player.duration(), 5.0);
}

#[test]
fn test_play_interpolates_every_schema() {
    let mut player = player(StreamConfig::default());
    player.update_immediately(1.5).unwrap();
    assert_eq!(player.num_updated(), 2);

    let xform = player.schema_as::<Schema<XformCooker>>(0).unwrap();
    let translation = xform.sample().unwrap().payload.translation();
    assert!((translation.x - 3.0).abs() < 1e-9);

    let points = player.schema_as::<Schema<PointsCooker>>(1).unwrap();
    let sample = points.sample().unwrap();
    assert_eq!(sample.payload.points[0], Vec3::splat(1.5));
    assert!(sample.visibility);
}

#[test]
fn test_window_offsets_current_time() {
    let mut player = player(StreamConfig::immediate());
    player.set_start_time(2.0);
    player.update_immediately(0.0).unwrap();

    let points = player.schema_as::<Schema<PointsCooker>>(1).unwrap();
    assert_eq!(points.last_sample_index(), Some(2));
    assert!(!points.sample().unwrap().visibility);
}

#[test]
fn test_config_changes_apply_to_next_update() {
    let mut player = player(StreamConfig::default());
    player.update_immediately(0.0).unwrap();

    player.set_async_load(false);
    player.set_vertex_motion_scale(0.5);
    player.update_immediately(1.25).unwrap();

    let points = player.schema_as::<Schema<PointsCooker>>(1).unwrap();
    // index 1 at t=1.0, next at t=2.0: one unit over one second, halved
    assert_eq!(points.sample().unwrap().payload.velocities[0], Vec3::splat(0.5));
    assert_eq!(points.job_state(), JobState::Idle);
}
