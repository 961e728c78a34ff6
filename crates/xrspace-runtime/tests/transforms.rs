//! Relative transforms between frames and spatial roots.

mod common;

use std::sync::Arc;

use common::{eye_level, pose, stationary};
use xrspace_geometry::{Matrix4, Quaternion, Vec3};
use xrspace_runtime::{CoordinateSystem, XrSession};
use xrspace_tracking::{SimPlatform, SimTrackingSource, SimTrackingSourceBuilder};
use xrspace_types::{
    FrameError, FrameId, SessionMode, SpatialRootId, StationarySubtype, TrackingQuality,
};

async fn session(builder: SimTrackingSourceBuilder) -> XrSession {
    XrSession::builder(SessionMode::Immersive)
        .source(builder.build())
        .platform(Arc::new(SimPlatform::new(TrackingQuality::InsideOut)))
        .start()
        .await
        .unwrap()
}

fn frame(id: FrameId) -> CoordinateSystem {
    CoordinateSystem::Frame(id)
}

fn root(id: &str) -> CoordinateSystem {
    CoordinateSystem::Root(SpatialRootId::new(id))
}

#[tokio::test]
async fn a_frame_relative_to_itself_is_identity() {
    let mut s = session(
        SimTrackingSource::builder(TrackingQuality::InsideOut).standing_at(pose(1.0, 1.6, 2.0, 0.7)),
    )
    .await;
    let eye = s.request_frame_of_reference(eye_level(), &[]).await.unwrap();
    s.tick().unwrap();

    let m = s.transform_to(&frame(eye), &frame(eye)).unwrap().unwrap();
    assert!(m.approx_eq(&Matrix4::identity(), 1e-5));
}

#[tokio::test]
async fn opposite_directions_are_inverses() {
    let mut s = session(
        SimTrackingSource::builder(TrackingQuality::InsideOut)
            .with_room_scale_stage(2.0)
            .standing_at(pose(0.4, 1.7, -0.6, 1.1)),
    )
    .await;
    let eye = s.request_frame_of_reference(eye_level(), &[]).await.unwrap();
    let floor = s
        .request_frame_of_reference(stationary(StationarySubtype::FloorLevel), &[])
        .await
        .unwrap();
    s.tick().unwrap();

    let there = s.transform_to(&frame(eye), &frame(floor)).unwrap().unwrap();
    let back = s.transform_to(&frame(floor), &frame(eye)).unwrap().unwrap();
    assert!(there.mul(&back).approx_eq(&Matrix4::identity(), 1e-5));
}

#[tokio::test]
async fn transforms_agree_with_device_poses() {
    let mut s = session(
        SimTrackingSource::builder(TrackingQuality::InsideOut)
            .with_room_scale_stage(2.0)
            .with_motion(|tick| pose(0.1 * tick as f32, 1.6, 0.05 * tick as f32, 0.2 * tick as f32)),
    )
    .await;
    let eye = s.request_frame_of_reference(eye_level(), &[]).await.unwrap();
    let floor = s
        .request_frame_of_reference(stationary(StationarySubtype::FloorLevel), &[])
        .await
        .unwrap();
    for _ in 0..4 {
        s.tick().unwrap();
    }

    let in_eye = s.device_pose(Some(eye)).unwrap().unwrap().transform;
    let in_floor = s.device_pose(Some(floor)).unwrap().unwrap().transform;
    let eye_to_floor = s
        .relative_transform(&frame(eye), &frame(floor))
        .unwrap()
        .unwrap();
    assert!(eye_to_floor.compose(in_eye).approx_eq(&in_floor, 1e-4));
}

#[tokio::test]
async fn frame_origin_relative_to_its_root() {
    let mut s = session(
        SimTrackingSource::builder(TrackingQuality::InsideOut).standing_at(pose(1.0, 1.6, 2.0, 0.0)),
    )
    .await;
    let eye = s.request_frame_of_reference(eye_level(), &[]).await.unwrap();
    s.tick().unwrap();

    let m = s
        .transform_to(&frame(eye), &root("tracking_system"))
        .unwrap()
        .unwrap();
    assert!(m.translation().approx_eq(Vec3::new(1.0, 1.6, 2.0), 1e-5));
    let p = m.transform_point(Vec3::new(0.0, 0.0, -1.0));
    assert!(p.approx_eq(Vec3::new(1.0, 1.6, 1.0), 1e-5));
}

#[tokio::test]
async fn anchors_are_located_through_the_tracking_root() {
    let anchor_pose = pose(2.0, 0.8, -1.0, 0.5);
    let mut s = session(
        SimTrackingSource::builder(TrackingQuality::InsideOut)
            .with_room_scale_stage(2.0)
            .with_anchor("table", anchor_pose)
            .hide_anchor("table", 3..4),
    )
    .await;
    let floor = s
        .request_frame_of_reference(stationary(StationarySubtype::FloorLevel), &[])
        .await
        .unwrap();
    s.tick().unwrap();

    let t = s
        .relative_transform(&root("table"), &frame(floor))
        .unwrap()
        .unwrap();
    assert!(t.approx_eq(&anchor_pose, 1e-5));

    s.tick().unwrap();
    s.tick().unwrap();
    assert_eq!(s.relative_transform(&root("table"), &frame(floor)), Ok(None));

    s.tick().unwrap();
    assert!(
        s.relative_transform(&root("table"), &frame(floor))
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn position_disabled_strips_translation() {
    let mut s = session(
        SimTrackingSource::builder(TrackingQuality::InsideOut)
            .with_room_scale_stage(2.0)
            .standing_at(pose(1.0, 1.6, -2.0, 0.3)),
    )
    .await;
    let pd = s
        .request_frame_of_reference(stationary(StationarySubtype::PositionDisabled), &[])
        .await
        .unwrap();
    let floor = s
        .request_frame_of_reference(stationary(StationarySubtype::FloorLevel), &[])
        .await
        .unwrap();
    s.tick().unwrap();

    for (from, to) in [(frame(pd), frame(floor)), (frame(floor), frame(pd))] {
        let t = s.relative_transform(&from, &to).unwrap().unwrap();
        assert_eq!(t.translation, Vec3::zero());
    }
    let t = s.relative_transform(&frame(pd), &frame(floor)).unwrap().unwrap();
    assert!(
        t.rotation
            .approx_eq(Quaternion::from_yaw(0.3), 1e-4)
    );
}

#[tokio::test]
async fn transforms_follow_a_reset_immediately() {
    let mut s = session(
        SimTrackingSource::builder(TrackingQuality::InsideOut)
            .with_motion(|tick| {
                if tick < 2 {
                    pose(0.0, 1.6, 0.0, 0.0)
                } else {
                    pose(2.0, 1.0, 0.0, 0.0)
                }
            })
            .recenter_at(2),
    )
    .await;
    let eye = s.request_frame_of_reference(eye_level(), &[]).await.unwrap();
    s.tick().unwrap();
    let before = s
        .relative_transform(&frame(eye), &root("tracking_system"))
        .unwrap()
        .unwrap();
    assert!(before.translation.approx_eq(Vec3::new(0.0, 1.6, 0.0), 1e-5));

    let report = s.tick().unwrap();
    assert_eq!(report.resets.len(), 1);
    let after = s
        .relative_transform(&frame(eye), &root("tracking_system"))
        .unwrap()
        .unwrap();
    assert!(after.translation.approx_eq(Vec3::new(0.0, 1.0, 0.0), 1e-5));
}

#[tokio::test]
async fn unknown_coordinate_systems_are_errors() {
    let mut s = session(SimTrackingSource::builder(TrackingQuality::InsideOut)).await;
    let eye = s.request_frame_of_reference(eye_level(), &[]).await.unwrap();
    s.tick().unwrap();

    assert_eq!(
        s.transform_to(&frame(eye), &root("nowhere")),
        Err(FrameError::RootNotFound(SpatialRootId::new("nowhere")))
    );
    let stranger = FrameId::new_v4();
    assert_eq!(
        s.transform_to(&frame(stranger), &frame(eye)),
        Err(FrameError::InvalidFrame(stranger))
    );

    s.end();
    assert_eq!(
        s.transform_to(&frame(eye), &frame(eye)),
        Err(FrameError::SessionClosed)
    );
}
