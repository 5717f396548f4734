use futures::FutureExt;

use flow_ar::{
    scenes::reticle,
    xr::{
        ReferenceSpaceType, XrError,
        session::{EndSignal, initialize},
        tracker::{FrameTracker, FrameUpdate, Phase},
    },
};

use crate::common::test_utils::{FakeFrame, FakeHit, FakeSession, pose_at, turned_pose_at};

mod common;

#[test]
fn frame_without_data_leaves_reticle_alone() {
    let mut tracker = FrameTracker::<FakeSession>::new();
    let mut reticle = reticle();

    reticle.visible = true;
    assert_eq!(tracker.track(None::<&FakeFrame>, &mut reticle), FrameUpdate::NoFrame);
    assert!(reticle.visible);

    reticle.visible = false;
    assert_eq!(tracker.track(None::<&FakeFrame>, &mut reticle), FrameUpdate::NoFrame);
    assert!(!reticle.visible);

    assert_eq!(tracker.phase(), Phase::Uninitialized);
    assert_eq!(tracker.init_requests(), 0);
}

#[test]
fn first_frame_initializes_and_tracks() {
    let session = FakeSession::new();
    let mut tracker = FrameTracker::new();
    let mut reticle = reticle();
    let pose = pose_at(0.0, -1.0, -2.0);

    let update = tracker.track(Some(&session.frame_with_poses(&[pose])), &mut reticle);

    assert_eq!(update, FrameUpdate::Hit(pose));
    assert!(tracker.is_ready());
    assert!(reticle.visible);
    assert_eq!(
        session.space_requests(),
        vec![ReferenceSpaceType::Viewer, ReferenceSpaceType::Local]
    );
    assert_eq!(session.source_requests(), 1);
}

#[test]
fn no_results_hide_the_reticle() {
    let session = FakeSession::new();
    let mut tracker = FrameTracker::new();
    let mut reticle = reticle();

    tracker.track(Some(&session.frame_with_poses(&[pose_at(0.0, 0.0, -1.0)])), &mut reticle);
    assert!(reticle.visible);

    let update = tracker.track(Some(&session.frame(vec![])), &mut reticle);
    assert_eq!(update, FrameUpdate::Miss);
    assert!(!reticle.visible);
}

#[test]
fn first_result_wins() {
    let session = FakeSession::new();
    let mut tracker = FrameTracker::new();
    let mut reticle = reticle();
    let first = turned_pose_at(0.3, -0.8, -1.5, 45.0);
    let second = pose_at(2.0, 0.0, -4.0);

    let update = tracker.track(
        Some(&session.frame_with_poses(&[first, second])),
        &mut reticle,
    );

    assert_eq!(update, FrameUpdate::Hit(first));
    assert!(reticle.visible);
    assert!(!reticle.transform.matrix_auto_update);
    assert_eq!(reticle.transform.matrix(), first.matrix);
}

#[test]
fn result_without_pose_hides_the_reticle() {
    let session = FakeSession::new();
    let mut tracker = FrameTracker::new();
    let mut reticle = reticle();
    reticle.visible = true;

    let frame = session.frame(vec![FakeHit(None), FakeHit(Some(pose_at(1.0, 0.0, 0.0)))]);
    assert_eq!(tracker.track(Some(&frame), &mut reticle), FrameUpdate::Miss);
    assert!(!reticle.visible);
}

#[test]
fn setup_happens_once_per_session() {
    let session = FakeSession::new();
    let mut tracker = FrameTracker::new();
    let mut reticle = reticle();

    for i in 0..30 {
        let poses = if i % 3 == 0 { vec![] } else { vec![pose_at(0.0, 0.0, -1.0)] };
        tracker.track(Some(&session.frame_with_poses(&poses)), &mut reticle);
    }

    assert_eq!(tracker.init_requests(), 1);
    assert_eq!(session.source_requests(), 1);
    assert_eq!(
        session.space_requests(),
        vec![ReferenceSpaceType::Viewer, ReferenceSpaceType::Local]
    );
}

#[test]
fn pending_setup_is_not_requested_twice() {
    let session = FakeSession::holding_source();
    let mut tracker = FrameTracker::new();
    let mut reticle = reticle();
    let pose = pose_at(0.0, -1.0, -1.0);

    for _ in 0..5 {
        let update = tracker.track(Some(&session.frame_with_poses(&[pose])), &mut reticle);
        assert_eq!(update, FrameUpdate::Initializing);
        assert!(!reticle.visible);
    }
    assert_eq!(tracker.phase(), Phase::Initializing);
    assert_eq!(tracker.init_requests(), 1);
    assert_eq!(session.source_requests(), 1);
    assert_eq!(session.space_requests(), vec![ReferenceSpaceType::Viewer]);

    session.release();
    let update = tracker.track(Some(&session.frame_with_poses(&[pose])), &mut reticle);
    assert_eq!(update, FrameUpdate::Hit(pose));
    assert_eq!(tracker.init_requests(), 1);
    assert_eq!(
        session.space_requests(),
        vec![ReferenceSpaceType::Viewer, ReferenceSpaceType::Local]
    );
}

#[test]
fn session_end_resets_and_next_frame_initializes_again() {
    let first = FakeSession::new();
    let mut tracker = FrameTracker::new();
    let mut reticle = reticle();

    tracker.track(Some(&first.frame_with_poses(&[pose_at(0.0, 0.0, -1.0)])), &mut reticle);
    assert!(tracker.is_ready());

    first.end();
    assert!(!tracker.is_ready());
    assert_eq!(tracker.phase(), Phase::Uninitialized);

    let second = FakeSession::new();
    let pose = pose_at(1.0, 0.0, -1.0);
    let update = tracker.track(Some(&second.frame_with_poses(&[pose])), &mut reticle);

    assert_eq!(update, FrameUpdate::Hit(pose));
    assert_eq!(tracker.init_requests(), 2);
    assert_eq!(second.source_requests(), 1);
    assert_eq!(first.source_requests(), 1);
}

#[test]
fn explicit_end_session_drops_the_context() {
    let session = FakeSession::new();
    let mut tracker = FrameTracker::new();
    let mut reticle = reticle();

    tracker.track(Some(&session.frame(vec![])), &mut reticle);
    assert!(tracker.local_space().is_some());

    tracker.end_session();
    assert!(!tracker.is_ready());
    assert!(tracker.local_space().is_none());
}

#[test]
fn end_during_setup_discards_the_pending_request() {
    let first = FakeSession::holding_source();
    let mut tracker = FrameTracker::new();
    let mut reticle = reticle();

    tracker.track(Some(&first.frame(vec![])), &mut reticle);
    assert_eq!(tracker.phase(), Phase::Initializing);

    first.end();
    assert_eq!(tracker.phase(), Phase::Uninitialized);

    let second = FakeSession::new();
    tracker.track(Some(&second.frame(vec![])), &mut reticle);
    assert!(tracker.is_ready());
    assert_eq!(tracker.init_requests(), 2);
}

#[test]
fn rejected_space_fails_for_the_rest_of_the_session() {
    let session = FakeSession::rejecting_space(ReferenceSpaceType::Viewer);
    let mut tracker = FrameTracker::new();
    let mut reticle = reticle();
    reticle.visible = true;

    for _ in 0..3 {
        let update = tracker.track(Some(&session.frame_with_poses(&[pose_at(0.0, 0.0, 0.0)])), &mut reticle);
        assert_eq!(update, FrameUpdate::Failed);
    }

    assert!(reticle.visible);
    assert_eq!(tracker.init_requests(), 1);
    assert_eq!(session.source_requests(), 0);
    assert!(matches!(
        tracker.last_error(),
        Some(XrError::ReferenceSpace {
            space: ReferenceSpaceType::Viewer,
            ..
        })
    ));
}

#[test]
fn rejected_source_is_retried_with_the_next_session() {
    let failing = FakeSession::rejecting_source();
    let mut tracker = FrameTracker::new();
    let mut reticle = reticle();

    assert_eq!(tracker.track(Some(&failing.frame(vec![])), &mut reticle), FrameUpdate::Failed);
    assert!(matches!(tracker.last_error(), Some(XrError::HitTestSource(_))));
    // Local space is requested after the source, so it is never reached.
    assert_eq!(failing.space_requests(), vec![ReferenceSpaceType::Viewer]);

    failing.end();
    let working = FakeSession::new();
    let pose = pose_at(0.0, 0.0, -1.0);
    assert_eq!(
        tracker.track(Some(&working.frame_with_poses(&[pose])), &mut reticle),
        FrameUpdate::Hit(pose)
    );
    assert!(tracker.last_error().is_none());
}

#[test]
fn end_signal_sees_an_end_while_setup_is_pending() {
    let session = FakeSession::holding_source();
    let signal = EndSignal::watch(&session);

    let mut setup = Box::pin(initialize(session.clone()));
    assert!((&mut setup).now_or_never().is_none());
    assert!(!signal.has_ended());

    session.end();
    assert!(signal.has_ended());

    session.release();
    match setup.now_or_never() {
        Some(Ok(context)) => assert!(context.has_ended()),
        other => panic!("setup should finish once released, got {other:?}"),
    }
}
