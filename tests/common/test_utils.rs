//! Scripted XR sessions and a renderer that only records what it was asked to do.

#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use cgmath::{Matrix4, Quaternion, Rotation3, Deg, Vector3};
use flow_ar::{
    camera::Camera,
    data_structures::scene_graph::{NodeId, Scene},
    render::Renderer,
    xr::{Pose, ReferenceSpaceType, XrError, XrFrame, XrFuture, XrSession, XrView},
};
use futures::{FutureExt, channel::oneshot};

#[derive(Clone, Debug, PartialEq)]
pub struct FakeSpace(pub ReferenceSpaceType);

#[derive(Debug)]
pub struct FakeSource;

#[derive(Clone, Debug)]
pub struct FakeHit(pub Option<Pose>);

#[derive(Default)]
struct SessionState {
    space_requests: RefCell<Vec<ReferenceSpaceType>>,
    source_requests: Cell<usize>,
    end_listeners: RefCell<Vec<Box<dyn FnOnce()>>>,
    reject_space: Cell<Option<ReferenceSpaceType>>,
    reject_source: Cell<bool>,
    hold_source: Cell<bool>,
    held: RefCell<Vec<oneshot::Sender<()>>>,
    ended: Cell<bool>,
}

/// An XR session whose requests resolve immediately unless told otherwise.
#[derive(Clone, Default)]
pub struct FakeSession {
    state: Rc<SessionState>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects requests for the given reference space.
    pub fn rejecting_space(kind: ReferenceSpaceType) -> Self {
        let session = Self::new();
        session.state.reject_space.set(Some(kind));
        session
    }

    pub fn rejecting_source() -> Self {
        let session = Self::new();
        session.state.reject_source.set(true);
        session
    }

    /// Hit-test source requests stay pending until [`FakeSession::release`].
    pub fn holding_source() -> Self {
        let session = Self::new();
        session.state.hold_source.set(true);
        session
    }

    pub fn release(&self) {
        for sender in self.state.held.borrow_mut().drain(..) {
            let _ = sender.send(());
        }
    }

    pub fn space_requests(&self) -> Vec<ReferenceSpaceType> {
        self.state.space_requests.borrow().clone()
    }

    pub fn source_requests(&self) -> usize {
        self.state.source_requests.get()
    }

    /// Fires every registered end listener, like the platform's `end` event.
    pub fn end(&self) {
        self.state.ended.set(true);
        let listeners: Vec<_> = self.state.end_listeners.borrow_mut().drain(..).collect();
        for listener in listeners {
            listener();
        }
    }

    pub fn frame(&self, hits: Vec<FakeHit>) -> FakeFrame {
        FakeFrame {
            session: self.clone(),
            hits,
            view: None,
        }
    }

    pub fn frame_with_poses(&self, poses: &[Pose]) -> FakeFrame {
        self.frame(poses.iter().map(|pose| FakeHit(Some(*pose))).collect())
    }
}

impl XrSession for FakeSession {
    type Space = FakeSpace;
    type HitTestSource = FakeSource;

    fn request_reference_space(&self, kind: ReferenceSpaceType) -> XrFuture<FakeSpace> {
        self.state.space_requests.borrow_mut().push(kind);
        let rejected = self.state.reject_space.get() == Some(kind);
        async move {
            if rejected {
                Err(XrError::ReferenceSpace {
                    space: kind,
                    reason: "not supported".into(),
                })
            } else {
                Ok(FakeSpace(kind))
            }
        }
        .boxed_local()
    }

    fn request_hit_test_source(&self, space: &FakeSpace) -> XrFuture<FakeSource> {
        assert_eq!(space.0, ReferenceSpaceType::Viewer, "hit-test rays start at the viewer");
        self.state.source_requests.set(self.state.source_requests.get() + 1);
        if self.state.reject_source.get() {
            return async { Err(XrError::HitTestSource("not supported".into())) }.boxed_local();
        }
        if self.state.hold_source.get() {
            let (tx, rx) = oneshot::channel();
            self.state.held.borrow_mut().push(tx);
            return async move {
                rx.await
                    .map(|_| FakeSource)
                    .map_err(|_| XrError::HitTestSource("dropped".into()))
            }
            .boxed_local();
        }
        async { Ok(FakeSource) }.boxed_local()
    }

    fn on_end(&self, listener: Box<dyn FnOnce()>) {
        if self.state.ended.get() {
            listener();
        } else {
            self.state.end_listeners.borrow_mut().push(listener);
        }
    }
}

pub struct FakeFrame {
    session: FakeSession,
    hits: Vec<FakeHit>,
    view: Option<XrView>,
}

impl FakeFrame {
    pub fn with_view(mut self, view: XrView) -> Self {
        self.view = Some(view);
        self
    }
}

impl XrFrame for FakeFrame {
    type Session = FakeSession;
    type HitResult = FakeHit;

    fn session(&self) -> &FakeSession {
        &self.session
    }

    fn hit_test_results(&self, _source: &FakeSource) -> Vec<FakeHit> {
        self.hits.clone()
    }

    fn hit_pose(&self, hit: &FakeHit, space: &FakeSpace) -> Option<Pose> {
        assert_eq!(space.0, ReferenceSpaceType::Local, "hit poses resolve in local space");
        hit.0
    }

    fn viewer_view(&self) -> Option<XrView> {
        self.view
    }
}

/// Counts frames and collects the ids a GPU renderer would have released.
#[derive(Default)]
pub struct RecordingRenderer {
    pub frames: usize,
    pub released: Vec<NodeId>,
    pub last_draw_count: usize,
    pub last_view_proj: Option<Matrix4<f32>>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, scene: &mut Scene, camera: &Camera) -> anyhow::Result<()> {
        self.frames += 1;
        self.released.extend(scene.take_released());
        self.last_draw_count = scene.draw_items().len();
        self.last_view_proj = Some(camera.view_proj());
        Ok(())
    }

    fn resize(&mut self, _width: u32, _height: u32) {}
}

pub fn pose_at(x: f32, y: f32, z: f32) -> Pose {
    Pose::from_position_orientation(Vector3::new(x, y, z), Quaternion::from_angle_y(Deg(0.0)))
}

pub fn turned_pose_at(x: f32, y: f32, z: f32, degrees: f32) -> Pose {
    Pose::from_position_orientation(Vector3::new(x, y, z), Quaternion::from_angle_y(Deg(degrees)))
}
