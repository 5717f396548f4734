//! Platform XR abstraction.
//!
//! The hit-test loop only needs a handful of things from the platform: reference
//! spaces, a hit-test source, per-frame hit results and a way to hear about the end
//! of a session. Those are expressed as the [`XrSession`] and [`XrFrame`] traits so
//! that the state machine in [`tracker`] can run against WebXR in the browser
//! ([`webxr`]) as well as against scripted sessions in tests.
//!
//! - [`session`] acquires the per-session hit-test context
//! - [`tracker`] drives the reticle from hit-test results once per frame

use std::fmt;

use cgmath::{Matrix4, Quaternion, SquareMatrix, Vector3};
use futures::future::LocalBoxFuture;
use thiserror::Error;

use crate::data_structures::instance::Instance;

pub mod session;
pub mod tracker;
#[cfg(target_arch = "wasm32")]
pub mod webxr;

/// The coordinate frames the hit-test loop asks the platform for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceSpaceType {
    /// Camera relative, used as the origin of the hit-test ray.
    Viewer,
    /// Session origin relative, used to resolve hit poses.
    Local,
}

impl ReferenceSpaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceSpaceType::Viewer => "viewer",
            ReferenceSpaceType::Local => "local",
        }
    }
}

impl fmt::Display for ReferenceSpaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejections surfaced by the platform while setting up hit-testing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum XrError {
    #[error("the platform rejected the `{space}` reference space: {reason}")]
    ReferenceSpace {
        space: ReferenceSpaceType,
        reason: String,
    },
    #[error("the platform rejected the hit-test source: {0}")]
    HitTestSource(String),
    #[error("immersive AR is not available: {0}")]
    Unsupported(String),
    #[error("the session could not be started: {0}")]
    Session(String),
}

/// Future returned by platform requests. XR objects are not `Send` in the browser,
/// so everything stays on the local task.
pub type XrFuture<T> = LocalBoxFuture<'static, Result<T, XrError>>;

/// A rigid transform handed out by the platform, stored as a column-major matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub matrix: Matrix4<f32>,
}

impl Pose {
    pub fn new(matrix: Matrix4<f32>) -> Self {
        Self { matrix }
    }

    /// Builds a pose from the 16 floats WebXR uses for `XRRigidTransform.matrix`.
    pub fn from_column_major(values: &[f32; 16]) -> Self {
        let c = |i: usize| [values[i], values[i + 1], values[i + 2], values[i + 3]];
        Self {
            matrix: Matrix4::from_cols(c(0).into(), c(4).into(), c(8).into(), c(12).into()),
        }
    }

    pub fn from_position_orientation(
        position: Vector3<f32>,
        orientation: Quaternion<f32>,
    ) -> Self {
        Self {
            matrix: Matrix4::from_translation(position) * Matrix4::from(orientation),
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        self.matrix.w.truncate()
    }

    pub fn orientation(&self) -> Quaternion<f32> {
        self.to_instance().rotation
    }

    pub fn to_instance(&self) -> Instance {
        Instance::from_matrix(self.matrix)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(Matrix4::identity())
    }
}

/// Camera parameters for one view, as reported by the platform for a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XrView {
    /// World to view transform (inverse of the viewer pose).
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
}

/// Features requested when an `immersive-ar` session is started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    pub required_features: Vec<&'static str>,
    pub optional_features: Vec<&'static str>,
}

impl SessionOptions {
    pub const MODE: &'static str = "immersive-ar";

    pub fn new(requires_hit_test: bool) -> Self {
        Self {
            required_features: if requires_hit_test {
                vec!["hit-test"]
            } else {
                Vec::new()
            },
            optional_features: vec!["dom-overlay"],
        }
    }
}

/// An immersive session as seen by the hit-test loop.
///
/// Implementations are cheap handles (`Clone`) onto a platform object.
pub trait XrSession: Clone + 'static {
    type Space: Clone + 'static;
    type HitTestSource: 'static;

    fn request_reference_space(&self, kind: ReferenceSpaceType) -> XrFuture<Self::Space>;

    fn request_hit_test_source(&self, space: &Self::Space) -> XrFuture<Self::HitTestSource>;

    /// Registers a listener that fires once when the platform ends the session.
    fn on_end(&self, listener: Box<dyn FnOnce()>);
}

/// A single rendered frame of an [`XrSession`].
pub trait XrFrame {
    type Session: XrSession;
    type HitResult;

    fn session(&self) -> &Self::Session;

    /// Results for this frame in the order the platform ranks them.
    fn hit_test_results(
        &self,
        source: &<Self::Session as XrSession>::HitTestSource,
    ) -> Vec<Self::HitResult>;

    /// Resolves a hit result against `space`. `None` when the platform cannot
    /// express the pose in that space this frame.
    fn hit_pose(
        &self,
        result: &Self::HitResult,
        space: &<Self::Session as XrSession>::Space,
    ) -> Option<Pose>;

    /// The primary view of the viewer in the space the host renders in, if the
    /// platform tracks it this frame.
    fn viewer_view(&self) -> Option<XrView> {
        None
    }
}

/// Session type for hosts without any XR runtime, such as the native preview.
///
/// It has no values, so a frame loop parameterised with it never sees a frame.
#[derive(Clone, Copy, Debug)]
pub enum Detached {}

impl XrSession for Detached {
    type Space = Detached;
    type HitTestSource = Detached;

    fn request_reference_space(&self, _: ReferenceSpaceType) -> XrFuture<Self::Space> {
        match *self {}
    }

    fn request_hit_test_source(&self, _: &Self::Space) -> XrFuture<Self::HitTestSource> {
        match *self {}
    }

    fn on_end(&self, _: Box<dyn FnOnce()>) {
        match *self {}
    }
}

impl XrFrame for Detached {
    type Session = Detached;
    type HitResult = Detached;

    fn session(&self) -> &Self::Session {
        self
    }

    fn hit_test_results(&self, _: &Detached) -> Vec<Detached> {
        match *self {}
    }

    fn hit_pose(&self, _: &Detached, _: &Detached) -> Option<Pose> {
        match *self {}
    }
}
