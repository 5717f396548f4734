//! Frame-driven hit-test tracking.
//!
//! A [`FrameTracker`] is fed once per rendered frame. It lazily starts the
//! per-session initialization, polls it without blocking, and once ready moves the
//! reticle to the first hit-test result (or hides it when nothing was hit).
//!
//! ```text
//! Uninitialized --frame--> Initializing --ok--> Ready
//!                          Initializing --err--> Failed
//! Initializing | Ready | Failed --session end--> Uninitialized
//! ```
//!
//! Only one initialization can be outstanding: while the tracker is `Initializing`,
//! later frames poll the pending request instead of issuing a new one.

use futures::FutureExt;

use super::{
    Pose, XrError, XrFrame, XrFuture, XrSession,
    session::{self, EndSignal, HitTestContext},
};
use crate::data_structures::scene_graph::Node;

/// What a call to [`FrameTracker::track`] did with the reticle.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameUpdate {
    /// No frame data this tick, the reticle is untouched.
    NoFrame,
    /// Hit-testing is still being set up, the reticle is untouched.
    Initializing,
    /// The reticle is shown at the first result's pose.
    Hit(Pose),
    /// Nothing was hit (or the hit had no pose), the reticle is hidden.
    Miss,
    /// Setup was rejected for this session, the reticle is untouched.
    Failed,
}

/// Public view of the tracker state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

enum TrackerState<S: XrSession> {
    Uninitialized,
    Initializing {
        pending: XrFuture<HitTestContext<S>>,
        ended: EndSignal,
    },
    Ready(HitTestContext<S>),
    Failed {
        error: XrError,
        ended: EndSignal,
    },
}

pub struct FrameTracker<S: XrSession> {
    state: TrackerState<S>,
    init_requests: usize,
}

impl<S: XrSession> FrameTracker<S> {
    pub fn new() -> Self {
        Self {
            state: TrackerState::Uninitialized,
            init_requests: 0,
        }
    }

    /// An ended session reads as `Uninitialized` even before the next frame clears it.
    pub fn phase(&self) -> Phase {
        if self.session_has_ended() {
            return Phase::Uninitialized;
        }
        match self.state {
            TrackerState::Uninitialized => Phase::Uninitialized,
            TrackerState::Initializing { .. } => Phase::Initializing,
            TrackerState::Ready(_) => Phase::Ready,
            TrackerState::Failed { .. } => Phase::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == Phase::Ready
    }

    /// How many times initialization has been started over the tracker's lifetime.
    pub fn init_requests(&self) -> usize {
        self.init_requests
    }

    pub fn last_error(&self) -> Option<&XrError> {
        match &self.state {
            TrackerState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn local_space(&self) -> Option<&S::Space> {
        match &self.state {
            TrackerState::Ready(ctx) => Some(&ctx.local_space),
            _ => None,
        }
    }

    /// Drops any hit-test context. The next frame starts over.
    pub fn end_session(&mut self) {
        if !matches!(self.state, TrackerState::Uninitialized) {
            log::info!("session ended, releasing hit-test state");
        }
        self.state = TrackerState::Uninitialized;
    }

    /// Runs one tracking step for `frame` and updates `reticle` accordingly.
    pub fn track<F>(&mut self, frame: Option<&F>, reticle: &mut Node) -> FrameUpdate
    where
        F: XrFrame<Session = S>,
    {
        let Some(frame) = frame else {
            return FrameUpdate::NoFrame;
        };

        if self.session_has_ended() {
            self.end_session();
        }
        if let TrackerState::Uninitialized = self.state {
            self.begin(frame.session().clone());
        }
        self.poll_initialization();

        match &self.state {
            TrackerState::Ready(ctx) => update_reticle(frame, ctx, reticle),
            TrackerState::Failed { .. } => FrameUpdate::Failed,
            TrackerState::Uninitialized | TrackerState::Initializing { .. } => {
                FrameUpdate::Initializing
            }
        }
    }

    fn session_has_ended(&self) -> bool {
        match &self.state {
            TrackerState::Uninitialized => false,
            TrackerState::Initializing { ended, .. } | TrackerState::Failed { ended, .. } => {
                ended.has_ended()
            }
            TrackerState::Ready(ctx) => ctx.has_ended(),
        }
    }

    fn begin(&mut self, session: S) {
        self.init_requests += 1;
        log::info!("requesting hit-test source");
        let ended = EndSignal::watch(&session);
        let pending = session::initialize(session).boxed_local();
        self.state = TrackerState::Initializing {
            pending,
            ended,
        };
    }

    fn poll_initialization(&mut self) {
        let outcome = match &mut self.state {
            TrackerState::Initializing { pending, .. } => pending.as_mut().now_or_never(),
            _ => return,
        };
        match outcome {
            None => {}
            Some(Ok(ctx)) => self.state = TrackerState::Ready(ctx),
            Some(Err(error)) => {
                log::error!("hit-testing is unavailable for this session: {}", error);
                let previous = std::mem::replace(&mut self.state, TrackerState::Uninitialized);
                if let TrackerState::Initializing { ended, .. } = previous {
                    self.state = TrackerState::Failed { error, ended };
                }
            }
        }
    }
}

impl<S: XrSession> Default for FrameTracker<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn update_reticle<F: XrFrame>(
    frame: &F,
    ctx: &HitTestContext<F::Session>,
    reticle: &mut Node,
) -> FrameUpdate {
    let results = frame.hit_test_results(&ctx.source);
    let pose = results
        .first()
        .and_then(|hit| frame.hit_pose(hit, &ctx.local_space));
    match pose {
        Some(pose) => {
            reticle.visible = true;
            reticle.transform.set_matrix(pose.matrix);
            FrameUpdate::Hit(pose)
        }
        None => {
            reticle.visible = false;
            FrameUpdate::Miss
        }
    }
}
