//! Per-session hit-test setup.
//!
//! [`initialize`] performs the three platform round-trips hit-testing needs and
//! bundles the results into a [`HitTestContext`]. The context owns the hit-test
//! source and the local reference space together, so they are created and dropped
//! as one unit.

use std::{cell::Cell, rc::Rc};

use super::{ReferenceSpaceType, XrError, XrSession};

/// Flag raised by the platform's end-of-session listener.
#[derive(Clone, Debug, Default)]
pub struct EndSignal(Rc<Cell<bool>>);

impl EndSignal {
    /// Registers an end listener on `session` and returns the flag it raises.
    pub fn watch<S: XrSession>(session: &S) -> Self {
        let signal = Self::default();
        let flag = signal.0.clone();
        session.on_end(Box::new(move || flag.set(true)));
        signal
    }

    pub fn has_ended(&self) -> bool {
        self.0.get()
    }
}

/// Everything the frame tracker needs to poll hit results for one session.
pub struct HitTestContext<S: XrSession> {
    pub source: S::HitTestSource,
    pub local_space: S::Space,
    ended: EndSignal,
}

impl<S: XrSession> HitTestContext<S> {
    pub fn has_ended(&self) -> bool {
        self.ended.has_ended()
    }
}

impl<S: XrSession> std::fmt::Debug for HitTestContext<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HitTestContext")
            .field("ended", &self.ended.has_ended())
            .finish_non_exhaustive()
    }
}

/// Requests the `viewer` space, a hit-test source against it and the `local` space.
///
/// The end listener is registered before the first request so an end that races
/// the setup is still observed by the returned context.
pub async fn initialize<S: XrSession>(session: S) -> Result<HitTestContext<S>, XrError> {
    let ended = EndSignal::watch(&session);

    let viewer = session
        .request_reference_space(ReferenceSpaceType::Viewer)
        .await?;
    let source = session.request_hit_test_source(&viewer).await?;
    let local_space = session
        .request_reference_space(ReferenceSpaceType::Local)
        .await?;
    log::info!("hit-test source ready");

    Ok(HitTestContext {
        source,
        local_space,
        ended,
    })
}
