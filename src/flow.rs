//! Flow control and the per-frame loop.
//!
//! A "flow" is one demo page: it builds its scene once, animates it every frame and
//! reacts to the select gesture. The [`FrameLoop`] owns the flow together with its
//! scene, camera and hit-test tracker and is driven by a host: the browser's XR
//! animation loop on the web, a winit window in the native preview (see [`run`]).
//!
//! # Lifecycle
//!
//! Every frame the loop
//! 1. applies async mutations whose futures have resolved,
//! 2. tracks the reticle against the frame's hit-test results (flows with a reticle only),
//! 3. adopts the platform's view and projection while frames arrive,
//! 4. calls `on_update`,
//! 5. renders.

use futures::{
    StreamExt,
    future::LocalBoxFuture,
    stream::FuturesUnordered,
    task::noop_waker_ref,
};
use instant::{Duration, Instant};

use cgmath::{Deg, Point3};

use crate::{
    camera::{Camera, Projection},
    data_structures::scene_graph::{NodeId, Scene},
    render::Renderer,
    xr::{
        XrFrame, XrSession,
        tracker::{FrameTracker, FrameUpdate},
    },
};

/// Deferred change to a flow and its scene, produced by an async operation.
pub type Mutation<F> = Box<dyn FnOnce(&mut F, &mut Scene)>;

///
/// Output type of the lifecycle hooks that may start async work.
///
/// `Out::FutFn` carries futures resolving to a [`Mutation`]. The frame loop applies
/// each mutation at the start of the first frame after its future resolves.
///
/// `Empty` is the default output used when nothing async has to happen.
///
pub enum Out<F> {
    FutFn(Vec<LocalBoxFuture<'static, Mutation<F>>>),
    Empty,
}

impl<F> Default for Out<F> {
    fn default() -> Self {
        Self::Empty
    }
}

impl<F: 'static> Out<F> {
    pub fn once(future: impl Future<Output = Mutation<F>> + 'static) -> Self {
        Self::FutFn(vec![Box::pin(future)])
    }
}

/// Host-facing settings of a flow.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameLoopSettings {
    pub title: &'static str,
    /// The AR session must be requested with the `hit-test` feature.
    pub requires_hit_test: bool,
    /// Transparent by default so the camera passthrough stays visible.
    pub clear_color: wgpu::Color,
    /// Far plane of the preview camera.
    pub zfar: f32,
}

impl Default for FrameLoopSettings {
    fn default() -> Self {
        Self {
            title: "flow-ar",
            requires_hit_test: false,
            clear_color: wgpu::Color::TRANSPARENT,
            zfar: 20.0,
        }
    }
}

/// A demo page.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once; build the scene and place the camera
/// 2. `on_update()` is called every frame after tracking
/// 3. `on_select()` is called for every select gesture of the XR input
///
pub trait ArFlow: Sized + 'static {
    fn settings(&self) -> FrameLoopSettings;

    fn on_init(&mut self, scene: &mut Scene, camera: &mut Camera) -> Out<Self>;

    fn on_update(&mut self, scene: &mut Scene, dt: Duration);

    fn on_select(&mut self, _scene: &mut Scene) -> Out<Self> {
        Out::Empty
    }

    /// The node driven by hit-test results, if the flow has one.
    fn reticle(&self) -> Option<NodeId> {
        None
    }
}

pub struct FrameLoop<F: ArFlow, S: XrSession> {
    flow: F,
    scene: Scene,
    camera: Camera,
    tracker: FrameTracker<S>,
    pending: FuturesUnordered<LocalBoxFuture<'static, Mutation<F>>>,
    last_time: Instant,
}

impl<F: ArFlow, S: XrSession> FrameLoop<F, S> {
    pub fn new(mut flow: F, width: u32, height: u32) -> Self {
        let settings = flow.settings();
        let mut scene = Scene::new();
        let mut camera = Camera::new(
            Point3::new(0.0, 0.0, 3.0),
            Point3::new(0.0, 0.0, 0.0),
            Projection::new(width, height, Deg(70.0), 0.01, settings.zfar),
        );
        let out = flow.on_init(&mut scene, &mut camera);
        log::info!("{}: scene ready with {} nodes", settings.title, scene.len());

        let mut frame_loop = Self {
            flow,
            scene,
            camera,
            tracker: FrameTracker::new(),
            pending: FuturesUnordered::new(),
            last_time: Instant::now(),
        };
        frame_loop.handle(out);
        frame_loop.poll_pending();
        frame_loop
    }

    fn handle(&mut self, out: Out<F>) {
        match out {
            Out::FutFn(futures) => self.pending.extend(futures),
            Out::Empty => (),
        }
    }

    /// Applies every mutation whose future has resolved and returns how many ran.
    pub fn poll_pending(&mut self) -> usize {
        let mut cx = std::task::Context::from_waker(noop_waker_ref());
        let mut applied = 0;
        while let std::task::Poll::Ready(Some(mutation)) = self.pending.poll_next_unpin(&mut cx) {
            mutation(&mut self.flow, &mut self.scene);
            applied += 1;
        }
        applied
    }

    /// Number of async operations still in flight.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Runs one frame. `frame` is `None` whenever the host has no XR frame data.
    ///
    /// Returns what tracking did with the reticle, or `None` for flows without one.
    pub fn on_frame<Fr, R>(
        &mut self,
        frame: Option<&Fr>,
        renderer: &mut R,
    ) -> anyhow::Result<Option<FrameUpdate>>
    where
        Fr: XrFrame<Session = S>,
        R: Renderer,
    {
        self.poll_pending();

        let now = Instant::now();
        let dt = now - self.last_time;
        self.last_time = now;

        let update = match self.flow.reticle().and_then(|id| self.scene.get_mut(id)) {
            Some(reticle) => Some(self.tracker.track(frame, reticle)),
            None => None,
        };
        if let Some(frame) = frame {
            self.camera.set_xr_view(frame.viewer_view());
        }

        self.flow.on_update(&mut self.scene, dt);
        renderer.render(&mut self.scene, &self.camera)?;
        Ok(update)
    }

    /// Forwards a select gesture to the flow.
    pub fn select(&mut self) {
        let out = self.flow.on_select(&mut self.scene);
        self.handle(out);
        self.poll_pending();
    }

    /// Tears down per-session state. The next frame with data initializes again.
    pub fn end_session(&mut self) {
        self.tracker.end_session();
        self.camera.set_xr_view(None);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.resize(width, height);
    }

    pub fn settings(&self) -> FrameLoopSettings {
        self.flow.settings()
    }

    pub fn flow(&self) -> &F {
        &self.flow
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn tracker(&self) -> &FrameTracker<S> {
        &self.tracker
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod preview {
    use std::sync::Arc;

    use winit::{
        application::ApplicationHandler,
        event::{DeviceEvent, DeviceId, ElementState, MouseButton, MouseScrollDelta, WindowEvent},
        event_loop::{ActiveEventLoop, EventLoop},
        window::Window,
    };

    use super::{ArFlow, FrameLoop};
    use crate::{
        camera::OrbitController,
        context::Context,
        render::{GpuRenderer, Renderer},
        xr::Detached,
    };

    struct AppState<F: ArFlow> {
        window: Arc<Window>,
        renderer: GpuRenderer,
        frame_loop: FrameLoop<F, Detached>,
    }

    pub(super) struct App<F: ArFlow> {
        async_runtime: tokio::runtime::Runtime,
        flow: Option<F>,
        state: Option<AppState<F>>,
        orbit: OrbitController,
    }

    impl<F: ArFlow> App<F> {
        pub(super) fn new(flow: F) -> anyhow::Result<Self> {
            Ok(Self {
                async_runtime: tokio::runtime::Runtime::new()?,
                flow: Some(flow),
                state: None,
                orbit: OrbitController::new(0.005, 0.1),
            })
        }
    }

    impl<F: ArFlow> ApplicationHandler for App<F> {
        fn resumed(&mut self, event_loop: &ActiveEventLoop) {
            let Some(flow) = self.flow.take() else {
                return;
            };
            let settings = flow.settings();
            let attributes = Window::default_attributes().with_title(settings.title);
            let window = match event_loop.create_window(attributes) {
                Ok(window) => Arc::new(window),
                Err(e) => {
                    log::error!("cannot open a window: {}", e);
                    event_loop.exit();
                    return;
                }
            };
            let size = window.inner_size();
            let ctx = match self
                .async_runtime
                .block_on(Context::new(window.clone(), size.width, size.height))
            {
                Ok(ctx) => ctx,
                Err(e) => {
                    log::error!("App initialization failed. Cannot create the main context: {:#}", e);
                    event_loop.exit();
                    return;
                }
            };
            let mut renderer = GpuRenderer::new(ctx);
            // The preview has no passthrough to show through a transparent clear.
            renderer.clear_color = wgpu::Color {
                a: 1.0,
                ..settings.clear_color
            };
            let frame_loop = FrameLoop::new(flow, size.width, size.height);
            window.request_redraw();
            self.state = Some(AppState {
                window,
                renderer,
                frame_loop,
            });
        }

        fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
            if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
                self.orbit.handle_drag(dx, dy);
            }
        }

        fn window_event(
            &mut self,
            event_loop: &ActiveEventLoop,
            _window_id: winit::window::WindowId,
            event: WindowEvent,
        ) {
            let Some(state) = &mut self.state else {
                return;
            };
            match event {
                WindowEvent::CloseRequested => event_loop.exit(),
                WindowEvent::Resized(size) => {
                    state.renderer.resize(size.width, size.height);
                    state.frame_loop.resize(size.width, size.height);
                }
                WindowEvent::RedrawRequested => {
                    self.orbit.update(state.frame_loop.camera_mut());
                    if let Err(e) = state
                        .frame_loop
                        .on_frame(None::<&Detached>, &mut state.renderer)
                    {
                        log::error!("Unable to render {:#}", e);
                    }
                    state.window.request_redraw();
                }
                WindowEvent::MouseInput {
                    state: button_state,
                    button,
                    ..
                } => match (button, button_state) {
                    (MouseButton::Left, ElementState::Pressed) => state.frame_loop.select(),
                    (MouseButton::Right, pressed) => self.orbit.set_dragging(pressed.is_pressed()),
                    _ => (),
                },
                WindowEvent::MouseWheel { delta, .. } => {
                    let lines = match delta {
                        MouseScrollDelta::LineDelta(_, y) => y,
                        MouseScrollDelta::PixelDelta(p) => p.y as f32 / 50.0,
                    };
                    self.orbit.handle_scroll(lines);
                }
                _ => {}
            }
        }
    }

    pub(super) fn event_loop() -> anyhow::Result<EventLoop<()>> {
        Ok(EventLoop::new()?)
    }
}

/// Opens a native window and runs `flow` without an XR runtime.
///
/// No frame ever carries XR data, so reticles stay hidden; the left mouse button
/// stands in for the select gesture and the right one orbits the camera.
#[cfg(not(target_arch = "wasm32"))]
pub fn run<F: ArFlow>(flow: F) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = preview::event_loop()?;
    let mut app = preview::App::new(flow)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
