//! Browser entry points.
//!
//! Each page calls one of the `start_*` exports. They create a full-window canvas,
//! open the GPU on it and add an AR button. Before a session starts the scene is
//! drawn from the window's animation loop; during a session the XR session's
//! animation loop takes over and feeds its frames to the [`FrameLoop`].
//!
//! wgpu presents into the page canvas. The canvas' WebGL2 context is installed as
//! the session's base layer so the browser delivers XR frames (poses, hit-tests),
//! but wgpu does not draw into the layer's framebuffer.

use std::{cell::RefCell, rc::Rc};

use wasm_bindgen::{JsCast, prelude::*};
use web_sys::{Document, HtmlCanvasElement, HtmlElement, PointerEvent, WheelEvent, Window};

use crate::{
    camera::OrbitController,
    context::Context,
    flow::{ArFlow, FrameLoop},
    render::{GpuRenderer, Renderer},
    scenes::{ModelViewer, SpinningShapes, SurfaceModel, SurfaceShapes},
    xr::{
        SessionOptions, XrSession,
        session::EndSignal,
        webxr::{self, RawFrame, RawReferenceSpace, WebFrame, WebSession},
    },
};

const START_LABEL: &str = "START AR";
const STOP_LABEL: &str = "STOP AR";
const UNSUPPORTED_LABEL: &str = "AR NOT SUPPORTED";

const BUTTON_STYLE: &str = "position:absolute;bottom:20px;left:calc(50% - 75px);width:150px;\
    padding:12px 6px;border:1px solid #fff;border-radius:4px;background:rgba(0,0,0,0.1);\
    color:#fff;font:normal 13px sans-serif;text-align:center;opacity:0.5;outline:none;z-index:999;\
    cursor:pointer";

struct ActiveSession {
    session: WebSession,
}

struct Page<F: ArFlow> {
    frame_loop: FrameLoop<F, WebSession>,
    renderer: GpuRenderer,
    canvas: HtmlCanvasElement,
    session: Option<ActiveSession>,
    /// Drag and wheel orbiting for pages shown without hit-testing.
    orbit: Option<OrbitController>,
}

type Shared<F> = Rc<RefCell<Page<F>>>;

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{:#}", e))
}

fn init_logging() {
    // A second page start in the same document keeps the first logger.
    console_log::init_with_level(log::Level::Info).ok();
}

fn window_size(window: &Window) -> (u32, u32) {
    let ratio = window.device_pixel_ratio();
    let size = |value: Result<JsValue, JsValue>| {
        let css = value.ok().and_then(|v| v.as_f64()).unwrap_or(1.0);
        ((css * ratio) as u32).max(1)
    };
    (size(window.inner_width()), size(window.inner_height()))
}

fn set_visible(canvas: &HtmlCanvasElement, visible: bool) {
    let display = if visible { "block" } else { "none" };
    if let Err(e) = canvas.style().set_property("display", display) {
        log::warn!("cannot change canvas visibility: {:?}", e);
    }
}

fn mk_canvas(document: &Document, body: &HtmlElement, window: &Window) -> Result<HtmlCanvasElement, JsValue> {
    let canvas: HtmlCanvasElement = document
        .create_element("canvas")?
        .dyn_into()
        .map_err(JsValue::from)?;
    let (width, height) = window_size(window);
    canvas.set_width(width);
    canvas.set_height(height);
    let style = canvas.style();
    style.set_property("width", "100vw")?;
    style.set_property("height", "100vh")?;
    style.set_property("display", "block")?;
    body.append_child(&canvas)?;
    Ok(canvas)
}

fn mk_button(document: &Document, body: &HtmlElement) -> Result<HtmlElement, JsValue> {
    let button: HtmlElement = document
        .create_element("button")?
        .dyn_into()
        .map_err(JsValue::from)?;
    button.set_attribute("style", BUTTON_STYLE)?;
    button.set_text_content(Some(START_LABEL));
    body.append_child(&button)?;
    Ok(button)
}

async fn start<F: ArFlow>(flow: F) -> Result<(), JsValue> {
    init_logging();
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let body = document
        .body()
        .ok_or_else(|| JsValue::from_str("no document body"))?;
    let settings = flow.settings();
    log::info!("starting {}", settings.title);

    let canvas = mk_canvas(&document, &body, &window)?;
    let (width, height) = (canvas.width(), canvas.height());
    let ctx = Context::new(wgpu::SurfaceTarget::Canvas(canvas.clone()), width, height)
        .await
        .map_err(to_js)?;
    let mut renderer = GpuRenderer::new(ctx);
    renderer.clear_color = settings.clear_color;
    // Surface pages only show the canvas while a session is running.
    if settings.requires_hit_test {
        set_visible(&canvas, false);
    }

    let page = Rc::new(RefCell::new(Page {
        frame_loop: FrameLoop::new(flow, width, height),
        renderer,
        canvas,
        session: None,
        orbit: (!settings.requires_hit_test).then(|| OrbitController::new(0.005, 0.1)),
    }));

    let button = mk_button(&document, &body)?;
    install_resize(&page, &window)?;
    if !settings.requires_hit_test {
        install_orbit(&page)?;
    }
    run_window_loop(page.clone(), window)?;

    if webxr::is_ar_supported().await {
        install_button(&page, &button)?;
    } else {
        log::warn!("immersive-ar sessions are not supported by this browser");
        button.set_text_content(Some(UNSUPPORTED_LABEL));
        button.style().set_property("cursor", "auto")?;
    }
    Ok(())
}

fn install_resize<F: ArFlow>(page: &Shared<F>, window: &Window) -> Result<(), JsValue> {
    let page = page.clone();
    let target = window.clone();
    let on_resize = Closure::<dyn FnMut()>::new(move || {
        let (width, height) = window_size(&target);
        let Ok(mut page) = page.try_borrow_mut() else {
            return;
        };
        page.canvas.set_width(width);
        page.canvas.set_height(height);
        page.renderer.resize(width, height);
        page.frame_loop.resize(width, height);
    });
    window.add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())?;
    on_resize.forget();
    Ok(())
}

fn install_orbit<F: ArFlow>(page: &Shared<F>) -> Result<(), JsValue> {
    let canvas = page.borrow().canvas.clone();

    let on_down = {
        let page = page.clone();
        let canvas = canvas.clone();
        Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            if let Some(orbit) = page.borrow_mut().orbit.as_mut() {
                orbit.set_dragging(true);
            }
            if let Err(e) = canvas.set_pointer_capture(event.pointer_id()) {
                log::debug!("pointer capture failed: {:?}", e);
            }
        })
    };
    canvas.add_event_listener_with_callback("pointerdown", on_down.as_ref().unchecked_ref())?;
    on_down.forget();

    for name in ["pointerup", "pointercancel"] {
        let page = page.clone();
        let on_up = Closure::<dyn FnMut(PointerEvent)>::new(move |_: PointerEvent| {
            if let Some(orbit) = page.borrow_mut().orbit.as_mut() {
                orbit.set_dragging(false);
            }
        });
        canvas.add_event_listener_with_callback(name, on_up.as_ref().unchecked_ref())?;
        on_up.forget();
    }

    let on_move = {
        let page = page.clone();
        Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            if let Some(orbit) = page.borrow_mut().orbit.as_mut() {
                orbit.handle_drag(f64::from(event.movement_x()), f64::from(event.movement_y()));
            }
        })
    };
    canvas.add_event_listener_with_callback("pointermove", on_move.as_ref().unchecked_ref())?;
    on_move.forget();

    let on_wheel = {
        let page = page.clone();
        Closure::<dyn FnMut(WheelEvent)>::new(move |event: WheelEvent| {
            event.prevent_default();
            if let Some(orbit) = page.borrow_mut().orbit.as_mut() {
                orbit.handle_scroll(OrbitController::wheel_lines(event.delta_y(), event.delta_mode()));
            }
        })
    };
    canvas.add_event_listener_with_callback("wheel", on_wheel.as_ref().unchecked_ref())?;
    on_wheel.forget();
    Ok(())
}

fn install_button<F: ArFlow>(page: &Shared<F>, button: &HtmlElement) -> Result<(), JsValue> {
    let page = page.clone();
    let target = button.clone();
    let on_click = Closure::<dyn FnMut()>::new(move || {
        let running = page
            .borrow()
            .session
            .as_ref()
            .map(|active| active.session.clone());
        match running {
            Some(session) => wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = session.end().await {
                    log::error!("{}", e);
                }
            }),
            None => {
                let page = page.clone();
                let button = target.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    if let Err(e) = start_session(page, button).await {
                        log::error!("{}", e);
                    }
                });
            }
        }
    });
    button.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;
    on_click.forget();
    Ok(())
}

async fn start_session<F: ArFlow>(page: Shared<F>, button: HtmlElement) -> Result<(), JsValue> {
    let (settings, canvas) = {
        let page = page.borrow();
        (page.frame_loop.settings(), page.canvas.clone())
    };
    let session = webxr::request_session(&SessionOptions::new(settings.requires_hit_test))
        .await
        .map_err(to_js)?;
    // Listen for the end before any further await so an early end is not missed.
    let ended = EndSignal::watch(&session);
    {
        let page = page.clone();
        let button = button.clone();
        session.on_end(Box::new(move || {
            if let Ok(mut page) = page.try_borrow_mut() {
                page.session = None;
                page.frame_loop.end_session();
                if page.frame_loop.settings().requires_hit_test {
                    set_visible(&page.canvas, false);
                }
            }
            button.set_text_content(Some(START_LABEL));
            log::info!("AR session ended");
        }));
    }

    session.attach_canvas(&canvas).await.map_err(to_js)?;
    let render_space = match session.render_space().await {
        Ok(space) => Some(space),
        Err(e) => {
            log::warn!("{}, the camera will not follow the viewer", e);
            None
        }
    };
    if ended.has_ended() {
        log::warn!("AR session ended before it was set up");
        return Ok(());
    }
    log::info!("AR session started");

    {
        let page = page.clone();
        let on_select = Closure::<dyn FnMut()>::new(move || match page.try_borrow_mut() {
            Ok(mut page) => page.frame_loop.select(),
            Err(_) => log::warn!("select arrived while the page was busy, ignored"),
        });
        session
            .raw()
            .add_event_listener_with_callback("select", on_select.as_ref().unchecked_ref())?;
        on_select.forget();
    }

    {
        let mut page = page.borrow_mut();
        page.session = Some(ActiveSession {
            session: session.clone(),
        });
        set_visible(&page.canvas, true);
    }
    button.set_text_content(Some(STOP_LABEL));
    run_session_loop(page, session, render_space);
    Ok(())
}

fn run_session_loop<F: ArFlow>(
    page: Shared<F>,
    session: WebSession,
    render_space: Option<RawReferenceSpace>,
) {
    let callback: Rc<RefCell<Option<Closure<dyn FnMut(f64, RawFrame)>>>> = Rc::new(RefCell::new(None));
    let next = callback.clone();
    let raw_session = session.raw().clone();
    let first = session.raw().clone();

    *callback.borrow_mut() = Some(Closure::new(move |_time: f64, frame: RawFrame| {
        {
            let Ok(mut page) = page.try_borrow_mut() else {
                log::warn!("skipping an XR frame, the page is busy");
                return;
            };
            // The session ended: stop rescheduling.
            if page.session.is_none() {
                return;
            }
            let frame = WebFrame::new(frame, session.clone(), render_space.clone());
            let Page {
                frame_loop,
                renderer,
                ..
            } = &mut *page;
            if let Err(e) = frame_loop.on_frame(Some(&frame), renderer) {
                log::error!("Unable to render {:#}", e);
            }
        }
        if let Some(callback) = next.borrow().as_ref() {
            raw_session.request_animation_frame(callback.as_ref().unchecked_ref());
        }
    }));

    if let Some(callback) = callback.borrow().as_ref() {
        first.request_animation_frame(callback.as_ref().unchecked_ref());
    }
}

fn run_window_loop<F: ArFlow>(page: Shared<F>, window: Window) -> Result<(), JsValue> {
    let callback: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let next = callback.clone();
    let target = window.clone();

    *callback.borrow_mut() = Some(Closure::new(move || {
        if let Ok(mut page) = page.try_borrow_mut() {
            if page.session.is_none() {
                let Page {
                    frame_loop,
                    renderer,
                    orbit,
                    ..
                } = &mut *page;
                if let Some(orbit) = orbit {
                    orbit.update(frame_loop.camera_mut());
                }
                if let Err(e) = frame_loop.on_frame(None::<&WebFrame>, renderer) {
                    log::error!("Unable to render {:#}", e);
                }
            }
        }
        if let Some(callback) = next.borrow().as_ref() {
            if let Err(e) = target.request_animation_frame(callback.as_ref().unchecked_ref()) {
                log::error!("cannot schedule the next frame: {:?}", e);
            }
        }
    }));

    if let Some(callback) = callback.borrow().as_ref() {
        window.request_animation_frame(callback.as_ref().unchecked_ref())?;
    }
    Ok(())
}

/// Spinning cone, tetrahedron and wireframe ring.
#[wasm_bindgen]
pub async fn start_spinning_shapes() -> Result<(), JsValue> {
    start(SpinningShapes::new()).await
}

/// A rotating glTF model.
#[wasm_bindgen]
pub async fn start_model_viewer() -> Result<(), JsValue> {
    start(ModelViewer::new()).await
}

/// Extruded blocks dropped at the hit-test reticle.
#[wasm_bindgen]
pub async fn start_surface_shapes() -> Result<(), JsValue> {
    start(SurfaceShapes::new()).await
}

/// A single glTF model placed at the hit-test reticle.
#[wasm_bindgen]
pub async fn start_surface_model() -> Result<(), JsValue> {
    start(SurfaceModel::new()).await
}
