//! WebXR adapter.
//!
//! `web-sys` ships no hit-test bindings, so the handful of WebXR interfaces the
//! frame loop touches are imported here directly.

use cgmath::Matrix4;
use futures::FutureExt;
use js_sys::{Array, Float32Array, Function, Object, Promise, Reflect};
use wasm_bindgen::{JsCast, prelude::*};
use wasm_bindgen_futures::JsFuture;

use super::{
    Pose, ReferenceSpaceType, SessionOptions, XrError, XrFrame, XrFuture, XrSession, XrView,
};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = XRSystem)]
    #[derive(Clone, Debug)]
    pub type RawSystem;

    #[wasm_bindgen(method, js_name = isSessionSupported)]
    fn is_session_supported(this: &RawSystem, mode: &str) -> Promise;

    #[wasm_bindgen(method, js_name = requestSession)]
    fn request_session(this: &RawSystem, mode: &str, options: &JsValue) -> Promise;

    #[wasm_bindgen(extends = web_sys::EventTarget, js_name = XRSession)]
    #[derive(Clone, Debug)]
    pub type RawSession;

    #[wasm_bindgen(method, js_name = requestReferenceSpace)]
    fn request_reference_space(this: &RawSession, kind: &str) -> Promise;

    #[wasm_bindgen(method, js_name = requestHitTestSource)]
    fn request_hit_test_source(this: &RawSession, options: &JsValue) -> Promise;

    #[wasm_bindgen(method, js_name = requestAnimationFrame)]
    pub fn request_animation_frame(this: &RawSession, callback: &Function) -> u32;

    #[wasm_bindgen(method, js_name = updateRenderState)]
    fn update_render_state(this: &RawSession, state: &JsValue);

    #[wasm_bindgen(method)]
    pub fn end(this: &RawSession) -> Promise;

    #[wasm_bindgen(js_name = XRReferenceSpace)]
    #[derive(Clone, Debug)]
    pub type RawReferenceSpace;

    #[wasm_bindgen(js_name = XRHitTestSource)]
    #[derive(Debug)]
    pub type RawHitTestSource;

    #[wasm_bindgen(js_name = XRFrame)]
    #[derive(Clone, Debug)]
    pub type RawFrame;

    #[wasm_bindgen(method, js_name = getHitTestResults)]
    fn get_hit_test_results(this: &RawFrame, source: &RawHitTestSource) -> Array;

    #[wasm_bindgen(method, js_name = getViewerPose)]
    fn get_viewer_pose(this: &RawFrame, space: &RawReferenceSpace) -> Option<RawViewerPose>;

    #[wasm_bindgen(js_name = XRHitTestResult)]
    #[derive(Debug)]
    pub type RawHitResult;

    #[wasm_bindgen(method, js_name = getPose)]
    fn get_pose(this: &RawHitResult, space: &RawReferenceSpace) -> Option<RawPose>;

    #[wasm_bindgen(js_name = XRPose)]
    type RawPose;

    #[wasm_bindgen(method, getter = transform)]
    fn pose_transform(this: &RawPose) -> RawRigidTransform;

    #[wasm_bindgen(js_name = XRViewerPose)]
    type RawViewerPose;

    #[wasm_bindgen(method, getter)]
    fn views(this: &RawViewerPose) -> Array;

    #[wasm_bindgen(js_name = XRView)]
    type RawView;

    #[wasm_bindgen(method, getter = projectionMatrix)]
    fn projection_matrix(this: &RawView) -> Float32Array;

    #[wasm_bindgen(method, getter = transform)]
    fn view_transform(this: &RawView) -> RawRigidTransform;

    #[wasm_bindgen(js_name = XRRigidTransform)]
    type RawRigidTransform;

    #[wasm_bindgen(method, getter)]
    fn matrix(this: &RawRigidTransform) -> Float32Array;

    #[wasm_bindgen(method, getter)]
    fn inverse(this: &RawRigidTransform) -> RawRigidTransform;

    #[wasm_bindgen(js_name = XRWebGLLayer)]
    type RawWebGlLayer;

    #[wasm_bindgen(constructor, js_class = "XRWebGLLayer", catch)]
    fn new_layer(session: &RawSession, context: &JsValue) -> Result<RawWebGlLayer, JsValue>;

    #[wasm_bindgen(js_name = WebGL2RenderingContext)]
    type RawGlContext;

    #[wasm_bindgen(method, js_name = makeXRCompatible)]
    fn make_xr_compatible(this: &RawGlContext) -> Promise;
}

fn describe(error: &JsValue) -> String {
    error.as_string().unwrap_or_else(|| format!("{:?}", error))
}

fn to_matrix(array: &Float32Array) -> Option<Matrix4<f32>> {
    if array.length() != 16 {
        return None;
    }
    let mut values = [0.0; 16];
    array.copy_to(&mut values);
    Some(Pose::from_column_major(&values).matrix)
}

/// `navigator.xr`, if the browser exposes WebXR at all.
pub fn system() -> Option<RawSystem> {
    let navigator = web_sys::window()?.navigator();
    let xr = Reflect::get(&navigator, &JsValue::from_str("xr")).ok()?;
    if xr.is_undefined() || xr.is_null() {
        return None;
    }
    Some(xr.unchecked_into())
}

/// Whether the browser can start an `immersive-ar` session.
pub async fn is_ar_supported() -> bool {
    let Some(system) = system() else {
        return false;
    };
    match JsFuture::from(system.is_session_supported(SessionOptions::MODE)).await {
        Ok(supported) => supported.as_bool().unwrap_or(false),
        Err(e) => {
            log::warn!("isSessionSupported failed: {}", describe(&e));
            false
        }
    }
}

fn set(target: &Object, key: &str, value: &JsValue) -> Result<(), XrError> {
    Reflect::set(target, &JsValue::from_str(key), value)
        .map(|_| ())
        .map_err(|e| XrError::Session(describe(&e)))
}

fn session_init(options: &SessionOptions) -> Result<Object, XrError> {
    let features = |names: &[&str]| names.iter().map(|name| JsValue::from_str(name)).collect::<Array>();
    let init = Object::new();
    set(&init, "requiredFeatures", &features(&options.required_features))?;
    set(&init, "optionalFeatures", &features(&options.optional_features))?;
    if let Some(body) = web_sys::window()
        .and_then(|window| window.document())
        .and_then(|document| document.body())
    {
        let overlay = Object::new();
        set(&overlay, "root", &body)?;
        set(&init, "domOverlay", &overlay)?;
    }
    Ok(init)
}

/// Starts an `immersive-ar` session. Must run inside a user gesture.
pub async fn request_session(options: &SessionOptions) -> Result<WebSession, XrError> {
    let system = system().ok_or_else(|| XrError::Unsupported("navigator.xr is missing".into()))?;
    let init = session_init(options)?;
    let raw = JsFuture::from(system.request_session(SessionOptions::MODE, &init))
        .await
        .map_err(|e| XrError::Session(describe(&e)))?;
    Ok(WebSession {
        raw: raw.unchecked_into(),
    })
}

/// Handle onto a running `XRSession`.
#[derive(Clone, Debug)]
pub struct WebSession {
    raw: RawSession,
}

impl WebSession {
    pub fn raw(&self) -> &RawSession {
        &self.raw
    }

    /// Makes the canvas' WebGL2 context XR compatible and installs it as the
    /// session's base layer, which the browser needs before it hands out frames.
    pub async fn attach_canvas(&self, canvas: &web_sys::HtmlCanvasElement) -> Result<(), XrError> {
        let context = canvas
            .get_context("webgl2")
            .map_err(|e| XrError::Session(describe(&e)))?
            .ok_or_else(|| XrError::Unsupported("the canvas has no WebGL2 context".into()))?;
        let context: RawGlContext = context.unchecked_into();
        JsFuture::from(context.make_xr_compatible())
            .await
            .map_err(|e| XrError::Session(describe(&e)))?;
        let layer = RawWebGlLayer::new_layer(&self.raw, &context)
            .map_err(|e| XrError::Session(describe(&e)))?;
        let state = Object::new();
        set(&state, "baseLayer", &layer)?;
        self.raw.update_render_state(&state);
        Ok(())
    }

    /// The space the host renders in.
    pub async fn render_space(&self) -> Result<RawReferenceSpace, XrError> {
        self.request_reference_space(ReferenceSpaceType::Local).await
    }

    pub async fn end(&self) -> Result<(), XrError> {
        JsFuture::from(self.raw.end())
            .await
            .map(|_| ())
            .map_err(|e| XrError::Session(describe(&e)))
    }
}

impl XrSession for WebSession {
    type Space = RawReferenceSpace;
    type HitTestSource = RawHitTestSource;

    fn request_reference_space(&self, kind: ReferenceSpaceType) -> XrFuture<Self::Space> {
        let promise = self.raw.request_reference_space(kind.as_str());
        async move {
            JsFuture::from(promise)
                .await
                .map(JsCast::unchecked_into)
                .map_err(|e| XrError::ReferenceSpace {
                    space: kind,
                    reason: describe(&e),
                })
        }
        .boxed_local()
    }

    fn request_hit_test_source(&self, space: &Self::Space) -> XrFuture<Self::HitTestSource> {
        let options = Object::new();
        if let Err(e) = set(&options, "space", space) {
            return async move { Err(XrError::HitTestSource(e.to_string())) }.boxed_local();
        }
        let promise = self.raw.request_hit_test_source(&options);
        async move {
            JsFuture::from(promise)
                .await
                .map(JsCast::unchecked_into)
                .map_err(|e| XrError::HitTestSource(describe(&e)))
        }
        .boxed_local()
    }

    fn on_end(&self, listener: Box<dyn FnOnce()>) {
        let callback = Closure::once_into_js(move || listener());
        if let Err(e) = self
            .raw
            .add_event_listener_with_callback("end", callback.unchecked_ref())
        {
            log::warn!("cannot listen for the end of the session: {}", describe(&e));
        }
    }
}

/// One `XRFrame` together with the session and render space it belongs to.
pub struct WebFrame {
    raw: RawFrame,
    session: WebSession,
    render_space: Option<RawReferenceSpace>,
}

impl WebFrame {
    pub fn new(raw: RawFrame, session: WebSession, render_space: Option<RawReferenceSpace>) -> Self {
        Self {
            raw,
            session,
            render_space,
        }
    }
}

impl XrFrame for WebFrame {
    type Session = WebSession;
    type HitResult = RawHitResult;

    fn session(&self) -> &WebSession {
        &self.session
    }

    fn hit_test_results(&self, source: &RawHitTestSource) -> Vec<RawHitResult> {
        self.raw
            .get_hit_test_results(source)
            .iter()
            .map(JsCast::unchecked_into)
            .collect()
    }

    fn hit_pose(&self, result: &RawHitResult, space: &RawReferenceSpace) -> Option<Pose> {
        let pose = result.get_pose(space)?;
        to_matrix(&pose.pose_transform().matrix()).map(Pose::new)
    }

    fn viewer_view(&self) -> Option<XrView> {
        let pose = self.raw.get_viewer_pose(self.render_space.as_ref()?)?;
        let first = pose.views().get(0);
        if first.is_undefined() {
            return None;
        }
        let view: RawView = first.unchecked_into();
        Some(XrView {
            view: to_matrix(&view.view_transform().inverse().matrix())?,
            projection: to_matrix(&view.projection_matrix())?,
        })
    }
}
