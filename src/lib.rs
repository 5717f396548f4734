//! flow-ar
//!
//! Small WebXR augmented-reality demos on top of wgpu. Each demo is a flow: it
//! builds a scene, animates it and reacts to the select gesture. On the web the
//! flows run inside an `immersive-ar` session; natively they run in a preview
//! window without XR.
//!
//! High-level modules
//! - `camera`: camera types, orbit controller and uniforms for view/projection
//! - `context`: GPU device, queue and surface
//! - `data_structures`: geometry, materials, lights and the scene graph
//! - `flow`: the flow trait and the per-frame loop
//! - `pipelines`: the render pipelines and their uniform layouts
//! - `render`: uploads the scene and draws it
//! - `resources`: asset and glTF loading
//! - `scenes`: the four demo flows
//! - `xr`: session setup and hit-test tracking behind platform traits
//!

pub mod camera;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scenes;
#[cfg(target_arch = "wasm32")]
pub mod web;
pub mod xr;

// Re-exports commonly used types for convenience in downstream code.
pub use flow::{ArFlow, FrameLoop, FrameLoopSettings, Out};
pub use scenes::SceneKind;
