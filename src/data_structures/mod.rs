//! Engine data structures: geometry, materials, lights, instances and the scene graph.
//!
//! - `geometry` contains vertex data and primitive builders (cone, tetrahedron, ring)
//! - `shape` holds 2D outlines and their bevelled extrusion
//! - `material` contains basic and standard surface materials
//! - `light` holds the light types and their uniform layout
//! - `instance` holds per-object transformation data
//! - `scene_graph` enables hierarchical scene organization

pub mod geometry;
pub mod instance;
pub mod light;
pub mod material;
pub mod scene_graph;
pub mod shape;
