//! The demo pages.
//!
//! - `shapes` spins three primitives in front of the viewer
//! - `model_viewer` loads one glTF model and rotates it
//! - `surface_shapes` drops extruded blocks wherever the reticle sits
//! - `surface_model` keeps a single glTF model at the last selected spot

use std::{f32::consts::FRAC_PI_2, fmt, str::FromStr};

use crate::data_structures::{
    geometry::Geometry, light::Light, material::Material, scene_graph::Node,
};

pub mod model_viewer;
pub mod shapes;
pub mod surface_model;
pub mod surface_shapes;

pub use model_viewer::ModelViewer;
pub use shapes::SpinningShapes;
pub use surface_model::SurfaceModel;
pub use surface_shapes::SurfaceShapes;

/// Far plane of the pages that track surfaces.
pub const SURFACE_ZFAR: f32 = 20.0;

/// Flat ring lying in the XZ plane that marks the current hit-test result.
///
/// It starts hidden and ignores its local transform: the tracker writes platform
/// poses into its matrix directly.
pub fn reticle() -> Node {
    let mut reticle = Node::mesh(
        "reticle",
        Geometry::ring(0.15, 0.2, 32, 1).rotate_x(-FRAC_PI_2),
        Material::basic(0xffffff),
    );
    reticle.transform.matrix_auto_update = false;
    reticle.visible = false;
    reticle
}

/// Sky/ground light shared by the surface pages.
pub fn surface_light() -> Light {
    Light::hemisphere(0xffffff, 0xbbbbff, 1.0, [0.5, 1.0, 0.25])
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneKind {
    Shapes,
    ModelViewer,
    SurfaceShapes,
    SurfaceModel,
}

impl SceneKind {
    pub const ALL: [SceneKind; 4] = [
        SceneKind::Shapes,
        SceneKind::ModelViewer,
        SceneKind::SurfaceShapes,
        SceneKind::SurfaceModel,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SceneKind::Shapes => "shapes",
            SceneKind::ModelViewer => "model",
            SceneKind::SurfaceShapes => "surface-shapes",
            SceneKind::SurfaceModel => "surface-model",
        }
    }
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SceneKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(SceneKind::name).collect();
                anyhow::anyhow!("unknown scene `{}`, expected one of {}", s, names.join(", "))
            })
    }
}
