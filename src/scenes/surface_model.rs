//! One glTF model kept on the last selected surface.
//!
//! The page has a single slot. A select disposes whatever occupies it, then loads
//! a fresh copy of the model and puts it where the reticle was at the time of the
//! select. When selects outpace loading, only the most recent load is kept.

use instant::Duration;

use crate::{
    camera::Camera,
    data_structures::{
        instance::Instance,
        scene_graph::{NodeId, Scene},
    },
    flow::{ArFlow, FrameLoopSettings, Mutation, Out},
    resources::{ModelLoader, gltf_loader},
};

pub const MODEL_PATH: &str = "models2/scene.gltf";
pub const MODEL_SCALE: f32 = 0.3;

pub struct SurfaceModel {
    loader: ModelLoader,
    reticle: Option<NodeId>,
    model: Option<NodeId>,
    /// Bumped on every accepted select; loads started for older values are dropped.
    generation: u64,
}

impl SurfaceModel {
    pub fn new() -> Self {
        Self::with_loader(gltf_loader())
    }

    pub fn with_loader(loader: ModelLoader) -> Self {
        Self {
            loader,
            reticle: None,
            model: None,
            generation: 0,
        }
    }

    /// The current occupant of the slot.
    pub fn model(&self) -> Option<NodeId> {
        self.model
    }
}

impl Default for SurfaceModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ArFlow for SurfaceModel {
    fn settings(&self) -> FrameLoopSettings {
        FrameLoopSettings {
            title: "Surface model",
            requires_hit_test: true,
            zfar: super::SURFACE_ZFAR,
            ..Default::default()
        }
    }

    fn on_init(&mut self, scene: &mut Scene, _camera: &mut Camera) -> Out<Self> {
        scene.add_light(super::surface_light());
        self.reticle = Some(scene.add(super::reticle()));
        Out::Empty
    }

    fn on_update(&mut self, _scene: &mut Scene, _dt: Duration) {}

    fn on_select(&mut self, scene: &mut Scene) -> Out<Self> {
        let Some(reticle) = self.reticle.and_then(|id| scene.get(id)) else {
            return Out::Empty;
        };
        if !reticle.visible {
            log::debug!("select ignored, no surface under the reticle");
            return Out::Empty;
        }
        let pose = Instance::from_matrix(reticle.transform.matrix());
        let placement = Instance {
            position: pose.position,
            rotation: pose.rotation,
            ..Instance::new().with_uniform_scale(MODEL_SCALE)
        };

        if let Some(previous) = self.model.take() {
            scene.remove_and_dispose(previous);
            log::debug!("disposed previous model {:?}", previous);
        }
        self.generation += 1;
        let generation = self.generation;

        let load = (self.loader)(MODEL_PATH);
        Out::once(async move {
            let result = load.await;
            Box::new(move |flow: &mut SurfaceModel, scene: &mut Scene| {
                if flow.generation != generation {
                    log::debug!("discarding model load superseded by a later select");
                    return;
                }
                match result {
                    Ok(model) => {
                        flow.model = Some(scene.add(model.with_transform(placement)));
                        log::info!("Model added to scene at: {:?}", placement.position);
                    }
                    Err(e) => log::error!("Error loading model: {:#}", e),
                }
            }) as Mutation<Self>
        })
    }

    fn reticle(&self) -> Option<NodeId> {
        self.reticle
    }
}
