//! A single glTF model, loaded once and rotated in front of the viewer.

use cgmath::Point3;
use instant::Duration;

use crate::{
    camera::Camera,
    data_structures::{
        instance::Instance,
        light::Light,
        scene_graph::{NodeId, Scene},
    },
    flow::{ArFlow, FrameLoopSettings, Mutation, Out},
    resources::{ModelLoader, gltf_loader},
};

pub const MODEL_PATH: &str = "models/scene.gltf";

pub struct ModelViewer {
    loader: ModelLoader,
    model: Option<NodeId>,
}

impl ModelViewer {
    pub fn new() -> Self {
        Self::with_loader(gltf_loader())
    }

    pub fn with_loader(loader: ModelLoader) -> Self {
        Self {
            loader,
            model: None,
        }
    }

    /// `None` until the model has finished loading.
    pub fn model(&self) -> Option<NodeId> {
        self.model
    }
}

impl Default for ModelViewer {
    fn default() -> Self {
        Self::new()
    }
}

impl ArFlow for ModelViewer {
    fn settings(&self) -> FrameLoopSettings {
        FrameLoopSettings {
            title: "Model viewer",
            zfar: 40.0,
            ..Default::default()
        }
    }

    fn on_init(&mut self, scene: &mut Scene, camera: &mut Camera) -> Out<Self> {
        scene.add_light(Light::directional(0xffffff, 2.0, [5.0, 5.0, 5.0]));
        scene.add_light(Light::ambient(0xffffff, 2.0));

        camera.position = Point3::new(0.0, 1.0, 3.0);
        camera.target = Point3::new(0.0, 1.0, 0.0);

        let load = (self.loader)(MODEL_PATH);
        Out::once(async move {
            let result = load.await;
            Box::new(move |flow: &mut ModelViewer, scene: &mut Scene| match result {
                Ok(model) => {
                    let model = model.with_transform(Instance::at(0.0, -1.0, -3.0));
                    flow.model = Some(scene.add(model));
                    log::info!("Model loaded successfully");
                }
                Err(e) => log::error!("Error loading model: {:#}", e),
            }) as Mutation<Self>
        })
    }

    fn on_update(&mut self, scene: &mut Scene, _dt: Duration) {
        if let Some(model) = self.model.and_then(|id| scene.get_mut(id)) {
            model.transform.local.rotate_y(super::shapes::SPIN);
        }
    }
}
