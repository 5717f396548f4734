//! Extruded blocks placed on detected surfaces.
//!
//! Every select while the reticle is visible drops a new bevelled block with a
//! random material at the reticle's position and orientation. Blocks accumulate.

use instant::Duration;
use rand::{Rng, SeedableRng, rngs::SmallRng};

use crate::{
    camera::Camera,
    data_structures::{
        geometry::Geometry,
        instance::Instance,
        material::Material,
        scene_graph::{Node, NodeId, Scene},
        shape::{Bevel, ExtrudeOptions, Shape, extrude},
    },
    flow::{ArFlow, FrameLoopSettings, Out},
};

pub const BLOCK_SIZE: f32 = 0.2;

pub const BLOCK_EXTRUSION: ExtrudeOptions = ExtrudeOptions {
    depth: 0.1,
    steps: 10,
    bevel: Some(Bevel {
        thickness: 0.03,
        size: 0.03,
        offset: 0.0,
        segments: 5,
    }),
};

pub struct SurfaceShapes {
    reticle: Option<NodeId>,
    placed: Vec<NodeId>,
    block: Geometry,
    rng: SmallRng,
}

impl SurfaceShapes {
    pub fn new() -> Self {
        Self::with_seed(instant::now().to_bits())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            reticle: None,
            placed: Vec::new(),
            block: extrude(&Shape::square(BLOCK_SIZE), &BLOCK_EXTRUSION),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Blocks placed so far, oldest first.
    pub fn placed(&self) -> &[NodeId] {
        &self.placed
    }

    fn random_material(&mut self) -> Material {
        let hex = (self.rng.random::<f64>() * f64::from(0xffffff_u32)) as u32;
        let metalness = self.rng.random::<f32>();
        let roughness = self.rng.random::<f32>() * 0.5;
        Material::standard(hex, metalness, roughness)
    }
}

impl Default for SurfaceShapes {
    fn default() -> Self {
        Self::new()
    }
}

impl ArFlow for SurfaceShapes {
    fn settings(&self) -> FrameLoopSettings {
        FrameLoopSettings {
            title: "Surface shapes",
            requires_hit_test: true,
            zfar: super::SURFACE_ZFAR,
            ..Default::default()
        }
    }

    fn on_init(&mut self, scene: &mut Scene, _camera: &mut Camera) -> Out<Self> {
        scene.add_light(super::surface_light());
        let reticle = super::reticle().with_child(Node::axes_helper(1.0));
        self.reticle = Some(scene.add(reticle));
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
            ..Instance::new()
        };

        let material = self.random_material();
        let block = Node::mesh("block", self.block.clone(), material).with_transform(placement);
        let id = scene.add(block);
        log::debug!("placed block {:?} at {:?}", id, placement.position);
        self.placed.push(id);
        Out::Empty
    }

    fn reticle(&self) -> Option<NodeId> {
        self.reticle
    }
}
