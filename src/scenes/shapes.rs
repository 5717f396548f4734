//! Three primitives spinning around their vertical axes.

use instant::Duration;

use crate::{
    camera::Camera,
    data_structures::{
        geometry::Geometry,
        instance::Instance,
        light::Light,
        material::Material,
        scene_graph::{Node, NodeId, Scene},
    },
    flow::{ArFlow, FrameLoopSettings, Out},
};

/// Radians added to each primitive's Y rotation per frame.
pub const SPIN: f32 = 0.01;

#[derive(Debug, Default)]
pub struct SpinningShapes {
    cone: Option<NodeId>,
    tetrahedron: Option<NodeId>,
    ring: Option<NodeId>,
}

impl SpinningShapes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cone(&self) -> Option<NodeId> {
        self.cone
    }

    pub fn tetrahedron(&self) -> Option<NodeId> {
        self.tetrahedron
    }

    pub fn ring(&self) -> Option<NodeId> {
        self.ring
    }
}

impl ArFlow for SpinningShapes {
    fn settings(&self) -> FrameLoopSettings {
        FrameLoopSettings {
            title: "Spinning shapes",
            zfar: 40.0,
            ..Default::default()
        }
    }

    fn on_init(&mut self, scene: &mut Scene, camera: &mut Camera) -> Out<Self> {
        scene.add_light(Light::directional(0xffffff, 4.0, [3.0, 3.0, 3.0]));
        scene.add_light(Light::point(0xffffff, 10.0, 10.0, [-2.0, 2.0, 2.0]));
        scene.add_light(Light::ambient(0xffffff, 1.2));

        let cone = Node::mesh(
            "cone",
            Geometry::cone(0.5, 1.5, 32),
            Material::standard(0xffa700, 0.9, 0.2),
        )
        .with_transform(Instance::new().with_uniform_scale(0.4));
        self.cone = Some(scene.add(cone));

        let tetrahedron = Node::mesh(
            "tetrahedron",
            Geometry::tetrahedron(0.7),
            Material::standard(0xffff00, 0.5, 0.3),
        )
        .with_transform(Instance::at(0.5, -0.1, 0.0).with_uniform_scale(0.4));
        self.tetrahedron = Some(scene.add(tetrahedron));

        let ring = Node::mesh(
            "ring",
            Geometry::ring(0.2, 0.5, 32, 3),
            Material::standard(0x00ffcc, 0.2, 0.6)
                .double_sided()
                .wireframe(),
        )
        .with_transform(Instance::at(-0.5, 0.0, 0.0).with_uniform_scale(0.5));
        self.ring = Some(scene.add(ring));

        camera.position.z = 3.0;
        Out::Empty
    }

    fn on_update(&mut self, scene: &mut Scene, _dt: Duration) {
        for (id, spin) in [
            (self.cone, -SPIN),
            (self.tetrahedron, SPIN),
            (self.ring, SPIN),
        ] {
            if let Some(node) = id.and_then(|id| scene.get_mut(id)) {
                node.transform.local.rotate_y(spin);
            }
        }
    }
}
