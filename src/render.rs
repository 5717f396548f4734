//! Turning a [`Scene`] into GPU draw calls.
//!
//! Meshes are uploaded the first time they show up in [`Scene::draw_items`] and keyed
//! by their [`NodeId`]. Ids drained from [`Scene::take_released`] have their buffers
//! destroyed before the next frame is drawn, so a disposed model stops holding GPU
//! memory as soon as the frame loop renders again.

use std::collections::HashMap;

use anyhow::Context as _;
use wgpu::util::DeviceExt;

use crate::{
    camera::{Camera, CameraUniform},
    context::Context,
    data_structures::{
        geometry::Topology,
        light::LightsUniform,
        material::Side,
        scene_graph::{Mesh, NodeId, Scene},
    },
    pipelines::basic::{BasicPipelines, ObjectUniform, mk_basic_pipelines, mk_buffer},
};

/// Anything a frame loop can draw a scene with.
pub trait Renderer {
    fn render(&mut self, scene: &mut Scene, camera: &Camera) -> anyhow::Result<()>;
    fn resize(&mut self, width: u32, height: u32);
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pass {
    Solid,
    DoubleSided,
    Lines,
}

struct GpuMesh {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pass: Pass,
}

impl GpuMesh {
    fn destroy(&self) {
        self.vertex.destroy();
        self.index.destroy();
        self.uniform.destroy();
    }
}

pub struct GpuRenderer {
    ctx: Context,
    pipelines: BasicPipelines,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    lights_buffer: wgpu::Buffer,
    globals: wgpu::BindGroup,
    meshes: HashMap<NodeId, GpuMesh>,
    pub clear_color: wgpu::Color,
}

impl GpuRenderer {
    pub fn new(ctx: Context) -> Self {
        let pipelines = mk_basic_pipelines(&ctx.device, ctx.format());
        let camera_uniform = CameraUniform::new();
        let camera_buffer = mk_buffer(&ctx.device, "Camera Buffer", &camera_uniform);
        let lights_buffer = mk_buffer(&ctx.device, "Lights Buffer", &LightsUniform::from_lights(&[]));
        let globals = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &pipelines.globals_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights_buffer.as_entire_binding(),
                },
            ],
            label: Some("globals_bind_group"),
        });
        Self {
            ctx,
            pipelines,
            camera_uniform,
            camera_buffer,
            lights_buffer,
            globals,
            meshes: HashMap::new(),
            clear_color: wgpu::Color::TRANSPARENT,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Number of meshes currently holding GPU buffers.
    pub fn uploaded(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_uploaded(&self, id: NodeId) -> bool {
        self.meshes.contains_key(&id)
    }

    fn release(&mut self, scene: &mut Scene) {
        for id in scene.take_released() {
            if let Some(mesh) = self.meshes.remove(&id) {
                mesh.destroy();
            }
        }
    }

    fn prepare(&mut self, scene: &mut Scene, camera: &Camera) {
        self.release(scene);

        self.camera_uniform.update_view_proj(camera);
        self.ctx
            .queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[self.camera_uniform]));
        self.ctx.queue.write_buffer(
            &self.lights_buffer,
            0,
            bytemuck::cast_slice(&[LightsUniform::from_lights(&scene.lights)]),
        );

        for item in scene.draw_items() {
            let uniform = ObjectUniform::new(item.world, &item.mesh.material);
            match self.meshes.get(&item.id) {
                Some(mesh) => self
                    .ctx
                    .queue
                    .write_buffer(&mesh.uniform, 0, bytemuck::cast_slice(&[uniform])),
                None => {
                    if let Some(mesh) = self.upload(item.mesh, &uniform) {
                        self.meshes.insert(item.id, mesh);
                    }
                }
            }
        }
    }

    /// Empty meshes are never uploaded; wgpu cannot bind a zero-sized buffer slice.
    fn upload(&self, mesh: &Mesh, uniform: &ObjectUniform) -> Option<GpuMesh> {
        let device = &self.ctx.device;
        let geometry = &mesh.geometry;
        let (indices, pass) = draw_indices(mesh)?;
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let uniform_buffer = mk_buffer(device, "Object Buffer", uniform);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.pipelines.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("object_bind_group"),
        });
        Some(GpuMesh {
            vertex,
            index,
            index_count: indices.len() as u32,
            uniform: uniform_buffer,
            bind_group,
            pass,
        })
    }

    /// Draws `scene` into `view`, which must have the context's format and size.
    pub fn render_to_view(&mut self, scene: &mut Scene, camera: &Camera, view: &wgpu::TextureView) {
        self.prepare(scene, camera);
        let ids: Vec<NodeId> = scene.draw_items().iter().map(|item| item.id).collect();

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            render_pass.set_bind_group(0, &self.globals, &[]);

            for (pass, pipeline) in [
                (Pass::Solid, &self.pipelines.solid),
                (Pass::DoubleSided, &self.pipelines.double_sided),
                (Pass::Lines, &self.pipelines.lines),
            ] {
                render_pass.set_pipeline(pipeline);
                for mesh in ids.iter().filter_map(|id| self.meshes.get(id)) {
                    if mesh.pass != pass {
                        continue;
                    }
                    render_pass.set_bind_group(1, &mesh.bind_group, &[]);
                    render_pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                    render_pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
            }
        }
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Renders into an offscreen texture and reads it back as tightly packed RGBA rows.
    pub async fn render_to_image(&mut self, scene: &mut Scene, camera: &Camera) -> anyhow::Result<Vec<u8>> {
        let (width, height) = (self.ctx.config.width, self.ctx.config.height);
        let texture = self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.ctx.format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.render_to_view(scene, camera, &view);
        read_back(&self.ctx, &texture).await
    }
}

/// Index list and pass for `mesh`, or `None` when there is nothing to draw.
fn draw_indices(mesh: &Mesh) -> Option<(Vec<u32>, Pass)> {
    let geometry = &mesh.geometry;
    let (indices, pass) = match (geometry.topology, mesh.material.wireframe, mesh.material.side) {
        (Topology::Lines, _, _) => (geometry.indices.clone(), Pass::Lines),
        (Topology::Triangles, true, _) => (geometry.wireframe_indices(), Pass::Lines),
        (Topology::Triangles, false, Side::Front) => (geometry.indices.clone(), Pass::Solid),
        (Topology::Triangles, false, Side::Double) => (geometry.indices.clone(), Pass::DoubleSided),
    };
    if geometry.vertices.is_empty() || indices.is_empty() {
        return None;
    }
    Some((indices, pass))
}

async fn read_back(ctx: &Context, texture: &wgpu::Texture) -> anyhow::Result<Vec<u8>> {
    let (width, height) = (texture.width(), texture.height());
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;

    let output_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size: (padded * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &output_buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        texture.size(),
    );
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
    let buffer_slice = output_buffer.slice(..);
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    #[cfg(target_arch = "wasm32")]
    ctx.device.poll(wgpu::PollType::Poll)?;
    #[cfg(not(target_arch = "wasm32"))]
    ctx.device.poll(wgpu::PollType::Wait {
        submission_index: None,
        timeout: Some(std::time::Duration::from_secs(3)),
    })?;
    rx.receive()
        .await
        .context("readback was cancelled")??;

    let data = buffer_slice.get_mapped_range();
    let pixels = data
        .chunks(padded as usize)
        .flat_map(|row| &row[..unpadded as usize])
        .copied()
        .collect();
    drop(data);
    output_buffer.unmap();
    Ok(pixels)
}

impl Renderer for GpuRenderer {
    fn render(&mut self, scene: &mut Scene, camera: &Camera) -> anyhow::Result<()> {
        let surface = self
            .ctx
            .surface
            .as_ref()
            .context("renderer has no surface to present to")?;
        let frame = match surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(frame)
            | wgpu::CurrentSurfaceTexture::Suboptimal(frame) => frame,
            wgpu::CurrentSurfaceTexture::Timeout | wgpu::CurrentSurfaceTexture::Occluded => {
                return Ok(());
            }
            wgpu::CurrentSurfaceTexture::Outdated | wgpu::CurrentSurfaceTexture::Lost => {
                log::warn!("surface outdated, reconfiguring");
                surface.configure(&self.ctx.device, &self.ctx.config);
                return Ok(());
            }
            wgpu::CurrentSurfaceTexture::Validation => {
                anyhow::bail!("validation error while acquiring the next frame")
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.render_to_view(scene, camera, &view);
        frame.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
    }
}
