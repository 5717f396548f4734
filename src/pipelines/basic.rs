use wgpu::util::DeviceExt;

use crate::{
    context::DEPTH_FORMAT,
    data_structures::{
        geometry::Vertex,
        material::{Material, Shading},
    },
};

use cgmath::{Matrix, Matrix4, SquareMatrix};

/// Per-object uniform: transforms plus the material parameters the shader needs.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 4],
    color: [f32; 4],
    // metalness, roughness, shading (0 basic, 1 standard), unused
    params: [f32; 4],
}

impl ObjectUniform {
    pub fn new(world: Matrix4<f32>, material: &Material) -> Self {
        let normal = world
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or(world);
        let shading = match material.shading {
            Shading::Basic => 0.0,
            Shading::Standard => 1.0,
        };
        let [r, g, b] = material.color;
        Self {
            model: world.into(),
            normal: normal.into(),
            color: [r, g, b, 1.0],
            params: [material.metalness, material.roughness, shading, 0.0],
        }
    }
}

/// The three pipelines every mesh is drawn with, sharing one layout.
pub struct BasicPipelines {
    pub solid: wgpu::RenderPipeline,
    pub double_sided: wgpu::RenderPipeline,
    pub lines: wgpu::RenderPipeline,
    pub globals_layout: wgpu::BindGroupLayout,
    pub object_layout: wgpu::BindGroupLayout,
}

pub fn mk_buffer<T: bytemuck::Pod>(device: &wgpu::Device, label: &str, contents: &T) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(std::slice::from_ref(contents)),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Camera at binding 0, lights at binding 1.
pub fn mk_globals_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
            uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
        ],
        label: Some("globals_bind_group_layout"),
    })
}

pub fn mk_object_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform_entry(
            0,
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        )],
        label: Some("object_bind_group_layout"),
    })
}

pub fn mk_basic_pipelines(device: &wgpu::Device, color_format: wgpu::TextureFormat) -> BasicPipelines {
    let globals_layout = mk_globals_layout(device);
    let object_layout = mk_object_layout(device);
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Render Pipeline Layout"),
        bind_group_layouts: &[Some(&globals_layout), Some(&object_layout)],
        immediate_size: 0,
    });
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Basic Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("basic.wgsl").into()),
    });
    let blend = Some(wgpu::BlendState {
        alpha: wgpu::BlendComponent::REPLACE,
        color: wgpu::BlendComponent::REPLACE,
    });
    let mk = |label, topology, cull_mode| {
        mk_render_pipeline(
            device,
            &layout,
            color_format,
            blend,
            Some(DEPTH_FORMAT),
            &[Vertex::desc()],
            &shader,
            topology,
            cull_mode,
            label,
        )
    };

    BasicPipelines {
        solid: mk(
            "Solid Pipeline",
            wgpu::PrimitiveTopology::TriangleList,
            Some(wgpu::Face::Back),
        ),
        double_sided: mk(
            "Double Sided Pipeline",
            wgpu::PrimitiveTopology::TriangleList,
            None,
        ),
        lines: mk("Line Pipeline", wgpu::PrimitiveTopology::LineList, None),
        globals_layout,
        object_layout,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    depth_format: Option<wgpu::TextureFormat>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: &wgpu::ShaderModule,
    topology: wgpu::PrimitiveTopology,
    cull_mode: Option<wgpu::Face>,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Less),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}
