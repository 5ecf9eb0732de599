//! GPU consumer of terrain batches.
//!
//! Submissions are copied into a per-frame staging array and a draw list;
//! [`TerrainPass::encode`] uploads the staging array once and replays the list.

use std::ops::Range;
use std::path::Path;

use wgpu::util::DeviceExt;

use crate::batch::{BatchSink, BlendMode, TextureId, TEXTURE_SLOTS};
use crate::camera::{CameraUniform, CameraView};
use crate::texture::{Texture, TextureTable};
use crate::vertex::TerrainVertex;

/// Default staging size, in vertices.
pub const DEFAULT_FRAME_VERTICES: usize = 1 << 20;

struct DrawCommand {
    texture: TextureId,
    blend: BlendMode,
    range: Range<u32>,
}

struct BoundTexture {
    _texture: Texture,
    bind_group: wgpu::BindGroup,
}

/// Terrain render pass implementing [`BatchSink`].
pub struct TerrainPass {
    opaque_pipeline: wgpu::RenderPipeline,
    alpha_pipeline: wgpu::RenderPipeline,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    camera_uniform: CameraUniform,
    texture_layout: wgpu::BindGroupLayout,
    textures: Vec<Option<BoundTexture>>,
    vertex_buffer: wgpu::Buffer,
    max_vertices: usize,
    staging: Vec<TerrainVertex>,
    commands: Vec<DrawCommand>,
    overflowed: bool,
}

impl TerrainPass {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, max_vertices: usize) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Terrain Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/terrain.wgsl").into()),
        });

        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Tile Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Terrain Pipeline Layout"),
            bind_group_layouts: &[&camera_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let opaque_pipeline = create_pipeline(device, &layout, &shader, format, BlendMode::Opaque);
        let alpha_pipeline = create_pipeline(device, &layout, &shader, format, BlendMode::Alpha);

        let max_vertices = max_vertices.max(1);
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Terrain Vertex Buffer"),
            size: (max_vertices * std::mem::size_of::<TerrainVertex>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            opaque_pipeline,
            alpha_pipeline,
            camera_buffer,
            camera_bind_group,
            camera_uniform,
            texture_layout,
            textures: (0..TEXTURE_SLOTS).map(|_| None).collect(),
            vertex_buffer,
            max_vertices,
            staging: Vec::with_capacity(max_vertices),
            commands: Vec::new(),
            overflowed: false,
        }
    }

    pub fn register_texture(&mut self, device: &wgpu::Device, id: TextureId, texture: Texture) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Tile Texture Bind Group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
        });
        self.textures[id as usize] = Some(BoundTexture {
            _texture: texture,
            bind_group,
        });
    }

    pub fn has_texture(&self, id: TextureId) -> bool {
        self.textures[id as usize].is_some()
    }

    /// Load every table entry found under `dir`. Missing files are skipped with
    /// a warning. Returns the number of textures registered.
    pub fn load_textures(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        table: &TextureTable,
        dir: &Path,
    ) -> usize {
        let mut loaded = 0;
        let ids: Vec<TextureId> = table.iter().map(|(id, _)| id).collect();
        for id in ids {
            let Some(path) = table.resolve(id, dir, "png") else {
                continue;
            };
            match Texture::load(device, queue, &path) {
                Ok(texture) => {
                    self.register_texture(device, id, texture);
                    loaded += 1;
                }
                Err(e) => log::warn!("Texture {} unavailable: {}", id, e),
            }
        }
        loaded
    }

    pub fn update_camera(&mut self, queue: &wgpu::Queue, view: &CameraView) {
        self.camera_uniform.update(view);
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[self.camera_uniform]));
    }

    /// Vertices staged for the current frame.
    pub fn staged_vertices(&self) -> usize {
        self.staging.len()
    }

    /// Upload the frame's vertices and replay the draw list, then reset.
    pub fn encode(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        clear: wgpu::Color,
    ) {
        if !self.staging.is_empty() {
            queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&self.staging));
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Terrain Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));

            let mut current_blend = None;
            for command in &self.commands {
                let Some(bound) = self.textures[command.texture as usize].as_ref() else {
                    continue;
                };
                if current_blend != Some(command.blend) {
                    let pipeline = match command.blend {
                        BlendMode::Opaque => &self.opaque_pipeline,
                        BlendMode::Alpha => &self.alpha_pipeline,
                    };
                    render_pass.set_pipeline(pipeline);
                    current_blend = Some(command.blend);
                }
                render_pass.set_bind_group(1, &bound.bind_group, &[]);
                render_pass.draw(command.range.clone(), 0..1);
            }
        }

        self.staging.clear();
        self.commands.clear();
        self.overflowed = false;
    }
}

impl BatchSink for TerrainPass {
    fn submit(&mut self, texture: TextureId, blend: BlendMode, vertices: &[TerrainVertex]) -> bool {
        if self.textures[texture as usize].is_none() {
            return false;
        }
        if self.staging.len() + vertices.len() > self.max_vertices {
            if !self.overflowed {
                log::warn!(
                    "Terrain frame exceeded {} staged vertices; dropping further batches",
                    self.max_vertices
                );
                self.overflowed = true;
            }
            return false;
        }
        let start = self.staging.len() as u32;
        self.staging.extend_from_slice(vertices);
        self.commands.push(DrawCommand {
            texture,
            blend,
            range: start..self.staging.len() as u32,
        });
        true
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    blend: BlendMode,
) -> wgpu::RenderPipeline {
    let (label, blend_state, depth_write) = match blend {
        BlendMode::Opaque => ("Terrain Opaque Pipeline", wgpu::BlendState::REPLACE, true),
        BlendMode::Alpha => ("Terrain Alpha Pipeline", wgpu::BlendState::ALPHA_BLENDING, false),
    };
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[TerrainVertex::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend_state),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: depth_write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
