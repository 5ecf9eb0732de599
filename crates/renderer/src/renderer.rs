//! Headless wgpu context: device, queue and an offscreen render target.

use crate::error::RenderError;
use crate::texture::Texture;

/// Color format of the offscreen target.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Main renderer state.
pub struct Renderer {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    color_target: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_texture: Texture,
    width: u32,
    height: u32,
}

impl Renderer {
    /// Create a renderer that draws into an offscreen texture.
    pub async fn new_headless(width: u32, height: u32) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;

        log::info!("Using GPU: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Terrain Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let width = width.max(1);
        let height = height.max(1);
        let color_target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color_target.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_texture = Texture::depth(&device, width, height);

        Ok(Self {
            device,
            queue,
            color_target,
            color_view,
            depth_texture,
            width,
            height,
        })
    }

    /// Blocking variant of [`Renderer::new_headless`].
    pub fn new_headless_blocking(width: u32, height: u32) -> Result<Self, RenderError> {
        pollster::block_on(Self::new_headless(width, height))
    }

    pub fn begin_frame(&self) -> wgpu::CommandEncoder {
        self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Terrain Encoder"),
        })
    }

    pub fn end_frame(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    pub fn color_view(&self) -> &wgpu::TextureView {
        &self.color_view
    }

    pub fn color_texture(&self) -> &wgpu::Texture {
        &self.color_target
    }

    pub fn depth_texture_view(&self) -> &wgpu::TextureView {
        &self.depth_texture.view
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        TARGET_FORMAT
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
