//! GPU rendering pipeline for particle sprites using wgpu.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::particles::{instance_buffer_layouts, GpuParticleBuffers};
use crate::sprite::SpriteImage;

/// Headless GPU context rendering into an offscreen color target.
pub struct RenderContext {
    /// Logical GPU device used for issuing commands.
    pub device: wgpu::Device,
    /// Command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Offscreen color target.
    pub target: wgpu::Texture,
    /// Format of the color target.
    pub format: wgpu::TextureFormat,
    /// Target dimensions in pixels (width, height).
    pub size: (u32, u32),
}

impl RenderContext {
    /// Create a device and an offscreen target of the given size.
    pub async fn new_headless(size: (u32, u32), format: wgpu::TextureFormat) -> Result<Self> {
        if size.0 == 0 || size.1 == 0 {
            anyhow::bail!("render target must be non-empty, got {}x{}", size.0, size.1);
        }

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
            .context("Failed to find suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("gpu-particles device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("Failed to create GPU device")?;

        let target = create_target(&device, size, format);

        tracing::info!(
            width = size.0,
            height = size.1,
            format = ?format,
            adapter = ?adapter.get_info().name,
            "headless particle context initialized"
        );

        Ok(Self {
            device,
            queue,
            target,
            format,
            size,
        })
    }

    /// Recreate the offscreen target at a new size.
    pub fn resize(&mut self, new_size: (u32, u32)) {
        if new_size.0 > 0 && new_size.1 > 0 && new_size != self.size {
            self.size = new_size;
            self.target = create_target(&self.device, new_size, self.format);
        }
    }

    /// Get current aspect ratio.
    pub fn aspect_ratio(&self) -> f32 {
        self.size.0 as f32 / self.size.1 as f32
    }
}

fn create_target(
    device: &wgpu::Device,
    size: (u32, u32),
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Particle Color Target"),
        size: wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// Per-frame uniforms shared by the vertex and fragment stages.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleUniform {
    /// Camera view-projection matrix.
    pub view_proj: [[f32; 4]; 4],
    /// Render target size in pixels.
    pub viewport: [f32; 2],
    /// Pool clock (`uTime`).
    pub time: f32,
    /// Sprite size multiplier (`uScale`).
    pub scale: f32,
    /// Half-width of the velocity range used to denormalize velocities.
    pub max_velocity: f32,
    /// Padding for 16-byte alignment
    pub _padding: [f32; 3],
}

impl ParticleUniform {
    /// Assemble the uniform block for one frame.
    pub fn new(
        camera: &Camera,
        viewport: (u32, u32),
        time: f32,
        scale: f32,
        max_velocity: f32,
    ) -> Self {
        Self {
            view_proj: camera.view_projection_matrix().to_cols_array_2d(),
            viewport: [viewport.0 as f32, viewport.1 as f32],
            time,
            scale,
            max_velocity,
            _padding: [0.0; 3],
        }
    }
}

/// How sprite fragments combine with the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Overwrite the target; transparent texels are discarded in the shader.
    #[default]
    Replace,
    /// Standard alpha blending.
    Alpha,
    /// Additive glow.
    Additive,
}

impl BlendMode {
    /// wgpu blend state for this mode.
    pub fn blend_state(self) -> wgpu::BlendState {
        match self {
            BlendMode::Replace => wgpu::BlendState::REPLACE,
            BlendMode::Alpha => wgpu::BlendState::ALPHA_BLENDING,
            BlendMode::Additive => wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent::OVER,
            },
        }
    }
}

fn upload_sprite_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    sprite: &SpriteImage,
) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: sprite.width,
        height: sprite.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Particle Sprite"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    // write_texture has no row alignment requirement, only copies between buffers do.
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &sprite.pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(sprite.width * 4),
            rows_per_image: Some(sprite.height),
        },
        size,
    );

    texture
}

/// Instanced sprite pipeline drawing one camera-facing quad per particle slot.
pub struct ParticlePipeline {
    render_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    blend: BlendMode,
}

impl ParticlePipeline {
    /// Create the particle render pipeline and upload the sprite texture.
    pub fn new(ctx: &RenderContext, sprite: &SpriteImage, blend: BlendMode) -> Result<Self> {
        let device = &ctx.device;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Uniform Buffer"),
            size: std::mem::size_of::<ParticleUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sprite_texture = upload_sprite_texture(device, &ctx.queue, sprite);
        let sprite_view = sprite_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sprite_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Particle Sprite Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&sprite_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sprite_sampler),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/particles.wgsl").into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let instance_layouts = instance_buffer_layouts();

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Particle Render Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &instance_layouts,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.format,
                    blend: Some(blend.blend_state()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            // Sprites never write depth.
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        Ok(Self {
            render_pipeline,
            uniform_buffer,
            bind_group,
            blend,
        })
    }

    /// Blend mode baked into the pipeline.
    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    /// Upload this frame's uniforms.
    pub fn update_uniform(&self, queue: &wgpu::Queue, uniform: &ParticleUniform) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniform]));
    }

    /// Record a pass that clears `view` and draws every written slot.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        clear: wgpu::Color,
        buffers: &GpuParticleBuffers,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Particle Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
            })],
            ..Default::default()
        });
        pass.set_pipeline(&self.render_pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        buffers.render(&mut pass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<ParticleUniform>(), 96);
        assert_eq!(std::mem::size_of::<ParticleUniform>() % 16, 0);
    }

    #[test]
    fn uniform_carries_frame_values() {
        let camera = Camera::new(2.0);
        let uniform = ParticleUniform::new(&camera, (640, 320), 3.5, 1.5, 2.0);
        assert_eq!(uniform.viewport, [640.0, 320.0]);
        assert_eq!(uniform.time, 3.5);
        assert_eq!(uniform.scale, 1.5);
        assert_eq!(uniform.max_velocity, 2.0);
        assert_eq!(
            uniform.view_proj,
            camera.view_projection_matrix().to_cols_array_2d()
        );
    }

    #[test]
    fn blend_modes_map_to_states() {
        assert_eq!(BlendMode::default(), BlendMode::Replace);
        assert_eq!(BlendMode::Replace.blend_state(), wgpu::BlendState::REPLACE);
        assert_eq!(
            BlendMode::Alpha.blend_state(),
            wgpu::BlendState::ALPHA_BLENDING
        );
        assert_eq!(
            BlendMode::Additive.blend_state().color.dst_factor,
            wgpu::BlendFactor::One
        );
    }
}
