#![warn(missing_docs)]
//! Rendering collaborator for the particle pool: wgpu context, sprite texture, instanced
//! sprite pipeline and dirty-buffer uploads.

use std::path::{Path, PathBuf};

use anyhow::Result;
use gpu_particles_core::{AttributeMask, ParticlePool};
use serde::{Deserialize, Serialize};

mod camera;
mod particles;
mod pipeline;
mod screenshot;
mod sprite;

pub use camera::Camera;
pub use particles::{
    instance_buffer_layouts, GpuAttribute, GpuParticleBuffers, GPU_ATTRIBUTES,
    VERTICES_PER_PARTICLE,
};
pub use pipeline::{BlendMode, ParticlePipeline, ParticleUniform, RenderContext};
pub use screenshot::{capture_rgba8, write_png};
pub use sprite::{warn_missing_sprite, SpriteError, SpriteImage, FALLBACK_SPRITE_SIZE};

/// Renderer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Sprite size multiplier (`uScale`).
    pub scale: f32,
    /// Fragment blending.
    pub blend: BlendMode,
    /// Sprite texture; `None` uses the procedural sprite.
    pub sprite_path: Option<PathBuf>,
    /// Clear color (linear RGBA).
    pub clear_color: [f64; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            scale: 1.0,
            blend: BlendMode::default(),
            sprite_path: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Headless renderer owning the GPU mirror of one particle pool.
pub struct ParticleRenderer {
    config: RendererConfig,
    context: RenderContext,
    pipeline: ParticlePipeline,
    buffers: GpuParticleBuffers,
    camera: Camera,
}

impl ParticleRenderer {
    /// Initialize GPU resources for a pool of `capacity` slots (async).
    pub async fn new_headless(config: RendererConfig, capacity: usize) -> Result<Self> {
        let context = RenderContext::new_headless(
            (config.width, config.height),
            wgpu::TextureFormat::Rgba8UnormSrgb,
        )
        .await?;

        let sprite = SpriteImage::load_or_fallback(config.sprite_path.as_deref());
        let pipeline = ParticlePipeline::new(&context, &sprite, config.blend)?;
        let buffers = GpuParticleBuffers::new(&context.device, capacity)?;
        let camera = Camera::new(context.aspect_ratio());

        tracing::info!(?config, capacity, "particle renderer initialized");

        Ok(Self {
            config,
            context,
            pipeline,
            buffers,
            camera,
        })
    }

    /// Access the renderer configuration provided at construction time.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Get reference to the camera.
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Get mutable reference to the camera.
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// GPU instance buffers.
    pub fn buffers(&self) -> &GpuParticleBuffers {
        &self.buffers
    }

    /// Change the `uScale` uniform used from the next frame on.
    pub fn set_scale(&mut self, scale: f32) {
        self.config.scale = scale;
    }

    /// Resize the offscreen target.
    pub fn resize(&mut self, new_size: (u32, u32)) {
        self.context.resize(new_size);
        self.config.width = self.context.size.0;
        self.config.height = self.context.size.1;
        self.camera.set_aspect(self.context.aspect_ratio());
    }

    /// Upload whichever pool buffers were flagged dirty since the last sync.
    pub fn sync<R>(&mut self, pool: &mut ParticlePool<R>) -> AttributeMask {
        self.buffers.sync(&self.context.queue, pool)
    }

    /// Draw the pool at its current clock into the offscreen target.
    pub fn render<R>(&self, pool: &ParticlePool<R>) {
        let uniform = ParticleUniform::new(
            &self.camera,
            self.context.size,
            pool.clock(),
            self.config.scale,
            pool.constants().max_velocity,
        );
        self.pipeline.update_uniform(&self.context.queue, &uniform);

        let view = self
            .context
            .target
            .create_view(&wgpu::TextureViewDescriptor::default());
        let [r, g, b, a] = self.config.clear_color;
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Particle Frame Encoder"),
                });
        self.pipeline
            .encode(&mut encoder, &view, wgpu::Color { r, g, b, a }, &self.buffers);
        self.context.queue.submit(Some(encoder.finish()));
    }

    /// Read the offscreen target back as RGBA8.
    pub fn capture(&self) -> Result<Vec<u8>> {
        capture_rgba8(
            &self.context.device,
            &self.context.queue,
            &self.context.target,
            self.context.format,
            self.context.size,
        )
    }

    /// Read the offscreen target back and write it as a PNG.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let rgba = self.capture()?;
        write_png(path, self.context.size, &rgba)?;
        tracing::info!(path = %path.display(), "particle frame captured");
        Ok(())
    }
}
