//! GPU-side mirrors of the pool's attribute buffers.

use anyhow::{bail, Context, Result};
use gpu_particles_core::{AttributeMask, ParticlePool};

/// One instance-rate vertex attribute backed by its own GPU buffer.
#[derive(Debug, Clone, Copy)]
pub struct GpuAttribute {
    /// Pool buffer this attribute mirrors.
    pub mask: AttributeMask,
    /// Debug label for the wgpu buffer.
    pub label: &'static str,
    /// Vertex format read by the shader.
    pub format: wgpu::VertexFormat,
}

/// Attribute table in shader location order.
pub const GPU_ATTRIBUTES: [GpuAttribute; 7] = [
    GpuAttribute {
        mask: AttributeMask::POSITION,
        label: "Particle position",
        format: wgpu::VertexFormat::Float32x3,
    },
    GpuAttribute {
        mask: AttributeMask::POSITION_START,
        label: "Particle positionStart",
        format: wgpu::VertexFormat::Float32x3,
    },
    GpuAttribute {
        mask: AttributeMask::START_TIME,
        label: "Particle startTime",
        format: wgpu::VertexFormat::Float32,
    },
    GpuAttribute {
        mask: AttributeMask::VELOCITY,
        label: "Particle velocity",
        format: wgpu::VertexFormat::Float32x3,
    },
    GpuAttribute {
        mask: AttributeMask::COLOR,
        label: "Particle color",
        format: wgpu::VertexFormat::Float32x3,
    },
    GpuAttribute {
        mask: AttributeMask::SIZE,
        label: "Particle size",
        format: wgpu::VertexFormat::Float32,
    },
    GpuAttribute {
        mask: AttributeMask::LIFE,
        label: "Particle life",
        format: wgpu::VertexFormat::Float32,
    },
];

static INSTANCE_ATTRIBUTES: [[wgpu::VertexAttribute; 1]; 7] = [
    wgpu::vertex_attr_array![0 => Float32x3],
    wgpu::vertex_attr_array![1 => Float32x3],
    wgpu::vertex_attr_array![2 => Float32],
    wgpu::vertex_attr_array![3 => Float32x3],
    wgpu::vertex_attr_array![4 => Float32x3],
    wgpu::vertex_attr_array![5 => Float32],
    wgpu::vertex_attr_array![6 => Float32],
];

/// Vertices per particle quad (two triangles, corners generated in the shader).
pub const VERTICES_PER_PARTICLE: u32 = 6;

/// Vertex buffer layouts for the seven attribute buffers, one instance per slot.
pub fn instance_buffer_layouts() -> Vec<wgpu::VertexBufferLayout<'static>> {
    GPU_ATTRIBUTES
        .iter()
        .zip(INSTANCE_ATTRIBUTES.iter())
        .map(|(attribute, attributes)| wgpu::VertexBufferLayout {
            array_stride: attribute.format.size(),
            step_mode: wgpu::VertexStepMode::Instance,
            attributes,
        })
        .collect()
}

fn attribute_buffer_size(attribute: &GpuAttribute, capacity: u32) -> u64 {
    attribute.format.size() * u64::from(capacity)
}

/// Fail before allocation if any attribute buffer would exceed the device limit.
fn check_buffer_sizes(capacity: u32, max_buffer_size: u64) -> Result<()> {
    for attribute in &GPU_ATTRIBUTES {
        let size = attribute_buffer_size(attribute, capacity);
        if size > max_buffer_size {
            bail!(
                "particle capacity {capacity} needs a {size}-byte {} buffer, \
                 device limit is {max_buffer_size} bytes",
                attribute.label
            );
        }
    }
    Ok(())
}

/// Seven instance buffers sized to the pool capacity.
pub struct GpuParticleBuffers {
    buffers: Vec<(AttributeMask, wgpu::Buffer)>,
    capacity: u32,
    instance_count: u32,
    uploads: u64,
}

impl GpuParticleBuffers {
    /// Allocate zeroed GPU buffers for `capacity` slots.
    pub fn new(device: &wgpu::Device, capacity: usize) -> Result<Self> {
        let capacity = u32::try_from(capacity)
            .with_context(|| format!("particle capacity {capacity} exceeds GPU instance range"))?;
        check_buffer_sizes(capacity, device.limits().max_buffer_size)?;

        let buffers = GPU_ATTRIBUTES
            .iter()
            .map(|attribute| {
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(attribute.label),
                    size: attribute_buffer_size(attribute, capacity),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                (attribute.mask, buffer)
            })
            .collect();

        tracing::info!(capacity, "particle attribute buffers allocated");

        Ok(Self {
            buffers,
            capacity,
            instance_count: 0,
            uploads: 0,
        })
    }

    /// Re-upload every buffer the pool has flagged dirty and return the flags consumed.
    pub fn sync<R>(&mut self, queue: &wgpu::Queue, pool: &mut ParticlePool<R>) -> AttributeMask {
        let dirty = pool.take_dirty();
        for (mask, buffer) in &self.buffers {
            if !dirty.contains(*mask) {
                continue;
            }
            if let Some(bytes) = pool.buffers().bytes(*mask) {
                queue.write_buffer(buffer, 0, bytes);
                self.uploads += 1;
            }
        }
        self.instance_count = (pool.active_slots() as u32).min(self.capacity);
        dirty
    }

    /// Slot capacity of the GPU buffers.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Instances drawn by [`GpuParticleBuffers::render`].
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    /// Individual buffer uploads issued since creation.
    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    /// Draw one quad per written slot; the shader hides expired slots.
    pub fn render<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        if self.instance_count == 0 {
            return;
        }
        for (slot, (_, buffer)) in self.buffers.iter().enumerate() {
            pass.set_vertex_buffer(slot as u32, buffer.slice(..));
        }
        pass.draw(0..VERTICES_PER_PARTICLE, 0..self.instance_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_follow_shader_locations() {
        let layouts = instance_buffer_layouts();
        assert_eq!(layouts.len(), 7);
        for (location, layout) in layouts.iter().enumerate() {
            assert_eq!(layout.step_mode, wgpu::VertexStepMode::Instance);
            assert_eq!(layout.attributes.len(), 1);
            assert_eq!(layout.attributes[0].shader_location, location as u32);
            assert_eq!(layout.attributes[0].offset, 0);
            assert_eq!(layout.attributes[0].format, GPU_ATTRIBUTES[location].format);
        }
    }

    #[test]
    fn attribute_table_covers_every_pool_buffer_once() {
        let combined = GPU_ATTRIBUTES
            .iter()
            .fold(AttributeMask::empty(), |acc, attribute| {
                assert!(!acc.intersects(attribute.mask));
                acc | attribute.mask
            });
        assert_eq!(combined, AttributeMask::all());
    }

    #[test]
    fn strides_match_pool_byte_views() {
        let pool = ParticlePool::with_seed(5, 1).unwrap();
        for attribute in GPU_ATTRIBUTES {
            let bytes = pool.buffers().bytes(attribute.mask).unwrap();
            assert_eq!(bytes.len() as u64, attribute.format.size() * 5);
        }
    }

    #[test]
    fn oversized_capacity_is_rejected_before_allocation() {
        let limit = wgpu::Limits::default().max_buffer_size;
        assert_eq!(limit, 256 << 20);

        let err = check_buffer_sizes(30_000_000, limit).unwrap_err();
        assert!(err.to_string().contains("30000000"), "{err}");
        assert!(err.to_string().contains("position"), "{err}");

        assert!(check_buffer_sizes(1_000_000, limit).is_ok());
    }

    #[test]
    fn buffer_size_scales_with_stride() {
        assert_eq!(attribute_buffer_size(&GPU_ATTRIBUTES[0], 10), 120);
        assert_eq!(attribute_buffer_size(&GPU_ATTRIBUTES[2], 10), 40);
    }
}
