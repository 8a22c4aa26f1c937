//! Flat per-slot attribute buffers and their dirty tracking.

use blake3::Hasher;
use serde::Serialize;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    /// Attribute buffers that must be re-uploaded before the next draw.
    pub struct AttributeMask: u8 {
        /// Unjittered spawn anchor.
        const POSITION = 0b0000_0001;
        /// Jittered start position.
        const POSITION_START = 0b0000_0010;
        /// Clock value at spawn plus jitter.
        const START_TIME = 0b0000_0100;
        /// Velocity normalized to `[0, 1]`.
        const VELOCITY = 0b0000_1000;
        /// Clamped color.
        const COLOR = 0b0001_0000;
        /// Sprite size.
        const SIZE = 0b0010_0000;
        /// Lifespan.
        const LIFE = 0b0100_0000;
    }
}

impl Default for AttributeMask {
    fn default() -> Self {
        AttributeMask::empty()
    }
}

/// Digest of every attribute buffer, used for bit-identity comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHash(pub [u8; 32]);

impl BufferHash {
    /// Lowercase hex rendering of the digest.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// One row across all buffers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParticleSlot {
    /// Unjittered spawn anchor.
    pub position: [f32; 3],
    /// Jittered start position.
    pub position_start: [f32; 3],
    /// Spawn time plus jitter.
    pub start_time: f32,
    /// Normalized velocity.
    pub velocity: [f32; 3],
    /// Clamped color.
    pub color: [f32; 3],
    /// Sprite size.
    pub size: f32,
    /// Lifespan.
    pub life: f32,
}

/// Seven parallel buffers, all indexed by slot and allocated once.
#[derive(Debug, Clone)]
pub struct AttributeBuffers {
    position: Vec<[f32; 3]>,
    position_start: Vec<[f32; 3]>,
    start_time: Vec<f32>,
    velocity: Vec<[f32; 3]>,
    color: Vec<[f32; 3]>,
    size: Vec<f32>,
    life: Vec<f32>,
}

impl AttributeBuffers {
    /// Allocate zeroed buffers for `capacity` slots.
    pub fn zeroed(capacity: usize) -> Self {
        Self {
            position: vec![[0.0; 3]; capacity],
            position_start: vec![[0.0; 3]; capacity],
            start_time: vec![0.0; capacity],
            velocity: vec![[0.0; 3]; capacity],
            color: vec![[0.0; 3]; capacity],
            size: vec![0.0; capacity],
            life: vec![0.0; capacity],
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.size.len()
    }

    /// True when no slots were allocated.
    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }

    /// Overwrite one row. Every buffer is written at the same index.
    pub(crate) fn write(&mut self, index: usize, slot: &ParticleSlot) {
        self.position[index] = slot.position;
        self.position_start[index] = slot.position_start;
        self.start_time[index] = slot.start_time;
        self.velocity[index] = slot.velocity;
        self.color[index] = slot.color;
        self.size[index] = slot.size;
        self.life[index] = slot.life;
    }

    /// Copy one row out of the buffers.
    pub fn read(&self, index: usize) -> Option<ParticleSlot> {
        if index >= self.len() {
            return None;
        }
        Some(ParticleSlot {
            position: self.position[index],
            position_start: self.position_start[index],
            start_time: self.start_time[index],
            velocity: self.velocity[index],
            color: self.color[index],
            size: self.size[index],
            life: self.life[index],
        })
    }

    /// Unjittered spawn anchors.
    pub fn position(&self) -> &[[f32; 3]] {
        &self.position
    }

    /// Jittered start positions.
    pub fn position_start(&self) -> &[[f32; 3]] {
        &self.position_start
    }

    /// Start times.
    pub fn start_time(&self) -> &[f32] {
        &self.start_time
    }

    /// Normalized velocities.
    pub fn velocity(&self) -> &[[f32; 3]] {
        &self.velocity
    }

    /// Colors.
    pub fn color(&self) -> &[[f32; 3]] {
        &self.color
    }

    /// Sizes.
    pub fn size(&self) -> &[f32] {
        &self.size
    }

    /// Lifespans.
    pub fn life(&self) -> &[f32] {
        &self.life
    }

    /// Raw bytes of the buffer selected by a single-flag `mask`, ready for GPU upload.
    ///
    /// Returns `None` when `mask` is empty or names more than one buffer.
    pub fn bytes(&self, mask: AttributeMask) -> Option<&[u8]> {
        let bytes: &[u8] = match mask {
            AttributeMask::POSITION => bytemuck::cast_slice(&self.position),
            AttributeMask::POSITION_START => bytemuck::cast_slice(&self.position_start),
            AttributeMask::START_TIME => bytemuck::cast_slice(&self.start_time),
            AttributeMask::VELOCITY => bytemuck::cast_slice(&self.velocity),
            AttributeMask::COLOR => bytemuck::cast_slice(&self.color),
            AttributeMask::SIZE => bytemuck::cast_slice(&self.size),
            AttributeMask::LIFE => bytemuck::cast_slice(&self.life),
            _ => return None,
        };
        Some(bytes)
    }

    /// Hash every buffer in declaration order.
    pub fn hash(&self) -> BufferHash {
        let mut hasher = Hasher::new();
        for flag in AttributeMask::all().iter() {
            if let Some(bytes) = self.bytes(flag) {
                hasher.update(bytes);
            }
        }
        BufferHash(*hasher.finalize().as_bytes())
    }
}
