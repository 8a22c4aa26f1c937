//! Spawn parameters and emitter-wide constants.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Per-call spawn description.
///
/// Randomness fields are upper bounds of an additive jitter drawn from `[0, r)`.
/// Values are not validated; negative bounds or lifespans flow straight into the buffers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnParams {
    /// Base spawn position.
    pub position: Vec3,
    /// Max additive jitter per position axis.
    pub position_randomness: f32,
    /// Max additive jitter per velocity axis, applied before normalization.
    pub velocity_randomness: f32,
    /// Max additive jitter per color channel, applied before clamping.
    pub color_randomness: f32,
    /// Lifespan in clock units.
    pub life: f32,
    /// Base particle size.
    pub size: f32,
    /// Max additive jitter on size.
    pub size_randomness: f32,
}

impl Default for SpawnParams {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            position_randomness: 0.0,
            velocity_randomness: 0.0,
            color_randomness: 1.0,
            life: 5.0,
            size: 10.0,
            size_randomness: 0.0,
        }
    }
}

impl SpawnParams {
    /// Create parameters with every field at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base spawn position.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Set the per-axis position jitter.
    pub fn with_position_randomness(mut self, randomness: f32) -> Self {
        self.position_randomness = randomness;
        self
    }

    /// Set the per-axis velocity jitter.
    pub fn with_velocity_randomness(mut self, randomness: f32) -> Self {
        self.velocity_randomness = randomness;
        self
    }

    /// Set the per-channel color jitter.
    pub fn with_color_randomness(mut self, randomness: f32) -> Self {
        self.color_randomness = randomness;
        self
    }

    /// Set the lifespan.
    pub fn with_life(mut self, life: f32) -> Self {
        self.life = life;
        self
    }

    /// Set base size and its jitter.
    pub fn with_size(mut self, size: f32, randomness: f32) -> Self {
        self.size = size;
        self.size_randomness = randomness;
        self
    }

    /// Zero every randomness bound, making the spawn fully determined except for start time jitter.
    pub fn without_randomness(mut self) -> Self {
        self.position_randomness = 0.0;
        self.velocity_randomness = 0.0;
        self.color_randomness = 0.0;
        self.size_randomness = 0.0;
        self
    }
}

/// Values shared by every spawn of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConstants {
    /// Color every particle starts from before jitter (linear RGB).
    pub base_color: [f32; 3],
    /// Velocity every particle starts from before jitter.
    pub base_velocity: Vec3,
    /// Half-width of the raw velocity range mapped onto `[0, 1]`.
    pub max_velocity: f32,
    /// Upper bound of the jitter added to a particle's start time.
    pub start_time_jitter: f32,
}

impl Default for EmitterConstants {
    fn default() -> Self {
        Self {
            base_color: [1.0, 0.0, 0.0],
            base_velocity: Vec3::ZERO,
            max_velocity: 2.0,
            start_time_jitter: 0.02,
        }
    }
}

impl EmitterConstants {
    /// Map a raw velocity component from `[-max, max]` onto `[0, 1]`, clipping outside values.
    pub fn normalize_velocity(&self, v: f32) -> f32 {
        let max = self.max_velocity;
        ((v + max) / (2.0 * max)).clamp(0.0, 1.0)
    }

    /// Inverse of [`Self::normalize_velocity`] for values inside the range.
    pub fn denormalize_velocity(&self, n: f32) -> f32 {
        (n * 2.0 - 1.0) * self.max_velocity
    }
}
