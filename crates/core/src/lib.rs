#![warn(missing_docs)]
//! Particle pool primitives: ring-buffer slot allocation and randomized spawn attributes
//! written into flat buffers for a GPU renderer.

mod attributes;
mod params;
mod pool;

pub use attributes::{AttributeBuffers, AttributeMask, BufferHash, ParticleSlot};
pub use params::{EmitterConstants, SpawnParams};
pub use pool::{ParticlePool, PoolError, DEFAULT_CAPACITY};
