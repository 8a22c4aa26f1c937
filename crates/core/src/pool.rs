//! Ring-buffer particle pool.
//!
//! Slots are handed out by a wrapping write cursor. Nothing tracks whether a slot is still
//! alive: once the cursor comes back around, the oldest row is overwritten even if its
//! particle has not expired yet. Such overwrites are counted (see
//! [`ParticlePool::live_overwrites`]) but never prevented.

use glam::Vec3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::attributes::{AttributeBuffers, AttributeMask, BufferHash, ParticleSlot};
use crate::params::{EmitterConstants, SpawnParams};

/// Slot count used when none is configured.
pub const DEFAULT_CAPACITY: usize = 1_000_000;

/// Errors raised while building a pool.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A ring buffer needs at least one slot for its cursor to be valid.
    #[error("particle pool capacity must be at least 1")]
    ZeroCapacity,
}

/// Fixed-capacity particle pool writing spawn attributes into flat buffers.
#[derive(Debug)]
pub struct ParticlePool<R = StdRng> {
    buffers: AttributeBuffers,
    constants: EmitterConstants,
    write_cursor: usize,
    spawned_this_frame: usize,
    total_spawned: u64,
    live_overwrites: u64,
    overwrite_warned: bool,
    clock: f32,
    dirty: AttributeMask,
    rng: R,
}

impl ParticlePool<StdRng> {
    /// Build a pool whose randomness comes from a seeded [`StdRng`].
    pub fn with_seed(capacity: usize, seed: u64) -> Result<Self, PoolError> {
        Self::new(capacity, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ParticlePool<R> {
    /// Build a pool with default emitter constants.
    pub fn new(capacity: usize, rng: R) -> Result<Self, PoolError> {
        Self::with_constants(capacity, EmitterConstants::default(), rng)
    }

    /// Build a pool with explicit emitter constants.
    pub fn with_constants(
        capacity: usize,
        constants: EmitterConstants,
        rng: R,
    ) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }

        info!(capacity, ?constants, "particle pool allocated");

        Ok(Self {
            buffers: AttributeBuffers::zeroed(capacity),
            constants,
            write_cursor: 0,
            spawned_this_frame: 0,
            total_spawned: 0,
            live_overwrites: 0,
            overwrite_warned: false,
            clock: 0.0,
            dirty: AttributeMask::all(),
            rng,
        })
    }

    /// Write one particle at the cursor and advance it, wrapping to slot 0 at capacity.
    ///
    /// Random draws happen in a fixed order (position, velocity, color, size, start time) so a
    /// seeded generator reproduces the same buffers for the same call sequence.
    pub fn spawn(&mut self, params: &SpawnParams) {
        let index = self.write_cursor;
        self.note_overwrite(index);

        let constants = self.constants;
        let base = params.position;

        let start = base + self.jitter3(params.position_randomness);
        let raw_velocity = constants.base_velocity + self.jitter3(params.velocity_randomness);
        let velocity = raw_velocity
            .to_array()
            .map(|v| constants.normalize_velocity(v));

        let color_jitter = self.jitter3(params.color_randomness);
        let color = [
            constants.base_color[0] + color_jitter.x,
            constants.base_color[1] + color_jitter.y,
            constants.base_color[2] + color_jitter.z,
        ]
        .map(|channel| channel.clamp(0.0, 1.0));

        let size = params.size + self.jitter(params.size_randomness);
        let start_time = self.clock + self.jitter(constants.start_time_jitter);

        self.buffers.write(
            index,
            &ParticleSlot {
                position: base.to_array(),
                position_start: start.to_array(),
                start_time,
                velocity,
                color,
                size,
                life: params.life,
            },
        );

        self.write_cursor += 1;
        self.spawned_this_frame += 1;
        self.total_spawned += 1;
        if self.write_cursor == self.buffers.len() {
            self.write_cursor = 0;
        }
    }

    /// Advance the clock, flag every buffer for re-upload and reset the per-frame counter.
    pub fn update(&mut self, time: f32) {
        debug!(
            time,
            spawned = self.spawned_this_frame,
            cursor = self.write_cursor,
            "particle pool frame"
        );
        self.clock = time;
        self.dirty = AttributeMask::all();
        self.spawned_this_frame = 0;
        self.overwrite_warned = false;
    }

    fn jitter(&mut self, bound: f32) -> f32 {
        self.rng.gen::<f32>() * bound
    }

    fn jitter3(&mut self, bound: f32) -> Vec3 {
        let x = self.jitter(bound);
        let y = self.jitter(bound);
        let z = self.jitter(bound);
        Vec3::new(x, y, z)
    }
}

impl<R> ParticlePool<R> {
    fn note_overwrite(&mut self, index: usize) {
        if self.total_spawned < self.buffers.len() as u64 {
            return;
        }
        let age = self.clock - self.buffers.start_time()[index];
        if age > self.buffers.life()[index] {
            return;
        }

        self.live_overwrites += 1;
        if !self.overwrite_warned {
            self.overwrite_warned = true;
            warn!(
                slot = index,
                capacity = self.buffers.len(),
                total = self.live_overwrites,
                "particle pool overwrote a live particle; capacity too small for spawn rate"
            );
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.buffers.len()
    }

    /// Slot the next spawn writes to.
    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    /// Clock value set by the last [`ParticlePool::update`].
    pub fn clock(&self) -> f32 {
        self.clock
    }

    /// Spawns since the last update.
    pub fn spawned_this_frame(&self) -> usize {
        self.spawned_this_frame
    }

    /// Spawns since construction.
    pub fn total_spawned(&self) -> u64 {
        self.total_spawned
    }

    /// Spawns that replaced a particle which had not yet reached its lifespan.
    pub fn live_overwrites(&self) -> u64 {
        self.live_overwrites
    }

    /// Slots that have been written at least once.
    pub fn active_slots(&self) -> usize {
        self.total_spawned.min(self.buffers.len() as u64) as usize
    }

    /// Emitter constants used for every spawn.
    pub fn constants(&self) -> &EmitterConstants {
        &self.constants
    }

    /// Read-only view of the attribute buffers.
    pub fn buffers(&self) -> &AttributeBuffers {
        &self.buffers
    }

    /// Copy of one slot, or `None` when out of range.
    pub fn slot(&self, index: usize) -> Option<ParticleSlot> {
        self.buffers.read(index)
    }

    /// Check whether any buffer in `mask` awaits upload.
    pub fn is_dirty(&self, mask: AttributeMask) -> bool {
        self.dirty.intersects(mask)
    }

    /// Consume and return the set of buffers awaiting upload.
    pub fn take_dirty(&mut self) -> AttributeMask {
        let flags = self.dirty;
        self.dirty = AttributeMask::empty();
        flags
    }

    /// Digest of every buffer.
    pub fn buffer_hash(&self) -> BufferHash {
        self.buffers.hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> SpawnParams {
        SpawnParams::default().without_randomness()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = ParticlePool::with_seed(0, 1).unwrap_err();
        assert_eq!(err, PoolError::ZeroCapacity);
    }

    #[test]
    fn fresh_pool_state() {
        let pool = ParticlePool::with_seed(16, 7).unwrap();
        assert_eq!(pool.capacity(), 16);
        assert_eq!(pool.write_cursor(), 0);
        assert_eq!(pool.clock(), 0.0);
        assert_eq!(pool.active_slots(), 0);
        assert!(pool.is_dirty(AttributeMask::all()));
    }

    #[test]
    fn cursor_advances_and_wraps() {
        let mut pool = ParticlePool::with_seed(3, 7).unwrap();
        pool.spawn(&quiet());
        pool.spawn(&quiet());
        assert_eq!(pool.write_cursor(), 2);
        pool.spawn(&quiet());
        assert_eq!(pool.write_cursor(), 0);
        assert_eq!(pool.spawned_this_frame(), 3);
        assert_eq!(pool.active_slots(), 3);
    }

    #[test]
    fn quiet_spawn_writes_base_values() {
        let mut pool = ParticlePool::with_seed(4, 7).unwrap();
        let params = quiet()
            .with_position(Vec3::new(1.0, -2.0, 3.0))
            .with_life(2.0)
            .with_size(4.0, 0.0);
        pool.spawn(&params);

        let slot = pool.slot(0).unwrap();
        assert_eq!(slot.position, [1.0, -2.0, 3.0]);
        assert_eq!(slot.position_start, [1.0, -2.0, 3.0]);
        assert_eq!(slot.velocity, [0.5, 0.5, 0.5]);
        assert_eq!(slot.color, [1.0, 0.0, 0.0]);
        assert_eq!(slot.size, 4.0);
        assert_eq!(slot.life, 2.0);
        assert!((0.0..0.02).contains(&slot.start_time));
    }

    #[test]
    fn start_time_follows_clock() {
        let mut pool = ParticlePool::with_seed(4, 7).unwrap();
        pool.update(10.0);
        pool.spawn(&quiet());
        let start = pool.slot(0).unwrap().start_time;
        assert!((10.0..10.02).contains(&start), "start time {start}");
    }

    #[test]
    fn update_sets_clock_and_resets_frame_counter() {
        let mut pool = ParticlePool::with_seed(8, 7).unwrap();
        for _ in 0..5 {
            pool.spawn(&quiet());
        }
        let before = pool.buffer_hash();
        pool.update(1.25);
        assert_eq!(pool.clock(), 1.25);
        assert_eq!(pool.spawned_this_frame(), 0);
        assert_eq!(pool.total_spawned(), 5);
        assert_eq!(pool.buffer_hash(), before);
    }

    #[test]
    fn take_dirty_clears_until_next_update() {
        let mut pool = ParticlePool::with_seed(8, 7).unwrap();
        assert_eq!(pool.take_dirty(), AttributeMask::all());
        assert!(pool.take_dirty().is_empty());

        pool.spawn(&quiet());
        assert!(!pool.is_dirty(AttributeMask::all()));

        pool.update(0.5);
        assert!(pool.is_dirty(AttributeMask::COLOR));
        assert_eq!(pool.take_dirty(), AttributeMask::all());
    }

    #[test]
    fn overwriting_live_particles_is_counted() {
        let mut pool = ParticlePool::with_seed(2, 7).unwrap();
        let params = quiet().with_life(5.0);
        pool.spawn(&params);
        pool.spawn(&params);
        assert_eq!(pool.live_overwrites(), 0);

        pool.spawn(&params);
        assert_eq!(pool.live_overwrites(), 1);
    }

    #[test]
    fn overwriting_expired_particles_is_not_counted() {
        let mut pool = ParticlePool::with_seed(2, 7).unwrap();
        let params = quiet().with_life(1.0);
        pool.spawn(&params);
        pool.spawn(&params);
        pool.update(2.0);
        pool.spawn(&params);
        pool.spawn(&params);
        assert_eq!(pool.live_overwrites(), 0);
        assert_eq!(pool.write_cursor(), 0);
    }

    #[test]
    fn custom_constants_change_base_color_and_range() {
        let constants = EmitterConstants {
            base_color: [0.0, 0.5, 1.0],
            max_velocity: 4.0,
            start_time_jitter: 0.0,
            ..Default::default()
        };
        let mut pool =
            ParticlePool::with_constants(2, constants, StdRng::seed_from_u64(3)).unwrap();
        pool.update(3.0);
        pool.spawn(&quiet());

        let slot = pool.slot(0).unwrap();
        assert_eq!(slot.color, [0.0, 0.5, 1.0]);
        assert_eq!(slot.velocity, [0.5, 0.5, 0.5]);
        assert_eq!(slot.start_time, 3.0);
    }

    #[test]
    fn explicit_zero_parameters_are_kept() {
        let mut pool = ParticlePool::with_seed(2, 1).unwrap();
        let params = SpawnParams::default()
            .with_life(0.0)
            .with_size(0.0, 0.0)
            .with_color_randomness(0.0);
        pool.spawn(&params);

        let slot = pool.slot(0).unwrap();
        assert_eq!(slot.life, 0.0);
        assert_eq!(slot.size, 0.0);
        assert_eq!(slot.color, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn negative_inputs_are_not_validated() {
        let mut pool = ParticlePool::with_seed(2, 7).unwrap();
        pool.spawn(&quiet().with_life(-1.0).with_size(-3.0, 0.0));
        let slot = pool.slot(0).unwrap();
        assert_eq!(slot.life, -1.0);
        assert_eq!(slot.size, -3.0);
    }
}
