//! Fixed-timestep frame loop: advance the pool clock, spawn, mirror to the GPU.

use anyhow::Result;
use gpu_particles_core::ParticlePool;
use gpu_particles_render::ParticleRenderer;
use gpu_particles_testkit::{FrameRecord, JsonlSink};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::EmitterConfig;

/// End-of-run totals written by `--stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub frames: u64,
    pub final_time: f32,
    pub capacity: usize,
    pub total_spawned: u64,
    pub live_overwrites: u64,
    pub cursor: usize,
    pub active_slots: usize,
    pub buffer_hash: String,
}

/// Seeded pool sized and tuned from the config.
pub fn build_pool(config: &EmitterConfig) -> Result<ParticlePool> {
    let rng = StdRng::seed_from_u64(config.seed);
    Ok(ParticlePool::with_constants(
        config.capacity,
        config.constants,
        rng,
    )?)
}

/// Runs the emitter for `config.frames` frames.
pub struct FrameLoop<'a> {
    config: &'a EmitterConfig,
    renderer: Option<&'a mut ParticleRenderer>,
    frame_log: Option<&'a mut JsonlSink>,
}

impl<'a> FrameLoop<'a> {
    pub fn new(config: &'a EmitterConfig) -> Self {
        Self {
            config,
            renderer: None,
            frame_log: None,
        }
    }

    pub fn with_renderer(mut self, renderer: &'a mut ParticleRenderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_frame_log(mut self, sink: &'a mut JsonlSink) -> Self {
        self.frame_log = Some(sink);
        self
    }

    /// Frame `n` runs at time `n * frame_dt`; spawns land after the clock update
    /// so they carry the current frame's start time.
    pub fn run<R: rand::Rng>(mut self, pool: &mut ParticlePool<R>) -> Result<RunSummary> {
        let config = self.config;
        let mut time = 0.0;

        for frame in 0..config.frames {
            time = frame as f32 * config.frame_dt;
            pool.update(time);
            for _ in 0..config.spawns_per_frame {
                pool.spawn(&config.spawn);
            }

            if let Some(renderer) = self.renderer.as_deref_mut() {
                if config.orbit_per_frame != 0.0 {
                    renderer.camera_mut().orbit(config.orbit_per_frame);
                }
                let uploaded = renderer.sync(pool);
                debug!(frame, ?uploaded, "particle buffers synced");
                renderer.render(pool);
            }

            if let Some(sink) = self.frame_log.as_deref_mut() {
                sink.write(&FrameRecord {
                    frame,
                    time,
                    spawned: pool.spawned_this_frame(),
                    cursor: pool.write_cursor(),
                    live_overwrites: pool.live_overwrites(),
                    hash: pool.buffer_hash().to_hex(),
                })?;
            }
        }

        let summary = RunSummary {
            frames: config.frames,
            final_time: time,
            capacity: pool.capacity(),
            total_spawned: pool.total_spawned(),
            live_overwrites: pool.live_overwrites(),
            cursor: pool.write_cursor(),
            active_slots: pool.active_slots(),
            buffer_hash: pool.buffer_hash().to_hex(),
        };
        info!(
            frames = summary.frames,
            total_spawned = summary.total_spawned,
            live_overwrites = summary.live_overwrites,
            "emitter run finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpu_particles_core::EmitterConstants;

    fn small_config() -> EmitterConfig {
        EmitterConfig {
            capacity: 16,
            seed: 7,
            frames: 5,
            frame_dt: 0.5,
            spawns_per_frame: 3,
            ..Default::default()
        }
    }

    fn pool_for(config: &EmitterConfig) -> ParticlePool {
        build_pool(config).unwrap()
    }

    #[test]
    fn totals_follow_spawn_rate() {
        let config = small_config();
        let mut pool = pool_for(&config);
        let summary = FrameLoop::new(&config).run(&mut pool).unwrap();

        assert_eq!(summary.total_spawned, 15);
        assert_eq!(summary.cursor, 15);
        assert_eq!(summary.active_slots, 15);
        assert_eq!(summary.live_overwrites, 0);
        assert_eq!(summary.final_time, 2.0);
        assert_eq!(pool.spawned_this_frame(), 3);
    }

    #[test]
    fn spawns_carry_the_frame_clock() {
        let config = EmitterConfig {
            constants: EmitterConstants {
                start_time_jitter: 0.0,
                ..Default::default()
            },
            ..small_config()
        };
        let mut pool = pool_for(&config);
        FrameLoop::new(&config).run(&mut pool).unwrap();

        assert_eq!(pool.slot(0).unwrap().start_time, 0.0);
        assert_eq!(pool.slot(3).unwrap().start_time, 0.5);
        assert_eq!(pool.slot(14).unwrap().start_time, 2.0);
    }

    #[test]
    fn same_seed_same_hash() {
        let config = small_config();
        let mut a = pool_for(&config);
        let mut b = pool_for(&config);
        let first = FrameLoop::new(&config).run(&mut a).unwrap();
        let second = FrameLoop::new(&config).run(&mut b).unwrap();
        assert_eq!(first.buffer_hash, second.buffer_hash);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = EmitterConfig {
            capacity: 0,
            ..small_config()
        };
        assert!(build_pool(&config).is_err());
    }

    #[test]
    fn overflow_counts_live_overwrites() {
        let config = EmitterConfig {
            capacity: 4,
            frames: 2,
            spawns_per_frame: 3,
            ..small_config()
        };
        let mut pool = pool_for(&config);
        let summary = FrameLoop::new(&config).run(&mut pool).unwrap();
        assert_eq!(summary.total_spawned, 6);
        assert_eq!(summary.cursor, 2);
        assert_eq!(summary.live_overwrites, 2);
    }
}
