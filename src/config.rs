use anyhow::Result;
use gpu_particles_core::{EmitterConstants, SpawnParams, DEFAULT_CAPACITY};
use gpu_particles_render::{Camera, RendererConfig};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/emitter.toml";

/// Everything the driver needs to build a pool and run its frame loop.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Pool slot count.
    pub capacity: usize,
    /// Seed for the pool's random generator.
    pub seed: u64,
    /// Frames to simulate.
    pub frames: u64,
    /// Clock advance per frame, in the same units as particle life.
    pub frame_dt: f32,
    /// Spawn calls per frame, all with the same preset.
    pub spawns_per_frame: u32,
    /// Camera orbit per frame in radians (only used when rendering).
    pub orbit_per_frame: f32,
    /// Emitter-wide spawn constants.
    pub constants: EmitterConstants,
    /// Parameters passed to every spawn.
    pub spawn: SpawnParams,
    /// Headless renderer settings (only used with `--screenshot`).
    pub renderer: RendererConfig,
    /// Initial camera placement.
    pub camera: Camera,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            seed: 1337,
            frames: 300,
            frame_dt: 1.0 / 60.0,
            spawns_per_frame: 250,
            orbit_per_frame: 0.0,
            constants: EmitterConstants::default(),
            spawn: SpawnParams::default(),
            renderer: RendererConfig::default(),
            camera: Camera::default(),
        }
    }
}

impl EmitterConfig {
    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<EmitterConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    EmitterConfig::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Emitter config not found at {}. Using defaults",
                    path.display()
                );
                EmitterConfig::default()
            }
            Err(err) => {
                warn!("Failed to read {}: {err}. Using defaults", path.display());
                EmitterConfig::default()
            }
        }
    }

    /// Save configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }
}
