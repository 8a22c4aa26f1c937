//! gpu-particles - drives a ring-buffer particle pool at a fixed timestep
//!
//! Optionally mirrors the pool to the GPU and captures the last frame as a PNG.

mod config;
mod driver;

use anyhow::{Context, Result};
use clap::Parser;
use config::EmitterConfig;
use driver::{build_pool, FrameLoop};
use gpu_particles_render::ParticleRenderer;
use gpu_particles_testkit::JsonlSink;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a particle emitter and report pool statistics", long_about = None)]
struct Args {
    /// Emitter config (TOML). Missing or malformed files fall back to defaults.
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Frames to simulate.
    #[arg(long)]
    frames: Option<u64>,

    /// Seed for the pool's random generator.
    #[arg(long)]
    seed: Option<u64>,

    /// Pool slot count.
    #[arg(long)]
    capacity: Option<usize>,

    /// Spawns per frame.
    #[arg(long)]
    spawns_per_frame: Option<u32>,

    /// Render headlessly and save the final frame here.
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Write an end-of-run JSON summary here.
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Write one JSON line per frame here.
    #[arg(long)]
    frame_log: Option<PathBuf>,

    /// Save the effective config (after flag overrides) as TOML.
    #[arg(long)]
    write_config: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut EmitterConfig) {
        if let Some(frames) = self.frames {
            config.frames = frames;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(spawns) = self.spawns_per_frame {
            config.spawns_per_frame = spawns;
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing with WARN level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    info!("Starting gpu-particles v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut config = EmitterConfig::load_from_path(&args.config);
    args.apply(&mut config);
    if let Some(path) = args.write_config.as_deref() {
        config.save_to_path(path)?;
        info!(path = %path.display(), "effective emitter config saved");
    }

    let mut pool = build_pool(&config)?;

    let mut frame_log = args
        .frame_log
        .as_ref()
        .map(JsonlSink::create)
        .transpose()
        .context("failed to create frame log")?;

    let mut renderer = match &args.screenshot {
        Some(_) => Some(pollster::block_on(ParticleRenderer::new_headless(
            config.renderer.clone(),
            config.capacity,
        ))?),
        None => None,
    };
    if let Some(renderer) = renderer.as_mut() {
        let aspect = renderer.camera().aspect;
        *renderer.camera_mut() = config.camera;
        renderer.camera_mut().set_aspect(aspect);
    }

    let mut frame_loop = FrameLoop::new(&config);
    if let Some(renderer) = renderer.as_mut() {
        frame_loop = frame_loop.with_renderer(renderer);
    }
    if let Some(sink) = frame_log.as_mut() {
        frame_loop = frame_loop.with_frame_log(sink);
    }
    let summary = frame_loop.run(&mut pool)?;

    if let (Some(renderer), Some(path)) = (renderer.as_ref(), args.screenshot.as_deref()) {
        renderer.save_png(path)?;
    }
    if let Some(path) = args.stats.as_deref() {
        write_stats(path, &summary)?;
    }

    println!(
        "frames={} spawned={} live_overwrites={} hash={}",
        summary.frames, summary.total_spawned, summary.live_overwrites, summary.buffer_hash
    );
    Ok(())
}

fn write_stats(path: &Path, summary: &driver::RunSummary) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "run summary written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "gpu-particles",
            "--frames",
            "12",
            "--capacity",
            "256",
            "--spawns-per-frame",
            "4",
        ]);
        let mut config = EmitterConfig::default();
        args.apply(&mut config);

        assert_eq!(config.frames, 12);
        assert_eq!(config.capacity, 256);
        assert_eq!(config.spawns_per_frame, 4);
        assert_eq!(config.seed, EmitterConfig::default().seed);
        assert_eq!(args.config, PathBuf::from(config::DEFAULT_CONFIG_PATH));
    }
}
