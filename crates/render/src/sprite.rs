use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::warn;

/// Edge length of the procedural fallback sprite.
pub const FALLBACK_SPRITE_SIZE: u32 = 64;

/// Error raised while loading the particle sprite.
#[derive(Debug, Error)]
pub enum SpriteError {
    /// The file could not be opened.
    #[error("failed to open sprite {path}: {source}")]
    Io {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// Image decoding failed.
    #[error("failed to decode sprite image: {0}")]
    Image(#[from] image::ImageError),
    /// The decoded image has no pixels.
    #[error("sprite {path} is empty")]
    Empty {
        /// Path that was requested.
        path: PathBuf,
    },
}

/// Decoded RGBA sprite ready for GPU upload.
#[derive(Debug, Clone)]
pub struct SpriteImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// RGBA pixels (width × height × 4).
    pub pixels: Vec<u8>,
}

impl SpriteImage {
    /// Decode a sprite from disk.
    pub fn load(path: &Path) -> Result<Self, SpriteError> {
        let reader = ImageReader::open(path).map_err(|source| SpriteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = reader.with_guessed_format().map_err(|source| SpriteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = rgba.decode()?.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(SpriteError::Empty {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    /// Soft white disc whose alpha falls off quadratically toward the edge.
    pub fn procedural(size: u32) -> Self {
        let size = size.max(1);
        let mut pixels = vec![0u8; (size * size * 4) as usize];
        let half = size as f32 / 2.0;

        for y in 0..size {
            for x in 0..size {
                let dx = (x as f32 + 0.5 - half) / half;
                let dy = (y as f32 + 0.5 - half) / half;
                let falloff = (1.0 - (dx * dx + dy * dy)).clamp(0.0, 1.0);
                let idx = ((y * size + x) * 4) as usize;
                pixels[idx] = 255;
                pixels[idx + 1] = 255;
                pixels[idx + 2] = 255;
                pixels[idx + 3] = (falloff * falloff * 255.0).round() as u8;
            }
        }

        Self {
            width: size,
            height: size,
            pixels,
        }
    }

    /// Load `path` if given, otherwise (or on failure) use the procedural sprite.
    pub fn load_or_fallback(path: Option<&Path>) -> Self {
        match path.map(Self::load) {
            Some(Ok(sprite)) => {
                tracing::info!(
                    width = sprite.width,
                    height = sprite.height,
                    "particle sprite loaded"
                );
                sprite
            }
            Some(Err(err)) => {
                warn_missing_sprite(&err);
                Self::procedural(FALLBACK_SPRITE_SIZE)
            }
            None => Self::procedural(FALLBACK_SPRITE_SIZE),
        }
    }
}

/// Log a helpful warning if sprite loading fails.
pub fn warn_missing_sprite(err: &SpriteError) {
    warn!("Falling back to procedural particle sprite: {err}");
}
