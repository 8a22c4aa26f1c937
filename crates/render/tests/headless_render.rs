//! Renders a pool through a headless GPU context.
//!
//! Skips quietly when the machine exposes no adapter.

use gpu_particles_core::{AttributeMask, ParticlePool, SpawnParams};
use gpu_particles_render::{ParticleRenderer, RendererConfig};

fn renderer(capacity: usize) -> Option<ParticleRenderer> {
    let config = RendererConfig {
        width: 64,
        height: 64,
        scale: 2.0,
        ..Default::default()
    };
    match pollster::block_on(ParticleRenderer::new_headless(config, capacity)) {
        Ok(renderer) => Some(renderer),
        Err(err) => {
            eprintln!("skipping headless render test: {err:#}");
            None
        }
    }
}

#[test]
fn sync_uploads_each_dirty_buffer_once() {
    let Some(mut renderer) = renderer(16) else {
        return;
    };
    let mut pool = ParticlePool::with_seed(16, 42).unwrap();
    pool.update(0.0);
    for _ in 0..5 {
        pool.spawn(&SpawnParams::default());
    }

    assert_eq!(renderer.sync(&mut pool), AttributeMask::all());
    assert_eq!(renderer.buffers().uploads(), 7);
    assert_eq!(renderer.buffers().instance_count(), 5);

    assert!(renderer.sync(&mut pool).is_empty());
    assert_eq!(renderer.buffers().uploads(), 7);
}

#[test]
fn spawned_particle_is_visible_at_screen_center() {
    let Some(mut renderer) = renderer(4) else {
        return;
    };
    let mut pool = ParticlePool::with_seed(4, 42).unwrap();
    pool.update(0.0);
    pool.spawn(&SpawnParams::default().without_randomness());
    pool.update(0.0);

    renderer.sync(&mut pool);
    renderer.render(&pool);
    let rgba = renderer.capture().expect("capture frame");
    assert_eq!(rgba.len(), 64 * 64 * 4);

    let center = ((32 * 64 + 32) * 4) as usize;
    let pixel = &rgba[center..center + 4];
    assert!(pixel[0] > 200, "center pixel {pixel:?}");
    assert!(pixel[1] < 10 && pixel[2] < 10, "center pixel {pixel:?}");

    let corner = &rgba[0..4];
    assert_eq!(&corner[..3], &[0, 0, 0]);
}

#[test]
fn expired_particles_are_not_drawn() {
    let Some(mut renderer) = renderer(4) else {
        return;
    };
    let mut pool = ParticlePool::with_seed(4, 42).unwrap();
    pool.spawn(&SpawnParams::default().without_randomness().with_life(1.0));
    pool.update(5.0);

    renderer.sync(&mut pool);
    renderer.render(&pool);
    let rgba = renderer.capture().expect("capture frame");
    assert!(rgba.chunks_exact(4).all(|pixel| pixel[..3] == [0, 0, 0]));
}
