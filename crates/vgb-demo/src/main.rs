//! vgbridge demo
//!
//! Opens a handful of views from separate host threads, renders frames
//! through the bridge, closes them and reopens more to show worker reuse.
//!
//! `VGB_VIEWS` and `VGB_FRAMES` override the defaults; `RUST_LOG` controls
//! log output.

use std::thread;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use vgb_bridge::NativeBridge;
use vgb_render::{Bounds, Color, ShapeScene};
use vgb_worker::PoolStats;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const FIT_CONTAIN: i32 = 1;
const ALIGN_CENTER: i32 = 4;

fn env_or(name: &str, default: usize) -> Result<usize> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", name, value)),
        Err(_) => Ok(default),
    }
}

fn scene(index: usize) -> ShapeScene {
    let shade = (40 + index * 50 % 200) as u8;
    ShapeScene::new(200.0, 100.0)
        .with_rect(Bounds::new(0.0, 0.0, 200.0, 100.0), Color::from_rgba8(20, 20, 30, 255))
        .with_moving_rect(
            Bounds::new(0.0, 30.0, 40.0, 70.0),
            Color::from_rgba8(shade, 120, 255 - shade, 255),
            120.0,
        )
}

fn log_stats(round: usize, stats: &PoolStats) {
    tracing::info!(
        "Round {}: {} workers ({} idle, {} checked out, peak {})",
        round,
        stats.total_workers,
        stats.idle_workers,
        stats.checked_out,
        stats.peak_checked_out
    );
}

/// One host view: open, render `frames` frames, close
fn run_view(bridge: &NativeBridge, index: usize, frames: usize) -> Result<u64> {
    let name = format!("view{}", index);
    let handle = bridge.create_renderer(
        name.as_bytes(),
        Box::new(scene(index)),
        FIT_CONTAIN,
        ALIGN_CENTER,
        0xFF00_0000,
    )?;
    bridge.set_surface(handle, 320, 180)?;

    for _ in 0..frames {
        bridge.draw(handle, 1.0 / 60.0)?;
    }
    bridge.flush(handle)?;

    let frame = bridge
        .last_frame(handle)?
        .context("renderer produced no frame")?;
    bridge.delete_renderer(handle)?;
    Ok(frame.frame_index)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let views = env_or("VGB_VIEWS", 4)?;
    let frames = env_or("VGB_FRAMES", 120)?;
    let bridge = NativeBridge::new();

    for round in 0..2 {
        let results: Vec<Result<u64>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..views)
                .map(|i| {
                    let bridge = &bridge;
                    scope.spawn(move || run_view(bridge, i, frames))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|_| Err(anyhow::anyhow!("view thread panicked"))))
                .collect()
        });

        for (i, result) in results.into_iter().enumerate() {
            let last = result.with_context(|| format!("view {} failed in round {}", i, round))?;
            tracing::info!("Round {} view {}: last frame index {}", round, i, last);
        }

        log_stats(round, &bridge.pool_stats());
    }

    println!("vgbridge demo finished: {:?}", bridge.pool_stats());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgb_render::SurfaceContext;
    use vgb_worker::{ThreadManager, WorkerConfig};

    #[test]
    fn test_env_default_when_unset() {
        assert_eq!(env_or("VGB_DEMO_UNSET_FOR_TEST", 7).unwrap(), 7);
    }

    #[test]
    fn test_views_reuse_pooled_worker() {
        let manager = ThreadManager::<SurfaceContext>::new(WorkerConfig::default());
        let bridge = NativeBridge::with_manager(manager);

        assert_eq!(run_view(&bridge, 0, 3).unwrap(), 2);
        assert_eq!(run_view(&bridge, 1, 3).unwrap(), 5);

        let stats: PoolStats = bridge.pool_stats();
        assert_eq!(stats.total_workers, 1);
        assert_eq!(stats.checked_out, 0);
    }
}
