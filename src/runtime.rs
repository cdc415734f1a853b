//! Process-wide, initialize-once warm-up of the image-processing kernels.
//!
//! The first caller runs every kernel the detector uses on a small synthetic
//! frame on the blocking thread pool; concurrent callers await that same
//! initialization and later callers get the memoized result immediately.

use crate::config::DetectionConfig;
use crate::detection::{contours, preprocessing};
use crate::models::ScaleContext;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect as PixelRect;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::info;

static RUNTIME: OnceCell<ProcessingRuntime> = OnceCell::const_new();

const WARMUP_SIZE: u32 = 160;

#[derive(Debug)]
pub struct ProcessingRuntime {
    /// Time the one-time warm-up took
    pub warmup: Duration,
}

/// The shared runtime, initializing it on first use
pub async fn shared() -> anyhow::Result<&'static ProcessingRuntime> {
    let runtime = RUNTIME
        .get_or_try_init(|| async { tokio::task::spawn_blocking(warm_up).await })
        .await
        .map_err(|e| anyhow::anyhow!("Runtime warm-up failed: {}", e))?;
    Ok(runtime)
}

pub fn is_initialized() -> bool {
    RUNTIME.initialized()
}

fn warm_up() -> ProcessingRuntime {
    let start = Instant::now();

    let mut frame = GrayImage::from_pixel(WARMUP_SIZE, WARMUP_SIZE, Luma([40u8]));
    draw_filled_rect_mut(&mut frame, PixelRect::at(60, 50).of_size(40, 60), Luma([220u8]));
    let frame = DynamicImage::ImageLuma8(frame);

    let config = DetectionConfig::default();
    let scale = ScaleContext::new(WARMUP_SIZE, WARMUP_SIZE, config.max_working_dimension);
    let normalized = preprocessing::normalize(&frame, &scale, &config);
    let mask = preprocessing::binarize(&normalized, &scale, &config);
    let regions = contours::find_regions(&mask).len();

    let warmup = start.elapsed();
    info!(?warmup, regions, "Image processing runtime initialized");
    ProcessingRuntime { warmup }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_initialization() -> anyhow::Result<()> {
        let handles: Vec<_> = (0..8).map(|_| tokio::spawn(shared())).collect();

        let mut runtimes = Vec::new();
        for handle in handles {
            runtimes.push(handle.await??);
        }

        assert!(is_initialized());
        let first = runtimes[0];
        assert!(runtimes.iter().all(|r| std::ptr::eq(*r, first)));
        assert!(std::ptr::eq(shared().await?, first));
        Ok(())
    }
}
