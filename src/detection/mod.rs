pub mod preprocessing;
pub mod contours;
pub mod grid;
pub mod ordering;
pub mod steps;

use crate::config::DetectionConfig;
use crate::error::{DetectError, Result};
use crate::models::{Crop, RawImage, Rect};
use crate::pipeline::{Pipeline, PipelineData};
use crate::runtime;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

/// Build the card detection pipeline: normalize → binarize → extract regions
/// → complete grid → reading order → crop
pub fn build_card_pipeline(config: DetectionConfig) -> Pipeline {
    use self::steps::*;

    Pipeline::with_config(config)
        .add_step(Arc::new(NormalizeStep))
        .add_step(Arc::new(BinarizeStep))
        .add_step(Arc::new(RegionExtractionStep))
        .add_step(Arc::new(GridCompletionStep))
        .add_step(Arc::new(ReadingOrderStep))
        .add_step(Arc::new(CropStep))
}

/// Stages of one detection run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Initial,
    PrimaryAttempt,
    RotateRetry,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timings {
    /// Time this call waited for the one-time runtime setup
    pub init: Duration,
    /// Time spent in the detection passes
    pub detect: Duration,
}

/// Result of a detection run. An empty `crops` means no cards were detected.
#[derive(Debug, Clone)]
pub struct Detection {
    pub crops: Vec<Crop>,
    /// Crops were cut from the source rotated by 90°
    pub rotated: bool,
    /// Pipeline passes run (1, or 2 after a rotation retry)
    pub attempts: usize,
    pub timings: Timings,
}

/// Card detector: runs the pipeline and retries once on a rotated source when
/// the first pass finds nothing
#[derive(Clone)]
pub struct CardDetector {
    pipeline: Pipeline,
}

impl CardDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            pipeline: build_card_pipeline(config),
        }
    }

    /// Dump every stage's frames under `output_dir` (must be empty)
    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        self.pipeline = self.pipeline.with_debug(output_dir)?;
        Ok(self)
    }

    pub fn config(&self) -> &DetectionConfig {
        self.pipeline.config()
    }

    /// Detect and crop every card, after the shared runtime is warm.
    ///
    /// The passes run on tokio's blocking pool, not on the calling worker.
    pub async fn detect(&self, raw: &RawImage) -> Result<Detection> {
        let start = Instant::now();
        runtime::shared().await?;
        let init = start.elapsed();

        let detector = self.clone();
        let raw = raw.clone();
        let mut detection = tokio::task::spawn_blocking(move || detector.detect_blocking(&raw))
            .await
            .map_err(|e| anyhow::anyhow!("Detection task failed: {}", e))??;
        detection.timings.init = init;
        Ok(detection)
    }

    /// Detect and crop every card on the calling thread; async callers should
    /// use [`CardDetector::detect`]
    #[instrument(skip_all, fields(width = raw.width(), height = raw.height()))]
    pub fn detect_blocking(&self, raw: &RawImage) -> Result<Detection> {
        let start = Instant::now();
        validate(raw)?;

        let mut source = raw.oriented();
        let mut state = RetryState::Initial;
        let mut crops = Vec::new();
        let mut attempts = 0;
        let mut rotated = false;

        while state != RetryState::Done {
            state = match state {
                RetryState::Initial => RetryState::PrimaryAttempt,
                RetryState::PrimaryAttempt => {
                    attempts += 1;
                    crops = self.run_pass(source.clone(), "")?;
                    if crops.is_empty() && self.config().rotate_retry {
                        info!("No cards found, retrying on rotated image");
                        RetryState::RotateRetry
                    } else {
                        RetryState::Done
                    }
                }
                RetryState::RotateRetry => {
                    attempts += 1;
                    rotated = true;
                    source = source.rotate90();
                    crops = self.run_pass(source.clone(), "retry_")?;
                    RetryState::Done
                }
                RetryState::Done => RetryState::Done,
            };
        }

        let detect = start.elapsed();
        info!(cards = crops.len(), attempts, rotated, ?detect, "Detection finished");

        Ok(Detection {
            crops,
            rotated,
            attempts,
            timings: Timings {
                init: Duration::ZERO,
                detect,
            },
        })
    }

    /// Working-resolution regions of a single pass, in reading order, without
    /// cropping or retrying
    pub fn locate(&self, raw: &RawImage) -> Result<Vec<Rect>> {
        validate(raw)?;
        let uncropped = self.pipeline.len().saturating_sub(1);
        let data = self.pipeline
            .run_partial(raw.oriented(), uncropped, "")
            .map_err(DetectError::from_pipeline)?;
        Ok(data.iter().filter_map(|item| item.bbox).collect())
    }

    fn run_pass(&self, source: DynamicImage, tag: &str) -> Result<Vec<Crop>> {
        let data = self.pipeline.run(source, tag).map_err(DetectError::from_pipeline)?;
        let padding = self.config().crop_padding;
        data.into_iter().map(|item| into_crop(item, padding)).collect()
    }
}

impl Default for CardDetector {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}

fn validate(raw: &RawImage) -> Result<()> {
    if raw.width() == 0 || raw.height() == 0 {
        return Err(DetectError::InvalidImage {
            width: raw.width(),
            height: raw.height(),
        });
    }
    Ok(())
}

fn into_crop(item: PipelineData, padding: u32) -> Result<Crop> {
    let ordinal = item.get_int(steps::ORDINAL)
        .ok_or_else(|| anyhow::anyhow!("Missing ordinal"))?;
    let region = item.bbox
        .ok_or_else(|| anyhow::anyhow!("Missing region for card {}", ordinal))?;
    let bounds = item.scale.to_full_resolution(&region, padding);

    Ok(Crop {
        ordinal: ordinal as usize,
        image: item.image,
        region,
        bounds,
    })
}
