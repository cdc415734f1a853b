use crate::detection::{contours, grid, ordering, preprocessing};
use crate::error::DetectError;
use crate::models::{Rect, ScaleContext};
use crate::pipeline::{MetadataValue, PipelineContext, PipelineData, PipelineStep};
use anyhow::Result;
use image::{DynamicImage, GrayImage};
use tracing::{debug, info};

/// Tag carried by grid-inferred regions until they are cropped
pub const SYNTHETIC: &str = "synthetic";
/// 1-based reading-order position assigned by the cropper
pub const ORDINAL: &str = "ordinal";

/// Orientation-corrected source → illumination-normalized working frame
pub struct NormalizeStep;

impl PipelineStep for NormalizeStep {
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let config = &context.config;
        let mut result = Vec::new();
        for item in data {
            let (width, height) = (item.image.width(), item.image.height());
            if width == 0 || height == 0 {
                return Err(DetectError::InvalidImage { width, height }.into());
            }

            let scale = ScaleContext::new(width, height, config.max_working_dimension);
            debug!(
                scale = scale.working_scale,
                width = scale.working_width,
                height = scale.working_height,
                "Working resolution"
            );

            let frame = preprocessing::normalize(&item.image, &scale, config);
            let mut new_item = item.with_image(DynamicImage::ImageLuma8(frame));
            new_item.scale = scale;
            result.push(new_item);
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Normalize"
    }
}

/// Working frame → eroded binary mask
pub struct BinarizeStep;

impl PipelineStep for BinarizeStep {
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();
        for item in data {
            let frame = item.image.to_luma8();
            let mask = preprocessing::binarize(&frame, &item.scale, &context.config);
            result.push(item.with_image(DynamicImage::ImageLuma8(mask)));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Binarize"
    }
}

/// Find card-like contours in the mask - splits one frame into many regions
pub struct RegionExtractionStep;

impl PipelineStep for RegionExtractionStep {
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for item in data {
            let mask = item.image.to_luma8();
            let frame_area = item.scale.working_area();

            let regions = contours::find_regions(&mask);
            let cards = contours::filter_card_regions(&regions, frame_area, &context.config);
            info!(contours = regions.len(), candidates = cards.len(), "Extracted card regions");

            // Each accepted contour becomes its own PipelineData
            for card in cards {
                let bounds = card.bounds;
                let view = image::imageops::crop_imm(&mask, bounds.x, bounds.y, bounds.width, bounds.height).to_image();

                debug!(
                    ?bounds,
                    area_ratio = card.area_ratio(frame_area),
                    aspect = card.aspect(),
                    rectangularity = card.rectangularity(),
                    "Card region"
                );

                result.push(PipelineData::from_region(
                    DynamicImage::ImageLuma8(view),
                    item.original.clone(),
                    item.scale,
                    bounds,
                ));
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Region Extraction"
    }
}

/// Add regions for the missing cells of a nearly complete card grid
pub struct GridCompletionStep;

impl PipelineStep for GridCompletionStep {
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let Some(first) = data.first() else {
            return Ok(data);
        };
        let original = first.original.clone();
        let scale = first.scale;

        let candidates: Vec<Rect> = data.iter().filter_map(|item| item.bbox).collect();
        let synthesized = grid::complete_grid(
            &candidates,
            scale.working_width,
            scale.working_height,
            &context.config,
        );
        if !synthesized.is_empty() {
            info!(count = synthesized.len(), "Synthesized missing grid cells");
        }

        let mut result = data;
        for cell in synthesized {
            // No mask evidence backs a synthesized cell
            let blank = GrayImage::new(cell.width, cell.height);
            result.push(
                PipelineData::from_region(DynamicImage::ImageLuma8(blank), original.clone(), scale, cell)
                    .with_metadata(SYNTHETIC, MetadataValue::Bool(true)),
            );
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Grid Completion"
    }
}

/// Sort regions row-major (coarse row bands, then x)
pub struct ReadingOrderStep;

impl PipelineStep for ReadingOrderStep {
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let fraction = context.config.row_band_fraction;
        let mut result = data;
        result.sort_by_key(|item| {
            let rect = item.bbox.unwrap_or(Rect::new(0, 0, 0, 0));
            ordering::reading_order_key(&rect, item.scale.working_height, fraction)
        });
        Ok(result)
    }

    fn name(&self) -> &str {
        "Reading Order"
    }
}

/// Replace every region by its padded full-resolution crop and number it
pub struct CropStep;

impl PipelineStep for CropStep {
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for (idx, item) in data.into_iter().enumerate() {
            let rect = item.bbox
                .ok_or_else(|| anyhow::anyhow!("Region {} has no bounding box", idx + 1))?;

            let (crop, _) = ordering::crop_region(&item.original, &rect, &item.scale, context.config.crop_padding);

            let mut new_item = item.with_image(crop);
            new_item.metadata.remove(SYNTHETIC);
            new_item.metadata.insert(ORDINAL.to_string(), MetadataValue::Int((idx + 1) as i32));
            result.push(new_item);
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Crop"
    }
}
