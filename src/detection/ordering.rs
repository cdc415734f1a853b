use crate::models::{Rect, ScaleContext};
use image::DynamicImage;

/// Coarse row band of a Rect: its top edge quantized into bands
/// `band_fraction` of the frame height tall, so slightly skewed rows still
/// read left to right
pub fn row_band(rect: &Rect, working_height: u32, band_fraction: f64) -> i64 {
    let band_height = (working_height as f64 * band_fraction).max(1.0);
    (rect.y as f64 / band_height).round() as i64
}

/// Sort key for reading order: row band first, then x
pub fn reading_order_key(rect: &Rect, working_height: u32, band_fraction: f64) -> (i64, u32) {
    (row_band(rect, working_height, band_fraction), rect.x)
}

/// Rects sorted row-major
pub fn sort_reading_order(rects: &mut [Rect], working_height: u32, band_fraction: f64) {
    rects.sort_by_key(|r| reading_order_key(r, working_height, band_fraction));
}

/// Cut a working-resolution Rect out of the full-resolution source, padded
/// by `padding` pixels and clipped to the image
pub fn crop_region(original: &DynamicImage, rect: &Rect, scale: &ScaleContext, padding: u32) -> (DynamicImage, Rect) {
    let bounds = scale.to_full_resolution(rect, padding);
    let crop = original.crop_imm(bounds.x, bounds.y, bounds.width, bounds.height);
    (crop, bounds)
}
