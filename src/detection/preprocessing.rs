use crate::config::{
    self, DetectionConfig, ThresholdPolicy, MIN_BLUR_KERNEL, MIN_BORDER_MARGIN, MIN_ERODE_KERNEL,
};
use crate::models::ScaleContext;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::definitions::Image;
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{erode, grayscale_dilate, Mask};
use imageproc::rect::Rect as PixelRect;
use tracing::debug;

/// Largest kernel a single-axis morphology mask can describe
const MAX_MASK_SIZE: u32 = 511;

/// Downsample to the working resolution and drop color and alpha
pub fn to_working_gray(img: &DynamicImage, scale: &ScaleContext) -> GrayImage {
    if scale.working_width == img.width() && scale.working_height == img.height() {
        return img.to_luma8();
    }
    img.resize_exact(scale.working_width, scale.working_height, FilterType::Triangle)
        .to_luma8()
}

/// Gaussian blur described by an odd kernel size rather than a sigma
pub fn blur_kernel(img: &GrayImage, ksize: u32) -> GrayImage {
    gaussian_blur_f32(img, kernel_sigma(ksize))
}

/// Shrink a kernel so it never spans more than the shorter frame side
pub fn fit_to_frame(ksize: u32, width: u32, height: u32) -> u32 {
    let side = width.min(height).max(1);
    let largest_odd = if side % 2 == 0 { side - 1 } else { side };
    ksize.min(largest_odd)
}

/// Sigma that a Gaussian kernel of `ksize` taps covers, the usual
/// `0.3 * ((ksize - 1) / 2 - 1) + 0.8` rule
pub fn kernel_sigma(ksize: u32) -> f32 {
    let ksize = ksize.max(MIN_BLUR_KERNEL) as f32;
    0.3 * ((ksize - 1.0) * 0.5 - 1.0) + 0.8
}

/// Large-radius blur of the frame, kept in `f32` so a flat table is
/// subtracted exactly instead of leaving a truncation residue of 1
pub fn estimate_background(gray: &GrayImage, ksize: u32) -> Image<Luma<f32>> {
    let as_float: Image<Luma<f32>> =
        ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| Luma([gray.get_pixel(x, y)[0] as f32]));
    gaussian_blur_f32(&as_float, kernel_sigma(ksize))
}

/// `gray - background`, negative results clamped to zero
pub fn subtract_background(gray: &GrayImage, background: &Image<Luma<f32>>) -> GrayImage {
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0] as f32;
        let base = background.get_pixel(x, y)[0];
        Luma([(value - base).round().clamp(0.0, 255.0) as u8])
    })
}

/// Square max filter of side `ksize`, done as a row pass and a column pass
pub fn local_maximum(img: &GrayImage, ksize: u32) -> GrayImage {
    let ksize = ksize.clamp(1, MAX_MASK_SIZE);
    let center = (ksize / 2) as u8;

    let row = Mask::from_image(&GrayImage::from_pixel(ksize, 1, Luma([255u8])), center, 0);
    let column = Mask::from_image(&GrayImage::from_pixel(1, ksize, Luma([255u8])), 0, center);

    grayscale_dilate(&grayscale_dilate(img, &row), &column)
}

/// Divide every pixel by its neighborhood maximum, rescaled to 0..=255.
/// The divisor is floored at 1 so flat black areas stay black.
pub fn equalize_local_contrast(normalized: &GrayImage, ksize: u32) -> GrayImage {
    let local_max = local_maximum(normalized, ksize);
    ImageBuffer::from_fn(normalized.width(), normalized.height(), |x, y| {
        let value = normalized.get_pixel(x, y)[0] as u32;
        let peak = (local_max.get_pixel(x, y)[0] as u32).max(1);
        Luma([((value * 255 + peak / 2) / peak).min(255) as u8])
    })
}

/// Image Normalizer: grayscale working frame with the illumination gradient
/// removed (and, optionally, local contrast equalized)
pub fn normalize(img: &DynamicImage, scale: &ScaleContext, config: &DetectionConfig) -> GrayImage {
    let gray = to_working_gray(img, scale);

    let (width, height) = gray.dimensions();
    let background_kernel = fit_to_frame(
        config::scaled_kernel(config.background_kernel, scale.working_scale, MIN_BLUR_KERNEL),
        width,
        height,
    );
    let background = estimate_background(&gray, background_kernel);
    let normalized = subtract_background(&gray, &background);
    debug!(background_kernel, "Background subtracted");

    if !config.local_contrast {
        return normalized;
    }

    let contrast_kernel = fit_to_frame(
        config::scaled_kernel(config.local_contrast_kernel, scale.working_scale, MIN_BLUR_KERNEL),
        width,
        height,
    );
    debug!(contrast_kernel, "Equalizing local contrast");
    equalize_local_contrast(&normalized, contrast_kernel)
}

/// Threshold level actually applied for a policy
pub fn threshold_level(img: &GrayImage, policy: ThresholdPolicy) -> u8 {
    match policy {
        ThresholdPolicy::Otsu => otsu_level(img),
        ThresholdPolicy::Fixed(level) => level,
    }
}

/// Zero a `margin` wide band along all four edges
pub fn clear_border(mask: &mut GrayImage, margin: u32) {
    let (width, height) = mask.dimensions();
    if margin == 0 || width == 0 || height == 0 {
        return;
    }
    let margin_x = margin.min(width);
    let margin_y = margin.min(height);
    let black = Luma([0u8]);

    draw_filled_rect_mut(mask, PixelRect::at(0, 0).of_size(width, margin_y), black);
    draw_filled_rect_mut(mask, PixelRect::at(0, (height - margin_y) as i32).of_size(width, margin_y), black);
    draw_filled_rect_mut(mask, PixelRect::at(0, 0).of_size(margin_x, height), black);
    draw_filled_rect_mut(mask, PixelRect::at((width - margin_x) as i32, 0).of_size(margin_x, height), black);
}

/// Binarizer: flatten card interiors, threshold, clear the border band and
/// erode to sever thin bridges between touching cards
pub fn binarize(normalized: &GrayImage, scale: &ScaleContext, config: &DetectionConfig) -> GrayImage {
    let s = scale.working_scale;

    let (width, height) = normalized.dimensions();
    let blur = fit_to_frame(config::scaled_kernel(config.blur_kernel, s, MIN_BLUR_KERNEL), width, height);
    let blurred = blur_kernel(normalized, blur);

    let level = threshold_level(&blurred, config.threshold);
    let mut mask = threshold(&blurred, level, ThresholdType::Binary);

    let margin = config::scaled_length(config.border_margin, s, MIN_BORDER_MARGIN);
    clear_border(&mut mask, margin);

    let erode_kernel = config::scaled_kernel(config.erode_kernel, s, MIN_ERODE_KERNEL).min(MAX_MASK_SIZE);
    let eroded = erode(&mask, Norm::LInf, (erode_kernel / 2) as u8);

    debug!(blur, level, margin, erode_kernel, "Binarized frame");
    eroded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_square(size: u32, x0: u32, y0: u32, side: u32, fg: u8, bg: u8) -> GrayImage {
        ImageBuffer::from_fn(size, size, |x, y| {
            if x >= x0 && x < x0 + side && y >= y0 && y < y0 + side {
                Luma([fg])
            } else {
                Luma([bg])
            }
        })
    }

    #[test]
    fn test_kernel_sigma_matches_nominal_sizes() {
        assert!((kernel_sigma(151) - 23.0).abs() < 1e-4);
        assert!((kernel_sigma(31) - 5.0).abs() < 1e-4);
        assert!((kernel_sigma(3) - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_subtract_background_clamps_at_zero() {
        let gray = GrayImage::from_pixel(4, 4, Luma([100u8]));
        let mut background: Image<Luma<f32>> = ImageBuffer::from_pixel(4, 4, Luma([59.6f32]));
        background.put_pixel(1, 1, Luma([200.0f32]));

        let result = subtract_background(&gray, &background);
        assert_eq!(result.get_pixel(0, 0)[0], 40);
        assert_eq!(result.get_pixel(1, 1)[0], 0);
    }

    #[test]
    fn test_background_of_flat_frame_is_exact() {
        let gray = GrayImage::from_pixel(320, 240, Luma([30u8]));
        let background = estimate_background(&gray, 151);
        let normalized = subtract_background(&gray, &background);
        assert!(normalized.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_local_maximum_spreads_peak_over_window() {
        let mut img = GrayImage::new(11, 11);
        img.put_pixel(5, 5, Luma([90u8]));

        let max = local_maximum(&img, 5);
        assert_eq!(max.get_pixel(3, 3)[0], 90);
        assert_eq!(max.get_pixel(7, 7)[0], 90);
        assert_eq!(max.get_pixel(2, 5)[0], 0);
        assert_eq!(max.get_pixel(5, 8)[0], 0);
    }

    #[test]
    fn test_local_contrast_lifts_dim_regions_and_keeps_black() {
        let dim = frame_with_square(40, 10, 10, 10, 60, 0);
        let scaled = equalize_local_contrast(&dim, 7);
        assert_eq!(scaled.get_pixel(15, 15)[0], 255);
        assert_eq!(scaled.get_pixel(35, 35)[0], 0);
    }

    #[test]
    fn test_normalize_removes_uniform_illumination() {
        let config = DetectionConfig::default();
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(320, 240, Luma([180u8])));
        let scale = ScaleContext::new(320, 240, config.max_working_dimension);

        let normalized = normalize(&img, &scale, &config);
        assert_eq!(normalized.dimensions(), (320, 240));
        assert!(normalized.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_normalize_downsamples_to_working_resolution() {
        let config = DetectionConfig {
            max_working_dimension: 100,
            ..DetectionConfig::default()
        };
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(400, 200, Luma([30u8])));
        let scale = ScaleContext::new(400, 200, config.max_working_dimension);

        let normalized = normalize(&img, &scale, &config);
        assert_eq!(normalized.dimensions(), (100, 50));
    }

    #[test]
    fn test_fit_to_frame_caps_kernel_at_shorter_side() {
        assert_eq!(fit_to_frame(151, 1000, 750), 151);
        assert_eq!(fit_to_frame(151, 100, 60), 59);
        assert_eq!(fit_to_frame(151, 100, 61), 61);
        assert_eq!(fit_to_frame(31, 0, 0), 1);
    }

    #[test]
    fn test_fixed_threshold_policy_uses_level() {
        let img = GrayImage::from_pixel(2, 2, Luma([10u8]));
        assert_eq!(threshold_level(&img, ThresholdPolicy::Fixed(40)), 40);
    }

    #[test]
    fn test_clear_border_zeroes_edges_only() {
        let mut mask = GrayImage::from_pixel(20, 20, Luma([255u8]));
        clear_border(&mut mask, 5);
        assert_eq!(mask.get_pixel(4, 10)[0], 0);
        assert_eq!(mask.get_pixel(15, 10)[0], 0);
        assert_eq!(mask.get_pixel(10, 19)[0], 0);
        assert_eq!(mask.get_pixel(5, 5)[0], 255);
        assert_eq!(mask.get_pixel(14, 14)[0], 255);
    }

    #[test]
    fn test_clear_border_margin_larger_than_frame() {
        let mut mask = GrayImage::from_pixel(6, 4, Luma([255u8]));
        clear_border(&mut mask, 10);
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_binarize_blank_frame_has_no_foreground() {
        let config = DetectionConfig::default();
        let frame = GrayImage::new(200, 150);
        let scale = ScaleContext::identity(200, 150);
        let mask = binarize(&frame, &scale, &config);
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_binarize_keeps_large_block_and_shrinks_it() {
        let config = DetectionConfig::default();
        let frame = frame_with_square(300, 100, 100, 100, 255, 0);
        let scale = ScaleContext::identity(300, 300);
        let mask = binarize(&frame, &scale, &config);

        assert_eq!(mask.get_pixel(150, 150)[0], 255);
        assert_eq!(mask.get_pixel(101, 150)[0], 0);
        assert_eq!(mask.get_pixel(20, 20)[0], 0);
    }

    /// Two 60x90 blocks 20 px apart, joined at mid height by a 3 px bar
    fn bridged_blocks() -> GrayImage {
        let mut frame = GrayImage::new(300, 250);
        let white = Luma([255u8]);
        draw_filled_rect_mut(&mut frame, PixelRect::at(60, 80).of_size(60, 90), white);
        draw_filled_rect_mut(&mut frame, PixelRect::at(140, 80).of_size(60, 90), white);
        draw_filled_rect_mut(&mut frame, PixelRect::at(120, 124).of_size(20, 3), white);
        frame
    }

    #[test]
    fn test_erosion_severs_thin_bridge() {
        let config = DetectionConfig {
            blur_kernel: MIN_BLUR_KERNEL,
            threshold: ThresholdPolicy::Fixed(128),
            ..DetectionConfig::default()
        };
        let scale = ScaleContext::identity(300, 250);
        let mask = binarize(&bridged_blocks(), &scale, &config);

        let regions = crate::detection::contours::find_regions(&mask);
        assert_eq!(regions.len(), 2);
        assert_eq!(mask.get_pixel(130, 125)[0], 0);
    }

    #[test]
    fn test_minimal_erosion_leaves_bridge_intact() {
        let config = DetectionConfig {
            blur_kernel: MIN_BLUR_KERNEL,
            threshold: ThresholdPolicy::Fixed(128),
            erode_kernel: MIN_ERODE_KERNEL,
            ..DetectionConfig::default()
        };
        let scale = ScaleContext::identity(300, 250);
        let mask = binarize(&bridged_blocks(), &scale, &config);

        assert_eq!(crate::detection::contours::find_regions(&mask).len(), 1);
    }
}
