use serde::{Deserialize, Serialize};

/// Largest side of the working frame in pixels
pub const DEFAULT_MAX_WORKING_DIMENSION: u32 = 1000;
/// Nominal background-estimate blur kernel at full resolution
pub const DEFAULT_BACKGROUND_KERNEL: u32 = 151;
/// Nominal local-maximum window at full resolution
pub const DEFAULT_LOCAL_CONTRAST_KERNEL: u32 = 101;
/// Nominal blur that flattens the symbols printed on a card
pub const DEFAULT_BLUR_KERNEL: u32 = 31;
pub const DEFAULT_FIXED_THRESHOLD: u8 = 40;
pub const DEFAULT_BORDER_MARGIN: u32 = 50;
pub const MIN_BORDER_MARGIN: u32 = 5;
pub const DEFAULT_ERODE_KERNEL: u32 = 11;
pub const MIN_ERODE_KERNEL: u32 = 3;
/// Smallest kernel any Gaussian stage will use
pub const MIN_BLUR_KERNEL: u32 = 3;

pub const DEFAULT_MIN_AREA_RATIO: f64 = 0.005;
pub const DEFAULT_MAX_AREA_RATIO: f64 = 0.08;
pub const DEFAULT_MIN_ASPECT: f64 = 0.9;
pub const DEFAULT_MAX_ASPECT: f64 = 2.2;
pub const DEFAULT_MIN_RECTANGULARITY: f64 = 0.25;

pub const DEFAULT_GRID_MIN_CANDIDATES: usize = 6;
/// Fraction of the median card size two centers may differ by and still align
pub const DEFAULT_GRID_TOLERANCE: f64 = 0.5;
pub const DEFAULT_GRID_MIN_DENSITY: f64 = 0.75;

pub const DEFAULT_ROW_BAND_FRACTION: f64 = 0.1;
pub const DEFAULT_CROP_PADDING: u32 = 10;

/// How the blurred frame is turned into a foreground mask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Histogram-derived level, recomputed per frame
    #[default]
    Otsu,
    Fixed(u8),
}

/// Every tunable heuristic of the card detector.
///
/// Kernel sizes and the border margin are nominal values for a full-resolution
/// photo; they are scaled by the working scale of each run (see
/// [`scaled_kernel`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub max_working_dimension: u32,
    pub background_kernel: u32,
    pub local_contrast: bool,
    pub local_contrast_kernel: u32,
    pub blur_kernel: u32,
    pub threshold: ThresholdPolicy,
    pub border_margin: u32,
    pub erode_kernel: u32,

    pub min_area_ratio: f64,
    pub max_area_ratio: f64,
    pub min_aspect: f64,
    pub max_aspect: f64,
    pub min_rectangularity: f64,

    pub grid_min_candidates: usize,
    pub grid_tolerance: f64,
    pub grid_min_density: f64,

    pub row_band_fraction: f64,
    pub crop_padding: u32,
    pub rotate_retry: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_working_dimension: DEFAULT_MAX_WORKING_DIMENSION,
            background_kernel: DEFAULT_BACKGROUND_KERNEL,
            local_contrast: true,
            local_contrast_kernel: DEFAULT_LOCAL_CONTRAST_KERNEL,
            blur_kernel: DEFAULT_BLUR_KERNEL,
            threshold: ThresholdPolicy::Otsu,
            border_margin: DEFAULT_BORDER_MARGIN,
            erode_kernel: DEFAULT_ERODE_KERNEL,
            min_area_ratio: DEFAULT_MIN_AREA_RATIO,
            max_area_ratio: DEFAULT_MAX_AREA_RATIO,
            min_aspect: DEFAULT_MIN_ASPECT,
            max_aspect: DEFAULT_MAX_ASPECT,
            min_rectangularity: DEFAULT_MIN_RECTANGULARITY,
            grid_min_candidates: DEFAULT_GRID_MIN_CANDIDATES,
            grid_tolerance: DEFAULT_GRID_TOLERANCE,
            grid_min_density: DEFAULT_GRID_MIN_DENSITY,
            row_band_fraction: DEFAULT_ROW_BAND_FRACTION,
            crop_padding: DEFAULT_CROP_PADDING,
            rotate_retry: true,
        }
    }
}

impl DetectionConfig {
    /// Parse a JSON config; missing fields keep their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Scale a nominal kernel to working resolution, never below `min`, always odd
pub fn scaled_kernel(nominal: u32, scale: f64, min: u32) -> u32 {
    let size = ((nominal as f64 * scale).round() as u32).max(min);
    if size % 2 == 0 { size + 1 } else { size }
}

/// Scale a nominal length (margins), never below `min`; parity is irrelevant
pub fn scaled_length(nominal: u32, scale: f64, min: u32) -> u32 {
    ((nominal as f64 * scale).round() as u32).max(min)
}
