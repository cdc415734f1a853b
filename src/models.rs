use image::DynamicImage;
use image::metadata::Orientation;

/// Decoded photo as handed over by the caller, plus its declared orientation
#[derive(Debug, Clone)]
pub struct RawImage {
    pub image: DynamicImage,
    pub orientation: Orientation,
}

impl RawImage {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            orientation: Orientation::NoTransforms,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixel-space copy matching the intended visual orientation
    pub fn oriented(&self) -> DynamicImage {
        let mut image = self.image.clone();
        image.apply_orientation(self.orientation);
        image
    }
}

/// Axis-aligned box, in working-resolution pixels unless stated otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Clip to a `width` x `height` frame
    pub fn clipped(&self, width: u32, height: u32) -> Rect {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Rect {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }
}

/// Relation between working and full-resolution coordinates for one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleContext {
    /// Always in (0, 1]
    pub working_scale: f64,
    pub working_width: u32,
    pub working_height: u32,
    pub full_width: u32,
    pub full_height: u32,
}

impl ScaleContext {
    pub fn new(full_width: u32, full_height: u32, max_working_dimension: u32) -> Self {
        let largest = full_width.max(full_height).max(1) as f64;
        let working_scale = (max_working_dimension as f64 / largest).min(1.0);
        Self {
            working_scale,
            working_width: ((full_width as f64 * working_scale).round() as u32).max(1),
            working_height: ((full_height as f64 * working_scale).round() as u32).max(1),
            full_width,
            full_height,
        }
    }

    /// Identity scale for frames that are already at full resolution
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            working_scale: 1.0,
            working_width: width,
            working_height: height,
            full_width: width,
            full_height: height,
        }
    }

    pub fn working_area(&self) -> u64 {
        self.working_width as u64 * self.working_height as u64
    }

    /// Map a working Rect to full resolution, pad it and clip it to the image
    pub fn to_full_resolution(&self, rect: &Rect, padding: u32) -> Rect {
        let s = self.working_scale;
        let x0 = (rect.x as f64 / s).round() as i64 - padding as i64;
        let y0 = (rect.y as f64 / s).round() as i64 - padding as i64;
        let x1 = ((rect.x + rect.width) as f64 / s).round() as i64 + padding as i64;
        let y1 = ((rect.y + rect.height) as f64 / s).round() as i64 + padding as i64;

        let x0 = x0.clamp(0, self.full_width as i64);
        let y0 = y0.clamp(0, self.full_height as i64);
        let x1 = x1.clamp(x0, self.full_width as i64);
        let y1 = y1.clamp(y0, self.full_height as i64);

        Rect {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    }
}

/// Measurements of one external contour in the binary mask
#[derive(Debug, Clone)]
pub struct CardRegion {
    pub bounds: Rect,
    /// Polygon area enclosed by the outer boundary
    pub area: f64,
}

impl CardRegion {
    pub fn area_ratio(&self, frame_area: u64) -> f64 {
        if frame_area == 0 {
            return 0.0;
        }
        self.area / frame_area as f64
    }

    /// Height over width; cards can appear in either orientation
    pub fn aspect(&self) -> f64 {
        if self.bounds.width == 0 {
            return 0.0;
        }
        self.bounds.height as f64 / self.bounds.width as f64
    }

    pub fn rectangularity(&self) -> f64 {
        let box_area = self.bounds.area();
        if box_area == 0 {
            return 0.0;
        }
        self.area / box_area as f64
    }
}

/// One card cut from the full-resolution source
#[derive(Debug, Clone)]
pub struct Crop {
    /// 1-based, reading order
    pub ordinal: usize,
    pub image: DynamicImage,
    /// Source Rect at working resolution
    pub region: Rect,
    /// Padded, clipped bounds in the full-resolution image
    pub bounds: Rect,
}
