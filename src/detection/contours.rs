use crate::config::DetectionConfig;
use crate::models::{CardRegion, Rect};
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

/// Outer boundaries of every foreground blob; holes and anything nested
/// inside a hole are skipped
pub fn find_regions(mask: &GrayImage) -> Vec<CardRegion> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter_map(|c| measure(&c.points))
        .collect()
}

fn measure(points: &[Point<i32>]) -> Option<CardRegion> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    Some(CardRegion {
        bounds: Rect::new(
            min_x as u32,
            min_y as u32,
            (max_x - min_x + 1) as u32,
            (max_y - min_y + 1) as u32,
        ),
        area: polygon_area(points),
    })
}

/// Shoelace area of a closed boundary polyline
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area: i64 = 0;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    twice_area.abs() as f64 / 2.0
}

/// Whether a region has the size and shape of a single card (bounds inclusive)
pub fn is_card_like(region: &CardRegion, frame_area: u64, config: &DetectionConfig) -> bool {
    let area_ratio = region.area_ratio(frame_area);
    let aspect = region.aspect();
    let rectangularity = region.rectangularity();

    area_ratio >= config.min_area_ratio
        && area_ratio <= config.max_area_ratio
        && aspect >= config.min_aspect
        && aspect <= config.max_aspect
        && rectangularity >= config.min_rectangularity
}

/// Keep only card-like regions
pub fn filter_card_regions(regions: &[CardRegion], frame_area: u64, config: &DetectionConfig) -> Vec<CardRegion> {
    regions
        .iter()
        .filter(|r| is_card_like(r, frame_area, config))
        .cloned()
        .collect()
}
