mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from cardcrop for tests
pub use cardcrop::{CardDetector, Crop, Detection, DetectionConfig, RawImage, Rect};

/// Center of a full-resolution box
pub fn center(rect: &Rect) -> (f64, f64) {
    rect.center()
}

/// Whether two boxes share a center within `tolerance` pixels on both axes
pub fn same_center(a: &Rect, b: &Rect, tolerance: f64) -> bool {
    let (ax, ay) = center(a);
    let (bx, by) = center(b);
    (ax - bx).abs() <= tolerance && (ay - by).abs() <= tolerance
}

/// Assert that every crop lies on one of the expected cards, one crop per card
pub fn assert_crops_match(detection: &Detection, cards: &[Rect]) {
    assert_eq!(detection.crops.len(), cards.len(), "crop count");
    for card in cards {
        let hits = detection
            .crops
            .iter()
            .filter(|crop| same_center(&crop.bounds, card, CENTER_TOLERANCE))
            .count();
        assert_eq!(hits, 1, "card at {:?} matched {} crops", card, hits);
    }
}
