use cardcrop::{RawImage, Rect};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect as PixelRect;

pub const SCENE_WIDTH: u32 = 600;
pub const SCENE_HEIGHT: u32 = 480;

/// Dark felt and white card stock
pub const TABLE: Rgb<u8> = Rgb([30, 34, 30]);
pub const CARD: Rgb<u8> = Rgb([220, 220, 214]);

/// Max distance between a crop's center and the card it came from
pub const CENTER_TOLERANCE: f64 = 4.0;

/// `rows` x `cols` cards of `card_w` x `card_h` separated by `gap`, centered
/// in a `width` x `height` frame, listed row-major
pub fn grid_layout(rows: u32, cols: u32, card_w: u32, card_h: u32, gap: u32, width: u32, height: u32) -> Vec<Rect> {
    let x0 = (width - (cols * card_w + (cols - 1) * gap)) / 2;
    let y0 = (height - (rows * card_h + (rows - 1) * gap)) / 2;

    let mut cards = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            cards.push(Rect::new(x0 + c * (card_w + gap), y0 + r * (card_h + gap), card_w, card_h));
        }
    }
    cards
}

/// The usual deal: 3 rows of 4 upright cards (48x72) on a 600x480 table
pub fn standard_layout() -> Vec<Rect> {
    grid_layout(3, 4, 48, 72, 60, SCENE_WIDTH, SCENE_HEIGHT)
}

/// 2 rows of 4 cards lying on their side (72x48), as in a photo taken with
/// the camera turned by 90°
pub fn sideways_layout() -> Vec<Rect> {
    grid_layout(2, 4, 72, 48, 50, SCENE_WIDTH, SCENE_HEIGHT)
}

/// Paint white boxes on the table
pub fn paint_scene(width: u32, height: u32, boxes: &[Rect]) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, TABLE);
    for b in boxes {
        draw_filled_rect_mut(
            &mut img,
            PixelRect::at(b.x as i32, b.y as i32).of_size(b.width, b.height),
            CARD,
        );
    }
    img
}

pub fn scene(boxes: &[Rect]) -> RawImage {
    RawImage::new(DynamicImage::ImageRgb8(paint_scene(SCENE_WIDTH, SCENE_HEIGHT, boxes)))
}

/// A flat strip centered on `card`, too wide to pass as a card
pub fn strip_over(card: &Rect) -> Rect {
    let (cx, cy) = card.center();
    Rect::new((cx - 36.0) as u32, (cy - 15.0) as u32, 72, 30)
}

/// Where a box lands after the frame (of height `height`) is turned 90°
/// clockwise
pub fn rotated_cw(rect: &Rect, height: u32) -> Rect {
    Rect::new(height - rect.y - rect.height, rect.x, rect.height, rect.width)
}

/// `paint_scene` with everything right of `shadow_x` darkened by `falloff`,
/// as if a lamp only lit the left part of the table
pub fn paint_shadowed_scene(width: u32, height: u32, boxes: &[Rect], shadow_x: u32, falloff: u8) -> RgbImage {
    let mut img = paint_scene(width, height, boxes);
    for (x, _, pixel) in img.enumerate_pixels_mut() {
        if x > shadow_x {
            pixel.0 = pixel.0.map(|c| c / falloff);
        }
    }
    img
}

pub fn shadowed_scene(boxes: &[Rect]) -> RawImage {
    RawImage::new(DynamicImage::ImageRgb8(paint_shadowed_scene(SCENE_WIDTH, SCENE_HEIGHT, boxes, 400, 3)))
}

/// A `thickness` px tall bar joining two cards of the same row at mid height
pub fn bridge_between(left: &Rect, right: &Rect, thickness: u32) -> Rect {
    let y = left.y + left.height / 2 - thickness / 2;
    Rect::new(left.x + left.width, y, right.x - (left.x + left.width), thickness)
}
