//! Draw the pointer marker onto an image-space frame.
//!
//! The marker is a cross: one horizontal and one vertical run, each
//! `2 * half_length + 1` pixels long and `stroke_width` pixels thick, centred
//! on the pointer. Anything that falls outside the frame is clipped.
use crate::perception::types::{Frame, ImageSpace, Marker};

/// Offsets covered by a stroke of `width` pixels around its centre line.
/// A width of 3 covers -1..=1.
fn stroke_span(width: u32) -> (i64, i64) {
    let width = width.max(1) as i64;
    let before = (width - 1) / 2;
    let after = width - 1 - before;
    (-before, after)
}

pub fn draw_marker(frame: &mut Frame<ImageSpace>, marker: &Marker) {
    let cx = marker.center.x as i64;
    let cy = marker.center.y as i64;
    let half = marker.half_length as i64;
    let (lo, hi) = stroke_span(marker.stroke_width);
    let col = [marker.color[0], marker.color[1], marker.color[2], 255];
    let canvas = frame.pixels_mut();

    // Horizontal run
    for x in (cx - half)..=(cx + half) {
        for dy in lo..=hi {
            put_clipped(canvas, x, cy + dy, col);
        }
    }
    // Vertical run
    for y in (cy - half)..=(cy + half) {
        for dx in lo..=hi {
            put_clipped(canvas, cx + dx, y, col);
        }
    }
}

fn put_clipped(canvas: &mut image::RgbaImage, x: i64, y: i64, col: [u8; 4]) {
    let (w, h) = canvas.dimensions();
    if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
        return;
    }
    canvas.put_pixel(x as u32, y as u32, image::Rgba(col));
}
