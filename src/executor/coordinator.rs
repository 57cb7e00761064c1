// Coordinate mapping between logical screen space and downsampled image space.
use crate::config::VisionConfig;
use crate::errors::{DeskError, DeskResult};
use crate::perception::types::{Coordinate, ImageSpace, Logical, ScreenSize};

/// How much a logical dimension shrinks to become an image-space dimension.
/// Always in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    pub const IDENTITY: ScaleFactor = ScaleFactor(1.0);

    pub fn new(value: f64) -> Option<Self> {
        (value > 0.0 && value <= 1.0).then_some(Self(value))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    pub fn is_identity(self) -> bool {
        self.0 >= 1.0
    }
}

/// Derives the downscale factor that fits a `width`×`height` logical screen
/// into both vision limits. Never enlarges.
pub fn image_to_logical_scale(
    long_edge_limit: u32,
    pixel_limit: u64,
    width: u32,
    height: u32,
) -> ScaleFactor {
    if width == 0 || height == 0 {
        return ScaleFactor::IDENTITY;
    }
    let long_edge = width.max(height) as f64;
    let long_edge_scale = (long_edge_limit as f64 / long_edge).min(1.0);
    let area = width as f64 * height as f64;
    let pixel_scale = (pixel_limit as f64 / area).sqrt().min(1.0);
    let scale = long_edge_scale.min(pixel_scale);
    ScaleFactor::new(scale).unwrap_or(ScaleFactor::IDENTITY)
}

/// Scale for the live screen under the configured limits.
pub fn scale_for(limits: &VisionConfig, screen: ScreenSize) -> ScaleFactor {
    image_to_logical_scale(
        limits.max_long_edge,
        limits.max_pixels,
        screen.width,
        screen.height,
    )
}

/// Dimensions of an image produced from `screen` at `scale`.
pub fn image_size(screen: ScreenSize, scale: ScaleFactor) -> ScreenSize {
    let w = (screen.width as f64 * scale.get()).floor() as u32;
    let h = (screen.height as f64 * scale.get()).floor() as u32;
    ScreenSize::new(w.max(1), h.max(1))
}

/// Maps a caller-supplied image-space coordinate onto the live logical
/// screen, rejecting anything that lands outside `[0, width) × [0, height)`.
pub fn to_logical(
    point: Coordinate<ImageSpace>,
    scale: ScaleFactor,
    screen: ScreenSize,
) -> DeskResult<Coordinate<Logical>> {
    let x = (point.x as f64 / scale.get()).round() as i64;
    let y = (point.y as f64 / scale.get()).round() as i64;
    if !screen.contains(x, y) {
        return Err(DeskError::CoordinateOutOfBounds {
            x,
            y,
            width: screen.width,
            height: screen.height,
        });
    }
    // In bounds, so both fit in i32.
    Ok(Coordinate::new(x as i32, y as i32))
}

/// Re-expresses a logical position in image space, clamped onto the image
/// produced for `screen` so the result can always be sent back as a click.
pub fn to_image(
    point: Coordinate<Logical>,
    scale: ScaleFactor,
    screen: ScreenSize,
) -> Coordinate<ImageSpace> {
    let image = image_size(screen, scale);
    let max_x = i64::from(image.width) - 1;
    let max_y = i64::from(image.height) - 1;
    // Rounding can push the last logical row or column one past the edge.
    let x = ((point.x as f64 * scale.get()).round() as i64).clamp(0, max_x);
    let y = ((point.y as f64 * scale.get()).round() as i64).clamp(0, max_y);
    Coordinate::new(x as i32, y as i32)
}
