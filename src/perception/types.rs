use std::fmt;
use std::marker::PhantomData;

use image::RgbaImage;

/// Marker trait for a pixel coordinate system.
pub trait Space: Copy + fmt::Debug + Send + Sync + 'static {
    const NAME: &'static str;
}

/// The pointer driver's coordinate system; matches the OS-reported screen size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Logical;

/// The coordinate system of the downsampled images handed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpace;

impl Space for Logical {
    const NAME: &'static str = "logical";
}

impl Space for ImageSpace {
    const NAME: &'static str = "image";
}

/// A pixel position tagged with the space it belongs to. The only way from one
/// space to the other is through `executor::coordinator`.
pub struct Coordinate<S: Space> {
    pub x: i32,
    pub y: i32,
    _space: PhantomData<S>,
}

impl<S: Space> Coordinate<S> {
    pub const fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            _space: PhantomData,
        }
    }
}

// Manual impls so `S` does not need to satisfy the derive bounds.
impl<S: Space> Clone for Coordinate<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Space> Copy for Coordinate<S> {}

impl<S: Space> PartialEq for Coordinate<S> {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl<S: Space> Eq for Coordinate<S> {}

impl<S: Space> fmt::Debug for Coordinate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", S::NAME, self.x, self.y)
    }
}

/// Width and height of a space in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }
}

/// A raw RGBA pixel buffer tagged with its space.
///
/// A `Frame<Logical>` straight from the capture device may be denser than
/// logical space (high-density displays); its pixel grid is folded onto the
/// image-space grid when it is resized.
pub struct Frame<S: Space> {
    pixels: RgbaImage,
    _space: PhantomData<S>,
}

impl<S: Space> Frame<S> {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels,
            _space: PhantomData,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> ScreenSize {
        ScreenSize::new(self.width(), self.height())
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }
}

impl Frame<Logical> {
    /// Resamples the captured frame onto the image-space grid. A frame that
    /// already has the target size is passed through untouched.
    pub fn into_image_space(self, target: ScreenSize) -> Frame<ImageSpace> {
        if self.size() == target {
            return Frame::new(self.pixels);
        }
        let resized = image::imageops::resize(
            &self.pixels,
            target.width,
            target.height,
            image::imageops::FilterType::Triangle,
        );
        Frame::new(resized)
    }
}

/// Pointer indicator drawn onto outgoing screenshots.
#[derive(Debug, Clone, Copy)]
pub struct Marker {
    pub center: Coordinate<ImageSpace>,
    pub half_length: u32,
    pub stroke_width: u32,
    pub color: [u8; 3],
}

/// Compressed image bytes ready to hand to the caller.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_size_contains_is_half_open() {
        let size = ScreenSize::new(1920, 1080);
        assert!(size.contains(0, 0));
        assert!(size.contains(1919, 1079));
        assert!(!size.contains(1920, 10));
        assert!(!size.contains(10, 1080));
        assert!(!size.contains(-1, 10));
    }

    #[test]
    fn frame_of_target_size_is_not_resampled() {
        let mut pixels = RgbaImage::new(8, 6);
        pixels.put_pixel(3, 2, image::Rgba([1, 2, 3, 255]));
        let frame: Frame<Logical> = Frame::new(pixels);
        let out = frame.into_image_space(ScreenSize::new(8, 6));
        assert_eq!(out.size(), ScreenSize::new(8, 6));
        assert_eq!(out.pixels().get_pixel(3, 2).0, [1, 2, 3, 255]);
    }

    #[test]
    fn frame_is_resampled_to_target() {
        let frame: Frame<Logical> = Frame::new(RgbaImage::new(40, 20));
        let out = frame.into_image_space(ScreenSize::new(10, 5));
        assert_eq!((out.width(), out.height()), (10, 5));
    }

    #[test]
    fn coordinate_debug_names_its_space() {
        let c: Coordinate<ImageSpace> = Coordinate::new(3, 4);
        assert_eq!(format!("{c:?}"), "image(3, 4)");
    }
}
