//! Screenshot pipeline: capture, downsample, mark the pointer, encode.
//!
//! 1. Wait out the settle delay so earlier input has finished rendering.
//! 2. Capture the primary screen and read the live logical screen size.
//! 3. Derive the scale for this request and resample the frame onto the
//!    image-space grid (the capture may be denser than logical space; the
//!    ratio is measured here rather than assumed).
//! 4. Convert the live pointer position to image space and draw the marker.
//! 5. Encode under the process-wide size budget.
use std::sync::Arc;
use std::time::Duration;

use crate::config::{MarkerConfig, VisionConfig};
use crate::errors::{DeskError, DeskResult};
use crate::executor::coordinator::{image_size, scale_for, to_image, ScaleFactor};
use crate::executor::input::InputBackend;
use crate::perception::annotator::draw_marker;
use crate::perception::traits::{ImageCodec, ScreenCapture};
use crate::perception::types::{EncodedImage, Marker, ScreenSize};

/// A composited screenshot. `width`/`height` define the image space every
/// subsequent caller coordinate must be expressed in.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub scale: ScaleFactor,
    pub image: EncodedImage,
}

pub struct ScreenshotCompositor {
    capture: Arc<dyn ScreenCapture>,
    input: Arc<dyn InputBackend>,
    codec: Arc<dyn ImageCodec>,
    vision: VisionConfig,
    marker: MarkerConfig,
    settle_delay: Duration,
}

impl ScreenshotCompositor {
    pub fn new(
        capture: Arc<dyn ScreenCapture>,
        input: Arc<dyn InputBackend>,
        codec: Arc<dyn ImageCodec>,
        vision: VisionConfig,
        marker: MarkerConfig,
        settle_delay: Duration,
    ) -> Self {
        Self {
            capture,
            input,
            codec,
            vision,
            marker,
            settle_delay,
        }
    }

    pub async fn capture(&self) -> DeskResult<Screenshot> {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let frame = self.capture.grab_frame().await?;
        let screen = self.capture.logical_size().await?;
        let scale = scale_for(&self.vision, screen);
        let target = image_size(screen, scale);
        log_pixel_ratio(frame.size(), screen);

        let pointer = self.input.pointer_position().await?;
        let marker = Marker {
            center: to_image(pointer, scale, screen),
            half_length: self.marker.half_length,
            stroke_width: self.marker.stroke_width,
            color: self.marker.color,
        };
        tracing::debug!(
            scale = scale.get(),
            width = target.width,
            height = target.height,
            pointer = ?pointer,
            marker = ?marker.center,
            "compositing screenshot"
        );

        let codec = Arc::clone(&self.codec);
        let image = tokio::task::spawn_blocking(move || {
            let mut resized = frame.into_image_space(target);
            draw_marker(&mut resized, &marker);
            codec.encode(resized.pixels())
        })
        .await
        .map_err(|e| DeskError::ScreenshotEncodeFailure(format!("join: {e}")))??;

        Ok(Screenshot {
            width: target.width,
            height: target.height,
            scale,
            image,
        })
    }
}

fn log_pixel_ratio(frame: ScreenSize, screen: ScreenSize) {
    if screen.width == 0 || screen.height == 0 {
        return;
    }
    let rx = frame.width as f64 / screen.width as f64;
    let ry = frame.height as f64 / screen.height as f64;
    if (rx - ry).abs() > 0.01 {
        tracing::warn!(rx, ry, "capture pixel ratio differs between axes");
    } else {
        tracing::debug!(ratio = rx, "capture pixel ratio");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDesktop, RawCodec};
    use image::RgbaImage;

    fn compositor(desktop: &Arc<FakeDesktop>) -> ScreenshotCompositor {
        ScreenshotCompositor::new(
            desktop.clone(),
            desktop.clone(),
            Arc::new(RawCodec),
            VisionConfig::default(),
            MarkerConfig::default(),
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn small_screen_is_returned_at_full_size() {
        let desktop = Arc::new(FakeDesktop::new(800, 600));
        let shot = compositor(&desktop).capture().await.unwrap();
        assert_eq!((shot.width, shot.height), (800, 600));
        assert!(shot.scale.is_identity());
        let img = RawCodec::decode(&shot.image);
        assert_eq!(img.dimensions(), (800, 600));
    }

    #[tokio::test]
    async fn uhd_screen_is_downsampled() {
        let desktop = Arc::new(FakeDesktop::new(3840, 2160));
        let shot = compositor(&desktop).capture().await.unwrap();
        assert_eq!((shot.width, shot.height), (1464, 823));
        let img = RawCodec::decode(&shot.image);
        assert_eq!(img.dimensions(), (1464, 823));
    }

    #[tokio::test]
    async fn marker_lands_on_scaled_pointer() {
        let desktop = Arc::new(FakeDesktop::new(3840, 2160));
        desktop.set_pointer(1000, 500);
        let shot = compositor(&desktop).capture().await.unwrap();
        let img = RawCodec::decode(&shot.image);
        // round(1000 * 0.38128) = 381, round(500 * 0.38128) = 191
        assert_eq!(img.get_pixel(381, 191).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(391, 191).0, [255, 0, 0, 255]);
        assert_ne!(img.get_pixel(392, 191).0, [255, 0, 0, 255]);
    }

    #[tokio::test]
    async fn high_density_capture_is_folded_onto_logical_grid() {
        // 2x capture of a 1280x720 logical screen.
        let desktop = Arc::new(FakeDesktop::new(1280, 720));
        desktop.set_frame(RgbaImage::new(2560, 1440));
        let shot = compositor(&desktop).capture().await.unwrap();
        let scale = scale_for(&VisionConfig::default(), ScreenSize::new(1280, 720));
        let expected = image_size(ScreenSize::new(1280, 720), scale);
        assert_eq!((shot.width, shot.height), (expected.width, expected.height));
        let img = RawCodec::decode(&shot.image);
        assert_eq!(img.dimensions(), (expected.width, expected.height));
    }

    #[tokio::test]
    async fn capture_failure_is_reported() {
        let desktop = Arc::new(FakeDesktop::new(800, 600));
        desktop.fail_capture();
        let err = compositor(&desktop).capture().await.unwrap_err();
        assert!(matches!(err, DeskError::ScreenshotEncodeFailure(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_delay_precedes_capture() {
        let desktop = Arc::new(FakeDesktop::new(800, 600));
        let compositor = ScreenshotCompositor::new(
            desktop.clone(),
            desktop.clone(),
            Arc::new(RawCodec),
            VisionConfig::default(),
            MarkerConfig::default(),
            Duration::from_millis(1000),
        );
        let started = tokio::time::Instant::now();
        compositor.capture().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }
}
