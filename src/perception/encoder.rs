//! Image encoding for outgoing screenshots.
//!
//! The size budget is fixed per process: PNG at a configured compression
//! level, or JPEG at a configured quality. Callers cannot change it.
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use crate::config::{ImageFormatKind, PngCompression, ScreenshotConfig};
use crate::errors::{DeskError, DeskResult};
use crate::perception::traits::ImageCodec;
use crate::perception::types::EncodedImage;

#[derive(Debug, Clone, Copy)]
pub enum Encoding {
    Png(PngCompression),
    Jpeg { quality: u8 },
}

#[derive(Debug, Clone, Copy)]
pub struct BudgetCodec {
    encoding: Encoding,
}

impl BudgetCodec {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    pub fn from_config(config: &ScreenshotConfig) -> Self {
        let encoding = match config.format {
            ImageFormatKind::Png => Encoding::Png(config.png_compression),
            ImageFormatKind::Jpeg => Encoding::Jpeg {
                quality: config.jpeg_quality,
            },
        };
        Self::new(encoding)
    }

    pub fn mime_type(&self) -> &'static str {
        match self.encoding {
            Encoding::Png(_) => "image/png",
            Encoding::Jpeg { .. } => "image/jpeg",
        }
    }
}

impl ImageCodec for BudgetCodec {
    fn encode(&self, pixels: &RgbaImage) -> DeskResult<EncodedImage> {
        let (w, h) = pixels.dimensions();
        let mut bytes = Vec::new();
        match self.encoding {
            Encoding::Png(level) => {
                let compression = match level {
                    PngCompression::Fast => CompressionType::Fast,
                    PngCompression::Default => CompressionType::Default,
                    PngCompression::Best => CompressionType::Best,
                };
                PngEncoder::new_with_quality(&mut bytes, compression, FilterType::Adaptive)
                    .write_image(pixels.as_raw(), w, h, ExtendedColorType::Rgba8)
                    .map_err(|e| DeskError::ScreenshotEncodeFailure(format!("PNG encode: {e}")))?;
            }
            Encoding::Jpeg { quality } => {
                // JPEG has no alpha channel.
                let rgb = image::DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
                JpegEncoder::new_with_quality(&mut bytes, quality)
                    .write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
                    .map_err(|e| DeskError::ScreenshotEncodeFailure(format!("JPEG encode: {e}")))?;
            }
        }
        tracing::debug!(width = w, height = h, bytes = bytes.len(), mime = self.mime_type(), "frame encoded");
        Ok(EncodedImage {
            bytes,
            mime_type: self.mime_type(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn png_output_decodes_to_same_size() {
        let codec = BudgetCodec::new(Encoding::Png(PngCompression::Fast));
        let out = codec.encode(&checker(32, 16)).unwrap();
        assert_eq!(out.mime_type, "image/png");
        assert_eq!(&out.bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
    }

    #[test]
    fn jpeg_output_has_jpeg_signature() {
        let codec = BudgetCodec::new(Encoding::Jpeg { quality: 50 });
        let out = codec.encode(&checker(24, 24)).unwrap();
        assert_eq!(out.mime_type, "image/jpeg");
        assert_eq!(&out.bytes[..2], &[0xff, 0xd8]);
    }

    #[test]
    fn config_selects_encoding() {
        let mut cfg = ScreenshotConfig::default();
        assert_eq!(BudgetCodec::from_config(&cfg).mime_type(), "image/png");
        cfg.format = ImageFormatKind::Jpeg;
        assert_eq!(BudgetCodec::from_config(&cfg).mime_type(), "image/jpeg");
    }
}
