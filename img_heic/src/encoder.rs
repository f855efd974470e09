//! Pixel encoding via the `image` crate

use crate::decoder::{PixelBuffer, PixelLayout};
use crate::error::EncodeError;
use crate::formats::OutputFormat;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder as _};

pub trait PixelEncoder: Send + Sync {
    /// `quality` is in 0..=1 and ignored by lossless formats.
    fn encode(
        &self,
        pixels: &PixelBuffer,
        format: OutputFormat,
        quality: f32,
    ) -> Result<Vec<u8>, EncodeError>;
}

/// Map 0..=1 onto the JPEG encoder's 1..=100 scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    if quality.is_nan() {
        return 92;
    }
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageEncoder;

impl PixelEncoder for ImageEncoder {
    fn encode(
        &self,
        pixels: &PixelBuffer,
        format: OutputFormat,
        quality: f32,
    ) -> Result<Vec<u8>, EncodeError> {
        let failed = |e: image::ImageError| EncodeError::Failed {
            format,
            reason: e.to_string(),
        };

        let mut out = Vec::new();
        match format {
            OutputFormat::Jpeg => {
                // JPEG has no alpha channel.
                let rgb = pixels.to_rgb();
                JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality))
                    .write_image(rgb.data(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                    .map_err(failed)?;
            }
            OutputFormat::Png => {
                let color = match pixels.layout() {
                    PixelLayout::Rgb8 => ExtendedColorType::Rgb8,
                    PixelLayout::Rgba8 => ExtendedColorType::Rgba8,
                };
                PngEncoder::new(&mut out)
                    .write_image(pixels.data(), pixels.width(), pixels.height(), color)
                    .map_err(failed)?;
            }
        }
        Ok(out)
    }
}
