//! libheif-backed HEIC/HEIF decoding
//!
//! Uses libheif-rs to decode the primary image of an in-memory HEIF
//! container into interleaved 8-bit RGB or RGBA.

use crate::decoder::{DecodeAttempt, Decoded, PixelBuffer, PixelLayout, TargetedDecoder};
use crate::error::DecodeError;
use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

#[derive(Debug, Clone, Copy, Default)]
pub struct LibheifDecoder;

impl TargetedDecoder for LibheifDecoder {
    fn decode_for(&self, bytes: &[u8], attempt: &DecodeAttempt) -> Result<Decoded, DecodeError> {
        let lib_heif = LibHeif::new();

        let ctx = HeifContext::read_from_bytes(bytes)
            .map_err(|e| DecodeError::Malformed(format!("Failed to read HEIF container: {}", e)))?;
        let handle = ctx
            .primary_image_handle()
            .map_err(|e| DecodeError::Malformed(format!("Failed to get primary image: {}", e)))?;

        let layout = if attempt.preserve_alpha && handle.has_alpha_channel() {
            PixelLayout::Rgba8
        } else {
            PixelLayout::Rgb8
        };
        let chroma = match layout {
            PixelLayout::Rgb8 => RgbChroma::Rgb,
            PixelLayout::Rgba8 => RgbChroma::Rgba,
        };

        let unsupported = |reason: String| DecodeError::Unsupported {
            target: attempt.target,
            reason,
        };

        let image = lib_heif
            .decode(&handle, ColorSpace::Rgb(chroma), None)
            .map_err(|e| unsupported(format!("Failed to decode HEIF image: {}", e)))?;

        let planes = image.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| unsupported("No interleaved RGB plane".to_string()))?;

        let (width, height) = (plane.width, plane.height);
        let row_len = width as usize * layout.channels();
        let stride = plane.stride;
        if stride < row_len || plane.data.len() < stride * height.saturating_sub(1) as usize + row_len
        {
            return Err(unsupported(format!(
                "Plane too small for {}x{} (stride {})",
                width, height, stride
            )));
        }

        // Rows may be padded to the stride; copy only the pixel bytes.
        let mut data = Vec::with_capacity(row_len * height as usize);
        for row in plane.data.chunks(stride).take(height as usize) {
            data.extend_from_slice(&row[..row_len]);
        }

        let buffer = PixelBuffer::new(width, height, layout, data)
            .map_err(|e| unsupported(e.to_string()))?;

        Ok(Decoded::Pixels {
            buffer,
            target: attempt.target,
        })
    }
}
