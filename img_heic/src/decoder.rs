//! HEIC decoding collaborators
//!
//! The orchestrator only sees [`HeicDecoder`]. Concrete decoders are
//! composed around it:
//!
//! - [`FallbackDecoder`] walks an ordered attempt plan (JPEG target, then
//!   PNG target) and stops on the first non-recoverable failure.
//! - [`SniffingDecoder`] passes through files that carry JPEG/PNG bytes
//!   under a HEIC name.
//! - [`UnavailableDecoder`] stands in when no HEIF backend is compiled in.

use crate::config::MAX_DECODE_ATTEMPTS;
use crate::error::{DecodeError, EncodeError};
use crate::formats::{sniff_container, ContainerKind, OutputFormat};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb8,
    Rgba8,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Rgb8 => 3,
            PixelLayout::Rgba8 => 4,
        }
    }
}

/// Tightly packed, row-major 8-bit pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: Vec<u8>,
    ) -> Result<Self, EncodeError> {
        let expected = width as usize * height as usize * layout.channels();
        if width == 0 || height == 0 || data.len() != expected {
            return Err(EncodeError::InvalidBuffer {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Same image without the alpha channel.
    pub fn to_rgb(&self) -> PixelBuffer {
        match self.layout {
            PixelLayout::Rgb8 => self.clone(),
            PixelLayout::Rgba8 => PixelBuffer {
                width: self.width,
                height: self.height,
                layout: PixelLayout::Rgb8,
                data: self
                    .data
                    .chunks_exact(4)
                    .flat_map(|px| [px[0], px[1], px[2]])
                    .collect(),
            },
        }
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// What a decoder hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Raw pixels still to be encoded as `target`.
    Pixels {
        buffer: PixelBuffer,
        target: OutputFormat,
    },
    /// Bytes that are already a finished image; the encoder is skipped.
    Encoded { format: OutputFormat, bytes: Vec<u8> },
}

impl Decoded {
    pub fn format(&self) -> OutputFormat {
        match self {
            Decoded::Pixels { target, .. } => *target,
            Decoded::Encoded { format, .. } => *format,
        }
    }
}

pub trait HeicDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError>;
}

impl<D: HeicDecoder + ?Sized> HeicDecoder for Box<D> {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError> {
        (**self).decode(bytes)
    }
}

/// One entry of an attempt plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeAttempt {
    pub target: OutputFormat,
    /// Keep an alpha plane if the image has one (only meaningful for PNG).
    pub preserve_alpha: bool,
}

impl DecodeAttempt {
    pub fn jpeg() -> Self {
        Self {
            target: OutputFormat::Jpeg,
            preserve_alpha: false,
        }
    }

    pub fn png() -> Self {
        Self {
            target: OutputFormat::Png,
            preserve_alpha: true,
        }
    }
}

/// A backend that decodes for one explicit target at a time.
pub trait TargetedDecoder: Send + Sync {
    fn decode_for(&self, bytes: &[u8], attempt: &DecodeAttempt) -> Result<Decoded, DecodeError>;
}

/// Tries each attempt in order until one succeeds or fails for good.
#[derive(Debug, Clone)]
pub struct FallbackDecoder<D> {
    inner: D,
    plan: Vec<DecodeAttempt>,
}

impl<D: TargetedDecoder> FallbackDecoder<D> {
    /// Plans longer than `MAX_DECODE_ATTEMPTS` are truncated.
    pub fn new(inner: D, mut plan: Vec<DecodeAttempt>) -> Self {
        plan.truncate(MAX_DECODE_ATTEMPTS);
        Self { inner, plan }
    }

    /// JPEG output falls back to PNG; PNG output has a single attempt.
    pub fn for_output(inner: D, format: OutputFormat) -> Self {
        let plan = match format {
            OutputFormat::Jpeg => vec![DecodeAttempt::jpeg(), DecodeAttempt::png()],
            OutputFormat::Png => vec![DecodeAttempt::png()],
        };
        Self::new(inner, plan)
    }

    pub fn plan(&self) -> &[DecodeAttempt] {
        &self.plan
    }
}

impl<D: TargetedDecoder> HeicDecoder for FallbackDecoder<D> {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError> {
        let mut last = None;
        for (i, attempt) in self.plan.iter().enumerate() {
            match self.inner.decode_for(bytes, attempt) {
                Ok(decoded) => return Ok(decoded),
                Err(e) if e.is_recoverable() => {
                    debug!(attempt = i + 1, target = %attempt.target, error = %e, "decode attempt failed, trying next");
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last.unwrap_or_else(|| DecodeError::Malformed("empty decode plan".to_string())))
    }
}

/// Passes already-encoded JPEG/PNG bytes through; delegates everything else.
#[derive(Debug, Clone)]
pub struct SniffingDecoder<D> {
    inner: D,
}

impl<D: HeicDecoder> SniffingDecoder<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

impl<D: HeicDecoder> HeicDecoder for SniffingDecoder<D> {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Malformed("file is empty".to_string()));
        }
        let kind = sniff_container(bytes);
        match kind.passthrough_format() {
            Some(format) => {
                debug!(container = %kind, "input is already encoded, passing through");
                Ok(Decoded::Encoded {
                    format,
                    bytes: bytes.to_vec(),
                })
            }
            None => {
                if kind == ContainerKind::Unknown {
                    debug!("no HEIF brand found, delegating anyway");
                }
                self.inner.decode(bytes)
            }
        }
    }
}

/// Every call fails with [`DecodeError::Unavailable`].
#[derive(Debug, Clone)]
pub struct UnavailableDecoder {
    reason: String,
}

impl UnavailableDecoder {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl HeicDecoder for UnavailableDecoder {
    fn decode(&self, _bytes: &[u8]) -> Result<Decoded, DecodeError> {
        Err(DecodeError::Unavailable(self.reason.clone()))
    }
}

/// Decoder stack used by the command-line driver.
#[cfg(feature = "libheif")]
pub fn default_decoder(format: OutputFormat) -> Box<dyn HeicDecoder> {
    Box::new(SniffingDecoder::new(FallbackDecoder::for_output(
        crate::heif::LibheifDecoder,
        format,
    )))
}

#[cfg(not(feature = "libheif"))]
pub fn default_decoder(_format: OutputFormat) -> Box<dyn HeicDecoder> {
    Box::new(SniffingDecoder::new(UnavailableDecoder::new(
        "built without HEIF support (enable the `libheif` feature)",
    )))
}
