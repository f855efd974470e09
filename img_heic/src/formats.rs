//! Output formats and container sniffing

use serde::{Deserialize, Serialize};
use std::fmt;

/// Encoded format of a conversion result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jpeg => write!(f, "JPEG"),
            OutputFormat::Png => write!(f, "PNG"),
        }
    }
}

/// What the leading bytes of a file say it is, regardless of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Heif,
    Jpeg,
    Png,
    Unknown,
}

impl ContainerKind {
    /// Format to pass the bytes through as, when they are already encoded.
    pub fn passthrough_format(self) -> Option<OutputFormat> {
        match self {
            ContainerKind::Jpeg => Some(OutputFormat::Jpeg),
            ContainerKind::Png => Some(OutputFormat::Png),
            ContainerKind::Heif | ContainerKind::Unknown => None,
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerKind::Heif => "heif",
            ContainerKind::Jpeg => "jpeg",
            ContainerKind::Png => "png",
            ContainerKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// ISO-BMFF major brands used by HEIC/HEIF stills and sequences.
const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"mif1", b"msf1",
];

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

pub fn sniff_container(bytes: &[u8]) -> ContainerKind {
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        let brand = &bytes[8..12];
        if HEIF_BRANDS.iter().any(|b| brand == &b[..]) {
            return ContainerKind::Heif;
        }
        // A foreign major brand may still list a HEIF brand as compatible.
        let box_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let end = box_len.min(bytes.len());
        if end > 16 {
            let compatible = bytes[16..end].chunks_exact(4);
            if compatible
                .into_iter()
                .any(|c| HEIF_BRANDS.iter().any(|b| c == &b[..]))
            {
                return ContainerKind::Heif;
            }
        }
        return ContainerKind::Unknown;
    }
    if bytes.len() >= 3 && bytes[..3] == [0xFF, 0xD8, 0xFF] {
        return ContainerKind::Jpeg;
    }
    if bytes.len() >= PNG_SIGNATURE.len() && &bytes[..PNG_SIGNATURE.len()] == PNG_SIGNATURE {
        return ContainerKind::Png;
    }
    ContainerKind::Unknown
}

#[cfg(test)]
pub(crate) fn heif_header(major: &[u8; 4], compatible: &[&[u8; 4]]) -> Vec<u8> {
    let len = 16 + 4 * compatible.len();
    let mut out = Vec::with_capacity(len);
    out.extend_from_slice(&(len as u32).to_be_bytes());
    out.extend_from_slice(b"ftyp");
    out.extend_from_slice(major);
    out.extend_from_slice(&[0, 0, 0, 0]);
    for brand in compatible {
        out.extend_from_slice(&brand[..]);
    }
    out
}
