//! Frame ids.
//!
//! Every frame of a source has a stable string id derived from its
//! structured address:
//!
//! | Address                          | Id                  |
//! |----------------------------------|---------------------|
//! | slice `s` of volume `v` (E2E)    | `vol{v}_slice{s}`   |
//! | slice `s` of a single volume     | `slice{s}`          |
//! | fundus image `i`                 | `fundus{i}`         |
//! | DICOM placeholder                | `dicom0`            |
//!
//! Indices are plain decimal without sign or leading zeros, so every id
//! has exactly one address and every address exactly one id.

use crate::core::error::AddressDecodeError;
use crate::core::types::FrameKind;
use std::fmt;
use std::str::FromStr;

const VOLUME_PREFIX: &str = "vol";
const SLICE_PREFIX: &str = "slice";
const FUNDUS_PREFIX: &str = "fundus";
const DICOM_ID: &str = "dicom0";

/// Structured location of a frame within its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameAddress {
    /// An OCT slice. `volume` is `None` for single-volume sources.
    OctSlice { volume: Option<usize>, slice: usize },
    /// A fundus photograph.
    Fundus { image: usize },
    /// Stand-in for a whole DICOM file.
    DicomPlaceholder,
}

impl FrameAddress {
    /// Slice `slice` of a single-volume source.
    pub fn slice(slice: usize) -> Self {
        FrameAddress::OctSlice { volume: None, slice }
    }

    /// Slice `slice` of volume `volume` in a multi-volume source.
    pub fn volume_slice(volume: usize, slice: usize) -> Self {
        FrameAddress::OctSlice {
            volume: Some(volume),
            slice,
        }
    }

    pub fn fundus(image: usize) -> Self {
        FrameAddress::Fundus { image }
    }

    pub fn kind(&self) -> FrameKind {
        match self {
            FrameAddress::OctSlice { .. } => FrameKind::OctSlice,
            FrameAddress::Fundus { .. } => FrameKind::FundusImage,
            FrameAddress::DicomPlaceholder => FrameKind::DicomPlaceholder,
        }
    }

    /// The frame id for this address.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse a frame id.
    pub fn decode(frame_id: &str) -> Result<Self, AddressDecodeError> {
        if frame_id == DICOM_ID {
            return Ok(FrameAddress::DicomPlaceholder);
        }

        if let Some(rest) = frame_id.strip_prefix(VOLUME_PREFIX) {
            let (volume, slice) = rest
                .split_once('_')
                .ok_or_else(|| AddressDecodeError::new(frame_id, "expected vol{v}_slice{s}"))?;
            let slice = slice
                .strip_prefix(SLICE_PREFIX)
                .ok_or_else(|| AddressDecodeError::new(frame_id, "expected vol{v}_slice{s}"))?;
            return Ok(FrameAddress::volume_slice(
                parse_index(frame_id, volume)?,
                parse_index(frame_id, slice)?,
            ));
        }

        if let Some(slice) = frame_id.strip_prefix(SLICE_PREFIX) {
            return Ok(FrameAddress::slice(parse_index(frame_id, slice)?));
        }

        if let Some(image) = frame_id.strip_prefix(FUNDUS_PREFIX) {
            return Ok(FrameAddress::fundus(parse_index(frame_id, image)?));
        }

        Err(AddressDecodeError::new(frame_id, "unknown frame id prefix"))
    }
}

fn parse_index(frame_id: &str, digits: &str) -> Result<usize, AddressDecodeError> {
    if digits.is_empty() {
        return Err(AddressDecodeError::new(frame_id, "missing index"));
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddressDecodeError::new(
            frame_id,
            format!("'{}' is not a decimal index", digits),
        ));
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(AddressDecodeError::new(
            frame_id,
            format!("index '{}' has leading zeros", digits),
        ));
    }
    digits
        .parse()
        .map_err(|e| AddressDecodeError::new(frame_id, format!("index '{}': {}", digits, e)))
}

impl fmt::Display for FrameAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameAddress::OctSlice {
                volume: Some(volume),
                slice,
            } => write!(f, "{}{}_{}{}", VOLUME_PREFIX, volume, SLICE_PREFIX, slice),
            FrameAddress::OctSlice { volume: None, slice } => write!(f, "{}{}", SLICE_PREFIX, slice),
            FrameAddress::Fundus { image } => write!(f, "{}{}", FUNDUS_PREFIX, image),
            FrameAddress::DicomPlaceholder => f.write_str(DICOM_ID),
        }
    }
}

impl FromStr for FrameAddress {
    type Err = AddressDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FrameAddress::decode(s)
    }
}
