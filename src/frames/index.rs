//! Frame lists.
//!
//! [`build`] turns a loaded source into the ordered list of frames a user
//! can select: every OCT slice in `(volume, slice)` order, then every fundus
//! image. Which parts are listed depends only on the source format.

use crate::core::error::AddressDecodeError;
use crate::core::types::{FormatTag, FrameKind, FundusPolicy, Laterality, Metadata};
use crate::frames::address::FrameAddress;
use crate::source::decoder::ScanDecoder;
use crate::source::registry::{LoadedSource, SourceHandle};
use serde::{Deserialize, Serialize};

/// One selectable frame of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    /// Stable id, unique within the source.
    pub frame_id: String,
    /// Name of the source the frame belongs to.
    pub source_name: String,
    pub kind: FrameKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_index: Option<usize>,
    pub laterality: Laterality,
    /// Vendor id of the volume the slice belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_label: Option<String>,
    /// Vendor id of the fundus image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_label: Option<String>,
}

impl FrameDescriptor {
    fn new(source_name: &str, address: FrameAddress, laterality: Laterality) -> Self {
        let (volume_index, slice_index, image_index) = match address {
            FrameAddress::OctSlice { volume, slice } => (volume, Some(slice), None),
            FrameAddress::Fundus { image } => (None, None, Some(image)),
            FrameAddress::DicomPlaceholder => (None, None, None),
        };
        Self {
            frame_id: address.encode(),
            source_name: source_name.to_string(),
            kind: address.kind(),
            volume_index,
            slice_index,
            image_index,
            laterality,
            volume_label: None,
            image_label: None,
        }
    }

    /// The structured address behind `frame_id`.
    ///
    /// The kind and index fields are authoritative. A descriptor whose
    /// indices do not fit its kind falls back to decoding `frame_id`.
    pub fn address(&self) -> Result<FrameAddress, AddressDecodeError> {
        match (self.kind, self.slice_index, self.image_index) {
            (FrameKind::OctSlice, Some(slice), _) => Ok(FrameAddress::OctSlice {
                volume: self.volume_index,
                slice,
            }),
            (FrameKind::FundusImage, _, Some(image)) => Ok(FrameAddress::Fundus { image }),
            (FrameKind::DicomPlaceholder, None, None) => Ok(FrameAddress::DicomPlaceholder),
            _ => {
                let address = FrameAddress::decode(&self.frame_id)?;
                if address.kind() == self.kind {
                    Ok(address)
                } else {
                    Err(AddressDecodeError::new(
                        &self.frame_id,
                        format!("id does not name a {:?} frame", self.kind),
                    ))
                }
            }
        }
    }
}

/// Build the frame list of a source.
///
/// Reads volumes and fundus images from the decoder every time it is called.
/// A part that fails to read is logged and left out; the rest is still
/// listed.
pub fn build(source: &LoadedSource) -> Vec<FrameDescriptor> {
    let name = source.name();
    let frames = match source.handle() {
        SourceHandle::Dicom => vec![FrameDescriptor::new(
            name,
            FrameAddress::DicomPlaceholder,
            Laterality::Unknown,
        )],
        SourceHandle::Decoder(decoder) => {
            let mut frames = oct_frames(name, source.format(), decoder.as_ref());
            frames.extend(fundus_frames(name, source.format(), decoder.as_ref()));

            let fallback = file_laterality(source.metadata());
            if fallback != Laterality::Unknown {
                for frame in frames.iter_mut().filter(|f| f.laterality == Laterality::Unknown) {
                    frame.laterality = fallback;
                }
            }
            frames
        }
    };

    if frames.is_empty() {
        log::warn!("No frames were found in {}", name);
    } else {
        log::info!("Found {} frames in {}", frames.len(), name);
    }
    frames
}

/// Laterality recorded for the whole file, from the `laterality` metadata
/// entry some decoders report.
fn file_laterality(metadata: &Metadata) -> Laterality {
    metadata
        .get("laterality")
        .and_then(|value| value.as_str())
        .map(Laterality::parse_lenient)
        .unwrap_or_default()
}

fn oct_frames(name: &str, format: FormatTag, decoder: &dyn ScanDecoder) -> Vec<FrameDescriptor> {
    let volumes = match decoder.read_volumes() {
        Ok(volumes) => volumes,
        Err(e) => {
            log::error!("Failed to read OCT volumes from {}: {}", name, e);
            return Vec::new();
        }
    };

    let mut frames = Vec::new();
    if format.is_multi_volume() {
        for (v, volume) in volumes.iter().enumerate() {
            log::debug!("Volume {} of {} has {} slices", v, name, volume.slices.len());
            frames.extend((0..volume.slices.len()).map(|s| {
                let mut frame = FrameDescriptor::new(name, FrameAddress::volume_slice(v, s), volume.laterality);
                frame.volume_label = volume.volume_id.clone();
                frame
            }));
        }
    } else {
        if volumes.len() > 1 {
            log::warn!(
                "{} returned {} volumes for a single-volume {} file; using the first",
                name,
                volumes.len(),
                format
            );
        }
        if let Some(volume) = volumes.first() {
            frames.extend((0..volume.slices.len()).map(|s| {
                let mut frame = FrameDescriptor::new(name, FrameAddress::slice(s), volume.laterality);
                frame.volume_label = volume.volume_id.clone();
                frame
            }));
        } else {
            log::warn!("{} has no volume data", name);
        }
    }
    frames
}

fn fundus_frames(name: &str, format: FormatTag, decoder: &dyn ScanDecoder) -> Vec<FrameDescriptor> {
    let policy = format.fundus_policy();
    if policy == FundusPolicy::None {
        return Vec::new();
    }

    let images = match decoder.read_fundus_images() {
        Ok(images) => images,
        Err(e) => {
            log::warn!("Failed to read fundus images from {}: {}", name, e);
            return Vec::new();
        }
    };

    let count = match policy {
        FundusPolicy::All => images.len(),
        FundusPolicy::First => images.len().min(1),
        FundusPolicy::None => 0,
    };
    images
        .iter()
        .take(count)
        .enumerate()
        .map(|(i, image)| {
            let mut frame = FrameDescriptor::new(name, FrameAddress::fundus(i), image.laterality);
            frame.image_label = image.image_id.clone();
            frame
        })
        .collect()
}
