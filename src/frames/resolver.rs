//! Frame id to pixels.

use crate::core::error::{FrameError, FrameResult};
use crate::core::pixels::PixelBuffer;
use crate::core::types::FundusPolicy;
use crate::frames::address::FrameAddress;
use crate::source::decoder::ScanDecoder;
use crate::source::registry::{LoadedSource, SourceHandle};
use image::DynamicImage;

/// Resolve a frame id of `source` to an 8-bit image.
///
/// The decoder is asked for the current volumes or fundus images on every
/// call and the address is checked against what it returns, so a stale id
/// fails with [`FrameError::NotFound`] instead of reading stale data.
pub fn resolve(source: &LoadedSource, frame_id: &str) -> FrameResult<DynamicImage> {
    let address = FrameAddress::decode(frame_id)?;
    let resolver = Resolver { source, frame_id };

    let decoder = match source.handle() {
        SourceHandle::Decoder(decoder) => decoder.as_ref(),
        SourceHandle::Dicom => {
            return Err(resolver.decode_failure("DICOM sources carry no decodable frames"));
        }
    };

    let buffer = match address {
        FrameAddress::OctSlice { volume, slice } => resolver.oct_slice(decoder, volume, slice)?,
        FrameAddress::Fundus { image } => resolver.fundus(decoder, image)?,
        FrameAddress::DicomPlaceholder => {
            return Err(resolver.not_found("only DICOM sources have a placeholder frame"));
        }
    };

    let image = buffer
        .normalize()
        .map_err(|e| resolver.decode_failure(e.to_string()))?;
    log::debug!(
        "Resolved {} of {} to {}x{} ({} from {})",
        frame_id,
        source.name(),
        image.width(),
        image.height(),
        channel_name(buffer.channels()),
        buffer.samples().dtype()
    );
    Ok(image)
}

fn channel_name(channels: u8) -> &'static str {
    match channels {
        1 => "gray",
        3 => "rgb",
        _ => "rgba",
    }
}

struct Resolver<'a> {
    source: &'a LoadedSource,
    frame_id: &'a str,
}

impl Resolver<'_> {
    fn not_found(&self, reason: impl Into<String>) -> FrameError {
        FrameError::NotFound {
            source_name: self.source.name().to_string(),
            frame_id: self.frame_id.to_string(),
            reason: reason.into(),
        }
    }

    fn decode_failure(&self, reason: impl Into<String>) -> FrameError {
        FrameError::DecodeFailure {
            source_name: self.source.name().to_string(),
            frame_id: self.frame_id.to_string(),
            reason: reason.into(),
        }
    }

    fn oct_slice(&self, decoder: &dyn ScanDecoder, volume: Option<usize>, slice: usize) -> FrameResult<PixelBuffer> {
        let format = self.source.format();
        let volume_index = match (volume, format.is_multi_volume()) {
            (Some(v), true) => v,
            (None, false) => 0,
            (Some(_), false) => {
                return Err(self.not_found(format!("{} files hold a single volume", format)));
            }
            (None, true) => {
                return Err(self.not_found(format!("{} slices are addressed as vol{{v}}_slice{{s}}", format)));
            }
        };

        let volumes = decoder
            .read_volumes()
            .map_err(|e| self.decode_failure(e.to_string()))?;
        let volume = volumes.get(volume_index).ok_or_else(|| {
            self.not_found(format!(
                "volume index {} out of range ({} volumes)",
                volume_index,
                volumes.len()
            ))
        })?;

        match volume.slices.slice(slice) {
            Some(result) => result.map_err(|e| self.decode_failure(e.to_string())),
            None => Err(self.not_found(format!(
                "slice index {} out of range ({} slices)",
                slice,
                volume.slices.len()
            ))),
        }
    }

    fn fundus(&self, decoder: &dyn ScanDecoder, image: usize) -> FrameResult<PixelBuffer> {
        let format = self.source.format();
        match format.fundus_policy() {
            FundusPolicy::None => {
                return Err(self.not_found(format!("{} files have no fundus frames", format)));
            }
            FundusPolicy::First if image > 0 => {
                return Err(self.not_found(format!("{} files have a single fundus frame", format)));
            }
            FundusPolicy::First | FundusPolicy::All => {}
        }

        let images = decoder
            .read_fundus_images()
            .map_err(|e| self.decode_failure(e.to_string()))?;
        images
            .into_iter()
            .nth(image)
            .map(|fundus| fundus.pixels)
            .ok_or_else(|| self.not_found(format!("fundus image index {} out of range", image)))
    }
}
