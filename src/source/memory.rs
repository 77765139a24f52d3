//! In-memory decoder.
//!
//! Serves volumes, fundus images and metadata from memory. Clones share
//! state, so a test can keep one handle and change what the decoder
//! returns after the source has been imported.

use crate::core::error::DecoderError;
use crate::core::types::Metadata;
use crate::source::decoder::{DecoderFactory, FundusImage, ScanDecoder, Volume};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryState {
    volumes: Vec<Volume>,
    fundus: Vec<FundusImage>,
    metadata: Metadata,
    volume_error: Option<DecoderError>,
    fundus_error: Option<DecoderError>,
    metadata_error: Option<DecoderError>,
}

/// Decoder backed by in-memory data.
#[derive(Debug, Clone, Default)]
pub struct MemoryDecoder {
    state: Arc<RwLock<MemoryState>>,
    volume_reads: Arc<AtomicUsize>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a volume.
    pub fn with_volume(self, volume: Volume) -> Self {
        self.state.write().volumes.push(volume);
        self
    }

    /// Add a fundus image.
    pub fn with_fundus(self, image: FundusImage) -> Self {
        self.state.write().fundus.push(image);
        self
    }

    /// Set a metadata entry.
    pub fn with_metadata(self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.state.write().metadata.insert(key.into(), value);
        self
    }

    /// Make `read_volumes` fail.
    pub fn with_volume_error(self, error: DecoderError) -> Self {
        self.state.write().volume_error = Some(error);
        self
    }

    /// Make `read_fundus_images` fail.
    pub fn with_fundus_error(self, error: DecoderError) -> Self {
        self.state.write().fundus_error = Some(error);
        self
    }

    /// Make `read_all_metadata` fail.
    pub fn with_metadata_error(self, error: DecoderError) -> Self {
        self.state.write().metadata_error = Some(error);
        self
    }

    /// Replace the volumes, affecting every clone.
    pub fn set_volumes(&self, volumes: Vec<Volume>) {
        self.state.write().volumes = volumes;
    }

    /// Replace the fundus images, affecting every clone.
    pub fn set_fundus(&self, images: Vec<FundusImage>) {
        self.state.write().fundus = images;
    }

    /// How often `read_volumes` has been called across all clones.
    pub fn volume_reads(&self) -> usize {
        self.volume_reads.load(Ordering::Relaxed)
    }

    /// A factory that hands out clones of this decoder for any path.
    pub fn into_factory(self) -> DecoderFactory {
        Arc::new(move |_path: &Path| Ok(Box::new(self.clone()) as Box<dyn ScanDecoder>))
    }
}

impl ScanDecoder for MemoryDecoder {
    fn read_volumes(&self) -> Result<Vec<Volume>, DecoderError> {
        self.volume_reads.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read();
        match &state.volume_error {
            Some(error) => Err(error.clone()),
            None => Ok(state.volumes.clone()),
        }
    }

    fn read_fundus_images(&self) -> Result<Vec<FundusImage>, DecoderError> {
        let state = self.state.read();
        match &state.fundus_error {
            Some(error) => Err(error.clone()),
            None => Ok(state.fundus.clone()),
        }
    }

    fn read_all_metadata(&self) -> Result<Metadata, DecoderError> {
        let state = self.state.read();
        match &state.metadata_error {
            Some(error) => Err(error.clone()),
            None => Ok(state.metadata.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pixels::{PixelBuffer, Samples, SliceStack};

    #[test]
    fn test_clones_share_state() {
        let decoder = MemoryDecoder::new();
        let clone = decoder.clone();
        decoder.set_volumes(vec![Volume::new(SliceStack::empty())]);

        assert_eq!(clone.read_volumes().unwrap().len(), 1);
        assert_eq!(decoder.volume_reads(), 1);
    }

    #[test]
    fn test_configured_failures() {
        let decoder = MemoryDecoder::new()
            .with_fundus(FundusImage::new(
                PixelBuffer::gray(1, 1, Samples::U8(vec![7])).unwrap(),
            ))
            .with_metadata_error(DecoderError::Malformed("no header".to_string()));

        assert_eq!(decoder.read_fundus_images().unwrap().len(), 1);
        assert!(decoder.read_all_metadata().is_err());
    }
}
