//! Decoder boundary: the capability interface vendor readers implement.
//!
//! Parsing vendor bytes is outside this crate. An embedding application
//! registers one factory per [`FormatTag`] in a [`DecoderRegistry`]; the
//! factory opens a file and returns a [`ScanDecoder`] that exposes volumes,
//! fundus images and metadata in the crate's canonical shapes.

use crate::core::error::DecoderError;
use crate::core::pixels::{PixelBuffer, SliceStack};
use crate::core::types::{FormatTag, Laterality, Metadata};
use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;

/// One OCT volume as returned by a decoder.
#[derive(Debug, Clone)]
pub struct Volume {
    /// The volume's slices.
    pub slices: SliceStack,
    /// Vendor identifier of the volume, if any.
    pub volume_id: Option<String>,
    /// Eye the volume was taken from.
    pub laterality: Laterality,
}

impl Volume {
    /// Create a volume with unknown id and laterality.
    pub fn new(slices: SliceStack) -> Self {
        Self {
            slices,
            volume_id: None,
            laterality: Laterality::Unknown,
        }
    }

    pub fn with_laterality(mut self, laterality: Laterality) -> Self {
        self.laterality = laterality;
        self
    }

    pub fn with_volume_id(mut self, volume_id: impl Into<String>) -> Self {
        self.volume_id = Some(volume_id.into());
        self
    }
}

/// One fundus photograph as returned by a decoder.
#[derive(Debug, Clone)]
pub struct FundusImage {
    pub pixels: PixelBuffer,
    /// Vendor identifier of the image, if any.
    pub image_id: Option<String>,
    pub laterality: Laterality,
}

impl FundusImage {
    pub fn new(pixels: PixelBuffer) -> Self {
        Self {
            pixels,
            image_id: None,
            laterality: Laterality::Unknown,
        }
    }

    pub fn with_laterality(mut self, laterality: Laterality) -> Self {
        self.laterality = laterality;
        self
    }

    pub fn with_image_id(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }
}

/// Read access to an opened scan file.
///
/// Every call may re-read the underlying file; callers must not assume the
/// results are cached.
pub trait ScanDecoder: Send + Sync {
    /// All OCT volumes in file order. Single-volume formats return one.
    fn read_volumes(&self) -> Result<Vec<Volume>, DecoderError>;

    /// All fundus images in file order. Formats without fundus data return
    /// an empty list.
    fn read_fundus_images(&self) -> Result<Vec<FundusImage>, DecoderError>;

    /// Everything the decoder knows about the file, JSON-compatible.
    fn read_all_metadata(&self) -> Result<Metadata, DecoderError> {
        Ok(Metadata::new())
    }
}

/// Whole-file DICOM conversion.
pub trait DicomExporter: Send + Sync {
    /// Convert the scan at `path`, writing `.dcm` files into `output_dir`.
    fn export_from_source(&self, path: &Path, output_dir: &Path) -> Result<(), DecoderError>;
}

/// Factory function that opens a file with a specific decoder.
pub type DecoderFactory =
    Arc<dyn Fn(&Path) -> Result<Box<dyn ScanDecoder>, DecoderError> + Send + Sync>;

/// Registry of decoder factories, one per format.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    factories: IndexMap<FormatTag, DecoderFactory>,
}

impl DecoderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for a format, replacing any previous one.
    pub fn register<F>(&mut self, format: FormatTag, factory: F)
    where
        F: Fn(&Path) -> Result<Box<dyn ScanDecoder>, DecoderError> + Send + Sync + 'static,
    {
        self.register_factory(format, Arc::new(factory));
    }

    /// Register an already shared factory.
    pub fn register_factory(&mut self, format: FormatTag, factory: DecoderFactory) {
        if self.factories.insert(format, factory).is_some() {
            log::debug!("Replaced decoder for {} files", format);
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_decoder<F>(mut self, format: FormatTag, factory: F) -> Self
    where
        F: Fn(&Path) -> Result<Box<dyn ScanDecoder>, DecoderError> + Send + Sync + 'static,
    {
        self.register(format, factory);
        self
    }

    /// Open a file with the decoder registered for `format`.
    ///
    /// Returns `None` when no decoder is registered.
    pub fn open(&self, format: FormatTag, path: &Path) -> Option<Result<Box<dyn ScanDecoder>, DecoderError>> {
        self.factories.get(&format).map(|factory| factory(path))
    }

    /// Check if a format has a decoder.
    pub fn supports(&self, format: FormatTag) -> bool {
        format == FormatTag::Dicom || self.factories.contains_key(&format)
    }

    /// Formats with a registered decoder, in registration order.
    pub fn formats(&self) -> impl Iterator<Item = FormatTag> + '_ {
        self.factories.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("formats", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::MemoryDecoder;

    #[test]
    fn test_register_and_open() {
        let mut registry = DecoderRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.supports(FormatTag::Img));
        assert!(registry.supports(FormatTag::Dicom));

        registry.register(FormatTag::Img, |_path| {
            Ok(Box::new(MemoryDecoder::new()) as Box<dyn ScanDecoder>)
        });
        assert!(registry.supports(FormatTag::Img));
        assert_eq!(registry.formats().collect::<Vec<_>>(), vec![FormatTag::Img]);

        let decoder = registry.open(FormatTag::Img, Path::new("scan.img")).unwrap().unwrap();
        assert!(decoder.read_volumes().unwrap().is_empty());
        assert!(registry.open(FormatTag::E2e, Path::new("scan.e2e")).is_none());
    }

    #[test]
    fn test_factory_errors_are_returned() {
        let registry = DecoderRegistry::new().with_decoder(FormatTag::Fds, |path: &Path| {
            Err::<Box<dyn ScanDecoder>, _>(DecoderError::Malformed(format!(
                "bad header in {}",
                path.display()
            )))
        });
        let result = registry.open(FormatTag::Fds, Path::new("x.fds")).unwrap();
        assert!(matches!(result, Err(DecoderError::Malformed(_))));
    }
}
