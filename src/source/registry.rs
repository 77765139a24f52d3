//! Registry of loaded scan sources.

use crate::core::error::ImportError;
use crate::core::types::{FormatTag, Metadata};
use crate::frames::index::{self, FrameDescriptor};
use crate::source::decoder::{DecoderRegistry, ScanDecoder};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Access to the data behind a loaded source.
pub enum SourceHandle {
    /// An opened vendor decoder.
    Decoder(Box<dyn ScanDecoder>),
    /// A DICOM file. Its pixels are never decoded here.
    Dicom,
}

impl SourceHandle {
    /// The decoder, if this is not a DICOM source.
    pub fn decoder(&self) -> Option<&dyn ScanDecoder> {
        match self {
            SourceHandle::Decoder(decoder) => Some(decoder.as_ref()),
            SourceHandle::Dicom => None,
        }
    }
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceHandle::Decoder(_) => f.write_str("Decoder(..)"),
            SourceHandle::Dicom => f.write_str("Dicom"),
        }
    }
}

/// A successfully imported scan file.
#[derive(Debug)]
pub struct LoadedSource {
    name: String,
    path: PathBuf,
    format: FormatTag,
    handle: SourceHandle,
    metadata: Metadata,
}

impl LoadedSource {
    /// Assemble a source from parts. Normally done by [`FileRegistry::import`].
    pub fn new(path: impl Into<PathBuf>, format: FormatTag, handle: SourceHandle, metadata: Metadata) -> Self {
        let path = path.into();
        Self {
            name: file_name(&path),
            path,
            format,
            handle,
            metadata,
        }
    }

    /// Basename of the file; the registry key.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without its extension, used to name exported files.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }

    pub fn format(&self) -> FormatTag {
        self.format
    }

    pub fn handle(&self) -> &SourceHandle {
        &self.handle
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// The set of currently loaded sources, keyed by basename.
///
/// Frame lists are built lazily and cached until the source is removed,
/// replaced or explicitly refreshed.
pub struct FileRegistry {
    decoders: DecoderRegistry,
    sources: IndexMap<String, Arc<LoadedSource>>,
    frame_cache: RwLock<HashMap<String, Arc<Vec<FrameDescriptor>>>>,
}

impl FileRegistry {
    /// Create an empty registry that opens files with `decoders`.
    pub fn new(decoders: DecoderRegistry) -> Self {
        Self {
            decoders,
            sources: IndexMap::new(),
            frame_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn decoders(&self) -> &DecoderRegistry {
        &self.decoders
    }

    pub fn decoders_mut(&mut self) -> &mut DecoderRegistry {
        &mut self.decoders
    }

    /// Import a scan file.
    ///
    /// On failure nothing is registered. Importing a file whose basename is
    /// already loaded replaces the earlier entry.
    pub fn import(&mut self, path: impl AsRef<Path>) -> Result<Arc<LoadedSource>, ImportError> {
        let path = path.as_ref();
        check_readable(path)?;

        let format =
            FormatTag::from_path(path).ok_or_else(|| ImportError::UnsupportedFormat(path.to_path_buf()))?;

        let mut metadata = Metadata::new();
        metadata.insert("file_type".to_string(), Value::from(format.as_str()));
        metadata.insert("file_name".to_string(), Value::from(file_name(path)));
        metadata.insert("file_path".to_string(), Value::from(path.display().to_string()));

        let handle = match format {
            FormatTag::Dicom => SourceHandle::Dicom,
            format => {
                let decoder = self
                    .decoders
                    .open(format, path)
                    .ok_or(ImportError::NoDecoder(format))?
                    .map_err(|error| ImportError::Decode {
                        path: path.to_path_buf(),
                        error,
                    })?;

                match decoder.read_all_metadata() {
                    Ok(extra) => metadata.extend(extra),
                    Err(e) => {
                        log::warn!("Could not read metadata from {}: {}", path.display(), e);
                        metadata.insert("error".to_string(), Value::from(e.to_string()));
                    }
                }
                SourceHandle::Decoder(decoder)
            }
        };

        let source = Arc::new(LoadedSource::new(path, format, handle, metadata));
        let name = source.name().to_string();
        if let Some(previous) = self.sources.insert(name.clone(), Arc::clone(&source)) {
            log::warn!(
                "Replacing {} (from {}) with {}",
                name,
                previous.path().display(),
                path.display()
            );
        }
        self.frame_cache.write().remove(&name);

        log::info!("Loaded {} as {}", name, format.description());
        Ok(source)
    }

    /// Import several files, returning one result per path.
    pub fn import_all<I, P>(&mut self, paths: I) -> Vec<(PathBuf, Result<Arc<LoadedSource>, ImportError>)>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .map(|path| {
                let path = path.as_ref().to_path_buf();
                let result = self.import(&path);
                if let Err(e) = &result {
                    log::error!("{}", e);
                }
                (path, result)
            })
            .collect()
    }

    /// Remove a source and its cached frames.
    pub fn remove(&mut self, name: &str) -> Option<Arc<LoadedSource>> {
        self.frame_cache.write().remove(name);
        let removed = self.sources.shift_remove(name);
        if removed.is_some() {
            log::debug!("Removed {}", name);
        }
        removed
    }

    /// Copy of the metadata of a loaded source.
    pub fn metadata(&self, name: &str) -> Option<Metadata> {
        self.sources.get(name).map(|source| source.metadata().clone())
    }

    pub fn get(&self, name: &str) -> Option<Arc<LoadedSource>> {
        self.sources.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Names of the loaded sources, in import order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(|name| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Frame list of a source, built on first use.
    pub fn frames(&self, name: &str) -> Option<Arc<Vec<FrameDescriptor>>> {
        if let Some(frames) = self.frame_cache.read().get(name) {
            return Some(Arc::clone(frames));
        }

        let source = self.sources.get(name)?;
        let frames = Arc::new(index::build(source));
        self.frame_cache
            .write()
            .insert(name.to_string(), Arc::clone(&frames));
        Some(frames)
    }

    /// Rebuild the frame list of a source from its decoder.
    pub fn refresh_frames(&self, name: &str) -> Option<Arc<Vec<FrameDescriptor>>> {
        self.frame_cache.write().remove(name);
        self.frames(name)
    }
}

impl Default for FileRegistry {
    fn default() -> Self {
        Self::new(DecoderRegistry::new())
    }
}

impl fmt::Debug for FileRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRegistry")
            .field("decoders", &self.decoders)
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn check_readable(path: &Path) -> Result<(), ImportError> {
    if !path.exists() {
        return Err(ImportError::NotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(ImportError::NotAFile(path.to_path_buf()));
    }

    let unreadable = |e: std::io::Error| ImportError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let mut file = File::open(path).map_err(unreadable)?;
    let mut byte = [0u8; 1];
    file.read(&mut byte).map(|_| ()).map_err(unreadable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::DecoderError;
    use crate::core::pixels::{PixelBuffer, Samples, SliceStack};
    use crate::source::decoder::Volume;
    use crate::source::memory::MemoryDecoder;
    use std::fs;
    use tempfile::TempDir;

    fn volume(slices: usize) -> Volume {
        Volume::new(SliceStack::from_slices(
            (0..slices)
                .map(|i| PixelBuffer::gray(2, 2, Samples::U16(vec![i as u16; 4])).unwrap())
                .collect(),
        ))
    }

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"scan").unwrap();
        path
    }

    fn registry_with(format: FormatTag, decoder: MemoryDecoder) -> FileRegistry {
        let mut decoders = DecoderRegistry::new();
        decoders.register_factory(format, decoder.into_factory());
        FileRegistry::new(decoders)
    }

    #[test]
    fn test_import_registers_source_with_metadata() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "eye.img");
        let decoder = MemoryDecoder::new()
            .with_volume(volume(3))
            .with_metadata("patient_id", Value::from("P-1"));
        let mut registry = registry_with(FormatTag::Img, decoder);

        let source = registry.import(&path).unwrap();
        assert_eq!(source.name(), "eye.img");
        assert_eq!(source.stem(), "eye");
        assert_eq!(source.format(), FormatTag::Img);

        let metadata = registry.metadata("eye.img").unwrap();
        assert_eq!(metadata["file_type"], Value::from("IMG"));
        assert_eq!(metadata["file_name"], Value::from("eye.img"));
        assert_eq!(metadata["patient_id"], Value::from("P-1"));
        assert!(registry.metadata("other.img").is_none());
    }

    #[test]
    fn test_import_rejects_bad_paths() {
        let dir = TempDir::new().unwrap();
        let mut registry = registry_with(FormatTag::Img, MemoryDecoder::new());

        assert!(matches!(
            registry.import(dir.path().join("missing.img")),
            Err(ImportError::NotFound(_))
        ));
        assert!(matches!(registry.import(dir.path()), Err(ImportError::NotAFile(_))));

        let unsupported = touch(&dir, "notes.txt");
        assert!(matches!(
            registry.import(&unsupported),
            Err(ImportError::UnsupportedFormat(_))
        ));

        let no_decoder = touch(&dir, "scan.e2e");
        assert!(matches!(
            registry.import(&no_decoder),
            Err(ImportError::NoDecoder(FormatTag::E2e))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_decoder_failure_registers_nothing() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "broken.fds");
        let mut decoders = DecoderRegistry::new();
        decoders.register(FormatTag::Fds, |_path| {
            Err::<Box<dyn ScanDecoder>, _>(DecoderError::Malformed("truncated".to_string()))
        });
        let mut registry = FileRegistry::new(decoders);

        let err = registry.import(&path).unwrap_err();
        assert!(matches!(err, ImportError::Decode { .. }));
        assert!(!registry.contains("broken.fds"));
    }

    #[test]
    fn test_metadata_failure_still_imports() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "eye.oct");
        let decoder = MemoryDecoder::new()
            .with_volume(volume(1))
            .with_metadata_error(DecoderError::Other("no header".to_string()));
        let mut registry = registry_with(FormatTag::Oct, decoder);

        registry.import(&path).unwrap();
        let metadata = registry.metadata("eye.oct").unwrap();
        assert_eq!(metadata["error"], Value::from("no header"));
        assert_eq!(metadata["file_type"], Value::from("OCT"));
    }

    #[test]
    fn test_dicom_needs_no_decoder() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "study.dcm");
        let mut registry = FileRegistry::default();

        let source = registry.import(&path).unwrap();
        assert!(source.handle().decoder().is_none());
        let frames = registry.frames("study.dcm").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_id, "dicom0");
    }

    #[test]
    fn test_frames_are_cached_until_refresh() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "eye.img");
        let decoder = MemoryDecoder::new().with_volume(volume(2));
        let mut registry = registry_with(FormatTag::Img, decoder.clone());
        registry.import(&path).unwrap();

        assert_eq!(registry.frames("eye.img").unwrap().len(), 2);
        decoder.set_volumes(vec![volume(5)]);
        assert_eq!(registry.frames("eye.img").unwrap().len(), 2);
        assert_eq!(registry.refresh_frames("eye.img").unwrap().len(), 5);
    }

    #[test]
    fn test_remove_and_reimport() {
        let dir = TempDir::new().unwrap();
        let first = touch(&dir, "eye.img");
        let nested = dir.path().join("second");
        fs::create_dir(&nested).unwrap();
        let second = nested.join("eye.img");
        fs::write(&second, b"scan").unwrap();

        let mut registry = registry_with(FormatTag::Img, MemoryDecoder::new().with_volume(volume(1)));
        registry.import(&first).unwrap();
        registry.import(&second).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("eye.img").unwrap().path(), second.as_path());

        assert!(registry.remove("eye.img").is_some());
        assert!(registry.frames("eye.img").is_none());
        assert!(registry.remove("eye.img").is_none());
    }

    #[test]
    fn test_import_all_keeps_going() {
        let dir = TempDir::new().unwrap();
        let good = touch(&dir, "a.img");
        let bad = dir.path().join("missing.img");
        let mut registry = registry_with(FormatTag::Img, MemoryDecoder::new().with_volume(volume(1)));

        let results = registry.import_all([&good, &bad]);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a.img"]);
    }
}
