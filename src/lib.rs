//! # Octslice - OCT frame extraction and export
//!
//! Octslice loads ophthalmic OCT scan files through pluggable decoders,
//! turns each file into a list of addressable frames (B-scan slices and
//! fundus photographs) and exports selected frames as 8-bit images.
//!
//! ## Features
//!
//! - **Stable frame ids**: `slice3`, `vol1_slice0`, `fundus0` identify a frame
//!   within its source and round-trip through [`FrameAddress`]
//! - **Vendor neutral**: decoders plug in through the [`ScanDecoder`] trait,
//!   one factory per [`FormatTag`]
//! - **Normalized output**: any sample type is min-max scaled to 8 bits
//! - **Export pipeline**: rotate, crop, duplicate handling, metadata sidecars,
//!   progress events and cancellation
//! - **Batch runs**: whole directories into per-file subfolders
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use octslice::prelude::*;
//!
//! let mut decoders = DecoderRegistry::new();
//! decoders.register(FormatTag::E2e, |path| open_e2e(path));
//!
//! let mut registry = FileRegistry::new(decoders);
//! registry.import("scans/patient.e2e")?;
//!
//! let frames = registry.frames("patient.e2e").unwrap_or_default();
//! let job = ExportJob::new("exports")
//!     .with_frames(frames.iter().map(FrameRef::from))
//!     .with_format(OutputFormat::Jpeg)
//!     .with_rotation(90);
//!
//! let result = ExportEngine::new(&registry).export(&job)?;
//! println!("{}", result.summary);
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: format tags, pixel buffers, normalization and errors
//! - [`source`]: decoder boundary and the registry of loaded files
//! - [`frames`]: frame ids, per-source frame lists, selection and lookup
//! - [`processing`]: rotation and cropping
//! - [`export`]: export jobs, the engine, batch and background runs
//! - [`config`]: TOML job files
//! - [`cli`]: the `octslice` command line, run with the application's decoders

#![warn(clippy::all)]

pub mod cli;
pub mod config;
pub mod core;
pub mod export;
pub mod frames;
pub mod processing;
pub mod source;

pub use crate::frames::FrameAddress;
pub use crate::source::ScanDecoder;
pub use crate::core::FormatTag;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use octslice::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{
        DuplicatePolicy, FormatTag, FrameKind, FundusPolicy, Laterality, Metadata, OutputFormat,
    };
    pub use crate::core::pixels::{PixelBuffer, Samples, SliceStack};

    // Errors
    pub use crate::core::error::{
        DecoderError, ExportError, FrameError, ImportError, OctError, OctResult, ValidationError,
    };

    // Sources
    pub use crate::source::{
        DecoderRegistry, DicomExporter, FileRegistry, FundusImage, LoadedSource, ScanDecoder, Volume,
    };

    // Frames
    pub use crate::frames::{FrameAddress, FrameDescriptor, FrameRef, FrameSelection};

    // Processing
    pub use crate::processing::{CropRect, TransformParams};

    // Export
    pub use crate::export::{
        BackgroundExport, BatchExporter, BatchOptions, BatchResult, CancelFlag, ExportEngine, ExportJob,
        ExportProgress, ExportResult, ExportStatus,
    };

    // Job files
    pub use crate::config::JobFile;
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use crate::source::MemoryDecoder;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "octslice");
    }

    #[test]
    fn test_import_select_export() {
        let dir = TempDir::new().unwrap();
        let decoder = MemoryDecoder::new()
            .with_volume(Volume::new(SliceStack::dense(2, 4, 4, Samples::U16(vec![500; 32])).unwrap()));
        let mut decoders = DecoderRegistry::new();
        decoders.register_factory(FormatTag::Fds, decoder.into_factory());

        let mut registry = FileRegistry::new(decoders);
        let path = dir.path().join("scan.fds");
        fs::write(&path, b"fds").unwrap();
        registry.import(&path).unwrap();

        let frames = registry.frames("scan.fds").unwrap();
        let mut selection = FrameSelection::new();
        selection.select_all("scan.fds", &frames);
        selection.deselect("scan.fds", "slice0");

        let job = ExportJob::new(dir.path().join("out")).with_frames(selection.selected(None));
        let result = ExportEngine::new(&registry).export(&job).unwrap();
        assert_eq!(result.status, ExportStatus::Completed);
        assert_eq!(result.written_files, vec![dir.path().join("out").join("scan_slice1.png")]);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"hello").unwrap();

        let mut registry = FileRegistry::default();
        assert!(registry.import(&path).is_err());
        assert!(registry.is_empty());
    }
}
