//! Scan sources: the decoder boundary and the registry of loaded files.

pub mod decoder;
pub mod memory;
pub mod registry;

pub use decoder::{DecoderFactory, DecoderRegistry, DicomExporter, FundusImage, ScanDecoder, Volume};
pub use memory::MemoryDecoder;
pub use registry::{FileRegistry, LoadedSource, SourceHandle};
