//! Core types for the octslice frame extraction engine.
//!
//! This module contains the foundational types shared by every layer:
//! - Format, frame and export option enums
//! - Pixel buffers, slice stacks and 8-bit normalization
//! - Error types

pub mod types;
pub mod pixels;
pub mod error;

// Re-export commonly used types
pub use types::{DuplicatePolicy, FormatTag, FrameKind, FundusPolicy, Laterality, Metadata, OutputFormat};
pub use pixels::{PixelBuffer, Samples, SliceStack};
pub use error::{
    AddressDecodeError, DecoderError, ExportError, FrameError, ImportError, OctError, PixelError,
    ValidationError,
};
