//! Error types for octslice.
//!
//! Uses thiserror for structured errors with context. Errors are designed to:
//! - Name the source file and frame id so a failure can be reproduced
//! - Separate job-level (fatal) failures from per-frame (recorded) ones
//! - Support error chaining for context

use crate::core::types::FormatTag;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for octslice.
///
/// This enum encompasses all error categories and enables automatic
/// conversion between specific error types.
#[derive(Error, Debug)]
pub enum OctError {
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Job file error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised by decoding and DICOM collaborators.
#[derive(Error, Debug, Clone)]
pub enum DecoderError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Malformed data: {0}")]
    Malformed(String),

    #[error("Unsupported by this decoder: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for DecoderError {
    fn from(error: std::io::Error) -> Self {
        DecoderError::Io(error.to_string())
    }
}

/// Errors from building pixel buffers and slice stacks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PixelError {
    #[error("Expected {expected} samples, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Unsupported channel count: {0} (expected 1, 3 or 4)")]
    UnsupportedChannels(u8),

    #[error("Image dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },

    #[error("Row {row} has {actual} samples, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Errors raised by validation of user-supplied parameters.
///
/// Everything except [`ValidationError::CropOutOfBounds`] is detected before
/// an export job touches its first frame and aborts the job. A crop that
/// does not fit one frame's image fails only that frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Rotation angle must be 0, 90, 180, or 270 degrees, got {0}")]
    InvalidRotation(i32),

    #[error(
        "Crop region {width}x{height} at (top {top}, left {left}) exceeds image dimensions {image_width}x{image_height}"
    )]
    CropOutOfBounds {
        top: u32,
        left: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Crop dimensions must be at least 1x1, got {width}x{height}")]
    EmptyCrop { width: u32, height: u32 },

    #[error("JPEG quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("Could not create directory {path}: {reason}")]
    DirectoryNotCreatable { path: PathBuf, reason: String },

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Directory is not writable: {path}: {reason}")]
    DirectoryNotWritable { path: PathBuf, reason: String },
}

impl ValidationError {
    /// Whether this error aborts a whole export job rather than a single frame.
    pub fn is_job_level(&self) -> bool {
        !matches!(self, ValidationError::CropOutOfBounds { .. })
    }
}

/// A frame id that does not follow the frame id grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid frame id '{frame_id}': {reason}")]
pub struct AddressDecodeError {
    /// The offending id.
    pub frame_id: String,
    /// What is wrong with it.
    pub reason: String,
}

impl AddressDecodeError {
    pub(crate) fn new(frame_id: &str, reason: impl Into<String>) -> Self {
        Self {
            frame_id: frame_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors that fail a single frame of an export job.
///
/// These are recorded and counted; the job moves on to the next frame.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("File not loaded: {0}")]
    SourceNotLoaded(String),

    #[error("{0}")]
    AddressDecode(#[from] AddressDecodeError),

    #[error("Frame {frame_id} not found in {source_name}: {reason}")]
    NotFound {
        source_name: String,
        frame_id: String,
        reason: String,
    },

    #[error("Could not decode frame {frame_id} in {source_name}: {reason}")]
    DecodeFailure {
        source_name: String,
        frame_id: String,
        reason: String,
    },

    #[error("Invalid processing parameters: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to write {path}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Failed to encode {path}: {error}")]
    Encode {
        path: PathBuf,
        #[source]
        error: image::ImageError,
    },

    #[error("DICOM export of {source_name} failed: {reason}")]
    DicomExport { source_name: String, reason: String },
}

impl FrameError {
    /// Whether the frame reference itself is bad (malformed or stale).
    pub fn is_missing_frame(&self) -> bool {
        matches!(
            self,
            FrameError::AddressDecode(_) | FrameError::NotFound { .. } | FrameError::SourceNotLoaded(_)
        )
    }

    /// Name of the source the failure concerns, when known.
    pub fn source_name(&self) -> Option<&str> {
        match self {
            FrameError::SourceNotLoaded(name)
            | FrameError::NotFound { source_name: name, .. }
            | FrameError::DecodeFailure { source_name: name, .. }
            | FrameError::DicomExport { source_name: name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Errors during source import. Nothing is registered when these occur.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Not a file: {0}")]
    NotAFile(PathBuf),

    #[error("File access error for {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("No decoder registered for {0} files")]
    NoDecoder(FormatTag),

    #[error("Error loading {path}: {error}")]
    Decode {
        path: PathBuf,
        #[source]
        error: DecoderError,
    },
}

/// Job-level export failures. The job stops before any frame is touched.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Invalid export directory: {0}")]
    InvalidDirectory(ValidationError),

    #[error("Invalid export settings: {0}")]
    InvalidJob(ValidationError),

    #[error("DICOM export requested but no DICOM exporter is configured")]
    NoDicomExporter,

    #[error("Export worker panicked")]
    WorkerPanicked,
}

/// Errors loading a job file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read {path}: {error}")]
    Read {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Could not parse {path}: {error}")]
    Parse {
        path: PathBuf,
        #[source]
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Result type alias for octslice operations.
pub type OctResult<T> = Result<T, OctError>;

/// Result type alias for per-frame operations.
pub type FrameResult<T> = Result<T, FrameError>;

/// Result type alias for parameter validation.
pub type ValidationResult<T> = Result<T, ValidationError>;
