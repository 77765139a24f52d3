//! Export job description and outcome.

use crate::core::error::{ValidationError, ValidationResult};
use crate::core::types::{DuplicatePolicy, OutputFormat};
use crate::frames::selection::FrameRef;
use crate::processing::transform::{CropRect, TransformParams};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// JPEG quality used when none is given.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// At most this many error messages are kept in an [`ExportResult`].
pub const MAX_ERROR_MESSAGES: usize = 100;

/// Errors quoted in a summary before the rest are only counted.
const SUMMARY_ERRORS: usize = 3;

/// What to export and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    /// Frames in export order.
    pub frames: Vec<FrameRef>,
    pub target_dir: PathBuf,
    pub format: OutputFormat,
    /// Clockwise rotation in degrees.
    pub rotation: i32,
    /// Crop applied after rotation.
    pub crop: Option<CropRect>,
    pub on_duplicate: DuplicatePolicy,
    /// Write a JSON metadata file next to every exported raster.
    pub export_metadata: bool,
    pub jpeg_quality: u8,
}

impl ExportJob {
    /// A PNG export into `target_dir` without frames.
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            frames: Vec::new(),
            target_dir: target_dir.into(),
            format: OutputFormat::default(),
            rotation: 0,
            crop: None,
            on_duplicate: DuplicatePolicy::default(),
            export_metadata: false,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_frames(mut self, frames: impl IntoIterator<Item = FrameRef>) -> Self {
        self.frames.extend(frames);
        self
    }

    pub fn with_frame(mut self, source_name: impl Into<String>, frame_id: impl Into<String>) -> Self {
        self.frames.push(FrameRef::new(source_name, frame_id));
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_crop(mut self, crop: CropRect) -> Self {
        self.crop = Some(crop);
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.on_duplicate = policy;
        self
    }

    pub fn with_metadata(mut self, export_metadata: bool) -> Self {
        self.export_metadata = export_metadata;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Rotation and crop as pipeline parameters.
    pub fn transform(&self) -> TransformParams {
        TransformParams {
            rotation: self.rotation,
            crop: self.crop,
        }
    }

    /// Check the settings that do not depend on any frame.
    pub fn validate(&self) -> ValidationResult<()> {
        self.transform().validate()?;
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ValidationError::InvalidQuality(self.jpeg_quality));
        }
        Ok(())
    }
}

/// Final state of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Completed,
    CompletedWithErrors,
    Canceled,
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportStatus::Completed => "completed",
            ExportStatus::CompletedWithErrors => "completed with errors",
            ExportStatus::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

/// Outcome of an export job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportResult {
    pub status: ExportStatus,
    pub success_count: usize,
    /// Every failed frame, including those past the message limit.
    pub error_count: usize,
    pub skipped_count: usize,
    /// The first [`MAX_ERROR_MESSAGES`] error messages.
    pub error_messages: Vec<String>,
    /// Files written, in order.
    pub written_files: Vec<PathBuf>,
    /// One-line description of the outcome.
    pub summary: String,
}

impl ExportResult {
    pub(crate) fn new() -> Self {
        Self {
            status: ExportStatus::Completed,
            success_count: 0,
            error_count: 0,
            skipped_count: 0,
            error_messages: Vec::new(),
            written_files: Vec::new(),
            summary: String::new(),
        }
    }

    pub(crate) fn record_error(&mut self, message: String) {
        self.error_count += 1;
        if self.error_messages.len() < MAX_ERROR_MESSAGES {
            self.error_messages.push(message);
        }
    }

    /// Set the final status and summary.
    pub(crate) fn finish(&mut self, target_dir: &Path) {
        if self.error_count == 0 {
            self.status = ExportStatus::Completed;
            self.summary = format!(
                "Successfully exported {} frames to {}",
                self.success_count,
                target_dir.display()
            );
        } else {
            self.status = ExportStatus::CompletedWithErrors;
            let quoted: Vec<&str> = self
                .error_messages
                .iter()
                .take(SUMMARY_ERRORS)
                .map(String::as_str)
                .collect();
            self.summary = format!(
                "Exported {} frames with {} errors: {}",
                self.success_count,
                self.error_count,
                quoted.join("; ")
            );
            if self.error_count > SUMMARY_ERRORS {
                self.summary
                    .push_str(&format!(" and {} more errors", self.error_count - SUMMARY_ERRORS));
            }
        }
    }

    pub(crate) fn cancel(&mut self) {
        self.status = ExportStatus::Canceled;
        self.summary = "Export canceled by user".to_string();
    }

    /// Whether every frame was written or skipped.
    pub fn is_success(&self) -> bool {
        self.status == ExportStatus::Completed
    }

    pub fn is_canceled(&self) -> bool {
        self.status == ExportStatus::Canceled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_defaults_and_builders() {
        let job = ExportJob::new("/tmp/out")
            .with_frame("a.img", "slice0")
            .with_format(OutputFormat::Jpeg)
            .with_rotation(90)
            .with_crop(CropRect::new(0, 0, 10, 10))
            .with_duplicate_policy(DuplicatePolicy::Skip);

        assert_eq!(job.frames, vec![FrameRef::new("a.img", "slice0")]);
        assert_eq!(job.jpeg_quality, DEFAULT_JPEG_QUALITY);
        assert!(!job.export_metadata);
        assert_eq!(job.transform().rotation, 90);
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_job_validation() {
        let job = ExportJob::new("out");
        assert_eq!(
            job.clone().with_rotation(45).validate(),
            Err(ValidationError::InvalidRotation(45))
        );
        assert_eq!(
            job.clone().with_jpeg_quality(0).validate(),
            Err(ValidationError::InvalidQuality(0))
        );
        assert!(job.with_crop(CropRect::new(0, 0, 0, 3)).validate().is_err());
    }

    #[test]
    fn test_summary_without_errors() {
        let mut result = ExportResult::new();
        result.success_count = 4;
        result.finish(Path::new("/data/out"));
        assert_eq!(result.status, ExportStatus::Completed);
        assert_eq!(result.summary, "Successfully exported 4 frames to /data/out");
    }

    #[test]
    fn test_summary_quotes_first_three_errors() {
        let mut result = ExportResult::new();
        result.success_count = 1;
        for i in 0..5 {
            result.record_error(format!("e{}", i));
        }
        result.finish(Path::new("out"));
        assert_eq!(result.status, ExportStatus::CompletedWithErrors);
        assert_eq!(
            result.summary,
            "Exported 1 frames with 5 errors: e0; e1; e2 and 2 more errors"
        );

        let mut few = ExportResult::new();
        few.record_error("only".to_string());
        few.finish(Path::new("out"));
        assert_eq!(few.summary, "Exported 0 frames with 1 errors: only");
    }

    #[test]
    fn test_error_messages_are_bounded() {
        let mut result = ExportResult::new();
        for i in 0..(MAX_ERROR_MESSAGES + 20) {
            result.record_error(format!("error {}", i));
        }
        assert_eq!(result.error_count, MAX_ERROR_MESSAGES + 20);
        assert_eq!(result.error_messages.len(), MAX_ERROR_MESSAGES);
    }

    #[test]
    fn test_cancel_summary() {
        let mut result = ExportResult::new();
        result.cancel();
        assert!(result.is_canceled());
        assert_eq!(result.summary, "Export canceled by user");
    }
}
