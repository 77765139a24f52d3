//! Export engine.
//!
//! Runs an [`ExportJob`] against the sources of a [`FileRegistry`]:
//!
//! 1. Validate the job settings and the target directory. Failure aborts the
//!    job before any frame is touched.
//! 2. For each frame in order: poll the progress callback, resolve, rotate
//!    and crop, then write according to the output format and duplicate
//!    policy. A failing frame is recorded and the job moves on.
//! 3. Poll the callback once more at completion and build the summary.

use crate::core::error::{ExportError, FrameError, FrameResult};
use crate::export::job::{ExportJob, ExportResult};
use crate::export::progress::{ExportProgress, ProgressListener, ProgressTracker};
use crate::export::writer;
use crate::frames::resolver;
use crate::frames::selection::FrameRef;
use crate::processing::transform::{self, TransformParams};
use crate::source::decoder::DicomExporter;
use crate::source::registry::{FileRegistry, LoadedSource};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What happened to one frame.
#[derive(Debug)]
enum FrameOutcome {
    Written(PathBuf),
    Skipped(PathBuf),
    Converted,
}

/// DICOM conversion outcome per source, so each source is converted once per job.
type DicomOutcomes = HashMap<String, Result<(), String>>;

/// Exports frames of loaded sources.
pub struct ExportEngine<'a> {
    registry: &'a FileRegistry,
    dicom: Option<Arc<dyn DicomExporter>>,
    listener: Option<ProgressListener>,
}

impl<'a> ExportEngine<'a> {
    pub fn new(registry: &'a FileRegistry) -> Self {
        Self {
            registry,
            dicom: None,
            listener: None,
        }
    }

    /// Set the collaborator used for DICOM output.
    pub fn with_dicom_exporter(mut self, exporter: Arc<dyn DicomExporter>) -> Self {
        self.dicom = Some(exporter);
        self
    }

    /// Receive [`ExportProgress`] events.
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(ExportProgress) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Run a job to the end.
    pub fn export(&self, job: &ExportJob) -> Result<ExportResult, ExportError> {
        self.run(job, |_, _| true)
    }

    /// Run a job.
    ///
    /// `progress` is called with `(frames_done, total)` before every frame
    /// and once more with `(total, total)` at the end. Returning `false`
    /// stops the job; files already written stay and the result is
    /// [`Canceled`](crate::export::job::ExportStatus::Canceled).
    pub fn run<F>(&self, job: &ExportJob, mut progress: F) -> Result<ExportResult, ExportError>
    where
        F: FnMut(usize, usize) -> bool,
    {
        self.validate(job)?;

        let total = job.frames.len();
        let params = job.transform();
        let mut tracker = ProgressTracker::new(total, self.listener.as_deref());
        let mut result = ExportResult::new();
        let mut dicom_outcomes = DicomOutcomes::new();

        log::info!(
            "Exporting {} frames as {} to {} (duplicates: {:?})",
            total,
            job.format,
            job.target_dir.display(),
            job.on_duplicate
        );
        tracker.started();

        for (index, frame) in job.frames.iter().enumerate() {
            if !progress(index, total) {
                return Ok(self.cancel(&tracker, result, index));
            }

            tracker.frame_started(index, &frame.source_name, &frame.frame_id);
            match self.export_frame(job, frame, &params, &mut dicom_outcomes) {
                Ok(FrameOutcome::Written(path)) => {
                    log::debug!("Saved {} of {} to {}", frame.frame_id, frame.source_name, path.display());
                    result.success_count += 1;
                    result.written_files.push(path.clone());
                    tracker.frame_written(index, path);
                }
                Ok(FrameOutcome::Converted) => {
                    result.success_count += 1;
                }
                Ok(FrameOutcome::Skipped(path)) => {
                    log::info!("{} already exists, skipping", path.display());
                    result.skipped_count += 1;
                    tracker.frame_skipped(index, path);
                }
                Err(e) => {
                    let message = format!("Frame {} of {}: {}", frame.frame_id, frame.source_name, e);
                    log::error!("{}", message);
                    tracker.frame_failed(index, message.clone());
                    result.record_error(message);
                }
            }
        }

        if !progress(total, total) {
            return Ok(self.cancel(&tracker, result, total));
        }

        result.finish(&job.target_dir);
        tracker.finished(result.status, result.success_count, result.error_count, result.skipped_count);
        log::info!("{} ({} ms)", result.summary, tracker.elapsed_ms());
        Ok(result)
    }

    fn validate(&self, job: &ExportJob) -> Result<(), ExportError> {
        job.validate().map_err(ExportError::InvalidJob)?;
        if !job.format.is_raster() && self.dicom.is_none() {
            return Err(ExportError::NoDicomExporter);
        }
        writer::validate_target_dir(&job.target_dir).map_err(|e| {
            log::error!("Invalid export directory: {}", e);
            ExportError::InvalidDirectory(e)
        })
    }

    fn cancel(&self, tracker: &ProgressTracker<'_>, mut result: ExportResult, frames_done: usize) -> ExportResult {
        log::info!("Export canceled by user after {} of {} frames", frames_done, tracker.total());
        result.cancel();
        tracker.canceled(frames_done);
        result
    }

    fn export_frame(
        &self,
        job: &ExportJob,
        frame: &FrameRef,
        params: &TransformParams,
        dicom_outcomes: &mut DicomOutcomes,
    ) -> FrameResult<FrameOutcome> {
        let source = self
            .registry
            .get(&frame.source_name)
            .ok_or_else(|| FrameError::SourceNotLoaded(frame.source_name.clone()))?;

        let image = resolver::resolve(&source, &frame.frame_id)?;
        let image = transform::process(&image, params)?;

        if !job.format.is_raster() {
            return self.export_dicom(&source, &job.target_dir, dicom_outcomes);
        }

        let stem = source.stem();
        let planned = writer::frame_path(&job.target_dir, &stem, &frame.frame_id, job.format);
        let Some(path) = writer::resolve_output_path(&planned, job.on_duplicate) else {
            return Ok(FrameOutcome::Skipped(planned));
        };

        writer::write_raster(&image, &path, job.format, job.jpeg_quality)?;

        if job.export_metadata {
            let sidecar = writer::sidecar_path(&job.target_dir, &stem, &frame.frame_id);
            match writer::write_sidecar(&sidecar, source.metadata()) {
                Ok(()) => log::info!("Saved metadata to {}", sidecar.display()),
                Err(e) => log::warn!("Failed to export metadata for {}: {}", frame.frame_id, e),
            }
        }

        Ok(FrameOutcome::Written(path))
    }

    fn export_dicom(
        &self,
        source: &LoadedSource,
        output_dir: &Path,
        outcomes: &mut DicomOutcomes,
    ) -> FrameResult<FrameOutcome> {
        let outcome = outcomes
            .entry(source.name().to_string())
            .or_insert_with(|| self.convert_to_dicom(source, output_dir))
            .clone();

        outcome
            .map(|()| FrameOutcome::Converted)
            .map_err(|reason| FrameError::DicomExport {
                source_name: source.name().to_string(),
                reason,
            })
    }

    fn convert_to_dicom(&self, source: &LoadedSource, output_dir: &Path) -> Result<(), String> {
        let exporter = self
            .dicom
            .as_ref()
            .ok_or_else(|| "no DICOM exporter configured".to_string())?;

        let before = writer::count_dcm_files(output_dir);
        exporter
            .export_from_source(source.path(), output_dir)
            .map_err(|e| e.to_string())?;
        let after = writer::count_dcm_files(output_dir);

        if after > before {
            log::info!(
                "Exported {} to DICOM: {} new files in {}",
                source.name(),
                after - before,
                output_dir.display()
            );
        } else {
            log::warn!(
                "DICOM export of {} reported success but no new .dcm files appeared in {}",
                source.name(),
                output_dir.display()
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for ExportEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportEngine")
            .field("registry", &self.registry)
            .field("dicom", &self.dicom.as_ref().map(|_| "<exporter>"))
            .field("listener", &self.listener.as_ref().map(|_| "<listener>"))
            .finish()
    }
}
