//! Running an export job on a worker thread.

use crate::core::error::ExportError;
use crate::export::engine::ExportEngine;
use crate::export::job::{ExportJob, ExportResult};
use crate::export::progress::{CancelFlag, ExportProgress};
use crate::source::decoder::DicomExporter;
use crate::source::registry::FileRegistry;
use crossbeam::channel::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// An export job running in the background.
///
/// Progress events arrive on [`events`](Self::events) while the job runs.
/// The job stops before its next frame once [`cancel`](Self::cancel) is
/// called.
pub struct BackgroundExport {
    handle: JoinHandle<Result<ExportResult, ExportError>>,
    events: Receiver<ExportProgress>,
    cancel: CancelFlag,
}

impl BackgroundExport {
    /// Start `job` on a new thread.
    pub fn spawn(registry: Arc<FileRegistry>, job: ExportJob, dicom: Option<Arc<dyn DicomExporter>>) -> Self {
        Self::spawn_with_cancel(registry, job, dicom, CancelFlag::new())
    }

    /// Start `job` on a new thread, stopping when `cancel` is set.
    pub fn spawn_with_cancel(
        registry: Arc<FileRegistry>,
        job: ExportJob,
        dicom: Option<Arc<dyn DicomExporter>>,
        cancel: CancelFlag,
    ) -> Self {
        let (sender, events) = channel::unbounded();
        let callback = cancel.callback();

        let handle = thread::spawn(move || {
            let mut engine = ExportEngine::new(&registry).with_listener(move |event| {
                // The receiver may be gone; the job still runs to the end.
                let _ = sender.send(event);
            });
            if let Some(exporter) = dicom {
                engine = engine.with_dicom_exporter(exporter);
            }
            engine.run(&job, callback)
        });

        Self { handle, events, cancel }
    }

    /// Ask the job to stop before its next frame.
    pub fn cancel(&self) {
        log::info!("Cancel requested for background export");
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Progress events sent so far and in the future.
    ///
    /// The receiver outlives [`join`](Self::join), so events not read yet
    /// can still be drained afterwards.
    pub fn events(&self) -> Receiver<ExportProgress> {
        self.events.clone()
    }

    /// Events received since the last call, without blocking.
    pub fn poll_events(&self) -> Vec<ExportProgress> {
        self.events.try_iter().collect()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job to end.
    pub fn join(self) -> Result<ExportResult, ExportError> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => {
                log::error!("Export worker panicked");
                Err(ExportError::WorkerPanicked)
            }
        }
    }
}

impl std::fmt::Debug for BackgroundExport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundExport")
            .field("finished", &self.handle.is_finished())
            .field("canceled", &self.cancel.is_canceled())
            .finish()
    }
}
