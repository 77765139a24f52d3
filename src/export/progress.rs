//! Progress reporting and cancellation for export jobs.
//!
//! Two channels exist. The *progress callback* is polled before every frame
//! with `(done, total)` and stops the job when it returns `false`. The
//! *listener* passively receives [`ExportProgress`] events.

use crate::export::job::ExportStatus;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A progress event.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportProgress {
    /// Validation passed and frames are about to be processed.
    Started { total: usize },
    /// A frame is being processed.
    FrameStarted {
        index: usize,
        total: usize,
        source_name: String,
        frame_id: String,
    },
    /// A frame was written.
    FrameWritten { index: usize, total: usize, path: PathBuf },
    /// A frame was left alone because its output already exists.
    FrameSkipped { index: usize, total: usize, path: PathBuf },
    /// A frame failed.
    FrameFailed {
        index: usize,
        total: usize,
        message: String,
    },
    /// The job ran to the end.
    Finished {
        status: ExportStatus,
        success_count: usize,
        error_count: usize,
        skipped_count: usize,
        duration_ms: u64,
    },
    /// The job was stopped by the progress callback.
    Canceled { frames_done: usize },
}

/// Receives [`ExportProgress`] events.
pub type ProgressListener = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    canceled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.canceled.store(false, Ordering::Relaxed);
    }

    /// A progress callback that keeps going until the flag is set.
    pub fn callback(&self) -> impl FnMut(usize, usize) -> bool + Send + 'static {
        let flag = self.clone();
        move |_done, _total| !flag.is_canceled()
    }
}

/// Forwards events of one job to an optional listener.
pub struct ProgressTracker<'a> {
    total: usize,
    start_time: Instant,
    listener: Option<&'a (dyn Fn(ExportProgress) + Send + Sync)>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(total: usize, listener: Option<&'a (dyn Fn(ExportProgress) + Send + Sync)>) -> Self {
        Self {
            total,
            start_time: Instant::now(),
            listener,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn started(&mut self) {
        self.start_time = Instant::now();
        self.send(ExportProgress::Started { total: self.total });
    }

    pub fn frame_started(&self, index: usize, source_name: &str, frame_id: &str) {
        self.send(ExportProgress::FrameStarted {
            index,
            total: self.total,
            source_name: source_name.to_string(),
            frame_id: frame_id.to_string(),
        });
    }

    pub fn frame_written(&self, index: usize, path: PathBuf) {
        self.send(ExportProgress::FrameWritten {
            index,
            total: self.total,
            path,
        });
    }

    pub fn frame_skipped(&self, index: usize, path: PathBuf) {
        self.send(ExportProgress::FrameSkipped {
            index,
            total: self.total,
            path,
        });
    }

    pub fn frame_failed(&self, index: usize, message: String) {
        self.send(ExportProgress::FrameFailed {
            index,
            total: self.total,
            message,
        });
    }

    pub fn finished(&self, status: ExportStatus, success_count: usize, error_count: usize, skipped_count: usize) {
        self.send(ExportProgress::Finished {
            status,
            success_count,
            error_count,
            skipped_count,
            duration_ms: self.elapsed_ms(),
        });
    }

    pub fn canceled(&self, frames_done: usize) {
        self.send(ExportProgress::Canceled { frames_done });
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    fn send(&self, update: ExportProgress) {
        if let Some(listener) = self.listener {
            listener(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_cancel_flag_callback() {
        let flag = CancelFlag::new();
        let mut callback = flag.callback();
        assert!(callback(0, 3));

        flag.clone().cancel();
        assert!(flag.is_canceled());
        assert!(!callback(1, 3));

        flag.reset();
        assert!(callback(2, 3));
    }

    #[test]
    fn test_listener_receives_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let listener: ProgressListener = Box::new(move |event| sink.lock().push(event));

        let mut tracker = ProgressTracker::new(2, Some(listener.as_ref()));
        tracker.started();
        tracker.frame_started(0, "a.img", "slice0");
        tracker.frame_failed(0, "boom".to_string());
        tracker.canceled(1);

        let events = events.lock();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], ExportProgress::Started { total: 2 });
        assert_eq!(events[3], ExportProgress::Canceled { frames_done: 1 });
    }
}
