//! Export pipeline: jobs, the per-frame engine, output files, batch runs
//! and background execution.

pub mod background;
pub mod batch;
pub mod engine;
pub mod job;
pub mod progress;
pub mod writer;

pub use background::BackgroundExport;
pub use batch::{collect_inputs, expand_inputs, BatchExporter, BatchOptions, BatchResult, FileOutcome};
pub use engine::ExportEngine;
pub use job::{ExportJob, ExportResult, ExportStatus, DEFAULT_JPEG_QUALITY, MAX_ERROR_MESSAGES};
pub use progress::{CancelFlag, ExportProgress, ProgressListener, ProgressTracker};
