//! Batch export of whole files.
//!
//! Each input file is imported, all of its frames are exported with the same
//! settings, and the outcomes are collected. A file that fails does not stop
//! the batch; cancellation does.

use crate::core::types::FormatTag;
use crate::export::engine::ExportEngine;
use crate::export::job::{ExportJob, ExportResult, ExportStatus};
use crate::export::progress::CancelFlag;
use crate::frames::selection::FrameRef;
use crate::source::decoder::DicomExporter;
use crate::source::registry::FileRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Settings shared by every file of a batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Export settings. `target_dir` is the batch root; `frames` is ignored.
    pub settings: ExportJob,
    /// Export each file into `{target_dir}/{file stem}`.
    pub create_subfolders: bool,
}

impl BatchOptions {
    pub fn new(settings: ExportJob) -> Self {
        Self {
            settings,
            create_subfolders: true,
        }
    }

    pub fn with_subfolders(mut self, create_subfolders: bool) -> Self {
        self.create_subfolders = create_subfolders;
        self
    }
}

/// Outcome for one input file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    /// The export result, or why the file could not be exported at all.
    pub result: Result<ExportResult, String>,
}

impl FileOutcome {
    fn failed(path: &Path, message: String) -> Self {
        log::error!("{}", message);
        Self {
            path: path.to_path_buf(),
            result: Err(message),
        }
    }

    /// Whether the file was exported without any error.
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(result) if result.is_success())
    }
}

/// Outcome of a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub files: Vec<FileOutcome>,
    pub success_count: usize,
    pub error_count: usize,
    pub error_messages: Vec<String>,
    pub canceled: bool,
    pub summary: String,
}

impl BatchResult {
    fn record(&mut self, outcome: FileOutcome) {
        let name = display_name(&outcome.path);
        match &outcome.result {
            Ok(result) if result.is_canceled() => {
                log::info!("Export of {} was canceled", name);
            }
            Ok(result) if result.is_success() => {
                log::info!("Successfully processed {}", name);
                self.success_count += 1;
            }
            Ok(result) => {
                let message = format!("Error exporting {}: {}", name, result.summary);
                log::error!("{}", message);
                self.error_count += 1;
                self.error_messages.push(message);
            }
            Err(message) => {
                self.error_count += 1;
                self.error_messages.push(message.clone());
            }
        }
        self.files.push(outcome);
    }

    fn finish(&mut self) {
        self.summary = if self.canceled {
            "Batch processing canceled by user".to_string()
        } else if self.error_count == 0 {
            format!("Successfully processed {} files", self.success_count)
        } else {
            format!(
                "Processed {} files with {} errors",
                self.success_count, self.error_count
            )
        };
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Imports and exports files one after another.
pub struct BatchExporter<'a> {
    registry: &'a mut FileRegistry,
    dicom: Option<Arc<dyn DicomExporter>>,
    cancel: CancelFlag,
}

impl<'a> BatchExporter<'a> {
    pub fn new(registry: &'a mut FileRegistry) -> Self {
        Self {
            registry,
            dicom: None,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_dicom_exporter(mut self, exporter: Arc<dyn DicomExporter>) -> Self {
        self.dicom = Some(exporter);
        self
    }

    /// Use an externally controlled cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the batch. `on_file` is called with `(index, total, path)` before
    /// each file.
    pub fn run<F>(&mut self, inputs: &[PathBuf], options: &BatchOptions, mut on_file: F) -> BatchResult
    where
        F: FnMut(usize, usize, &Path),
    {
        let mut batch = BatchResult::default();
        let total = inputs.len();

        for (index, path) in inputs.iter().enumerate() {
            if self.cancel.is_canceled() {
                log::info!("Batch processing canceled by user");
                batch.canceled = true;
                break;
            }

            on_file(index, total, path);
            let outcome = self.process_file(path, options);
            let canceled = matches!(&outcome.result, Ok(result) if result.status == ExportStatus::Canceled);
            batch.record(outcome);
            if canceled {
                log::info!("Batch processing canceled by user");
                batch.canceled = true;
                break;
            }
        }

        batch.finish();
        batch
    }

    fn process_file(&mut self, path: &Path, options: &BatchOptions) -> FileOutcome {
        let name = display_name(path);
        let source = match self.registry.import(path) {
            Ok(source) => source,
            Err(e) => return FileOutcome::failed(path, format!("Error importing {}: {}", name, e)),
        };

        let frames = match self.registry.frames(source.name()) {
            Some(frames) if !frames.is_empty() => frames,
            _ => return FileOutcome::failed(path, format!("No frames found in {}", name)),
        };

        let mut job = options.settings.clone();
        job.frames = frames.iter().map(FrameRef::from).collect();
        if options.create_subfolders {
            job.target_dir = job.target_dir.join(source.stem());
        }

        let mut engine = ExportEngine::new(&*self.registry);
        if let Some(dicom) = &self.dicom {
            engine = engine.with_dicom_exporter(Arc::clone(dicom));
        }

        match engine.run(&job, self.cancel.callback()) {
            Ok(result) => FileOutcome {
                path: path.to_path_buf(),
                result: Ok(result),
            },
            Err(e) => FileOutcome::failed(path, format!("Error exporting {}: {}", name, e)),
        }
    }
}

/// Supported scan files in `dir`, sorted by path.
///
/// Only the directory itself is searched unless `recursive` is set.
pub fn collect_inputs(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let walker = if recursive {
        WalkDir::new(dir)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| FormatTag::from_path(path).is_some())
        .collect();
    files.sort();
    files
}

/// Expand directories in `inputs` into the scan files they contain.
pub fn expand_inputs(inputs: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    inputs
        .iter()
        .flat_map(|input| {
            if input.is_dir() {
                collect_inputs(input, recursive)
            } else {
                vec![input.clone()]
            }
        })
        .collect()
}
