//! TOML job files for the command line.
//!
//! ```toml
//! target_dir = "exports"
//! format = "jpeg"
//! rotation = 90
//! on_duplicate = "unique"
//! export_metadata = true
//!
//! [crop]
//! top = 10
//! left = 0
//! width = 256
//! height = 256
//!
//! [[sources]]
//! path = "scans/patient.e2e"
//! frames = ["vol0_slice3", "fundus0"]
//!
//! [[sources]]
//! path = "scans/cube.img"   # every frame
//! ```
//!
//! Relative paths are resolved against the job file's directory.

use crate::core::error::ConfigError;
use crate::core::types::{DuplicatePolicy, OutputFormat};
use crate::export::job::{ExportJob, DEFAULT_JPEG_QUALITY};
use crate::frames::selection::FrameRef;
use crate::processing::transform::CropRect;
use crate::source::registry::FileRegistry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One input file of a job and the frames to take from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub path: PathBuf,
    /// Frame ids to export. Absent means every frame.
    #[serde(default)]
    pub frames: Option<Vec<String>>,
}

/// An export job as written in a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFile {
    pub target_dir: PathBuf,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub rotation: i32,
    #[serde(default)]
    pub crop: Option<CropRect>,
    #[serde(default = "default_duplicate_policy")]
    pub on_duplicate: String,
    #[serde(default)]
    pub export_metadata: bool,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_format() -> String {
    "png".to_string()
}

fn default_duplicate_policy() -> String {
    "overwrite".to_string()
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

impl JobFile {
    /// Read and parse a job file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        let mut job: JobFile = toml::from_str(&text).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })?;
        job.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        log::debug!("Loaded job file {} with {} sources", path.display(), job.sources.len());
        Ok(job)
    }

    /// Resolve relative paths against `dir` instead of the job file's directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn output_format(&self) -> Result<OutputFormat, ConfigError> {
        self.format
            .parse()
            .map_err(|reason| ConfigError::InvalidValue { field: "format", reason })
    }

    pub fn duplicate_policy(&self) -> Result<DuplicatePolicy, ConfigError> {
        self.on_duplicate
            .parse()
            .map_err(|reason| ConfigError::InvalidValue {
                field: "on_duplicate",
                reason,
            })
    }

    pub fn target_path(&self) -> PathBuf {
        self.base_dir.join(&self.target_dir)
    }

    /// Input files in declaration order.
    pub fn source_paths(&self) -> Vec<PathBuf> {
        self.sources.iter().map(|s| self.base_dir.join(&s.path)).collect()
    }

    /// Build the export job for sources already imported into `registry`.
    ///
    /// Sources without a `frames` list contribute every indexed frame.
    pub fn into_job(&self, registry: &FileRegistry) -> Result<ExportJob, ConfigError> {
        let mut job = ExportJob::new(self.target_path())
            .with_format(self.output_format()?)
            .with_rotation(self.rotation)
            .with_duplicate_policy(self.duplicate_policy()?)
            .with_metadata(self.export_metadata)
            .with_jpeg_quality(self.jpeg_quality);
        if let Some(crop) = self.crop {
            job = job.with_crop(crop);
        }

        for (entry, path) in self.sources.iter().zip(self.source_paths()) {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "sources",
                    reason: format!("{} has no file name", path.display()),
                })?;
            if !registry.contains(&name) {
                return Err(ConfigError::InvalidValue {
                    field: "sources",
                    reason: format!("{} is not loaded", name),
                });
            }

            match &entry.frames {
                Some(ids) => job = job.with_frames(ids.iter().map(|id| FrameRef::new(name.as_str(), id.as_str()))),
                None => {
                    let frames = registry.frames(&name).unwrap_or_default();
                    if frames.is_empty() {
                        log::warn!("No frames found in {}", name);
                    }
                    job = job.with_frames(frames.iter().map(FrameRef::from));
                }
            }
        }

        Ok(job)
    }
}
