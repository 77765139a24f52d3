//! Core value types shared across the frame and export layers.
//!
//! Vendor formats, frame kinds and export options are closed sets, so they
//! are modeled as enums and matched exhaustively instead of being inspected
//! at runtime.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Metadata attached to a loaded source, in decoder order.
pub type Metadata = IndexMap<String, serde_json::Value>;

/// Supported scan file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FormatTag {
    /// Heidelberg Spectralis (.e2e)
    E2e,
    /// Zeiss Cirrus raw (.img)
    Img,
    /// Topcon (.fds)
    Fds,
    /// Topcon (.fda)
    Fda,
    /// Bioptigen (.oct)
    Oct,
    /// Optovue (.OCT, upper case)
    OctRaw,
    /// DICOM (.dcm)
    Dicom,
}

/// Which fundus images a format contributes to its frame list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundusPolicy {
    /// Fundus images are not indexed.
    None,
    /// Only the first fundus image, as `fundus0`.
    First,
    /// Every fundus image the decoder returns.
    All,
}

impl FormatTag {
    /// All supported formats.
    pub const ALL: [FormatTag; 7] = [
        FormatTag::E2e,
        FormatTag::Img,
        FormatTag::Fds,
        FormatTag::Fda,
        FormatTag::Oct,
        FormatTag::OctRaw,
        FormatTag::Dicom,
    ];

    /// Detect the format from a file extension.
    ///
    /// Matching is case-insensitive, except that an upper-case `.OCT`
    /// selects the Optovue raw reader and every other spelling of `.oct`
    /// selects the Bioptigen reader.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if extension == "OCT" {
            return Some(FormatTag::OctRaw);
        }
        match extension.to_ascii_lowercase().as_str() {
            "e2e" => Some(FormatTag::E2e),
            "img" => Some(FormatTag::Img),
            "fds" => Some(FormatTag::Fds),
            "fda" => Some(FormatTag::Fda),
            "oct" => Some(FormatTag::Oct),
            "dcm" => Some(FormatTag::Dicom),
            _ => None,
        }
    }

    /// Whether the format can hold several volumes per file.
    pub fn is_multi_volume(self) -> bool {
        matches!(self, FormatTag::E2e)
    }

    /// Which fundus images this format exposes as frames.
    pub fn fundus_policy(self) -> FundusPolicy {
        match self {
            FormatTag::E2e => FundusPolicy::All,
            FormatTag::Fds | FormatTag::Fda => FundusPolicy::First,
            FormatTag::Img | FormatTag::Oct | FormatTag::OctRaw | FormatTag::Dicom => {
                FundusPolicy::None
            }
        }
    }

    /// Short identifier, as used in metadata and job files.
    pub fn as_str(self) -> &'static str {
        match self {
            FormatTag::E2e => "E2E",
            FormatTag::Img => "IMG",
            FormatTag::Fds => "FDS",
            FormatTag::Fda => "FDA",
            FormatTag::Oct => "OCT",
            FormatTag::OctRaw => "OCTRAW",
            FormatTag::Dicom => "DICOM",
        }
    }

    /// Human readable vendor description.
    pub fn description(self) -> &'static str {
        match self {
            FormatTag::E2e => "Heidelberg OCT E2E",
            FormatTag::Img => "Zeiss Cirrus OCT RAW",
            FormatTag::Fds => "Topcon FDS",
            FormatTag::Fda => "Topcon FDA",
            FormatTag::Oct => "Bioptigen OCT",
            FormatTag::OctRaw => "Optovue OCT RAW",
            FormatTag::Dicom => "DICOM",
        }
    }

    /// File extension associated with the format.
    pub fn extension(self) -> &'static str {
        match self {
            FormatTag::E2e => "e2e",
            FormatTag::Img => "img",
            FormatTag::Fds => "fds",
            FormatTag::Fda => "fda",
            FormatTag::Oct => "oct",
            FormatTag::OctRaw => "OCT",
            FormatTag::Dicom => "dcm",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of an addressable frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    OctSlice,
    FundusImage,
    DicomPlaceholder,
}

/// Which eye a frame originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Laterality {
    Left,
    Right,
    #[default]
    Unknown,
}

impl Laterality {
    /// Interpret the laterality strings vendors commonly use.
    ///
    /// Accepts `L`/`R`, `OS`/`OD` and `left`/`right` in any case; anything
    /// else is `Unknown`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "l" | "os" | "left" => Laterality::Left,
            "r" | "od" | "right" => Laterality::Right,
            _ => Laterality::Unknown,
        }
    }
}

impl fmt::Display for Laterality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Laterality::Left => "Left",
            Laterality::Right => "Right",
            Laterality::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Export output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    Tiff,
    Dicom,
}

impl OutputFormat {
    /// File extension used for raster outputs.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Dicom => "dcm",
        }
    }

    /// Whether frames are written as individual raster files.
    pub fn is_raster(self) -> bool {
        !matches!(self, OutputFormat::Dicom)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "tif" | "tiff" => Ok(OutputFormat::Tiff),
            "dcm" | "dicom" => Ok(OutputFormat::Dicom),
            other => Err(format!(
                "Unsupported output format: {}. Use: png, jpeg, tiff, or dicom",
                other
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Png => "PNG",
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Tiff => "TIFF",
            OutputFormat::Dicom => "DICOM",
        };
        f.write_str(name)
    }
}

/// What to do when an output file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Replace the existing file.
    #[default]
    Overwrite,
    /// Leave the existing file alone and record the frame as skipped.
    Skip,
    /// Write next to it as `name_1.ext`, `name_2.ext`, ...
    Unique,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(DuplicatePolicy::Overwrite),
            "skip" => Ok(DuplicatePolicy::Skip),
            "unique" | "rename" => Ok(DuplicatePolicy::Unique),
            other => Err(format!(
                "Unknown duplicate policy: {}. Use: overwrite, skip, or unique",
                other
            )),
        }
    }
}
