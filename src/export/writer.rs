//! Output files: target directory checks, naming, raster encoding and
//! metadata sidecars.

use crate::core::error::{FrameError, FrameResult, ValidationError, ValidationResult};
use crate::core::types::{DuplicatePolicy, Metadata, OutputFormat};
use image::codecs::jpeg::JpegEncoder;
use image::error::{ImageFormatHint, UnsupportedError, UnsupportedErrorKind};
use image::{DynamicImage, ImageError, ImageFormat};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Make sure `dir` exists, is a directory and accepts new files.
///
/// Missing directories are created. Writability is checked by creating and
/// deleting a uniquely named file.
pub fn validate_target_dir(dir: &Path) -> ValidationResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| ValidationError::DirectoryNotCreatable {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        log::info!("Created output directory: {}", dir.display());
    } else if !dir.is_dir() {
        return Err(ValidationError::NotADirectory(dir.to_path_buf()));
    }

    let test_file = dir.join(format!(".octslice_write_test_{}", uuid::Uuid::new_v4()));
    let not_writable = |e: std::io::Error| ValidationError::DirectoryNotWritable {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    };
    File::create(&test_file)
        .and_then(|mut file| file.write_all(b"test"))
        .map_err(not_writable)?;
    fs::remove_file(&test_file).map_err(not_writable)
}

/// `{dir}/{stem}_{frame_id}.{ext}`
pub fn frame_path(dir: &Path, stem: &str, frame_id: &str, format: OutputFormat) -> PathBuf {
    dir.join(format!("{}_{}.{}", stem, frame_id, format.extension()))
}

/// `{dir}/{stem}_{frame_id}_metadata.json`
pub fn sidecar_path(dir: &Path, stem: &str, frame_id: &str) -> PathBuf {
    dir.join(format!("{}_{}_metadata.json", stem, frame_id))
}

/// Apply the duplicate policy to a planned output path.
///
/// Returns `None` when the frame should be skipped. For
/// [`DuplicatePolicy::Unique`] the first free `name_N.ext` with `N >= 1`
/// is chosen.
pub fn resolve_output_path(path: &Path, policy: DuplicatePolicy) -> Option<PathBuf> {
    if !path.exists() {
        return Some(path.to_path_buf());
    }

    match policy {
        DuplicatePolicy::Overwrite => {
            log::debug!("Overwriting existing file: {}", path.display());
            Some(path.to_path_buf())
        }
        DuplicatePolicy::Skip => None,
        DuplicatePolicy::Unique => {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let extension = path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            let parent = path.parent().unwrap_or_else(|| Path::new(""));

            (1..)
                .map(|n| parent.join(format!("{}_{}{}", stem, n, extension)))
                .find(|candidate| !candidate.exists())
        }
    }
}

/// Encode an image to `path`.
///
/// JPEG drops any alpha channel and uses `jpeg_quality`; PNG and TIFF keep
/// the image's color type. DICOM is not a raster format and is rejected.
pub fn write_raster(image: &DynamicImage, path: &Path, format: OutputFormat, jpeg_quality: u8) -> FrameResult<()> {
    let encode_error = |error: ImageError| FrameError::Encode {
        path: path.to_path_buf(),
        error,
    };

    match format {
        OutputFormat::Jpeg => {
            let file = File::create(path).map_err(|error| FrameError::Io {
                path: path.to_path_buf(),
                error,
            })?;
            let mut output = BufWriter::new(file);
            let encoder = JpegEncoder::new_with_quality(&mut output, jpeg_quality);
            match image {
                DynamicImage::ImageLuma8(gray) => gray.write_with_encoder(encoder),
                other => other.to_rgb8().write_with_encoder(encoder),
            }
            .map_err(encode_error)?;
            output.flush().map_err(|error| FrameError::Io {
                path: path.to_path_buf(),
                error,
            })
        }
        OutputFormat::Png => image.save_with_format(path, ImageFormat::Png).map_err(encode_error),
        OutputFormat::Tiff => image.save_with_format(path, ImageFormat::Tiff).map_err(encode_error),
        OutputFormat::Dicom => {
            let hint = ImageFormatHint::Name("DICOM".to_string());
            Err(encode_error(ImageError::Unsupported(UnsupportedError::from_format_and_kind(
                hint.clone(),
                UnsupportedErrorKind::Format(hint),
            ))))
        }
    }
}

/// Write source metadata as pretty-printed JSON.
pub fn write_sidecar(path: &Path, metadata: &Metadata) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, metadata)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Number of `.dcm` files directly inside `dir`, in any letter case.
pub fn count_dcm_files(dir: &Path) -> usize {
    let pattern = format!("{}/*.dcm", glob::Pattern::escape(&dir.to_string_lossy()));
    let options = glob::MatchOptions {
        case_sensitive: false,
        ..glob::MatchOptions::new()
    };
    match glob::glob_with(&pattern, options) {
        Ok(paths) => paths.filter_map(Result::ok).count(),
        Err(e) => {
            log::warn!("Could not list DICOM files in {}: {}", dir.display(), e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn test_validate_creates_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a").join("b");
        validate_target_dir(&target).unwrap();
        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);
    }

    #[test]
    fn test_validate_rejects_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();
        assert_eq!(
            validate_target_dir(&file),
            Err(ValidationError::NotADirectory(file.clone()))
        );
        assert!(matches!(
            validate_target_dir(&file.join("below")),
            Err(ValidationError::DirectoryNotCreatable { .. })
        ));
    }

    #[test]
    fn test_paths() {
        let dir = Path::new("/out");
        assert_eq!(
            frame_path(dir, "scan", "vol0_slice1", OutputFormat::Tiff),
            PathBuf::from("/out/scan_vol0_slice1.tiff")
        );
        assert_eq!(
            sidecar_path(dir, "scan", "fundus0"),
            PathBuf::from("/out/scan_fundus0_metadata.json")
        );
    }

    #[test]
    fn test_duplicate_policies() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.png");
        assert_eq!(resolve_output_path(&path, DuplicatePolicy::Skip), Some(path.clone()));

        fs::write(&path, b"old").unwrap();
        assert_eq!(resolve_output_path(&path, DuplicatePolicy::Overwrite), Some(path.clone()));
        assert_eq!(resolve_output_path(&path, DuplicatePolicy::Skip), None);
        assert_eq!(
            resolve_output_path(&path, DuplicatePolicy::Unique),
            Some(dir.path().join("x_1.png"))
        );

        fs::write(dir.path().join("x_1.png"), b"old").unwrap();
        assert_eq!(
            resolve_output_path(&path, DuplicatePolicy::Unique),
            Some(dir.path().join("x_2.png"))
        );
    }

    #[test]
    fn test_write_raster_formats() {
        let dir = TempDir::new().unwrap();
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 3, image::Luma([128])));
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, image::Rgba([1, 2, 3, 4])));

        for (format, image) in [
            (OutputFormat::Png, &gray),
            (OutputFormat::Tiff, &gray),
            (OutputFormat::Jpeg, &gray),
            (OutputFormat::Jpeg, &rgba),
            (OutputFormat::Png, &rgba),
        ] {
            let path = dir.path().join(format!("out_{:?}.{}", image.color(), format.extension()));
            write_raster(image, &path, format, 90).unwrap();
            let decoded = image::open(&path).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (4, 3));
        }
    }

    #[test]
    fn test_write_raster_reports_io_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("x.jpeg");
        let image = DynamicImage::new_luma8(2, 2);
        assert!(matches!(
            write_raster(&image, &path, OutputFormat::Jpeg, 90),
            Err(FrameError::Io { .. })
        ));
        assert!(write_raster(&image, &path.with_extension("png"), OutputFormat::Png, 90).is_err());
    }

    #[test]
    fn test_sidecar_is_pretty_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.json");
        let mut metadata = Metadata::new();
        metadata.insert("file_type".to_string(), serde_json::Value::from("E2E"));
        write_sidecar(&path, &metadata).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"file_type\": \"E2E\"\n}\n");
    }

    #[test]
    fn test_count_dcm_files() {
        let dir = TempDir::new().unwrap();
        assert_eq!(count_dcm_files(dir.path()), 0);
        fs::write(dir.path().join("a.dcm"), b"").unwrap();
        fs::write(dir.path().join("b.dcm"), b"").unwrap();
        fs::write(dir.path().join("c.png"), b"").unwrap();
        assert_eq!(count_dcm_files(dir.path()), 2);
        fs::write(dir.path().join("IM0001.DCM"), b"").unwrap();
        fs::write(dir.path().join("IM0002.Dcm"), b"").unwrap();
        assert_eq!(count_dcm_files(dir.path()), 4);
    }
}
