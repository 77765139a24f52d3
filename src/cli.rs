//! Command line front end.
//!
//! The library ships no vendor decoders, so the commands are run with the
//! decoders and DICOM exporter of the embedding application:
//!
//! ```rust,ignore
//! fn main() -> anyhow::Result<()> {
//!     let decoders = DecoderRegistry::new().with_decoder(FormatTag::E2e, open_e2e);
//!     octslice::cli::run(decoders, Some(Arc::new(MyDicomWriter)))
//! }
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};

use crate::config::JobFile;
use crate::core::error::{OctError, OctResult};
use crate::core::types::{DuplicatePolicy, FormatTag, OutputFormat};
use crate::export::{
    expand_inputs, BatchExporter, BatchOptions, ExportEngine, ExportJob, ExportProgress, DEFAULT_JPEG_QUALITY,
};
use crate::frames::FrameRef;
use crate::processing::CropRect;
use crate::source::{DecoderRegistry, DicomExporter, FileRegistry};

#[derive(Parser, Debug)]
#[command(name = "octslice", version, about = "Extract and export frames from OCT scan files")]
struct Cli {
    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List supported scan formats.
    Formats,
    /// List the frames of a scan file.
    Frames(FramesArgs),
    /// Export frames of one or more scan files.
    Export(ExportArgs),
    /// Export every frame of many files, one subfolder per file.
    Batch(BatchArgs),
}

#[derive(Parser, Debug)]
struct FramesArgs {
    /// Scan file.
    file: PathBuf,

    /// Print descriptors as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Output format: png, jpeg, tiff or dicom.
    #[arg(long, default_value = "png")]
    format: OutputFormat,

    /// Clockwise rotation: 0, 90, 180 or 270.
    #[arg(long, default_value_t = 0)]
    rotate: i32,

    /// Crop after rotation, as `top,left,width,height`.
    #[arg(long, value_parser = parse_crop)]
    crop: Option<CropRect>,

    /// What to do with existing files: overwrite, skip or unique.
    #[arg(long, default_value = "overwrite")]
    on_duplicate: DuplicatePolicy,

    /// Write a JSON metadata file next to every image.
    #[arg(long, default_value_t = false)]
    metadata: bool,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    quality: u8,
}

impl OutputArgs {
    fn job(&self, target_dir: &Path) -> ExportJob {
        let mut job = ExportJob::new(target_dir)
            .with_format(self.format)
            .with_rotation(self.rotate)
            .with_duplicate_policy(self.on_duplicate)
            .with_metadata(self.metadata)
            .with_jpeg_quality(self.quality);
        if let Some(crop) = self.crop {
            job = job.with_crop(crop);
        }
        job
    }
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// TOML job file. Output options are ignored when given.
    #[arg(long, conflicts_with_all = ["inputs", "out"])]
    job: Option<PathBuf>,

    /// Scan files.
    inputs: Vec<PathBuf>,

    /// Output directory.
    #[arg(long, short)]
    out: Option<PathBuf>,

    /// Frame ids to export from every input (default: all frames).
    #[arg(long = "frame")]
    frames: Vec<String>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Scan files or directories.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output root directory.
    #[arg(long, short)]
    out: PathBuf,

    /// Descend into subdirectories of input directories.
    #[arg(long, short, default_value_t = false)]
    recursive: bool,

    /// Write every file's frames directly into the output root.
    #[arg(long, default_value_t = false)]
    no_subfolders: bool,

    #[command(flatten)]
    output: OutputArgs,
}

/// Parse the process arguments and run the selected command.
pub fn run(decoders: DecoderRegistry, dicom: Option<Arc<dyn DicomExporter>>) -> anyhow::Result<()> {
    run_from(std::env::args_os(), decoders, dicom)
}

/// Like [`run`], with explicit arguments (the first is the program name).
pub fn run_from<I, T>(args: I, decoders: DecoderRegistry, dicom: Option<Arc<dyn DicomExporter>>) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    init_logging(cli.verbose);

    let commands = Commands { decoders, dicom };
    let name = match &cli.cmd {
        Command::Formats => "formats",
        Command::Frames(_) => "frames",
        Command::Export(_) => "export",
        Command::Batch(_) => "batch",
    };
    commands.dispatch(cli.cmd).with_context(|| format!("octslice {} failed", name))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    // A logger may already be installed by the host application.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).try_init();
}

fn parse_crop(value: &str) -> Result<CropRect, String> {
    let parts: Vec<u32> = value
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid crop '{}': {}", value, e))?;
    match parts.as_slice() {
        [top, left, width, height] => Ok(CropRect::new(*top, *left, *width, *height)),
        _ => Err(format!("crop needs 4 values (top,left,width,height), got '{}'", value)),
    }
}

struct Commands {
    decoders: DecoderRegistry,
    dicom: Option<Arc<dyn DicomExporter>>,
}

impl Commands {
    fn dispatch(&self, cmd: Command) -> OctResult<()> {
        match cmd {
            Command::Formats => self.formats(),
            Command::Frames(args) => self.frames(args),
            Command::Export(args) => self.export(args),
            Command::Batch(args) => self.batch(args),
        }
    }

    fn registry(&self) -> FileRegistry {
        FileRegistry::new(self.decoders.clone())
    }

    fn formats(&self) -> OctResult<()> {
        println!("Supported formats:");
        for format in FormatTag::ALL {
            let status = if self.decoders.supports(format) {
                "available"
            } else {
                "no decoder"
            };
            println!("  .{:<4} {:<22} {}", format.extension(), format.description(), status);
        }
        let dicom = if self.dicom.is_some() { "available" } else { "not configured" };
        println!("DICOM output: {}", dicom);
        Ok(())
    }

    fn frames(&self, args: FramesArgs) -> OctResult<()> {
        let mut registry = self.registry();
        let source = registry.import(&args.file)?;
        let frames = registry.frames(source.name()).unwrap_or_default();

        if args.json {
            println!("{}", serde_json::to_string_pretty(frames.as_slice())?);
            return Ok(());
        }

        println!("{} ({}): {} frames", source.name(), source.format().description(), frames.len());
        for frame in frames.iter() {
            println!("  {:<16} {:?} {}", frame.frame_id, frame.kind, frame.laterality);
        }
        Ok(())
    }

    fn export(&self, args: ExportArgs) -> OctResult<()> {
        let mut registry = self.registry();

        let job = match &args.job {
            Some(path) => {
                let job_file = JobFile::load(path)?;
                import_all(&mut registry, &job_file.source_paths())?;
                job_file.into_job(&registry)?
            }
            None => {
                let out = args
                    .out
                    .as_deref()
                    .ok_or_else(|| OctError::Other("--out is required without --job".to_string()))?;
                if args.inputs.is_empty() {
                    return Err(OctError::Other("no input files given".to_string()));
                }
                let names = import_all(&mut registry, &args.inputs)?;
                let mut job = args.output.job(out);
                for name in &names {
                    if args.frames.is_empty() {
                        let frames = registry.frames(name).unwrap_or_default();
                        job = job.with_frames(frames.iter().map(FrameRef::from));
                    } else {
                        job = job.with_frames(args.frames.iter().map(|id| FrameRef::new(name.as_str(), id.as_str())));
                    }
                }
                job
            }
        };

        if job.frames.is_empty() {
            return Err(OctError::Other("no frames to export".to_string()));
        }

        let mut engine = ExportEngine::new(&registry).with_listener(|event| {
            if let ExportProgress::FrameStarted { index, total, frame_id, .. } = event {
                log::debug!("[{}/{}] {}", index + 1, total, frame_id);
            }
        });
        if let Some(dicom) = &self.dicom {
            engine = engine.with_dicom_exporter(Arc::clone(dicom));
        }
        let result = engine.export(&job)?;

        println!("{}", result.summary);
        for message in &result.error_messages {
            eprintln!("  {}", message);
        }
        if result.error_count > 0 {
            return Err(OctError::Other(format!(
                "{} of {} frames failed",
                result.error_count,
                job.frames.len()
            )));
        }
        Ok(())
    }

    fn batch(&self, args: BatchArgs) -> OctResult<()> {
        let inputs = expand_inputs(&args.inputs, args.recursive);
        if inputs.is_empty() {
            return Err(OctError::Other("no supported scan files found".to_string()));
        }

        let options = BatchOptions::new(args.output.job(&args.out)).with_subfolders(!args.no_subfolders);
        let mut registry = self.registry();
        let mut exporter = BatchExporter::new(&mut registry);
        if let Some(dicom) = &self.dicom {
            exporter = exporter.with_dicom_exporter(Arc::clone(dicom));
        }
        let result = exporter.run(&inputs, &options, |index, total, path| {
            eprintln!("[{}/{}] {}", index + 1, total, path.display());
        });

        println!("{}", result.summary);
        for message in &result.error_messages {
            eprintln!("  {}", message);
        }
        if result.error_count > 0 {
            return Err(OctError::Other(format!(
                "{} of {} files failed",
                result.error_count,
                inputs.len()
            )));
        }
        Ok(())
    }
}

/// Import every path and return the registry names in order.
fn import_all(registry: &mut FileRegistry, paths: &[PathBuf]) -> OctResult<Vec<String>> {
    paths
        .iter()
        .map(|path| {
            let source = registry.import(path)?;
            Ok(source.name().to_string())
        })
        .collect()
}
