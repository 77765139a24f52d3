//! Octslice CLI - frame listing and export for OCT scan files.
//!
//! This build links no vendor decoders and no DICOM writer; it handles
//! DICOM sources only. Applications with decoders build their own binary
//! around [`octslice::cli::run`].

use octslice::source::DecoderRegistry;

fn main() -> anyhow::Result<()> {
    octslice::cli::run(DecoderRegistry::new(), None)
}
