//! # embedbibpdf
//!
//! A Rust library for keeping a BibTeX attachment embedded inside PDF documents.
//!
//! ## What this crate does
//!
//! 1. **Guard the target**: silently skips paths that are missing or are not PDF files.
//! 2. **Repair the name tree**: resolves (or creates) the catalog's `/Names`
//!    dictionary, its `/EmbeddedFiles` name tree and the tree's entry map.
//! 3. **Replace the attachment**: reuses the file specification stored under the
//!    attachment name (or creates one) and gives it a fresh embedded stream.
//! 4. **Rewrite the document**: serializes the whole object graph back to disk.
//!
//! ## Quick example
//!
//! ```no_run
//! use embedbibpdf::{embed, EmbedOutcome, BIBTEX_SUBTYPE, EMBEDDED_FILE_NAME};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bib = "@article{x,\n  title = {T}\n}\n";
//! match embed("paper.pdf", EMBEDDED_FILE_NAME, bib.as_bytes(), BIBTEX_SUBTYPE)? {
//!     EmbedOutcome::Skipped => println!("not a PDF, nothing to do"),
//!     outcome => println!("{EMBEDDED_FILE_NAME}: {outcome:?}"),
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use thiserror::Error;

mod embedded;
mod exporter;
mod file_spec;
mod name_tree;
mod payload;
mod pdf_utils;
mod synchronizer;
mod validator;

pub use embedded::{EmbeddedFile, EmbeddedFileMetadata};
pub use exporter::{EmbeddedBibExporter, EntrySerializer};
pub use payload::{DeclaredSize, Payload};
pub use synchronizer::{AttachmentSynchronizer, EmbedOutcome};
pub use validator::is_supported_target;

/// Name under which the bibliography is stored in the embedded-files name tree.
pub const EMBEDDED_FILE_NAME: &str = "main.bib";

/// Subtype written on the embedded stream for BibTeX payloads.
pub const BIBTEX_SUBTYPE: &str = "text/x-bibtex";

// ── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration for [`AttachmentSynchronizer`].
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    /// Unit used for the `/Params/Size` entry of the embedded stream.
    pub declared_size: DeclaredSize,

    /// Flate-compress the embedded stream. Readers get the same bytes back
    /// either way; compression only changes the stored representation.
    pub compress: bool,

    /// Write a `/Params/ModDate` entry with the current time.
    pub stamp_modification_date: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            declared_size: DeclaredSize::ByteLength,
            compress: false,
            stamp_modification_date: true,
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Every error that this crate can produce.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// A required argument was empty or otherwise unusable.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A filesystem I/O error occurred (e.g. when loading or saving a file).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The document parsed, but its catalog or name tree is malformed.
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// The document cannot be modified.
    #[error("File '{0}' is write protected")]
    WriteProtected(String),

    /// The entry serializer could not produce the attachment text.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// The underlying lopdf parser or writer returned an error.
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, EmbedError>;

// ── Entry points ─────────────────────────────────────────────────────────────

/// Insert or replace the attachment `attachment_name` inside the PDF at
/// `document_path`, then rewrite the file in place.
///
/// Returns [`EmbedOutcome::Skipped`] without touching anything when the path
/// does not exist or is not a PDF file.
pub fn embed<P: AsRef<Path>>(
    document_path: P,
    attachment_name: &str,
    payload: &[u8],
    mime_subtype: &str,
) -> Result<EmbedOutcome> {
    embed_with_config(
        document_path,
        attachment_name,
        Payload::bytes(payload.to_vec()),
        mime_subtype,
        EmbedConfig::default(),
    )
}

/// Same as [`embed`], with an explicit [`Payload`] and [`EmbedConfig`].
#[tracing::instrument(skip_all, fields(attachment = attachment_name, path = %document_path.as_ref().display()))]
pub fn embed_with_config<P: AsRef<Path>>(
    document_path: P,
    attachment_name: &str,
    payload: Payload,
    mime_subtype: &str,
    config: EmbedConfig,
) -> Result<EmbedOutcome> {
    let path = document_path.as_ref();
    validator::check_arguments(attachment_name, mime_subtype)?;

    if !is_supported_target(path) {
        tracing::warn!("target is not an existing PDF file, skipping");
        return Ok(EmbedOutcome::Skipped);
    }

    let mut sync = AttachmentSynchronizer::with_config(path, config)?;
    validator::ensure_writable(sync.document(), path)?;

    let outcome = sync.embed(attachment_name, &payload, mime_subtype)?;
    sync.save(path)?;

    tracing::info!(attachment = attachment_name, ?outcome, "attachment embedded");
    Ok(outcome)
}

/// In-memory variant: `(PDF bytes, name, payload) -> new PDF bytes`.
pub fn embed_bytes(
    pdf: &[u8],
    attachment_name: &str,
    payload: &[u8],
    mime_subtype: &str,
) -> Result<Vec<u8>> {
    validator::check_arguments(attachment_name, mime_subtype)?;

    let mut sync = AttachmentSynchronizer::from_bytes(pdf)?;
    validator::ensure_writable(sync.document(), Path::new("<memory>"))?;

    sync.embed(attachment_name, &Payload::bytes(payload.to_vec()), mime_subtype)?;
    sync.to_bytes()
}
