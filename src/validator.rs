use crate::{EmbedError, Result};
use lopdf::Document;
use std::io::Read;
use std::path::Path;

// ── Target checks ─────────────────────────────────────────────────────────────

/// Every PDF file starts with this header (possibly after a few junk bytes,
/// which readers tolerate within the first kilobyte).
const PDF_HEADER: &[u8] = b"%PDF-";
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Returns `true` when `path` is an existing regular file with a `.pdf`
/// extension (any case) whose first kilobyte contains the `%PDF-` header.
///
/// Anything else is not an error: callers skip such targets silently.
pub fn is_supported_target<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();

    let has_pdf_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if !has_pdf_extension || !path.is_file() {
        return false;
    }

    let mut head = Vec::with_capacity(HEADER_SEARCH_WINDOW);
    let read = std::fs::File::open(path)
        .and_then(|f| f.take(HEADER_SEARCH_WINDOW as u64).read_to_end(&mut head));

    read.is_ok() && head.windows(PDF_HEADER.len()).any(|w| w == PDF_HEADER)
}

/// Precondition checks, run before any file is opened.
pub(crate) fn check_arguments(attachment_name: &str, mime_subtype: &str) -> Result<()> {
    if attachment_name.is_empty() {
        return Err(EmbedError::InvalidArgument(
            "attachment name must not be empty".into(),
        ));
    }
    if mime_subtype.is_empty() {
        return Err(EmbedError::InvalidArgument(
            "subtype must not be empty".into(),
        ));
    }
    Ok(())
}

/// Encrypted documents cannot be rewritten without dropping their security
/// handler, so they are treated as write protected.
///
/// `Document::load` decrypts files that open with an empty user password and
/// strips `/Encrypt` from the trailer; only `encryption_state` remembers it.
pub(crate) fn ensure_writable(document: &Document, path: &Path) -> Result<()> {
    if document.was_encrypted() || document.is_encrypted() {
        return Err(EmbedError::WriteProtected(path.display().to_string()));
    }
    Ok(())
}
