use std::path::Path;

// ── EmbeddedFile ─────────────────────────────────────────────────────────────

/// A file stored in a PDF's embedded-files name tree.
///
/// Returned by [`crate::AttachmentSynchronizer::read_attachment`].
#[derive(Debug, Clone)]
pub struct EmbeddedFile {
    /// The filename as declared in the PDF file specification object
    /// (Unicode name preferred over ASCII name when both are present).
    pub filename: String,

    /// The raw, decompressed file content.
    pub data: Vec<u8>,

    /// Metadata read from the file specification and the embedded stream.
    pub metadata: EmbeddedFileMetadata,
}

impl EmbeddedFile {
    /// The content as UTF-8 text, or `None` for binary payloads.
    ///
    /// ```
    /// # use embedbibpdf::{EmbeddedFile, EmbeddedFileMetadata};
    /// # let file = EmbeddedFile { filename: "main.bib".into(), data: b"@misc{a}".to_vec(), metadata: Default::default() };
    /// assert_eq!(file.text(), Some("@misc{a}"));
    /// ```
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Returns the file extension, or `None` if the filename has no extension.
    ///
    /// ```
    /// # use embedbibpdf::{EmbeddedFile, EmbeddedFileMetadata};
    /// # let file = EmbeddedFile { filename: "main.bib".into(), data: vec![], metadata: Default::default() };
    /// assert_eq!(file.extension(), Some("bib"));
    /// ```
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
    }
}

// ── EmbeddedFileMetadata ──────────────────────────────────────────────────────

/// Metadata associated with an [`EmbeddedFile`], sourced from the PDF file
/// specification dictionary and the embedded stream's dictionary.
///
/// All fields are optional: a conforming PDF need not populate them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedFileMetadata {
    /// Subtype of the embedded stream (e.g. `"text/x-bibtex"`).
    pub mime_type: Option<String>,

    /// Human-readable description from the `/Desc` entry.
    pub description: Option<String>,

    /// Modification date from `/Params/ModDate` in PDF date format.
    pub modification_date: Option<String>,

    /// Creation date from `/Params/CreationDate`.
    pub creation_date: Option<String>,

    /// Declared file size from `/Params/Size`.
    pub size: Option<usize>,
}

impl EmbeddedFileMetadata {
    /// Returns `true` when the declared subtype matches `mime_type`
    /// (case-insensitive).
    pub fn has_mime_type(&self, mime_type: &str) -> bool {
        self.mime_type
            .as_deref()
            .map(|m| m.eq_ignore_ascii_case(mime_type))
            .unwrap_or(false)
    }
}
