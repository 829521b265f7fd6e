use crate::{embed_with_config, EmbedConfig, EmbedOutcome, Payload, Result};
use crate::{BIBTEX_SUBTYPE, EMBEDDED_FILE_NAME};
use std::path::Path;

/// Turns a list of bibliography entries into the text that gets embedded.
///
/// Formatting preferences (field order, line endings, …) belong to the
/// implementation; the exporter treats the returned string as opaque.
pub trait EntrySerializer {
    type Entry;

    fn serialize(&self, entries: &[Self::Entry]) -> Result<String>;
}

// ── EmbeddedBibExporter ───────────────────────────────────────────────────────

/// Writes entries as BibTeX into the `main.bib` attachment of a PDF.
///
/// ```no_run
/// use embedbibpdf::{EmbeddedBibExporter, EntrySerializer, Result};
///
/// struct Raw;
///
/// impl EntrySerializer for Raw {
///     type Entry = String;
///     fn serialize(&self, entries: &[String]) -> Result<String> {
///         Ok(entries.concat())
///     }
/// }
///
/// let exporter = EmbeddedBibExporter::new(Raw);
/// exporter
///     .export("paper.pdf", &["@misc{a}\n".to_string()])
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddedBibExporter<S> {
    serializer: S,
    config: EmbedConfig,
}

impl<S: EntrySerializer> EmbeddedBibExporter<S> {
    /// Short identifier of this export format.
    pub const ID: &'static str = "bib";

    /// Name shown to users when picking an export format.
    pub const DISPLAY_NAME: &'static str = "Embedded BibTeX";

    /// Extension of the files this exporter writes into.
    pub const TARGET_EXTENSION: &'static str = "pdf";

    pub fn new(serializer: S) -> Self {
        Self::with_config(serializer, EmbedConfig::default())
    }

    pub fn with_config(serializer: S, config: EmbedConfig) -> Self {
        Self { serializer, config }
    }

    /// Serialize `entries` and embed the result into the PDF at `path`.
    ///
    /// Targets that are missing or not PDFs yield [`EmbedOutcome::Skipped`].
    pub fn export<P: AsRef<Path>>(&self, path: P, entries: &[S::Entry]) -> Result<EmbedOutcome> {
        let text = self.serializer.serialize(entries)?;
        embed_with_config(
            path,
            EMBEDDED_FILE_NAME,
            Payload::text(&text),
            BIBTEX_SUBTYPE,
            self.config.clone(),
        )
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }
}
