use crate::file_spec::{self, FileSpecParser};
use crate::name_tree::{NameTreeEditor, NameTreeReader, SpecEntry};
use crate::{EmbedConfig, EmbeddedFile, Payload, Result};
use lopdf::{Document, Object};
use std::path::Path;
use tracing::debug;

/// What [`AttachmentSynchronizer::embed`] did with the named entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedOutcome {
    /// No entry existed under the name; a new file specification was inserted.
    Created,
    /// An entry existed; its file specification now points at a new stream.
    Replaced,
    /// The target was not a PDF file and was left untouched.
    Skipped,
}

// ── AttachmentSynchronizer ────────────────────────────────────────────────────

/// Owns one parsed document for the duration of an embed call.
///
/// # Example
///
/// ```no_run
/// use embedbibpdf::{AttachmentSynchronizer, Payload, BIBTEX_SUBTYPE, EMBEDDED_FILE_NAME};
///
/// let mut sync = AttachmentSynchronizer::from_path("paper.pdf").unwrap();
/// let payload = Payload::text("@misc{a,\n  title = {A}\n}\n");
/// sync.embed(EMBEDDED_FILE_NAME, &payload, BIBTEX_SUBTYPE).unwrap();
/// sync.save("paper.pdf").unwrap();
/// ```
pub struct AttachmentSynchronizer {
    document: Document,
    config: EmbedConfig,
}

impl AttachmentSynchronizer {
    // ── Constructors ──────────────────────────────────────────────────────────

    /// Load a PDF from the file system.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_config(path, EmbedConfig::default())
    }

    /// Load a PDF from an in-memory byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self {
            document: Document::load_mem(data)?,
            config: EmbedConfig::default(),
        })
    }

    /// Load a PDF from the file system with a custom [`EmbedConfig`].
    pub fn with_config<P: AsRef<Path>>(path: P, config: EmbedConfig) -> Result<Self> {
        Ok(Self {
            document: Document::load(path)?,
            config,
        })
    }

    /// Wrap an already-parsed document.
    pub fn from_document(document: Document, config: EmbedConfig) -> Self {
        Self { document, config }
    }

    // ── Embedding ─────────────────────────────────────────────────────────────

    /// Insert or replace the entry `attachment_name` in the embedded-files
    /// name tree, creating `/Names` and `/EmbeddedFiles` on the way if the
    /// document lacks them.
    ///
    /// An existing file specification is mutated in place, so keys this
    /// method does not manage (`/Desc`, `/AFRelationship`, …) survive. The
    /// embedded stream itself is always replaced.
    pub fn embed(
        &mut self,
        attachment_name: &str,
        payload: &Payload,
        mime_subtype: &str,
    ) -> Result<EmbedOutcome> {
        crate::validator::check_arguments(attachment_name, mime_subtype)?;

        let mut editor = NameTreeEditor::new(&mut self.document);
        let chain = editor.resolve_chain()?;

        let existing = match editor.find_entry(chain.tree, attachment_name)? {
            Some(slot) => Some(editor.spec_id(slot)?),
            None => None,
        };

        let stream = file_spec::build_embedded_stream(payload, mime_subtype, &self.config)?;
        let stream_id = self.document.add_object(Object::Stream(stream));

        let (spec_id, outcome) = match existing {
            Some(id) => (id, EmbedOutcome::Replaced),
            None => {
                let id = self
                    .document
                    .add_object(file_spec::new_file_spec(attachment_name));
                (id, EmbedOutcome::Created)
            }
        };

        let superseded =
            file_spec::attach_stream(&mut self.document, spec_id, attachment_name, stream_id)?;

        let mut editor = NameTreeEditor::new(&mut self.document);
        if outcome == EmbedOutcome::Created {
            editor.insert_entry(chain.tree, attachment_name, spec_id)?;
        }
        editor.relink_chain(chain)?;

        file_spec::discard_unreferenced(&mut self.document, &superseded);

        debug!(
            attachment = attachment_name,
            ?spec_id,
            ?stream_id,
            bytes = payload.len(),
            ?outcome,
            "name tree entry written"
        );
        Ok(outcome)
    }

    // ── Serialization ─────────────────────────────────────────────────────────

    /// Serialize the whole document (full rewrite, not an incremental update).
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.document.save_to(&mut out)?;
        Ok(out)
    }

    /// Serialize the whole document and overwrite `path` with it.
    ///
    /// The document is serialized to memory first, so a serialization error
    /// leaves the file on disk untouched.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    // ── Reading back ──────────────────────────────────────────────────────────

    /// Names of every entry in the embedded-files name tree, in tree order.
    pub fn attachments(&self) -> Vec<String> {
        NameTreeReader::new(&self.document)
            .collect_file_specs()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    /// Decode the entry stored under `attachment_name`, if there is one.
    pub fn read_attachment(&self, attachment_name: &str) -> Result<Option<EmbeddedFile>> {
        let entry = NameTreeReader::new(&self.document)
            .collect_file_specs()
            .into_iter()
            .find(|(name, _)| name == attachment_name)
            .map(|(_, entry)| entry);

        let parser = FileSpecParser::new(&self.document);
        match entry {
            Some(SpecEntry::Indirect(id)) => parser.parse_file_spec(attachment_name, id).map(Some),
            Some(SpecEntry::Inline(dict)) => parser.parse_spec_dict(attachment_name, dict).map(Some),
            None => Ok(None),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// Returns a reference to the underlying [`lopdf::Document`].
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Returns a reference to the active [`EmbedConfig`].
    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    /// Consume the synchronizer and hand back the document.
    pub fn into_document(self) -> Document {
        self.document
    }
}

impl From<Document> for AttachmentSynchronizer {
    fn from(document: Document) -> Self {
        Self::from_document(document, EmbedConfig::default())
    }
}

impl std::fmt::Debug for AttachmentSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentSynchronizer")
            .field("objects", &self.document.objects.len())
            .field("config", &self.config)
            .finish()
    }
}
