use crate::pdf_utils::{self, text_string};
use crate::{EmbedConfig, EmbedError, EmbeddedFile, EmbeddedFileMetadata, Payload, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

// ── Writing ───────────────────────────────────────────────────────────────────

/// Build the `/Type /EmbeddedFile` stream carrying `payload`.
///
/// ```text
/// <<
///   /Type     /EmbeddedFile
///   /Subtype  /text#2Fx-bibtex
///   /Params   << /Size 42 /ModDate (D:20240229123456Z) >>
///   /Length   42
/// >>
/// stream … endstream
/// ```
pub fn build_embedded_stream(
    payload: &Payload,
    mime_subtype: &str,
    config: &EmbedConfig,
) -> Result<Stream> {
    let mut params = dictionary! {
        "Size" => payload.declared_size(config.declared_size) as i64,
    };
    if config.stamp_modification_date {
        params.set("ModDate", Object::string_literal(pdf_utils::pdf_date_now()));
    }

    let dict = dictionary! {
        "Type" => "EmbeddedFile",
        "Subtype" => Object::Name(mime_subtype.as_bytes().to_vec()),
        "Params" => params,
    };

    let mut stream = Stream::new(dict, payload.as_bytes().to_vec());
    if config.compress {
        stream.compress()?;
    }
    Ok(stream)
}

/// A fresh file specification for `filename`; `/EF` is filled in by
/// [`attach_stream`].
pub fn new_file_spec(filename: &str) -> Dictionary {
    dictionary! {
        "Type" => "Filespec",
        "F" => text_string(filename),
        "UF" => text_string(filename),
    }
}

/// Point the file specification `spec_id` at `stream_id`, keeping every
/// other key it already has. Returns the objects it referenced before: an
/// indirect `/EF` dictionary first, then the streams.
pub fn attach_stream(
    document: &mut Document,
    spec_id: ObjectId,
    filename: &str,
    stream_id: ObjectId,
) -> Result<Vec<ObjectId>> {
    let superseded = previous_streams(document, spec_id);

    let spec = document
        .get_object_mut(spec_id)?
        .as_dict_mut()
        .map_err(|_| EmbedError::InvalidPdf("file specification is not a dictionary".into()))?;

    spec.set("Type", Object::Name(b"Filespec".to_vec()));
    spec.set("F", text_string(filename));
    spec.set("UF", text_string(filename));

    // /EF may be missing, inline, or (non-conforming) a reference; it is
    // rewritten inline either way.
    spec.set(
        "EF",
        dictionary! {
            "F" => stream_id,
            "UF" => stream_id,
        },
    );

    debug!(filename, ?stream_id, "embedded stream attached");
    Ok(superseded.into_iter().filter(|id| *id != stream_id).collect())
}

/// Objects the spec's `/EF` entry currently points at. An indirect `/EF`
/// dictionary comes first so that dropping it releases the streams after it.
fn previous_streams(document: &Document, spec_id: ObjectId) -> Vec<ObjectId> {
    let ef = document
        .get_object(spec_id)
        .and_then(Object::as_dict)
        .and_then(|spec| spec.get(b"EF"))
        .ok();

    let (ef_id, ef_dict) = match ef {
        Some(Object::Reference(id)) => (
            Some(*id),
            document.get_object(*id).and_then(Object::as_dict).ok(),
        ),
        Some(other) => (None, other.as_dict().ok()),
        None => (None, None),
    };

    let mut ids: Vec<ObjectId> = ef_dict
        .map(|d| d.iter().filter_map(|(_, v)| v.as_reference().ok()).collect())
        .unwrap_or_default();
    ids.sort();
    ids.dedup();

    if let Some(ef_id) = ef_id {
        ids.retain(|id| *id != ef_id);
        ids.insert(0, ef_id);
    }
    ids
}

/// Remove superseded objects that nothing else in the document references
/// any more, in the order given.
pub fn discard_unreferenced(document: &mut Document, candidates: &[ObjectId]) {
    for &id in candidates {
        let still_used = document
            .objects
            .iter()
            .any(|(owner, obj)| *owner != id && pdf_utils::references_object(obj, id))
            || pdf_utils::references_object(&Object::Dictionary(document.trailer.clone()), id);

        if !still_used && document.objects.remove(&id).is_some() {
            debug!(?id, "superseded object removed");
        }
    }
}

// ── Reading ───────────────────────────────────────────────────────────────────

/// Handles parsing of file specifications and extraction of embedded file data.
pub struct FileSpecParser<'a> {
    document: &'a Document,
}

impl<'a> FileSpecParser<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Error for a file specification that does not have the expected shape.
    fn spec_error(&self, name: &str, message: &str) -> EmbedError {
        EmbedError::InvalidPdf(format!("attachment '{name}': {message}"))
    }

    /// Get object from document and convert to dictionary with error context.
    fn get_dict_object(&self, obj_id: ObjectId, name: &str, context: &str) -> Result<&'a Dictionary> {
        self.document
            .get_object(obj_id)?
            .as_dict()
            .map_err(|_| self.spec_error(name, context))
    }

    /// Parse a file-specification object and return an [`EmbeddedFile`] with content and metadata.
    ///
    /// Layout of a file specification (PDF spec §7.11.3):
    ///
    /// ```text
    /// <<
    ///   /Type  /Filespec
    ///   /F     (ascii filename)
    ///   /UF    (unicode filename)          ← preferred
    ///   /Desc  (description)
    ///   /EF    <<
    ///              /F   <stream-ref>
    ///              /UF  <stream-ref>       ← preferred
    ///          >>
    /// >>
    /// ```
    pub fn parse_file_spec(&self, name: &str, spec_id: ObjectId) -> Result<EmbeddedFile> {
        let spec_dict = self.get_dict_object(spec_id, name, "file spec is not a dictionary")?;
        self.parse_spec_dict(name, spec_dict)
    }

    /// Same as [`Self::parse_file_spec`] for a specification stored inline
    /// in the name tree.
    pub fn parse_spec_dict(&self, name: &str, spec_dict: &'a Dictionary) -> Result<EmbeddedFile> {
        let ef_dict = self.resolve_ef_dictionary(spec_dict, name)?;
        let stream = self.embedded_stream(ef_dict, name)?;

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        Ok(EmbeddedFile {
            filename: Self::best_filename(spec_dict, name),
            data,
            metadata: Self::read_metadata(spec_dict, &stream.dict),
        })
    }

    /// Resolve the /EF dictionary, handling both inline and reference cases.
    fn resolve_ef_dictionary(&self, spec_dict: &'a Dictionary, name: &str) -> Result<&'a Dictionary> {
        let ef_val = spec_dict
            .get(b"EF")
            .map_err(|_| self.spec_error(name, "missing /EF entry"))?;

        match ef_val {
            Object::Reference(ef_id) => self.get_dict_object(*ef_id, name, "/EF reference is not a dict"),
            other => other
                .as_dict()
                .map_err(|_| self.spec_error(name, "/EF is not a dictionary")),
        }
    }

    /// The embedded stream, `/UF` preferred over `/F`.
    fn embedded_stream(&self, ef_dict: &'a Dictionary, name: &str) -> Result<&'a Stream> {
        let stream_id = ef_dict
            .get(b"UF")
            .or_else(|_| ef_dict.get(b"F"))
            .and_then(Object::as_reference)
            .map_err(|_| self.spec_error(name, "/EF has no stream reference"))?;

        self.document
            .get_object(stream_id)?
            .as_stream()
            .map_err(|_| self.spec_error(name, "embedded stream object is not a stream"))
    }

    /// Return the best available filename: Unicode (/UF) > ASCII (/F) > fallback.
    fn best_filename(spec_dict: &Dictionary, fallback: &str) -> String {
        for key in [b"UF" as &[u8], b"F"] {
            if let Some(name) = pdf_utils::extract_string_from_dict(spec_dict, key) {
                return name;
            }
        }
        fallback.into()
    }

    /// Metadata from the file specification and the stream's `/Subtype` and
    /// `/Params` entries.
    fn read_metadata(spec_dict: &Dictionary, stream_dict: &Dictionary) -> EmbeddedFileMetadata {
        let mut metadata = EmbeddedFileMetadata {
            description: pdf_utils::extract_string_from_dict(spec_dict, b"Desc"),
            ..Default::default()
        };

        // lopdf decodes #2F in names, so the subtype arrives as "text/x-bibtex"
        if let Ok(name_bytes) = stream_dict.get(b"Subtype").and_then(Object::as_name) {
            metadata.mime_type = Some(String::from_utf8_lossy(name_bytes).into_owned());
        }

        if let Ok(params) = stream_dict.get(b"Params").and_then(Object::as_dict) {
            metadata.modification_date = pdf_utils::extract_string_from_dict(params, b"ModDate");
            metadata.creation_date = pdf_utils::extract_string_from_dict(params, b"CreationDate");
            if let Ok(n) = params.get(b"Size").and_then(Object::as_i64) {
                metadata.size = usize::try_from(n).ok();
            }
        }

        metadata
    }
}
