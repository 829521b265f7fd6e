// Integration tests for embedbibpdf.
//
// Fixture PDFs are built in memory with lopdf and written into a temporary
// directory, so no binary fixtures are needed.

use embedbibpdf::{
    embed, embed_bytes, embed_with_config, AttachmentSynchronizer, DeclaredSize, EmbedConfig,
    EmbedError, EmbedOutcome, EmbeddedBibExporter, EntrySerializer, Payload, BIBTEX_SUBTYPE,
    EMBEDDED_FILE_NAME,
};
use lopdf::{
    dictionary, Dictionary, Document, EncryptionState, EncryptionVersion, Object, ObjectId,
    Permissions, Stream,
};
use std::path::{Path, PathBuf};

const BIB: &str = "@article{x,\n  title = {T}\n}\n";
const PAGE_CONTENT: &[u8] = b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET";

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// A one-page document with an /Info title and no /Names dictionary.
fn sample_document() -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let content_id = doc.add_object(Stream::new(Dictionary::new(), PAGE_CONTENT.to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::from(page_id)],
            "Count" => 1i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Sample"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc
}

/// Add a file specification + stream for `name` and return the spec id.
fn add_file_spec(doc: &mut Document, name: &str, data: &[u8], desc: Option<&str>) -> ObjectId {
    let stream_id = doc.add_object(Stream::new(
        dictionary! { "Type" => "EmbeddedFile" },
        data.to_vec(),
    ));
    let mut spec = dictionary! {
        "Type" => "Filespec",
        "F" => Object::string_literal(name),
        "EF" => dictionary! { "F" => stream_id },
    };
    if let Some(desc) = desc {
        spec.set("Desc", Object::string_literal(desc));
    }
    doc.add_object(spec)
}

/// Install `/Names << /EmbeddedFiles << /Names [...] >> >>` with the given entries.
fn install_tree(doc: &mut Document, entries: &[(&str, ObjectId)]) {
    let mut names = Vec::new();
    for (name, id) in entries {
        names.push(Object::string_literal(*name));
        names.push(Object::Reference(*id));
    }
    let tree_id = doc.add_object(dictionary! { "Names" => names });
    let names_id = doc.add_object(dictionary! { "EmbeddedFiles" => tree_id });

    let root = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    doc.get_object_mut(root)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("Names", names_id);
}

/// `sample_document` encrypted with an owner password and an empty user
/// password, so lopdf opens it without prompting.
fn encrypted_document() -> Document {
    let mut doc = sample_document();
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::string_literal("ABC"),
            Object::string_literal("DEF"),
        ]),
    );
    let state = EncryptionState::try_from(EncryptionVersion::V2 {
        document: &doc,
        owner_password: "owner",
        user_password: "",
        key_length: 40,
        permissions: Permissions::empty(),
    })
    .unwrap();
    doc.encrypt(&state).unwrap();
    doc
}

fn write_pdf(dir: &Path, name: &str, mut doc: Document) -> PathBuf {
    let path = dir.join(name);
    doc.save(&path).unwrap();
    path
}

fn open(path: &Path) -> AttachmentSynchronizer {
    AttachmentSynchronizer::from_path(path).unwrap()
}

fn bib_text(path: &Path) -> String {
    let file = open(path).read_attachment(EMBEDDED_FILE_NAME).unwrap().unwrap();
    String::from_utf8(file.data).unwrap()
}

fn embedded_stream_count(doc: &Document) -> usize {
    doc.objects
        .values()
        .filter(|o| {
            o.as_stream()
                .ok()
                .and_then(|s| s.dict.get(b"Type").ok())
                .and_then(|t| t.as_name().ok())
                == Some(b"EmbeddedFile".as_slice())
        })
        .count()
}

// ── Creation and replacement ──────────────────────────────────────────────────

#[test]
fn creates_full_chain_when_names_dictionary_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "paper.pdf", sample_document());

    let outcome = embed(&path, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE).unwrap();
    assert_eq!(outcome, EmbedOutcome::Created);

    let sync = open(&path);
    let catalog = sync.document().catalog().unwrap();
    let names_id = catalog.get(b"Names").unwrap().as_reference().unwrap();
    let names = sync.document().get_object(names_id).unwrap().as_dict().unwrap();
    assert!(names.get(b"EmbeddedFiles").unwrap().as_reference().is_ok());

    assert_eq!(sync.attachments(), [EMBEDDED_FILE_NAME]);
    assert_eq!(bib_text(&path), BIB);
}

#[test]
fn creates_tree_when_only_names_dictionary_exists() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = sample_document();
    let names_id = doc.add_object(dictionary! { "Dests" => Dictionary::new() });
    let root = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    doc.get_object_mut(root)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("Names", names_id);
    let path = write_pdf(dir.path(), "paper.pdf", doc);

    embed(&path, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE).unwrap();

    let sync = open(&path);
    let names = sync.document().get_object(names_id).unwrap().as_dict().unwrap();
    assert!(names.has(b"Dests"));
    assert!(names.has(b"EmbeddedFiles"));
    assert_eq!(bib_text(&path), BIB);
}

#[test]
fn embedding_twice_keeps_a_single_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "paper.pdf", sample_document());

    assert_eq!(
        embed(&path, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE).unwrap(),
        EmbedOutcome::Created
    );
    assert_eq!(
        embed(&path, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE).unwrap(),
        EmbedOutcome::Replaced
    );

    let sync = open(&path);
    assert_eq!(sync.attachments(), [EMBEDDED_FILE_NAME]);
    assert_eq!(embedded_stream_count(sync.document()), 1);
    assert_eq!(bib_text(&path), BIB);
}

#[test]
fn replaces_existing_payload_and_keeps_custom_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = sample_document();
    let spec = add_file_spec(
        &mut doc,
        EMBEDDED_FILE_NAME,
        b"@misc{old}\n",
        Some("library export"),
    );
    install_tree(&mut doc, &[(EMBEDDED_FILE_NAME, spec)]);
    let path = write_pdf(dir.path(), "paper.pdf", doc);

    let outcome = embed(&path, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE).unwrap();
    assert_eq!(outcome, EmbedOutcome::Replaced);

    let sync = open(&path);
    assert_eq!(sync.attachments(), [EMBEDDED_FILE_NAME]);
    assert_eq!(embedded_stream_count(sync.document()), 1);

    let file = sync.read_attachment(EMBEDDED_FILE_NAME).unwrap().unwrap();
    assert_eq!(file.data, BIB.as_bytes());
    assert_eq!(file.metadata.description.as_deref(), Some("library export"));

    // The original file specification object now points at the new stream.
    let spec_dict = sync.document().get_object(spec).unwrap().as_dict().unwrap();
    let stream_id = spec_dict
        .get(b"EF")
        .and_then(Object::as_dict)
        .and_then(|ef| ef.get(b"F"))
        .and_then(Object::as_reference)
        .unwrap();
    let stream = sync.document().get_object(stream_id).unwrap().as_stream().unwrap();
    assert_eq!(stream.content, BIB.as_bytes());
}

#[test]
fn replacing_drops_indirect_ef_dictionary_and_old_stream() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = sample_document();
    let old_stream = doc.add_object(Stream::new(
        dictionary! { "Type" => "EmbeddedFile" },
        b"@misc{old}\n".to_vec(),
    ));
    let old_ef = doc.add_object(dictionary! { "F" => old_stream, "UF" => old_stream });
    let spec = doc.add_object(dictionary! {
        "Type" => "Filespec",
        "F" => Object::string_literal(EMBEDDED_FILE_NAME),
        "EF" => old_ef,
    });
    install_tree(&mut doc, &[(EMBEDDED_FILE_NAME, spec)]);
    let path = write_pdf(dir.path(), "paper.pdf", doc);

    let outcome = embed(&path, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE).unwrap();
    assert_eq!(outcome, EmbedOutcome::Replaced);

    let sync = open(&path);
    assert!(!sync.document().objects.contains_key(&old_ef));
    assert!(!sync.document().objects.contains_key(&old_stream));
    assert_eq!(embedded_stream_count(sync.document()), 1);
    assert_eq!(bib_text(&path), BIB);
}

#[test]
fn inline_file_specs_are_listed_and_readable() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = sample_document();
    let stream_id = doc.add_object(Stream::new(
        dictionary! { "Type" => "EmbeddedFile" },
        b"inline notes".to_vec(),
    ));
    let tree_id = doc.add_object(dictionary! {
        "Names" => vec![
            Object::string_literal("notes.txt"),
            Object::Dictionary(dictionary! {
                "Type" => "Filespec",
                "F" => Object::string_literal("notes.txt"),
                "EF" => dictionary! { "F" => stream_id },
            }),
        ],
    });
    let names_id = doc.add_object(dictionary! { "EmbeddedFiles" => tree_id });
    let root = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    doc.get_object_mut(root)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("Names", names_id);
    let path = write_pdf(dir.path(), "paper.pdf", doc);

    let sync = open(&path);
    assert_eq!(sync.attachments(), ["notes.txt"]);
    let notes = sync.read_attachment("notes.txt").unwrap().unwrap();
    assert_eq!(notes.data, b"inline notes");

    embed(&path, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE).unwrap();

    let sync = open(&path);
    assert_eq!(sync.attachments(), [EMBEDDED_FILE_NAME, "notes.txt"]);
    assert_eq!(bib_text(&path), BIB);
}

#[test]
fn round_trip_is_byte_exact_and_carries_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "paper.pdf", sample_document());

    embed(&path, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE).unwrap();

    let file = open(&path).read_attachment(EMBEDDED_FILE_NAME).unwrap().unwrap();
    assert_eq!(file.data, BIB.as_bytes());
    assert_eq!(file.filename, EMBEDDED_FILE_NAME);
    assert!(file.metadata.has_mime_type(BIBTEX_SUBTYPE));
    assert_eq!(file.metadata.size, Some(BIB.len()));
    assert!(file.metadata.modification_date.is_some());
}

#[test]
fn compressed_stream_reads_back_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "paper.pdf", sample_document());
    let config = EmbedConfig {
        compress: true,
        ..Default::default()
    };

    embed_with_config(&path, EMBEDDED_FILE_NAME, Payload::text(BIB), BIBTEX_SUBTYPE, config)
        .unwrap();

    assert_eq!(bib_text(&path), BIB);
}

// ── Declared size ─────────────────────────────────────────────────────────────

#[test]
fn declared_size_defaults_to_byte_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "paper.pdf", sample_document());
    let text = "@book{m,\n  author = {Müller}\n}\n";

    embed_with_config(
        &path,
        EMBEDDED_FILE_NAME,
        Payload::text(text),
        BIBTEX_SUBTYPE,
        EmbedConfig::default(),
    )
    .unwrap();

    let file = open(&path).read_attachment(EMBEDDED_FILE_NAME).unwrap().unwrap();
    assert_eq!(file.metadata.size, Some(text.len()));
    assert_eq!(file.text(), Some(text));
}

#[test]
fn text_length_mode_counts_utf16_units() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "paper.pdf", sample_document());
    let text = "@book{m,\n  author = {Müller}\n}\n";
    let config = EmbedConfig {
        declared_size: DeclaredSize::TextLength,
        ..Default::default()
    };

    embed_with_config(&path, EMBEDDED_FILE_NAME, Payload::text(text), BIBTEX_SUBTYPE, config)
        .unwrap();

    let file = open(&path).read_attachment(EMBEDDED_FILE_NAME).unwrap().unwrap();
    assert_eq!(file.metadata.size, Some(text.len() - 1));
    assert_eq!(file.data, text.as_bytes());
}

// ── Surroundings ──────────────────────────────────────────────────────────────

#[test]
fn other_pages_and_attachments_are_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = sample_document();
    let invoice = add_file_spec(&mut doc, "invoice.xml", b"<Invoice/>", Some("ZUGFeRD"));
    let zeta = add_file_spec(&mut doc, "zeta.txt", b"last", None);
    install_tree(&mut doc, &[("invoice.xml", invoice), ("zeta.txt", zeta)]);
    let path = write_pdf(dir.path(), "paper.pdf", doc);

    let before = open(&path);
    embed(&path, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE).unwrap();
    let after = open(&path);

    assert_eq!(
        after.attachments(),
        ["invoice.xml", EMBEDDED_FILE_NAME, "zeta.txt"]
    );
    for name in ["invoice.xml", "zeta.txt"] {
        let old = before.read_attachment(name).unwrap().unwrap();
        let new = after.read_attachment(name).unwrap().unwrap();
        assert_eq!(old.data, new.data, "{name} content changed");
        assert_eq!(old.metadata, new.metadata, "{name} metadata changed");
    }

    let pages = after.document().get_pages();
    assert_eq!(pages.len(), 1);
    let page_id = *pages.values().next().unwrap();
    let content = after.document().get_page_content(page_id).unwrap();
    assert_eq!(content, PAGE_CONTENT);

    let info_id = after.document().trailer.get(b"Info").unwrap().as_reference().unwrap();
    let info = after.document().get_object(info_id).unwrap().as_dict().unwrap();
    assert_eq!(info.get(b"Title").unwrap().as_str().unwrap(), b"Sample");
}

// ── Skipped targets and errors ────────────────────────────────────────────────

#[test]
fn non_pdf_target_is_left_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"just some notes").unwrap();

    let outcome = embed(&path, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE).unwrap();

    assert_eq!(outcome, EmbedOutcome::Skipped);
    assert_eq!(std::fs::read(&path).unwrap(), b"just some notes");
}

#[test]
fn missing_target_is_skipped_and_not_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.pdf");

    let outcome = embed(&path, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE).unwrap();

    assert_eq!(outcome, EmbedOutcome::Skipped);
    assert!(!path.exists());
}

#[test]
fn empty_attachment_name_is_rejected_before_io() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "paper.pdf", sample_document());
    let original = std::fs::read(&path).unwrap();

    let err = embed(&path, "", BIB.as_bytes(), BIBTEX_SUBTYPE).unwrap_err();

    assert!(matches!(err, EmbedError::InvalidArgument(_)));
    assert_eq!(std::fs::read(&path).unwrap(), original);
}

#[test]
fn unparseable_pdf_fails_without_rewriting() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.pdf");
    std::fs::write(&path, b"%PDF-1.7\nthis is not a pdf body").unwrap();

    assert!(embed(&path, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE).is_err());
    assert_eq!(
        std::fs::read(&path).unwrap(),
        b"%PDF-1.7\nthis is not a pdf body"
    );
}

#[test]
fn encrypted_pdf_is_write_protected_and_left_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "locked.pdf", encrypted_document());
    let original = std::fs::read(&path).unwrap();

    let err = embed(&path, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE).unwrap_err();

    match err {
        EmbedError::WriteProtected(name) => assert!(name.ends_with("locked.pdf")),
        other => panic!("expected WriteProtected, got {other:?}"),
    }
    assert_eq!(std::fs::read(&path).unwrap(), original);
}

#[test]
fn embed_bytes_rejects_encrypted_document() {
    let mut doc = encrypted_document();
    let mut original = Vec::new();
    doc.save_to(&mut original).unwrap();

    let err = embed_bytes(&original, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE)
        .unwrap_err();
    assert!(matches!(err, EmbedError::WriteProtected(_)));
}

#[test]
fn error_display_is_non_empty() {
    let errors: &[EmbedError] = &[
        EmbedError::InvalidArgument("name".into()),
        EmbedError::InvalidPdf("test".into()),
        EmbedError::WriteProtected("paper.pdf".into()),
        EmbedError::Serialization("reason".into()),
    ];
    for e in errors {
        assert!(!e.to_string().is_empty(), "empty display for {e:?}");
    }
    assert_eq!(
        EmbedError::WriteProtected("paper.pdf".into()).to_string(),
        "File 'paper.pdf' is write protected"
    );
}

// ── In-memory transform ───────────────────────────────────────────────────────

#[test]
fn embed_bytes_returns_updated_document() {
    let mut doc = sample_document();
    let mut original = Vec::new();
    doc.save_to(&mut original).unwrap();

    let updated = embed_bytes(&original, EMBEDDED_FILE_NAME, BIB.as_bytes(), BIBTEX_SUBTYPE)
        .unwrap();

    let sync = AttachmentSynchronizer::from_bytes(&updated).unwrap();
    let file = sync.read_attachment(EMBEDDED_FILE_NAME).unwrap().unwrap();
    assert_eq!(file.data, BIB.as_bytes());
}

#[test]
fn from_bytes_rejects_non_pdf() {
    assert!(AttachmentSynchronizer::from_bytes(b"not a pdf").is_err());
}

// ── Exporter ──────────────────────────────────────────────────────────────────

struct Concat;

impl EntrySerializer for Concat {
    type Entry = &'static str;

    fn serialize(&self, entries: &[&'static str]) -> embedbibpdf::Result<String> {
        Ok(entries.concat())
    }
}

struct Failing;

impl EntrySerializer for Failing {
    type Entry = ();

    fn serialize(&self, _: &[()]) -> embedbibpdf::Result<String> {
        Err(EmbedError::Serialization("unknown entry type".into()))
    }
}

#[test]
fn exporter_embeds_serialized_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "paper.pdf", sample_document());
    let exporter = EmbeddedBibExporter::new(Concat);

    let outcome = exporter
        .export(&path, &["@misc{a}\n", "@misc{b}\n"])
        .unwrap();

    assert_eq!(outcome, EmbedOutcome::Created);
    assert_eq!(bib_text(&path), "@misc{a}\n@misc{b}\n");
    assert_eq!(EmbeddedBibExporter::<Concat>::ID, "bib");
    assert_eq!(EmbeddedBibExporter::<Concat>::DISPLAY_NAME, "Embedded BibTeX");
}

#[test]
fn exporter_propagates_serializer_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "paper.pdf", sample_document());
    let original = std::fs::read(&path).unwrap();

    let err = EmbeddedBibExporter::new(Failing).export(&path, &[()]).unwrap_err();

    assert!(matches!(err, EmbedError::Serialization(_)));
    assert_eq!(std::fs::read(&path).unwrap(), original);
}
