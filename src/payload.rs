/// Unit used when declaring the size of an embedded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeclaredSize {
    /// Encoded byte length of the stored payload.
    #[default]
    ByteLength,

    /// Length of the text in UTF-16 code units, as older exporters wrote it.
    /// Differs from [`DeclaredSize::ByteLength`] for non-ASCII text; binary
    /// payloads always fall back to their byte length.
    TextLength,
}

// ── Payload ───────────────────────────────────────────────────────────────────

/// Bytes that end up inside the embedded stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    data: Vec<u8>,
    text_len: Option<usize>,
}

impl Payload {
    /// A UTF-8 text payload (e.g. a serialized bibliography).
    pub fn text(text: &str) -> Self {
        Self {
            data: text.as_bytes().to_vec(),
            text_len: Some(text.encode_utf16().count()),
        }
    }

    /// An opaque byte payload.
    pub fn bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            text_len: None,
        }
    }

    /// Returns the raw bytes that are written into the stream.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size recorded in `/Params/Size`.
    pub fn declared_size(&self, unit: DeclaredSize) -> usize {
        match (unit, self.text_len) {
            (DeclaredSize::TextLength, Some(n)) => n,
            _ => self.data.len(),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::text(&text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Self::bytes(data)
    }
}
