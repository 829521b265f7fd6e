//! Shared PDF object helpers used across multiple modules.

use lopdf::{Object, ObjectId};

/// Extract a string value from a PDF dictionary for a given key.
///
/// Returns `Some(String)` if the key exists and contains a valid non-empty string,
/// `None` otherwise.
pub fn extract_string_from_dict(dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key)
        .ok()
        .and_then(|v| v.as_str().ok())
        .map(decode_text_string)
        .filter(|s| !s.is_empty())
}

/// Decode a PDF text string: UTF-16BE when it starts with a byte-order mark,
/// otherwise treated as UTF-8 (a superset of the ASCII part of PDFDocEncoding).
pub fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Encode `text` as a PDF text string object: a plain literal for ASCII,
/// UTF-16BE with a byte-order mark otherwise.
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, lopdf::StringFormat::Hexadecimal)
}

/// Returns `true` when `object` contains a reference to `target` anywhere
/// inside it (dictionary values, array items, stream dictionaries).
pub fn references_object(object: &Object, target: ObjectId) -> bool {
    match object {
        Object::Reference(id) => *id == target,
        Object::Array(items) => items.iter().any(|o| references_object(o, target)),
        Object::Dictionary(dict) => dict.iter().any(|(_, v)| references_object(v, target)),
        Object::Stream(stream) => stream
            .dict
            .iter()
            .any(|(_, v)| references_object(v, target)),
        _ => false,
    }
}

/// Current time in PDF date format (`D:YYYYMMDDHHmmSSZ`), UTC.
pub fn pdf_date_now() -> String {
    pdf_date(chrono::Utc::now())
}

fn pdf_date(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("D:%Y%m%d%H%M%SZ").to_string()
}
