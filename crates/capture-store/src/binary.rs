//! Magic-byte sniffing for binary payloads in bodies and WebSocket frames.
//!
//! Checked in order MessagePack, CBOR, protobuf, BSON. The single-byte markers overlap, so the
//! first hit wins and the confidence says how much the marker is worth.

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BinaryFormat {
    pub name: &'static str,
    pub confidence: f64,
    pub details: String,
}

impl BinaryFormat {
    fn new(name: &'static str, confidence: f64, details: impl Into<String>) -> Self {
        Self {
            name,
            confidence,
            details: details.into(),
        }
    }
}

/// `None` for empty input, text, or unrecognised bytes.
pub fn detect(data: &[u8]) -> Option<BinaryFormat> {
    if data.is_empty() || is_likely_text(data) {
        return None;
    }
    detect_msgpack(data)
        .or_else(|| detect_cbor(data))
        .or_else(|| detect_protobuf(data))
        .or_else(|| detect_bson(data))
}

/// More than 90% printable ASCII or tab/CR/LF.
pub fn is_likely_text(data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }
    let text = data
        .iter()
        .filter(|b| matches!(b, 0x20..=0x7e | b'\n' | b'\r' | b'\t'))
        .count();
    text as f64 / data.len() as f64 > 0.9
}

/// (minimum length, confidence, details); a minimum of 0 needs only the marker byte.
fn msgpack_marker(b: u8) -> Option<(usize, f64, &'static str)> {
    Some(match b {
        0xc0 => (0, 0.9, "nil"),
        0xc2 => (0, 0.9, "false"),
        0xc3 => (0, 0.9, "true"),
        0xc4..=0xc6 => (0, 0.85, "bin"),
        0xc7..=0xc9 => (0, 0.85, "ext"),
        0xca => (5, 0.85, "float32"),
        0xcb => (9, 0.85, "float64"),
        0xcc => (2, 0.8, "uint8"),
        0xcd => (3, 0.8, "uint16"),
        0xce => (5, 0.8, "uint32"),
        0xcf => (9, 0.8, "uint64"),
        0xd0 => (2, 0.8, "int8"),
        0xd1 => (3, 0.8, "int16"),
        0xd2 => (5, 0.8, "int32"),
        0xd3 => (9, 0.8, "int64"),
        0xd4..=0xd8 => (0, 0.85, "fixext"),
        0xd9 => (2, 0.8, "str8"),
        0xda => (3, 0.8, "str16"),
        0xdb => (5, 0.8, "str32"),
        0xdc => (3, 0.85, "array16"),
        0xdd => (5, 0.85, "array32"),
        0xde => (3, 0.85, "map16"),
        0xdf => (5, 0.85, "map32"),
        _ => return None,
    })
}

fn detect_msgpack(data: &[u8]) -> Option<BinaryFormat> {
    let b = *data.first()?;
    match b {
        0x80..=0x8f => return Some(BinaryFormat::new("messagepack", 0.85, "fixmap")),
        0x90..=0x9f => return Some(BinaryFormat::new("messagepack", 0.85, "fixarray")),
        0xa0..=0xbf => return Some(BinaryFormat::new("messagepack", 0.8, "fixstr")),
        _ => {}
    }
    let (min_len, confidence, details) = msgpack_marker(b)?;
    if min_len > 0 && data.len() < min_len {
        return None;
    }
    Some(BinaryFormat::new("messagepack", confidence, details))
}

fn cbor_simple(b: u8) -> Option<(usize, f64, &'static str)> {
    Some(match b {
        0xf4 => (0, 0.9, "false"),
        0xf5 => (0, 0.9, "true"),
        0xf6 => (0, 0.9, "null"),
        0xf7 => (0, 0.9, "undefined"),
        0xf9 => (3, 0.85, "float16"),
        0xfa => (5, 0.85, "float32"),
        0xfb => (9, 0.85, "float64"),
        0xff => (0, 0.8, "break"),
        _ => return None,
    })
}

fn detect_cbor(data: &[u8]) -> Option<BinaryFormat> {
    let b = *data.first()?;
    let major = b >> 5;
    let info = b & 0x1f;
    match major {
        4 | 5 if info <= 0x17 || info == 0x1f => {
            let details = if major == 5 { "map" } else { "array" };
            Some(BinaryFormat::new("cbor", 0.75, details))
        }
        6 => Some(BinaryFormat::new("cbor", 0.85, "tagged")),
        7 => {
            let (min_len, confidence, details) = cbor_simple(b)?;
            if min_len > 0 && data.len() < min_len {
                return None;
            }
            Some(BinaryFormat::new("cbor", confidence, details))
        }
        _ => None,
    }
}

fn detect_protobuf(data: &[u8]) -> Option<BinaryFormat> {
    if data.len() < 2 {
        return None;
    }
    let wire = data[0] & 0x07;
    let field = data[0] >> 3;
    if field == 0 || field > 15 {
        return None;
    }
    let detail = |kind: &str| format!("field {field}, {kind}");
    match wire {
        0 => {
            let terminated = data.iter().skip(1).take(9).any(|b| b & 0x80 == 0);
            (terminated || data.len() < 10).then(|| BinaryFormat::new("protobuf", 0.7, detail("varint")))
        }
        1 => (data.len() >= 9).then(|| BinaryFormat::new("protobuf", 0.65, detail("fixed64"))),
        2 => {
            if data[1] & 0x80 != 0 {
                return Some(BinaryFormat::new("protobuf", 0.6, detail("length-delimited")));
            }
            let len = data[1] as usize;
            (len > 0 && data.len() >= 2 + len)
                .then(|| BinaryFormat::new("protobuf", 0.7, detail("length-delimited")))
        }
        5 => (data.len() >= 5).then(|| BinaryFormat::new("protobuf", 0.65, detail("fixed32"))),
        _ => None,
    }
}

fn detect_bson(data: &[u8]) -> Option<BinaryFormat> {
    if data.len() < 5 {
        return None;
    }
    let doc_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if !(5..=16 * 1024 * 1024).contains(&doc_len) || doc_len < data.len() {
        return None;
    }
    if data.len() >= doc_len && data[doc_len - 1] != 0x00 {
        return None;
    }
    let element = data[4];
    matches!(element, 0x00..=0x13 | 0x7f | 0xff)
        .then(|| BinaryFormat::new("bson", 0.65, "document"))
}
