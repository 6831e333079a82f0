//! PDF serialization.
//!
//! Writes a document back out as a fresh, single-section file: objects in
//! ascending id order, a regenerated classic cross-reference table, and a
//! rebuilt trailer. Output is deterministic: dictionaries iterate in key
//! order and nothing time- or randomness-dependent is emitted, so writing
//! the same object graph twice produces identical bytes.

use crate::object::{Dict, Object, ObjectRef};
use std::collections::BTreeMap;
use std::io::Write;

const HEADER: &[u8] = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n";

/// Serialize a full document: header, objects, xref table, trailer.
pub fn write_document(objects: &BTreeMap<ObjectRef, Object>, trailer: &Dict) -> Vec<u8> {
    let mut out = Vec::with_capacity(1024);
    out.extend_from_slice(HEADER);

    let mut offsets: BTreeMap<u32, (usize, u16)> = BTreeMap::new();
    for (obj_ref, obj) in objects {
        offsets.insert(obj_ref.id, (out.len(), obj_ref.gen));
        serialize_indirect(&mut out, *obj_ref, obj);
    }

    let max_id = offsets.keys().next_back().copied().unwrap_or(0);
    let xref_offset = out.len();

    // Classic xref table covering 0..=max_id; ids without an object are
    // written as free entries
    let _ = writeln!(out, "xref");
    let _ = writeln!(out, "0 {}", max_id + 1);
    let _ = write!(out, "0000000000 65535 f\r\n");
    for id in 1..=max_id {
        match offsets.get(&id) {
            Some((offset, gen)) => {
                let _ = write!(out, "{:010} {:05} n\r\n", offset, gen);
            },
            None => {
                let _ = write!(out, "0000000000 65535 f\r\n");
            },
        }
    }

    let mut trailer = trailer.clone();
    trailer.insert("Size".to_string(), Object::Integer(max_id as i64 + 1));
    // Chain keys from a previous incremental life are meaningless in a
    // full rewrite
    trailer.remove("Prev");
    trailer.remove("XRefStm");

    let _ = write!(out, "trailer\n");
    serialize_object(&mut out, &Object::Dictionary(trailer));
    let _ = write!(out, "\nstartxref\n{}\n%%EOF\n", xref_offset);

    out
}

/// Serialize an indirect object definition: `id gen obj ... endobj`.
fn serialize_indirect(out: &mut Vec<u8>, obj_ref: ObjectRef, obj: &Object) {
    let _ = writeln!(out, "{} {} obj", obj_ref.id, obj_ref.gen);
    serialize_object(out, obj);
    let _ = write!(out, "\nendobj\n");
}

/// Serialize a single object to its byte representation.
pub fn serialize_object(out: &mut Vec<u8>, obj: &Object) {
    match obj {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Object::Integer(i) => {
            let _ = write!(out, "{}", i);
        },
        Object::Real(r) => write_real(out, *r),
        Object::String(s) => write_string(out, s),
        Object::Name(n) => write_name(out, n),
        Object::Array(arr) => {
            out.push(b'[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                serialize_object(out, item);
            }
            out.push(b']');
        },
        Object::Dictionary(dict) => write_dictionary(out, dict),
        Object::Stream { dict, data } => {
            let mut dict = dict.clone();
            dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
            write_dictionary(out, &dict);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(data);
            out.extend_from_slice(b"\nendstream");
        },
        Object::Reference(r) => {
            let _ = write!(out, "{} {} R", r.id, r.gen);
        },
    }
}

/// Write a real number with up to 5 decimal places, trailing zeros trimmed.
fn write_real(out: &mut Vec<u8>, value: f64) {
    if value.fract() == 0.0 {
        let _ = write!(out, "{}", value as i64);
    } else {
        let formatted = format!("{:.5}", value);
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        out.extend_from_slice(trimmed.as_bytes());
    }
}

/// Write a PDF string.
///
/// Printable ASCII uses literal `(...)` syntax with escaping; anything
/// binary uses hex `<...>` syntax.
fn write_string(out: &mut Vec<u8>, data: &[u8]) {
    let is_printable = data
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

    if is_printable {
        out.push(b'(');
        for &byte in data {
            match byte {
                b'(' => out.extend_from_slice(b"\\("),
                b')' => out.extend_from_slice(b"\\)"),
                b'\\' => out.extend_from_slice(b"\\\\"),
                b'\n' => out.extend_from_slice(b"\\n"),
                b'\r' => out.extend_from_slice(b"\\r"),
                b'\t' => out.extend_from_slice(b"\\t"),
                _ => out.push(byte),
            }
        }
        out.push(b')');
    } else {
        out.push(b'<');
        for byte in data {
            let _ = write!(out, "{:02X}", byte);
        }
        out.push(b'>');
    }
}

/// Write a PDF name, escaping irregular characters as `#xx`.
fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for byte in name.bytes() {
        match byte {
            b'!' | b'"' | b'$'..=b'&' | b'\''..=b'.' | b'0'..=b'9' | b';' | b'?' | b'@'
            | b'A'..=b'Z' | b'^'..=b'z' | b'|' | b'~' => out.push(byte),
            _ => {
                let _ = write!(out, "#{:02X}", byte);
            },
        }
    }
}

fn write_dictionary(out: &mut Vec<u8>, dict: &Dict) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict {
        out.push(b' ');
        write_name(out, key);
        out.push(b' ');
        serialize_object(out, value);
    }
    out.extend_from_slice(b" >>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn serialize_to_string(obj: &Object) -> String {
        let mut out = Vec::new();
        serialize_object(&mut out, obj);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_serialize_primitives() {
        assert_eq!(serialize_to_string(&Object::Null), "null");
        assert_eq!(serialize_to_string(&Object::Boolean(true)), "true");
        assert_eq!(serialize_to_string(&Object::Integer(-123)), "-123");
        assert_eq!(serialize_to_string(&Object::Real(1.0)), "1");
        assert_eq!(serialize_to_string(&Object::Real(0.5)), "0.5");
    }

    #[test]
    fn test_serialize_string_escaping() {
        assert_eq!(serialize_to_string(&Object::String(b"Hello".to_vec())), "(Hello)");
        assert_eq!(
            serialize_to_string(&Object::String(b"Test (parens)".to_vec())),
            "(Test \\(parens\\))"
        );
    }

    #[test]
    fn test_serialize_binary_string_as_hex() {
        assert_eq!(
            serialize_to_string(&Object::String(vec![0x00, 0xFF, 0x80])),
            "<00FF80>"
        );
    }

    #[test]
    fn test_serialize_name_with_special_chars() {
        assert_eq!(
            serialize_to_string(&Object::Name("Name With Space".to_string())),
            "/Name#20With#20Space"
        );
    }

    #[test]
    fn test_serialize_reference() {
        assert_eq!(
            serialize_to_string(&Object::Reference(ObjectRef::new(10, 0))),
            "10 0 R"
        );
    }

    #[test]
    fn test_serialize_dictionary_sorted() {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::Name("Page".to_string()));
        dict.insert("Count".to_string(), Object::Integer(1));
        // BTreeMap iterates in key order: Count before Type
        assert_eq!(
            serialize_to_string(&Object::Dictionary(dict)),
            "<< /Count 1 /Type /Page >>"
        );
    }

    #[test]
    fn test_serialize_stream_sets_length() {
        let stream = Object::Stream {
            dict: Dict::new(),
            data: bytes::Bytes::from_static(b"stream data"),
        };
        let s = serialize_to_string(&stream);
        assert!(s.contains("/Length 11"));
        assert!(s.contains("stream\nstream data\nendstream"));
    }

    #[test]
    fn test_write_document_roundtrip() {
        let mut objects = BTreeMap::new();
        let mut catalog = Dict::new();
        catalog.insert("Type".to_string(), Object::Name("Catalog".to_string()));
        catalog.insert("Pages".to_string(), Object::Reference(ObjectRef::new(2, 0)));
        objects.insert(ObjectRef::new(1, 0), Object::Dictionary(catalog));

        let mut pages = Dict::new();
        pages.insert("Type".to_string(), Object::Name("Pages".to_string()));
        pages.insert("Kids".to_string(), Object::Array(vec![]));
        pages.insert("Count".to_string(), Object::Integer(0));
        objects.insert(ObjectRef::new(2, 0), Object::Dictionary(pages));

        let mut trailer = Dict::new();
        trailer.insert("Root".to_string(), Object::Reference(ObjectRef::new(1, 0)));

        let bytes = write_document(&objects, &trailer);
        assert!(bytes.starts_with(b"%PDF-1.7"));
        assert!(bytes.ends_with(b"%%EOF\n"));

        // The written file must parse back via the xref path
        let parsed = parse_document(&bytes).unwrap();
        assert_eq!(parsed.objects.len(), 2);
        assert_eq!(parsed.objects.get(&ObjectRef::new(1, 0)), objects.get(&ObjectRef::new(1, 0)));
        assert_eq!(
            parsed.trailer.get("Root").unwrap().as_reference(),
            Some(ObjectRef::new(1, 0))
        );
    }

    #[test]
    fn test_write_document_deterministic() {
        let mut objects = BTreeMap::new();
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::Name("Catalog".to_string()));
        objects.insert(ObjectRef::new(1, 0), Object::Dictionary(dict));
        let mut trailer = Dict::new();
        trailer.insert("Root".to_string(), Object::Reference(ObjectRef::new(1, 0)));

        assert_eq!(write_document(&objects, &trailer), write_document(&objects, &trailer));
    }

    #[test]
    fn test_write_document_gap_gets_free_entry() {
        let mut objects = BTreeMap::new();
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::Name("Catalog".to_string()));
        objects.insert(ObjectRef::new(1, 0), Object::Dictionary(dict));
        objects.insert(ObjectRef::new(3, 0), Object::Integer(7));
        let mut trailer = Dict::new();
        trailer.insert("Root".to_string(), Object::Reference(ObjectRef::new(1, 0)));

        let bytes = write_document(&objects, &trailer);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("0 4\n")); // xref subsection covers ids 0..=3
        let parsed = parse_document(&bytes).unwrap();
        assert_eq!(parsed.objects.len(), 2);
    }
}
