//! PDF document parsing.
//!
//! Two-stage strategy: follow the classic cross-reference table chain from
//! `startxref`, and if that fails (xref streams, truncated tables, damaged
//! offsets) fall back to reconstructing the object table by scanning the
//! whole file for `N G obj` markers. The fallback is an explicit branch,
//! not a silent retry, and is logged.

use crate::error::{Error, Result};
use crate::lexer::{self, Token};
use crate::object::{Dict, Object, ObjectRef};
use std::collections::{BTreeMap, HashSet};

/// Maximum nesting depth for arrays/dictionaries.
const MAX_DEPTH: u32 = 100;

/// A fully parsed document: resolved object table plus merged trailer.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    /// All indirect objects, keyed by reference
    pub objects: BTreeMap<ObjectRef, Object>,
    /// Trailer dictionary (newest entries win across incremental updates)
    pub trailer: Dict,
}

/// Parse a complete PDF from raw bytes.
pub fn parse_document(data: &[u8]) -> Result<ParsedDocument> {
    let body = locate_header(data)?;

    match parse_via_xref(body) {
        Ok(doc) => Ok(doc),
        Err(e) => {
            log::debug!("xref parse failed ({}), reconstructing by full scan", e);
            parse_via_scan(body)
        },
    }
}

/// Find the `%PDF-` header and return the slice starting at it.
///
/// Some files carry a few bytes of junk before the header; the spec-level
/// tolerance is 1024 bytes.
fn locate_header(data: &[u8]) -> Result<&[u8]> {
    let window = &data[..data.len().min(1024)];
    match find_first(window, b"%PDF-") {
        Some(pos) => Ok(&data[pos..]),
        None => {
            let preview = String::from_utf8_lossy(&data[..data.len().min(8)]).into_owned();
            Err(Error::InvalidHeader(preview))
        },
    }
}

// ---------------------------------------------------------------------------
// Token cursor
// ---------------------------------------------------------------------------

/// Byte cursor yielding lexer tokens with save/restore for lookahead.
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn save(&self) -> usize {
        self.pos
    }

    fn restore(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn parse_error(&self, reason: impl Into<String>) -> Error {
        Error::ParseError {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    /// Read the next token, advancing the cursor.
    pub(crate) fn next_token(&mut self) -> Result<Token<'a>> {
        let input = &self.data[self.pos.min(self.data.len())..];
        match lexer::token(input) {
            Ok((rest, tok)) => {
                self.pos += input.len() - rest.len();
                Ok(tok)
            },
            Err(_) => {
                if input.iter().all(|b| b.is_ascii_whitespace() || *b == 0) {
                    Err(Error::UnexpectedEof)
                } else {
                    Err(self.parse_error("unrecognized token"))
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Object parsing
// ---------------------------------------------------------------------------

/// Parse one value (possibly a reference) starting at the cursor.
fn parse_value(cursor: &mut Cursor<'_>, depth: u32) -> Result<Object> {
    let token = cursor.next_token()?;
    parse_value_from_token(cursor, token, depth)
}

fn parse_value_from_token(cursor: &mut Cursor<'_>, token: Token<'_>, depth: u32) -> Result<Object> {
    if depth > MAX_DEPTH {
        return Err(cursor.parse_error("nesting too deep"));
    }

    match token {
        Token::Null => Ok(Object::Null),
        Token::True => Ok(Object::Boolean(true)),
        Token::False => Ok(Object::Boolean(false)),
        Token::Real(r) => Ok(Object::Real(r)),
        Token::Name(n) => Ok(Object::Name(n)),
        Token::LiteralString(raw) => Ok(Object::String(lexer::decode_literal_string(raw))),
        Token::HexString(raw) => Ok(Object::String(lexer::decode_hex_string(raw))),
        Token::Integer(i) => {
            // Lookahead for "gen R" making this a reference
            let mark = cursor.save();
            if let Ok(Token::Integer(gen)) = cursor.next_token() {
                if matches!(cursor.next_token(), Ok(Token::R)) {
                    if i >= 0 && gen >= 0 && i <= u32::MAX as i64 && gen <= u16::MAX as i64 {
                        return Ok(Object::Reference(ObjectRef::new(i as u32, gen as u16)));
                    }
                }
            }
            cursor.restore(mark);
            Ok(Object::Integer(i))
        },
        Token::ArrayStart => {
            let mut items = Vec::new();
            loop {
                let tok = cursor.next_token()?;
                if tok == Token::ArrayEnd {
                    break;
                }
                items.push(parse_value_from_token(cursor, tok, depth + 1)?);
            }
            Ok(Object::Array(items))
        },
        Token::DictStart => {
            let dict = parse_dict_body(cursor, depth)?;

            // A dictionary followed by the "stream" keyword is a stream object
            let mark = cursor.save();
            match cursor.next_token() {
                Ok(Token::StreamStart) => {
                    let data = read_stream_data(cursor, &dict)?;
                    Ok(Object::Stream {
                        dict,
                        data: bytes::Bytes::from(data),
                    })
                },
                _ => {
                    cursor.restore(mark);
                    Ok(Object::Dictionary(dict))
                },
            }
        },
        other => Err(cursor.parse_error(format!("unexpected token {:?}", other))),
    }
}

/// Parse dictionary entries up to and including the closing `>>`.
fn parse_dict_body(cursor: &mut Cursor<'_>, depth: u32) -> Result<Dict> {
    let mut dict = Dict::new();
    loop {
        match cursor.next_token()? {
            Token::DictEnd => break,
            Token::Name(key) => {
                let value = parse_value(cursor, depth + 1)?;
                dict.insert(key, value);
            },
            other => {
                return Err(cursor.parse_error(format!("expected name key, found {:?}", other)));
            },
        }
    }
    Ok(dict)
}

/// Read raw stream data following a `stream` keyword.
///
/// Prefers the declared /Length when it is a direct integer that actually
/// lands on an `endstream`; otherwise recovers by searching for the
/// `endstream` keyword, which covers files whose Length is indirect or
/// wrong.
fn read_stream_data(cursor: &mut Cursor<'_>, dict: &Dict) -> Result<Vec<u8>> {
    // Exactly one EOL after the "stream" keyword belongs to the syntax
    if cursor.pos < cursor.data.len() && cursor.data[cursor.pos] == b'\r' {
        cursor.pos += 1;
    }
    if cursor.pos < cursor.data.len() && cursor.data[cursor.pos] == b'\n' {
        cursor.pos += 1;
    }
    let start = cursor.pos;

    let declared = dict.get("Length").and_then(|o| o.as_integer());
    if let Some(len) = declared {
        let len = len.max(0) as usize;
        let end = start.saturating_add(len);
        if end <= cursor.data.len() && endstream_follows(&cursor.data[end..]) {
            cursor.pos = end;
            consume_endstream(cursor)?;
            return Ok(cursor.data[start..end].to_vec());
        }
        log::debug!("stream /Length {} does not land on endstream, recovering", len);
    }

    // Recovery: search for the endstream keyword
    match find_first(&cursor.data[start..], b"endstream") {
        Some(rel) => {
            let mut end = start + rel;
            // The EOL before "endstream" is syntax, not payload
            if end > start && cursor.data[end - 1] == b'\n' {
                end -= 1;
            }
            if end > start && cursor.data[end - 1] == b'\r' {
                end -= 1;
            }
            let data = cursor.data[start..end].to_vec();
            cursor.pos = start + rel;
            consume_endstream(cursor)?;
            Ok(data)
        },
        None => Err(Error::UnexpectedEof),
    }
}

/// Check that (after optional whitespace) the input starts with `endstream`.
fn endstream_follows(input: &[u8]) -> bool {
    let mut i = 0;
    while i < input.len() && matches!(input[i], b' ' | b'\t' | b'\r' | b'\n') {
        i += 1;
        if i > 4 {
            return false;
        }
    }
    input[i..].starts_with(b"endstream")
}

fn consume_endstream(cursor: &mut Cursor<'_>) -> Result<()> {
    match cursor.next_token()? {
        Token::StreamEnd => Ok(()),
        other => Err(cursor.parse_error(format!("expected endstream, found {:?}", other))),
    }
}

/// Parse an indirect object definition: `id gen obj ... endobj`.
fn parse_indirect(cursor: &mut Cursor<'_>) -> Result<(ObjectRef, Object)> {
    let id = match cursor.next_token()? {
        Token::Integer(i) if (0..=u32::MAX as i64).contains(&i) => i as u32,
        other => return Err(cursor.parse_error(format!("expected object id, found {:?}", other))),
    };
    let gen = match cursor.next_token()? {
        Token::Integer(g) if (0..=u16::MAX as i64).contains(&g) => g as u16,
        other => return Err(cursor.parse_error(format!("expected generation, found {:?}", other))),
    };
    match cursor.next_token()? {
        Token::ObjStart => {},
        other => return Err(cursor.parse_error(format!("expected obj keyword, found {:?}", other))),
    }

    let value = parse_value(cursor, 0)?;

    // Tolerate a missing endobj; plenty of generators omit it
    let mark = cursor.save();
    if !matches!(cursor.next_token(), Ok(Token::ObjEnd)) {
        cursor.restore(mark);
    }

    Ok((ObjectRef::new(id, gen), value))
}

// ---------------------------------------------------------------------------
// Cross-reference table path
// ---------------------------------------------------------------------------

fn parse_via_xref(data: &[u8]) -> Result<ParsedDocument> {
    let start = find_startxref(data)?;

    let mut offsets: BTreeMap<u32, (usize, u16)> = BTreeMap::new();
    let mut trailer = Dict::new();
    let mut visited = HashSet::new();
    let mut next = Some(start);

    while let Some(offset) = next {
        if !visited.insert(offset) {
            // A Prev loop; everything reachable is already collected
            break;
        }
        if offset >= data.len() {
            return Err(Error::InvalidXref);
        }
        let section_trailer = parse_xref_section(data, offset, &mut offsets)?;

        // Newest-first walk: keep the first value seen for each key
        next = section_trailer
            .get("Prev")
            .and_then(|o| o.as_integer())
            .map(|p| p.max(0) as usize);
        for (k, v) in section_trailer {
            trailer.entry(k).or_insert(v);
        }
    }

    if trailer.is_empty() {
        return Err(Error::InvalidXref);
    }

    let mut objects = BTreeMap::new();
    for (id, (offset, gen)) in offsets {
        if offset >= data.len() {
            return Err(Error::InvalidXref);
        }
        let mut cursor = Cursor::at(data, offset);
        let (obj_ref, obj) = parse_indirect(&mut cursor)?;
        if obj_ref.id != id || obj_ref.gen != gen {
            return Err(Error::ParseError {
                offset,
                reason: format!("xref entry for {} {} points at {}", id, gen, obj_ref),
            });
        }
        objects.insert(obj_ref, obj);
    }

    Ok(ParsedDocument { objects, trailer })
}

/// Locate the byte offset announced by the final `startxref`.
fn find_startxref(data: &[u8]) -> Result<usize> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];
    let pos = find_last(tail, b"startxref").ok_or(Error::InvalidXref)?;

    let mut cursor = Cursor::at(data, tail_start + pos + b"startxref".len());
    match cursor.next_token() {
        Ok(Token::Integer(i)) if i >= 0 => Ok(i as usize),
        _ => Err(Error::InvalidXref),
    }
}

/// Parse one classic `xref` section plus its trailer dictionary.
///
/// Records only entries not already present: the chain is walked newest
/// first, so the first recording wins.
fn parse_xref_section(
    data: &[u8],
    offset: usize,
    offsets: &mut BTreeMap<u32, (usize, u16)>,
) -> Result<Dict> {
    let mut cursor = Cursor::at(data, offset);

    match cursor.next_token()? {
        Token::Operator(b"xref") => {},
        // An integer here means this is an xref *stream* object, which the
        // scan fallback handles instead
        _ => return Err(Error::InvalidXref),
    }

    loop {
        let mark = cursor.save();
        match cursor.next_token()? {
            Token::Integer(start) if start >= 0 => {
                let count = match cursor.next_token()? {
                    Token::Integer(c) if c >= 0 => c as usize,
                    _ => return Err(Error::InvalidXref),
                };
                for i in 0..count {
                    let entry_offset = match cursor.next_token()? {
                        Token::Integer(o) if o >= 0 => o as usize,
                        _ => return Err(Error::InvalidXref),
                    };
                    let gen = match cursor.next_token()? {
                        Token::Integer(g) if (0..=u16::MAX as i64).contains(&g) => g as u16,
                        _ => return Err(Error::InvalidXref),
                    };
                    let in_use = match cursor.next_token()? {
                        Token::Operator(b"n") => true,
                        Token::Operator(b"f") => false,
                        _ => return Err(Error::InvalidXref),
                    };
                    let id = start as u32 + i as u32;
                    if in_use {
                        offsets.entry(id).or_insert((entry_offset, gen));
                    }
                }
            },
            Token::Operator(b"trailer") => {
                match cursor.next_token()? {
                    Token::DictStart => return parse_dict_body(&mut cursor, 0),
                    _ => return Err(Error::InvalidXref),
                }
            },
            _ => {
                cursor.restore(mark);
                return Err(Error::InvalidXref);
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Full-scan fallback
// ---------------------------------------------------------------------------

/// Reconstruct the object table by scanning for `N G obj` markers.
///
/// Later definitions override earlier ones, matching incremental-update
/// semantics where the newest body section appears last in the file.
fn parse_via_scan(data: &[u8]) -> Result<ParsedDocument> {
    let mut objects = BTreeMap::new();

    for pos in find_all(data, b"obj") {
        // Keyword boundary on both sides
        if pos + 3 < data.len() && !is_boundary(data[pos + 3]) {
            continue;
        }
        let Some(start) = backtrack_object_header(data, pos) else {
            continue;
        };
        let mut cursor = Cursor::at(data, start);
        match parse_indirect(&mut cursor) {
            Ok((obj_ref, obj)) => {
                objects.insert(obj_ref, obj);
            },
            Err(e) => {
                log::warn!("skipping unparsable object at byte {}: {}", start, e);
            },
        }
    }

    if objects.is_empty() {
        return Err(Error::ParseError {
            offset: 0,
            reason: "no indirect objects found".to_string(),
        });
    }

    let mut trailer = Dict::new();
    for pos in find_all(data, b"trailer") {
        if pos + 7 < data.len() && !is_boundary(data[pos + 7]) {
            continue;
        }
        let mut cursor = Cursor::at(data, pos + 7);
        if let Ok(Token::DictStart) = cursor.next_token() {
            if let Ok(dict) = parse_dict_body(&mut cursor, 0) {
                // Later trailers are newer; their entries win
                for (k, v) in dict {
                    trailer.insert(k, v);
                }
            }
        }
    }

    if !trailer.contains_key("Root") {
        // No trailer survived; locate the catalog directly
        let catalog = objects.iter().find(|(_, obj)| {
            obj.as_dict()
                .and_then(|d| d.get("Type"))
                .and_then(|t| t.as_name())
                == Some("Catalog")
        });
        match catalog {
            Some((obj_ref, _)) => {
                log::debug!("no trailer found, using catalog {}", obj_ref);
                trailer.insert("Root".to_string(), Object::Reference(*obj_ref));
            },
            None => {
                return Err(Error::ParseError {
                    offset: 0,
                    reason: "no trailer and no catalog object".to_string(),
                });
            },
        }
    }

    Ok(ParsedDocument { objects, trailer })
}

/// Walk backwards from an `obj` keyword over `gen` and `id`, returning the
/// byte offset of the id.
fn backtrack_object_header(data: &[u8], obj_pos: usize) -> Option<usize> {
    let mut i = obj_pos;

    let skip_ws_back = |mut i: usize| -> Option<usize> {
        let start = i;
        while i > 0 && data[i - 1].is_ascii_whitespace() {
            i -= 1;
        }
        (i < start).then_some(i)
    };
    let skip_digits_back = |mut i: usize| -> Option<usize> {
        let start = i;
        while i > 0 && data[i - 1].is_ascii_digit() {
            i -= 1;
        }
        (i < start).then_some(i)
    };

    i = skip_ws_back(i)?;
    i = skip_digits_back(i)?; // generation
    i = skip_ws_back(i)?;
    i = skip_digits_back(i)?; // id
    if i > 0 && !is_boundary(data[i - 1]) {
        return None;
    }
    Some(i)
}

fn is_boundary(c: u8) -> bool {
    matches!(
        c,
        b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C | b'/' | b'%' | b'(' | b')' | b'<' | b'>'
            | b'[' | b']'
    )
}

// ---------------------------------------------------------------------------
// Byte search helpers
// ---------------------------------------------------------------------------

fn find_first(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn find_last(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    if needle.is_empty() || haystack.len() < needle.len() {
        return positions;
    }
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        if &haystack[i..i + needle.len()] == needle {
            positions.push(i);
            i += needle.len();
        } else {
            i += 1;
        }
    }
    positions
}
