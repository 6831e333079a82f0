//! Canonical document digest.
//!
//! The digest covers only the text a reader sees: the string operands of the
//! show-text operators (`Tj`, `'`, `"`, `TJ`) in each page's content
//! streams, visited in page-tree order, with one newline appended per page.
//! Metadata, layout coordinates, fonts, and file structure are all outside
//! the digest, so rewriting a file or stamping a signature record into its
//! Info dictionary does not change the value.

use crate::document::PdfDocument;
use crate::error::Result;
use crate::lexer::{self, Token};
use crate::parser::Cursor;
use sha2::{Digest, Sha256};

/// Digest length in bytes (SHA-256).
pub const DIGEST_LEN: usize = 32;

/// Compute the canonical SHA-256 digest of a document's page text.
pub fn compute(doc: &PdfDocument) -> Result<[u8; DIGEST_LEN]> {
    let text = extract_text(doc)?;
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    Ok(hasher.finalize().into())
}

/// Extract the canonical text of a document, one newline-terminated line
/// per page.
pub fn extract_text(doc: &PdfDocument) -> Result<String> {
    let mut text = String::new();
    for page_ref in doc.pages()? {
        for stream in doc.page_content_streams(page_ref)? {
            extract_shown_text(&stream, &mut text);
        }
        text.push('\n');
    }
    Ok(text)
}

/// Content-stream operand, reduced to what text extraction needs.
enum Operand {
    Str(Vec<u8>),
    Array(Vec<Operand>),
    Other,
}

/// Scan one decoded content stream and append every shown string to `out`.
fn extract_shown_text(stream: &[u8], out: &mut String) {
    let mut cursor = Cursor::new(stream);
    let mut stack: Vec<Operand> = Vec::new();

    loop {
        let token = match cursor.next_token() {
            Ok(t) => t,
            Err(crate::Error::UnexpectedEof) => break,
            Err(e) => {
                // Inline-image data or a damaged stream; everything up to
                // this point still counts
                log::warn!("stopping content scan early: {}", e);
                break;
            },
        };
        match token {
            Token::LiteralString(raw) => {
                stack.push(Operand::Str(lexer::decode_literal_string(raw)));
            },
            Token::HexString(raw) => {
                stack.push(Operand::Str(lexer::decode_hex_string(raw)));
            },
            Token::ArrayStart => match scan_array(&mut cursor) {
                Some(items) => stack.push(Operand::Array(items)),
                None => break,
            },
            Token::Operator(op) => {
                match op {
                    b"Tj" | b"'" | b"\"" => {
                        if let Some(Operand::Str(s)) =
                            stack.iter().rev().find(|o| matches!(o, Operand::Str(_)))
                        {
                            out.push_str(&decode_text_string(s));
                        }
                    },
                    b"TJ" => {
                        if let Some(Operand::Array(items)) = stack.last() {
                            for item in items {
                                if let Operand::Str(s) = item {
                                    out.push_str(&decode_text_string(s));
                                }
                            }
                        }
                    },
                    _ => {},
                }
                stack.clear();
            },
            // Numbers, names, booleans and stray keywords are operands for
            // operators we do not interpret
            _ => stack.push(Operand::Other),
        }
    }
}

/// Collect operands up to the matching `]`. Returns `None` on lexer failure.
fn scan_array(cursor: &mut Cursor<'_>) -> Option<Vec<Operand>> {
    let mut items = Vec::new();
    loop {
        match cursor.next_token() {
            Ok(Token::ArrayEnd) => return Some(items),
            Ok(Token::LiteralString(raw)) => {
                items.push(Operand::Str(lexer::decode_literal_string(raw)));
            },
            Ok(Token::HexString(raw)) => {
                items.push(Operand::Str(lexer::decode_hex_string(raw)));
            },
            Ok(Token::ArrayStart) => {
                items.push(Operand::Array(scan_array(cursor)?));
            },
            Ok(_) => items.push(Operand::Other),
            Err(_) => return None,
        }
    }
}

/// Decode a PDF text string to Rust text.
///
/// Strings with a UTF-16BE byte-order mark decode as UTF-16BE; everything
/// else is treated as Latin-1, where every byte maps to the code point of
/// the same value.
fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}
