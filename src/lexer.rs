//! PDF lexer (tokenizer).
//!
//! Low-level tokenization of PDF byte streams, used both for document
//! objects and for page content streams. Token types:
//! - Numbers: integers (42, -123) and reals (3.14, -2.5)
//! - Strings: literal ((Hello)) and hexadecimal (<48656C6C6F>)
//! - Names: identifiers starting with / (/Type, /Pages)
//! - Keywords: true, false, null, obj/endobj, stream/endstream, R
//! - Delimiters: `[`, `]`, `<<`, `>>`
//! - Operators: any other bare identifier (content-stream operators
//!   such as `BT`, `Tj`, `TJ`)
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are
//! skipped. String escape sequences are decoded by the helpers at the
//! bottom of this module, not by the tokenizer itself.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    sequence::{delimited, preceded},
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),

    /// Real (floating-point) number (e.g., 3.14, -2.5, .5)
    Real(f64),

    /// Literal string bytes (content of "(Hello)"), escapes NOT decoded
    LiteralString(&'a [u8]),

    /// Hexadecimal string bytes (content of "<48656C6C6F>"), not decoded
    HexString(&'a [u8]),

    /// Name (e.g., "Type" from "/Type"); # escapes ARE decoded
    Name(String),

    /// Boolean true keyword
    True,

    /// Boolean false keyword
    False,

    /// Null keyword
    Null,

    /// Array start delimiter [
    ArrayStart,

    /// Array end delimiter ]
    ArrayEnd,

    /// Dictionary start delimiter <<
    DictStart,

    /// Dictionary end delimiter >>
    DictEnd,

    /// Indirect object start keyword "obj"
    ObjStart,

    /// Indirect object end keyword "endobj"
    ObjEnd,

    /// Stream start keyword "stream"
    StreamStart,

    /// Stream end keyword "endstream"
    StreamEnd,

    /// Reference keyword "R" (used in "10 0 R")
    R,

    /// Bare identifier: a content-stream operator such as "BT" or "Tj"
    Operator(&'a [u8]),
}

/// Parse whitespace characters.
///
/// PDF whitespace: space, tab, CR, LF, null, form feed. Requires at
/// least one whitespace character.
fn whitespace(input: &[u8]) -> IResult<&[u8], ()> {
    let (remaining, ws) =
        take_while(|c| matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C))(input)?;

    if ws.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Space)));
    }

    Ok((remaining, ()))
}

/// Parse a comment (% to end of line).
fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments.
fn skip_ws(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let mut remaining = input;

    loop {
        if let Ok((rest, _)) = whitespace(remaining) {
            remaining = rest;
            continue;
        }
        if let Ok((rest, _)) = comment(remaining) {
            remaining = rest;
            continue;
        }
        break;
    }

    Ok((remaining, input))
}

/// Parse an integer or real number.
///
/// PDF allows leading +/- signs and numbers starting or ending with a
/// decimal point: 42, -123, +17, 3.14, .5, 5.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    if int_part.is_none() && frac_part.is_none() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    let digit_err = || nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit));

    if frac_part.is_some() {
        let mut num_str = String::new();
        if sign == Some('-') {
            num_str.push('-');
        }
        if let Some(int) = int_part {
            num_str.push_str(std::str::from_utf8(int).map_err(|_| digit_err())?);
        } else {
            num_str.push('0');
        }
        num_str.push('.');
        if let Some(Some(frac)) = frac_part {
            num_str.push_str(std::str::from_utf8(frac).map_err(|_| digit_err())?);
        } else {
            num_str.push('0');
        }

        let num: f64 = num_str.parse().map_err(|_| digit_err())?;
        Ok((input, Token::Real(num)))
    } else {
        let int_bytes = int_part.ok_or_else(digit_err)?;
        let int_str = std::str::from_utf8(int_bytes).map_err(|_| digit_err())?;
        let mut num: i64 = int_str.parse().map_err(|_| digit_err())?;
        if sign == Some('-') {
            num = -num;
        }
        Ok((input, Token::Integer(num)))
    }
}

/// Parse a literal string enclosed in parentheses.
///
/// Handles balanced nested parentheses, escape sequences (\n, \ddd, ...)
/// and line continuations. Raw bytes including escape sequences are
/// returned; decoding happens via [`decode_literal_string`].
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (mut remaining, _) = char('(')(input)?;
    let mut depth = 1;
    let mut pos = 0;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => {
                pos += 1;
                if pos < remaining.len() {
                    if remaining[pos].is_ascii_digit() {
                        // Octal escape \ddd: 1-3 digits
                        pos += 1;
                        if pos < remaining.len() && remaining[pos].is_ascii_digit() {
                            pos += 1;
                        }
                        if pos < remaining.len() && remaining[pos].is_ascii_digit() {
                            pos += 1;
                        }
                    } else {
                        pos += 1;
                    }
                }
            },
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => {
                pos += 1;
            },
        }
    }

    if depth != 0 {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    let content = &remaining[..pos - 1];
    remaining = &remaining[pos..];

    Ok((remaining, Token::LiteralString(content)))
}

/// Parse a hexadecimal string enclosed in angle brackets.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    // Must not be a dictionary start (<<)
    if input.len() >= 2 && input[0] == b'<' && input[1] == b'<' {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || c.is_ascii_whitespace()),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode #XX escape sequences in PDF names.
///
/// Name objects can contain arbitrary characters encoded as `#XX` where XX
/// is a two-digit hex code; `/A#20B` becomes `A B`. Invalid sequences are
/// preserved literally.
pub fn decode_name_escapes(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '#' {
            let hex1 = chars.next();
            let hex2 = chars.next();

            if let (Some(h1), Some(h2)) = (hex1, hex2) {
                let hex_str = format!("{}{}", h1, h2);
                if let Ok(byte) = u8::from_str_radix(&hex_str, 16) {
                    result.push(byte as char);
                    continue;
                }
                result.push('#');
                result.push(h1);
                result.push(h2);
            } else if let Some(h1) = hex1 {
                result.push('#');
                result.push(h1);
            } else {
                result.push('#');
            }
        } else {
            result.push(ch);
        }
    }

    result
}

fn is_delimiter_or_ws(c: u8) -> bool {
    matches!(
        c,
        b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C | // Whitespace
        b'/' | b'%' | // Start of name/comment
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' // Delimiters
    )
}

/// Parse a name starting with /.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(|c: u8| !is_delimiter_or_ws(c)), |bytes| {
            let name_str = std::str::from_utf8(bytes).unwrap_or("");
            Token::Name(decode_name_escapes(name_str))
        }),
    )(input)
}

/// Parse PDF keywords and delimiters.
///
/// Order matters: multi-character keywords before single characters,
/// `endstream` before `stream`, `<<` before `<`. A keyword only matches
/// when not followed by a regular character (so `Tf` is not read as
/// `T` + garbage, and `RG` is not read as a reference marker).
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, token) = alt((
        value(Token::False, tag(b"false")),
        value(Token::True, tag(b"true")),
        value(Token::Null, tag(b"null")),
        value(Token::ObjEnd, tag(b"endobj")),
        value(Token::ObjStart, tag(b"obj")),
        value(Token::StreamEnd, tag(b"endstream")), // Check before "stream"
        value(Token::StreamStart, tag(b"stream")),
        value(Token::R, tag(b"R")),
    ))(input)?;

    if !rest.is_empty() && !is_delimiter_or_ws(rest[0]) {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    Ok((rest, token))
}

/// Parse structural delimiters.
fn parse_delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input)
}

/// Parse a bare identifier (content-stream operator).
fn parse_operator(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(take_while1(|c: u8| !is_delimiter_or_ws(c)), Token::Operator)(input)
}

/// Parse a single PDF token.
///
/// Skips whitespace/comments and then tries every token type. Parsing
/// order matters: delimiters and keywords before names and numbers,
/// operators last as the catch-all.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;

    alt((
        parse_delimiter,
        parse_keyword,
        parse_name,
        parse_number,
        parse_literal_string,
        parse_hex_string,
        parse_operator,
    ))(input)
}

/// Decode the escape sequences of a literal string into raw bytes.
///
/// Handles \n \r \t \b \f \( \) \\, octal \ddd, backslash-EOL line
/// continuation, and normalizes bare CR / CRLF inside the string to LF.
pub fn decode_literal_string(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let b = raw[i];
        if b == b'\\' {
            i += 1;
            if i >= raw.len() {
                break;
            }
            match raw[i] {
                b'n' => out.push(b'\n'),
                b'r' => out.push(b'\r'),
                b't' => out.push(b'\t'),
                b'b' => out.push(0x08),
                b'f' => out.push(0x0C),
                b'(' => out.push(b'('),
                b')' => out.push(b')'),
                b'\\' => out.push(b'\\'),
                // Line continuation: backslash followed by EOL
                b'\r' => {
                    if i + 1 < raw.len() && raw[i + 1] == b'\n' {
                        i += 1;
                    }
                },
                b'\n' => {},
                d if d.is_ascii_digit() => {
                    // Octal escape, up to three digits
                    let mut val = (d - b'0') as u32;
                    let mut digits = 1;
                    while digits < 3
                        && i + 1 < raw.len()
                        && raw[i + 1].is_ascii_digit()
                        && raw[i + 1] < b'8'
                    {
                        i += 1;
                        digits += 1;
                        val = val * 8 + (raw[i] - b'0') as u32;
                    }
                    out.push((val & 0xFF) as u8);
                },
                other => out.push(other),
            }
            i += 1;
        } else if b == b'\r' {
            // EOL inside a string means LF
            out.push(b'\n');
            if i + 1 < raw.len() && raw[i + 1] == b'\n' {
                i += 1;
            }
            i += 1;
        } else {
            out.push(b);
            i += 1;
        }
    }

    out
}

/// Decode a hex string body into raw bytes.
///
/// Whitespace is ignored; an odd trailing digit is padded with 0.
pub fn decode_hex_string(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() / 2);
    let mut hi: Option<u8> = None;

    for &b in raw {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => continue,
        };
        match hi.take() {
            None => hi = Some(digit),
            Some(h) => out.push((h << 4) | digit),
        }
    }
    if let Some(h) = hi {
        out.push(h << 4);
    }

    out
}
