//! Recursive-descent parser for PDF syntax.
//!
//! The parser works over the whole file as a byte slice with a cursor, so
//! every error can report its absolute byte offset. An optional RC4 cipher
//! decrypts string and stream payloads in place as they are encountered;
//! the keystream advances across all strings of one indirect object and is
//! never reset between them.

use log::trace;

use crate::crypto::rc4::Rc4;
use crate::error::{PDFError, Result};

use super::object::{Dict, IndirectObject, Object, ObjectRef, PDFString, Stream};

/// True for the PDF whitespace set: space, tab, LF, CR, FF, NUL.
pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | 0)
}

/// True for the PDF delimiter set.
pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// True for regular characters (neither whitespace nor delimiter).
pub(crate) fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// Numeric value of a hex digit, or `None`.
pub(crate) fn unhex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// PDF syntax parser over a byte slice.
pub struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    cipher: Option<Rc4>,
}

impl<'a> Parser<'a> {
    /// Create a parser positioned at the start of the slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            cipher: None,
        }
    }

    /// Create a parser positioned at the given offset.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            cipher: None,
        }
    }

    /// Attach a decrypting cipher for the strings and stream of the object
    /// about to be parsed.
    pub fn with_cipher(mut self, cipher: Option<Rc4>) -> Self {
        self.cipher = cipher;
        self
    }

    /// Current byte offset of the cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Advance past whitespace and `%...EOL` comments.
    pub fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while self.pos < self.data.len()
                    && self.data[self.pos] != b'\n'
                    && self.data[self.pos] != b'\r'
                {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Read the next run of regular characters as a token.
    pub fn read_token(&mut self) -> &'a [u8] {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.data.len() && is_regular(self.data[self.pos]) {
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    fn expect_keyword(&mut self, word: &str) -> Result<()> {
        let at = self.pos;
        let tok = self.read_token();
        if tok == word.as_bytes() {
            Ok(())
        } else {
            Err(PDFError::parse(
                at,
                format!("expected '{word}', got {:?}", String::from_utf8_lossy(tok)),
            ))
        }
    }

    /// Parse the next object, recognized by its first non-whitespace byte.
    pub fn parse_object(&mut self) -> Result<Object> {
        self.skip_whitespace();
        let b = self
            .peek()
            .ok_or_else(|| PDFError::parse(self.pos, "unexpected end of input"))?;

        match b {
            b'<' => {
                if self.data.get(self.pos + 1) == Some(&b'<') {
                    self.parse_dict().map(Object::Dict)
                } else {
                    self.parse_hex_string().map(Object::String)
                }
            }
            b'(' => self.parse_literal_string().map(Object::String),
            b'/' => self.parse_name().map(Object::Name),
            b'[' => self.parse_array().map(Object::Array),
            b't' | b'f' => self.parse_boolean(),
            b'n' => self.parse_null(),
            b'0'..=b'9' | b'+' | b'-' | b'.' => self.parse_number_or_ref(),
            _ => Err(PDFError::parse(
                self.pos,
                format!("unexpected character {:?}", b as char),
            )),
        }
    }

    /// Parse a name object. `#XX` sequences decode to the escaped byte.
    pub fn parse_name(&mut self) -> Result<String> {
        if self.peek() != Some(b'/') {
            return Err(PDFError::parse(self.pos, "expected '/'"));
        }
        self.pos += 1;

        let mut name = String::new();
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            if b == b'#' && self.pos + 2 < self.data.len() {
                if let (Some(hi), Some(lo)) =
                    (unhex(self.data[self.pos + 1]), unhex(self.data[self.pos + 2]))
                {
                    name.push(char::from((hi << 4) | lo));
                    self.pos += 3;
                    continue;
                }
            }
            name.push(char::from(b));
            self.pos += 1;
        }
        Ok(name)
    }

    fn parse_boolean(&mut self) -> Result<Object> {
        let at = self.pos;
        match self.read_token() {
            b"true" => Ok(Object::Boolean(true)),
            b"false" => Ok(Object::Boolean(false)),
            tok => Err(PDFError::parse(
                at,
                format!("expected boolean, got {:?}", String::from_utf8_lossy(tok)),
            )),
        }
    }

    fn parse_null(&mut self) -> Result<Object> {
        let at = self.pos;
        match self.read_token() {
            b"null" => Ok(Object::Null),
            tok => Err(PDFError::parse(
                at,
                format!("expected null, got {:?}", String::from_utf8_lossy(tok)),
            )),
        }
    }

    /// Parse a number, or an indirect reference when the next two tokens are
    /// a non-negative integer followed by `R`. The look-ahead restores the
    /// cursor if the triple does not materialize.
    fn parse_number_or_ref(&mut self) -> Result<Object> {
        let start = self.pos;
        let tok = self.read_token();
        let tok_str = std::str::from_utf8(tok)
            .map_err(|_| PDFError::parse(start, "invalid number token"))?;

        if let Ok(int_val) = tok_str.parse::<i64>() {
            let after_first = self.pos;
            self.skip_whitespace();
            if matches!(self.peek(), Some(b'0'..=b'9')) {
                let tok2 = self.read_token();
                let gen_ok = std::str::from_utf8(tok2)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok());
                if let Some(gen_val) = gen_ok {
                    self.skip_whitespace();
                    if self.peek() == Some(b'R') {
                        self.pos += 1;
                        return Ok(Object::Reference(ObjectRef::new(
                            int_val as u32,
                            gen_val as u16,
                        )));
                    }
                }
            }
            self.pos = after_first;
            return Ok(Object::Integer(int_val));
        }

        tok_str
            .parse::<f64>()
            .map(Object::Real)
            .map_err(|_| PDFError::parse(start, format!("invalid number {tok_str:?}")))
    }

    /// Parse a literal string `(...)` with balanced parentheses and escapes.
    pub fn parse_literal_string(&mut self) -> Result<PDFString> {
        let start = self.pos;
        if self.peek() != Some(b'(') {
            return Err(PDFError::parse(self.pos, "expected '('"));
        }
        self.pos += 1;

        let mut buf = Vec::new();
        let mut depth = 1usize;

        while depth > 0 {
            let b = self
                .peek()
                .ok_or_else(|| PDFError::parse(start, "unterminated literal string"))?;
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    buf.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth > 0 {
                        buf.push(b);
                    }
                }
                b'\\' => {
                    let esc = self
                        .peek()
                        .ok_or_else(|| PDFError::parse(start, "unterminated string escape"))?;
                    self.pos += 1;
                    match esc {
                        b'n' => buf.push(b'\n'),
                        b'r' => buf.push(b'\r'),
                        b't' => buf.push(b'\t'),
                        b'b' => buf.push(0x08),
                        b'f' => buf.push(0x0c),
                        b'(' | b')' | b'\\' => buf.push(esc),
                        b'0'..=b'7' => {
                            let mut oct = u32::from(esc - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        oct = oct * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            buf.push(oct as u8);
                        }
                        other => buf.push(other),
                    }
                }
                _ => buf.push(b),
            }
        }

        if let Some(cipher) = self.cipher.as_mut() {
            cipher.apply(&mut buf);
        }
        Ok(PDFString::literal(buf))
    }

    /// Parse a hex string `<...>`. Whitespace is ignored; an odd trailing
    /// nibble is taken as the high half of the final byte.
    pub fn parse_hex_string(&mut self) -> Result<PDFString> {
        let start = self.pos;
        if self.peek() != Some(b'<') {
            return Err(PDFError::parse(self.pos, "expected '<'"));
        }
        self.pos += 1;

        let mut buf = Vec::new();
        let mut hi: Option<u8> = None;

        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'>' {
                if let Some(h) = hi {
                    buf.push(h << 4);
                }
                if let Some(cipher) = self.cipher.as_mut() {
                    cipher.apply(&mut buf);
                }
                return Ok(PDFString::hexadecimal(buf));
            }
            if is_whitespace(b) {
                continue;
            }
            let v = unhex(b).ok_or_else(|| {
                PDFError::parse(self.pos - 1, format!("invalid hex character {:?}", b as char))
            })?;
            match hi.take() {
                None => hi = Some(v),
                Some(h) => buf.push((h << 4) | v),
            }
        }

        Err(PDFError::parse(start, "unterminated hex string"))
    }

    /// Parse an array `[obj obj ...]`.
    pub fn parse_array(&mut self) -> Result<Vec<Object>> {
        let start = self.pos;
        if self.peek() != Some(b'[') {
            return Err(PDFError::parse(self.pos, "expected '['"));
        }
        self.pos += 1;

        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(PDFError::parse(start, "unterminated array")),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(_) => items.push(self.parse_object()?),
            }
        }
    }

    /// Parse a dictionary `<< /Key value ... >>`.
    pub fn parse_dict(&mut self) -> Result<Dict> {
        let start = self.pos;
        if self.peek() != Some(b'<') || self.data.get(self.pos + 1) != Some(&b'<') {
            return Err(PDFError::parse(self.pos, "expected '<<'"));
        }
        self.pos += 2;

        let mut dict = Dict::new();
        loop {
            self.skip_whitespace();
            if self.pos >= self.data.len() {
                return Err(PDFError::parse(start, "unterminated dictionary"));
            }
            if self.peek() == Some(b'>') && self.data.get(self.pos + 1) == Some(&b'>') {
                self.pos += 2;
                return Ok(dict);
            }
            let key = self.parse_name()?;
            let value = self.parse_object()?;
            dict.set(key, value);
        }
    }

    /// Parse an indirect object `N G obj ... endobj`, reading a stream
    /// payload of exactly `/Length` bytes when one follows.
    pub fn parse_indirect_object(&mut self) -> Result<IndirectObject> {
        self.skip_whitespace();
        let at = self.pos;

        let num = self.read_uint("object number")?;
        let gen = self.read_uint("generation number")?;
        self.expect_keyword("obj")?;

        let mut value = self.parse_object()?;

        self.skip_whitespace();
        if self.data[self.pos..].starts_with(b"stream") {
            let dict = match value {
                Object::Dict(d) => d,
                _ => {
                    return Err(PDFError::parse(
                        at,
                        format!("stream object {num} {gen} has a non-dictionary header"),
                    ))
                }
            };

            self.pos += 6;
            // A single CRLF or LF follows the stream keyword.
            if self.peek() == Some(b'\r') {
                self.pos += 1;
            }
            if self.peek() == Some(b'\n') {
                self.pos += 1;
            }

            let length = dict.get_int("Length").unwrap_or(0).max(0) as usize;
            if self.pos + length > self.data.len() {
                return Err(PDFError::parse(
                    self.pos,
                    format!("stream /Length {length} extends beyond end of file"),
                ));
            }
            let mut payload = self.data[self.pos..self.pos + length].to_vec();
            self.pos += length;

            if let Some(cipher) = self.cipher.as_mut() {
                cipher.apply(&mut payload);
            }

            self.skip_whitespace();
            if self.data[self.pos..].starts_with(b"endstream") {
                self.pos += 9;
            }

            value = Object::Stream(Stream {
                dict,
                data: payload,
            });
        }

        self.skip_whitespace();
        if self.data[self.pos..].starts_with(b"endobj") {
            self.pos += 6;
        }

        trace!("parsed indirect object {} {}", num, gen);
        Ok(IndirectObject {
            reference: ObjectRef::new(num as u32, gen as u16),
            value,
        })
    }

    fn read_uint(&mut self, what: &str) -> Result<u64> {
        let at = self.pos;
        let tok = self.read_token();
        std::str::from_utf8(tok)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| {
                PDFError::parse(
                    at,
                    format!("expected {what}, got {:?}", String::from_utf8_lossy(tok)),
                )
            })
    }
}
