//! PDF object model.
//!
//! A closed set of object variants mirrors the PDF data model: every value
//! parsed from a file is one of these. Strings are byte sequences, not
//! Unicode; decoding to text happens in higher layers.

use std::collections::HashMap;
use std::fmt;

/// An indirect object reference (`N G R`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Object number.
    pub number: u32,
    /// Generation number.
    pub generation: u16,
}

impl ObjectRef {
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// A PDF string together with its source notation.
///
/// `hex` records whether the string came from `<...>` rather than `(...)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PDFString {
    pub data: Vec<u8>,
    pub hex: bool,
}

impl PDFString {
    pub fn literal(data: Vec<u8>) -> Self {
        Self { data, hex: false }
    }

    pub fn hexadecimal(data: Vec<u8>) -> Self {
        Self { data, hex: true }
    }
}

/// A stream object: dictionary plus payload bytes.
///
/// The payload is kept in its filter-encoded form; `pdf::filter` decodes it
/// on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dict,
    pub data: Vec<u8>,
}

/// A PDF object.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    /// A name after `#XX` escape decoding. Bytes map to chars one to one.
    Name(String),
    String(PDFString),
    Array(Vec<Object>),
    Dict(Dict),
    Stream(Stream),
    Reference(ObjectRef),
}

impl Object {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            Object::Real(r) => Some(*r as i64),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PDFString> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Convert an object to the text form used for form field values.
    ///
    /// Strings are decoded (UTF-16BE when BOM-prefixed, otherwise byte for
    /// byte), names become their literal text, booleans `true`/`false`, and
    /// numbers their decimal form. Anything else yields an empty string.
    pub fn to_text(&self) -> String {
        match self {
            Object::String(s) => crate::doc::text::decode_pdf_string(&s.data),
            Object::Name(n) => n.clone(),
            Object::Integer(i) => i.to_string(),
            Object::Real(r) => format!("{r}"),
            Object::Boolean(b) => b.to_string(),
            _ => String::new(),
        }
    }

    /// Serialize the object in PDF syntax.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Object::Null => out.extend_from_slice(b"null"),
            Object::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => out.extend_from_slice(format!("{r}").as_bytes()),
            Object::Name(n) => write_name(n, out),
            Object::String(s) => write_string(s, out),
            Object::Array(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    item.write_to(out);
                }
                out.push(b']');
            }
            Object::Dict(d) => d.write_to(out),
            Object::Stream(s) => {
                s.dict.write_to(out);
                out.extend_from_slice(b"\nstream\n");
                out.extend_from_slice(&s.data);
                out.extend_from_slice(b"\nendstream");
            }
            Object::Reference(r) => out.extend_from_slice(r.to_string().as_bytes()),
        }
    }
}

fn write_name(name: &str, out: &mut Vec<u8>) {
    out.push(b'/');
    for &b in name.as_bytes() {
        // Bytes outside the regular-character set are re-escaped as #XX.
        if b <= b' '
            || b == b'#'
            || matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
        {
            out.extend_from_slice(format!("#{b:02X}").as_bytes());
        } else {
            out.push(b);
        }
    }
}

fn write_string(s: &PDFString, out: &mut Vec<u8>) {
    if s.hex {
        out.push(b'<');
        for &b in &s.data {
            out.extend_from_slice(format!("{b:02X}").as_bytes());
        }
        out.push(b'>');
    } else {
        out.push(b'(');
        for &b in &s.data {
            match b {
                b'(' | b')' | b'\\' => {
                    out.push(b'\\');
                    out.push(b);
                }
                _ => out.push(b),
            }
        }
        out.push(b')');
    }
}

/// A PDF dictionary. Iteration order is not significant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dict {
    entries: HashMap<String, Object>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Object) {
        self.entries.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.entries.iter()
    }

    /// Get a name entry, or `None` if absent or not a name.
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Object::as_name)
    }

    /// Get an integer entry. Reals are truncated, matching lenient readers.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Object::as_int)
    }

    /// Get a numeric entry as a float.
    pub fn get_real(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Object::as_real)
    }

    /// Get an array entry.
    pub fn get_array(&self, key: &str) -> Option<&[Object]> {
        self.get(key).and_then(Object::as_array)
    }

    /// Get a sub-dictionary entry.
    pub fn get_dict(&self, key: &str) -> Option<&Dict> {
        self.get(key).and_then(Object::as_dict)
    }

    /// Get a string entry.
    pub fn get_string(&self, key: &str) -> Option<&PDFString> {
        self.get(key).and_then(Object::as_string)
    }

    /// Get a reference entry.
    pub fn get_reference(&self, key: &str) -> Option<ObjectRef> {
        self.get(key).and_then(|o| o.as_reference())
    }

    /// Serialize the dictionary in PDF syntax.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b"<< ");
        for (key, value) in &self.entries {
            write_name(key, out);
            out.push(b' ');
            value.write_to(out);
            out.push(b' ');
        }
        out.extend_from_slice(b">>");
    }
}

/// An indirect object definition (`N G obj ... endobj`).
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    pub reference: ObjectRef,
    pub value: Object,
}
