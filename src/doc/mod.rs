//! Document-level reading: opening files, resolving indirect objects,
//! metadata, the page list, and form fields.

pub mod acroform;
pub mod page;
pub mod text;

use std::collections::HashMap;
use std::path::Path;

use log::{debug, trace};

use crate::crypto::standard::EncryptInfo;
use crate::error::{PDFError, Result};
use crate::pdf::object::{Dict, Object, ObjectRef};
use crate::pdf::parser::Parser;
use crate::pdf::xref::{find_start_xref, parse_xref, XrefTable};

pub use acroform::FormField;
pub use page::{Page, Rect};

/// A parsed PDF document.
///
/// The raw file bytes are held for the document's lifetime; indirect
/// objects are re-parsed from them on every resolution, so no cache can go
/// stale.
#[derive(Debug)]
pub struct Document {
    data: Vec<u8>,
    version: String,
    xref: XrefTable,
    trailer: Dict,
    pages: Vec<Page>,
    encrypt: Option<EncryptInfo>,
}

impl Document {
    /// Open and parse a PDF file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::read(std::fs::read(path)?)
    }

    /// Open and parse an encrypted PDF file using the given password.
    pub fn open_with_password(path: impl AsRef<Path>, password: &str) -> Result<Self> {
        Self::read_with_password(std::fs::read(path)?, password)
    }

    /// Parse a PDF document from bytes.
    pub fn read(data: Vec<u8>) -> Result<Self> {
        Self::read_with_password(data, "")
    }

    /// Parse a PDF document from bytes, decrypting with the password when
    /// the file is encrypted. An empty password and a missing password are
    /// equivalent.
    pub fn read_with_password(data: Vec<u8>, password: &str) -> Result<Self> {
        let version = parse_version(&data);
        debug!("parsing document, {} bytes, version {:?}", data.len(), version);

        let start = find_start_xref(&data)?;
        let (xref, trailer) = parse_xref(&data, start)?;

        let mut doc = Self {
            data,
            version,
            xref,
            trailer,
            pages: Vec::new(),
            encrypt: None,
        };

        if doc.trailer.contains_key("Encrypt") {
            doc.decrypt(password)?;
        }

        doc.pages = page::build_page_list(&doc)?;
        debug!("document parsed: {} page(s)", doc.pages.len());
        Ok(doc)
    }

    /// Parse the /Encrypt dictionary and derive the file key. The /Encrypt
    /// object itself is parsed without a cipher; its strings are stored in
    /// the clear.
    fn decrypt(&mut self, password: &str) -> Result<()> {
        let enc_obj = self.trailer.get("Encrypt").cloned().unwrap_or(Object::Null);
        let resolved = self.resolve_if_ref(&enc_obj)?;
        let enc_dict = resolved
            .as_dict()
            .ok_or_else(|| PDFError::parse(0, "/Encrypt is not a dictionary"))?;

        let file_id = self
            .trailer
            .get_array("ID")
            .and_then(|arr| arr.first())
            .and_then(Object::as_string)
            .map(|s| s.data.clone())
            .unwrap_or_default();

        let mut info = EncryptInfo::from_dict(enc_dict, file_id)?;
        info.authenticate(password.as_bytes())?;
        self.encrypt = Some(info);
        Ok(())
    }

    /// PDF version from the `%PDF-x.y` header, empty when absent.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The raw bytes the document was parsed from.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// The cross-reference table.
    pub fn xref(&self) -> &XrefTable {
        &self.xref
    }

    /// True when the document carried an /Encrypt dictionary.
    pub fn is_encrypted(&self) -> bool {
        self.encrypt.is_some()
    }

    /// Total number of pages.
    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// The page at the given 1-based index.
    pub fn page(&self, n: usize) -> Result<&Page> {
        if n < 1 || n > self.pages.len() {
            return Err(PDFError::OutOfRange {
                what: "page",
                index: n as i64,
                bound: self.pages.len() as i64,
            });
        }
        Ok(&self.pages[n - 1])
    }

    /// Iterate over all pages with their 1-based indices.
    pub fn pages(&self) -> impl Iterator<Item = (usize, &Page)> {
        self.pages.iter().enumerate().map(|(i, p)| (i + 1, p))
    }

    /// Resolve an indirect reference to its object. Free or absent entries
    /// resolve to null.
    pub fn resolve(&self, reference: ObjectRef) -> Result<Object> {
        let entry = match self.xref.get(reference.number) {
            Some(e) if e.in_use => *e,
            _ => return Ok(Object::Null),
        };

        let offset = entry.offset as usize;
        if offset >= self.data.len() {
            return Err(PDFError::xref(format!(
                "object {} offset {} out of bounds",
                reference.number, offset
            )));
        }

        trace!("resolving object {} at offset {}", reference.number, offset);
        let cipher = self
            .encrypt
            .as_ref()
            .map(|info| info.object_cipher(reference.number, reference.generation));
        let mut parser = Parser::at(&self.data, offset).with_cipher(cipher);
        Ok(parser.parse_indirect_object()?.value)
    }

    /// Resolve an object if it is a reference, otherwise return a clone.
    pub fn resolve_if_ref(&self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(r) => self.resolve(*r),
            other => Ok(other.clone()),
        }
    }

    /// The document catalog (the trailer's /Root object).
    pub fn catalog(&self) -> Result<Dict> {
        let root = self
            .trailer
            .get("Root")
            .ok_or_else(|| PDFError::parse(0, "missing /Root in trailer"))?
            .clone();
        self.resolve_if_ref(&root)?
            .as_dict()
            .cloned()
            .ok_or_else(|| PDFError::parse(0, "/Root is not a dictionary"))
    }

    /// Document metadata from the /Info dictionary. Keys absent from the
    /// file are absent from the map.
    pub fn metadata(&self) -> HashMap<String, String> {
        let mut meta = HashMap::new();

        let info_obj = match self.trailer.get("Info") {
            Some(o) => o.clone(),
            None => return meta,
        };
        let info = match self.resolve_if_ref(&info_obj) {
            Ok(Object::Dict(d)) => d,
            _ => return meta,
        };

        for key in ["Title", "Author", "Subject", "Keywords", "Creator", "Producer"] {
            if let Some(s) = info.get_string(key) {
                meta.insert(key.to_string(), text::decode_pdf_string(&s.data));
            }
        }
        meta
    }
}

/// Extract the PDF version from the `%PDF-x.y` header.
fn parse_version(data: &[u8]) -> String {
    let head = &data[..data.len().min(20)];
    let Some(idx) = head.windows(5).position(|w| w == b"%PDF-") else {
        return String::new();
    };
    let rest = &head[idx + 5..];
    let end = rest
        .iter()
        .position(|&b| b == b'\n' || b == b'\r')
        .unwrap_or(rest.len());
    String::from_utf8_lossy(&rest[..end]).into_owned()
}
