//! PDF toolkit working directly on the file's bytes.
//!
//! The crate reads existing PDF documents (objects, cross-reference
//! tables, RC4 encryption, page tree, AcroForm fields, text) and mutates
//! them at the byte level: form filling and flattening, page operations
//! driven through a writer collaborator, and detached PKCS#7 signatures.
//!
//! # Reading
//!
//! ```no_run
//! use pdfbyte::Document;
//!
//! let doc = Document::open("report.pdf")?;
//! println!("{} pages, version {}", doc.num_pages(), doc.version());
//! for (i, page) in doc.pages() {
//!     println!("page {i}: {}", page.extract_text()?);
//! }
//! # Ok::<(), pdfbyte::PDFError>(())
//! ```
//!
//! # Filling a form
//!
//! ```no_run
//! use std::collections::HashMap;
//!
//! let input = std::fs::read("form.pdf")?;
//! let mut values = HashMap::new();
//! values.insert("name".to_string(), "John Doe".to_string());
//! let filled = pdfbyte::form::fill(&input, &values)?;
//! std::fs::write("filled.pdf", filled)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod crypto;
pub mod doc;
pub mod error;
pub mod form;
pub mod pageops;
pub mod pdf;
pub mod sign;

#[cfg(test)]
pub(crate) mod testutil;

pub use doc::{Document, FormField, Page, Rect};
pub use error::{EncryptionErrorKind, PDFError, Result};
pub use pdf::{Dict, Object, ObjectRef, PDFString, Stream};
