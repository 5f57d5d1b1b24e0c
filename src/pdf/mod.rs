//! PDF syntax layer: the object model, the recursive-descent parser,
//! stream filters, and cross-reference tables.

pub mod filter;
pub mod object;
pub mod parser;
pub mod xref;

pub use filter::decode_stream;
pub use object::{Dict, IndirectObject, Object, ObjectRef, PDFString, Stream};
pub use parser::Parser;
pub use xref::{XrefEntry, XrefTable};
