//! Error types for the PDF toolkit.

use std::io;
use thiserror::Error;

/// Reasons an encrypted document cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionErrorKind {
    /// The /Encrypt dictionary declares a version this crate does not handle.
    UnsupportedVersion(i32),
    /// Neither the user nor the owner interpretation of the password validates.
    InvalidPassword,
    /// The trailer carries no /ID, so the file key cannot be derived.
    MissingID,
}

impl std::fmt::Display for EncryptionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedVersion(v) => write!(f, "unsupported encryption version V={v}"),
            Self::InvalidPassword => write!(f, "invalid password"),
            Self::MissingID => write!(f, "missing file /ID"),
        }
    }
}

/// Main error type for all PDF operations.
#[derive(Error, Debug)]
pub enum PDFError {
    /// Malformed PDF syntax at a byte offset.
    #[error("parse error at byte {offset}: {reason}")]
    Parse { offset: usize, reason: String },

    /// Corrupted cross-reference data or unresolvable startxref.
    #[error("cross-reference error: {0}")]
    Xref(String),

    /// Document encryption cannot be handled or the password is wrong.
    #[error("encryption error: {0}")]
    Encryption(EncryptionErrorKind),

    /// An index fell outside its valid range.
    #[error("{what} {index} out of range [1, {bound}]")]
    OutOfRange {
        what: &'static str,
        index: i64,
        bound: i64,
    },

    /// A stream declares a filter this crate does not decode.
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// A form operation named a field the document does not contain.
    #[error("form field {0:?} not found")]
    FieldNotFound(String),

    /// A form operation ran against a document without an AcroForm.
    #[error("document has no form fields")]
    NoForm,

    /// A signature dictionary could not be decoded.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// A signature /ByteRange is negative or exceeds the file.
    #[error("signature byte range out of bounds")]
    BadByteRange,

    /// A signature failed digest comparison or cryptographic verification.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// A signature uses an algorithm this crate does not verify.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The page tree references itself.
    #[error("cycle detected in page tree")]
    CycleDetected,

    /// Underlying read or write failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PDFError>;

impl PDFError {
    /// Create a new parse error at the given byte offset.
    pub fn parse(offset: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            reason: reason.into(),
        }
    }

    /// Create a new cross-reference error.
    pub fn xref(msg: impl Into<String>) -> Self {
        Self::Xref(msg.into())
    }

    /// Create a new malformed-signature error.
    pub fn malformed_signature(msg: impl Into<String>) -> Self {
        Self::MalformedSignature(msg.into())
    }

    /// Check if the error concerns document structure rather than content.
    pub fn is_structure_error(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Xref(_) | Self::CycleDetected)
    }

    /// Check if the error concerns signature verification.
    pub fn is_signature_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedSignature(_)
                | Self::BadByteRange
                | Self::InvalidSignature(_)
                | Self::UnsupportedAlgorithm(_)
        )
    }
}
