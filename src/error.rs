//! Error types for the signing core.
//!
//! This module defines all error types that can occur during key custody,
//! PDF parsing, and signature handling. Cryptographic verification mismatch
//! is deliberately NOT an error; it is a [`VerificationStatus`] value,
//! since an invalid signature is an expected, recoverable outcome.
//!
//! [`VerificationStatus`]: crate::verifier::VerificationStatus

/// Result type alias for signing-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during key custody and PDF processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation required a key that is not currently held
    #[error("No key available: generate or load a key pair first")]
    NoKeyAvailable,

    /// Private-key unwrap failed.
    ///
    /// Wrong passphrase, corrupted blob, and tampered ciphertext are
    /// indistinguishable by design; the message must not leak which.
    #[error("Invalid passphrase or corrupted key data")]
    InvalidPassphrase,

    /// A passphrase was supplied that cannot be used for wrapping
    #[error("Passphrase must not be empty")]
    EmptyPassphrase,

    /// Removable-store target (volume or file) is not currently present
    #[error("No such path: {0}")]
    NoSuchPath(std::path::PathBuf),

    /// An embedded signature record was present but unparsable
    #[error("Malformed signature record: {0}")]
    MalformedRecord(String),

    /// Key serialization or low-level cipher failure
    #[error("Key custody error: {0}")]
    KeyCustody(String),

    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Circular reference detected in the object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(crate::object::ObjectRef),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
