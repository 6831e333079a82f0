//! Signature record embedding.
//!
//! A signed document carries exactly one extra piece of state: a JSON
//! record stored as a string under the `Signature` key of the Info
//! dictionary. The record holds the signer identity, a timestamp, the
//! base64 signature bytes, and the hash algorithm name. Because the
//! canonical digest ignores metadata, embedding the record does not
//! invalidate the signature it carries.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::Object;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Record format version.
pub const RECORD_VERSION: &str = "1.0";

/// Hash algorithm name recorded in every signature.
pub const HASH_ALGORITHM: &str = "SHA-256";

/// Info dictionary key holding the signature record.
pub const METADATA_KEY: &str = "Signature";

/// Identity of the signing party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl SignerInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contact: None,
            location: None,
        }
    }
}

/// The JSON payload embedded in a signed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub version: String,
    pub timestamp: String,
    pub signer: SignerInfo,
    /// Base64-encoded RSA-PSS signature over the canonical digest.
    pub signature: String,
    pub hash_algorithm: String,
}

impl SignatureRecord {
    /// Build a record for freshly produced signature bytes, timestamped now.
    pub fn new(signer: SignerInfo, signature: &[u8]) -> Self {
        Self {
            version: RECORD_VERSION.to_string(),
            timestamp: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            signer,
            signature: BASE64.encode(signature),
            hash_algorithm: HASH_ALGORITHM.to_string(),
        }
    }

    /// Decode the signature field.
    pub fn signature_bytes(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(&self.signature)
            .map_err(|e| Error::MalformedRecord(format!("signature is not valid base64: {}", e)))
    }
}

/// Store a record in the document, replacing any existing one.
pub fn embed(doc: &mut PdfDocument, record: &SignatureRecord) -> Result<()> {
    let json = serde_json::to_string(record)
        .map_err(|e| Error::MalformedRecord(format!("record serialization failed: {}", e)))?;
    doc.set_metadata(METADATA_KEY, Object::String(json.into_bytes()));
    Ok(())
}

/// Read the record back out of a document.
///
/// `Ok(None)` means the document carries no record at all; a present but
/// unparseable record is an [`Error::MalformedRecord`].
pub fn extract(doc: &PdfDocument) -> Result<Option<SignatureRecord>> {
    let Some(entry) = doc.metadata(METADATA_KEY) else {
        return Ok(None);
    };
    let bytes = entry.as_string().ok_or_else(|| {
        Error::MalformedRecord(format!(
            "signature entry is a {}, expected a string",
            entry.type_name()
        ))
    })?;
    let json = std::str::from_utf8(bytes)
        .map_err(|_| Error::MalformedRecord("signature entry is not UTF-8".to_string()))?;
    let record = serde_json::from_str(json)
        .map_err(|e| Error::MalformedRecord(format!("invalid signature JSON: {}", e)))?;
    Ok(Some(record))
}

/// Remove the record from a document. Returns whether one was present.
pub fn remove(doc: &mut PdfDocument) -> bool {
    doc.remove_metadata(METADATA_KEY)
}
