//! Signature verification.
//!
//! Verification recomputes the canonical digest and checks it against the
//! embedded record with RSA-PSS. Outcomes that describe the document
//! (unsigned, malformed record, signature mismatch) are statuses in the
//! report, not errors; `Err` is reserved for documents that cannot be
//! processed at all.

use crate::document::PdfDocument;
use crate::envelope::{self, SignatureRecord, HASH_ALGORITHM};
use crate::error::{Error, Result};
use crate::{digest, pss_scheme};
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use std::path::Path;

/// Outcome of verifying one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Record present, signature checks out against the current page text.
    Valid,
    /// The verifier holds no public key.
    NoPublicKey,
    /// The document carries no signature record.
    NotSigned,
    /// A record is present but cannot be interpreted.
    MalformedRecord,
    /// The signature does not match the document's current content.
    Mismatch,
}

impl VerificationStatus {
    pub fn is_valid(self) -> bool {
        matches!(self, VerificationStatus::Valid)
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            VerificationStatus::Valid => "valid",
            VerificationStatus::NoPublicKey => "no public key available",
            VerificationStatus::NotSigned => "document is not signed",
            VerificationStatus::MalformedRecord => "signature record is malformed",
            VerificationStatus::Mismatch => "signature does not match content",
        };
        f.write_str(text)
    }
}

/// Verification result plus the record it was checked against, when one
/// could be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub status: VerificationStatus,
    pub record: Option<SignatureRecord>,
}

impl VerificationReport {
    fn status_only(status: VerificationStatus) -> Self {
        Self {
            status,
            record: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status.is_valid()
    }
}

/// Verifying party holding (optionally) a public key.
#[derive(Debug, Clone)]
pub struct Verifier {
    public_key: Option<RsaPublicKey>,
}

impl Verifier {
    pub fn new(public_key: RsaPublicKey) -> Self {
        Self {
            public_key: Some(public_key),
        }
    }

    /// A verifier with no key; every document reports `NoPublicKey`.
    pub fn empty() -> Self {
        Self { public_key: None }
    }

    /// Check a document's embedded signature against its current content.
    pub fn verify(&self, doc: &PdfDocument) -> Result<VerificationReport> {
        let Some(public_key) = self.public_key.as_ref() else {
            return Ok(VerificationReport::status_only(
                VerificationStatus::NoPublicKey,
            ));
        };

        let record = match envelope::extract(doc) {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Ok(VerificationReport::status_only(VerificationStatus::NotSigned));
            },
            Err(Error::MalformedRecord(reason)) => {
                log::warn!("unreadable signature record: {}", reason);
                return Ok(VerificationReport::status_only(
                    VerificationStatus::MalformedRecord,
                ));
            },
            Err(e) => return Err(e),
        };

        if record.hash_algorithm != HASH_ALGORITHM {
            log::warn!("unknown hash algorithm {:?}", record.hash_algorithm);
            return Ok(VerificationReport {
                status: VerificationStatus::MalformedRecord,
                record: Some(record),
            });
        }
        let signature = match record.signature_bytes() {
            Ok(bytes) => bytes,
            Err(_) => {
                return Ok(VerificationReport {
                    status: VerificationStatus::MalformedRecord,
                    record: Some(record),
                });
            },
        };

        let digest = digest::compute(doc)?;
        let status = match public_key.verify(pss_scheme(public_key.size()), &digest, &signature) {
            Ok(()) => VerificationStatus::Valid,
            Err(_) => VerificationStatus::Mismatch,
        };
        Ok(VerificationReport {
            status,
            record: Some(record),
        })
    }

    /// Open a file and verify it.
    pub fn verify_file(&self, path: impl AsRef<Path>) -> Result<VerificationReport> {
        let doc = PdfDocument::open(path)?;
        self.verify(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{SignatureRecord, SignerInfo, METADATA_KEY};
    use crate::object::Object;
    use crate::signer::Signer;
    use rsa::RsaPrivateKey;

    fn signed_doc() -> (PdfDocument, RsaPrivateKey) {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let mut doc = PdfDocument::from_text_pages(&["Contract body"]);
        Signer::new(key.clone())
            .sign_document(&mut doc, &SignerInfo::new("Alice"))
            .unwrap();
        (doc, key)
    }

    #[test]
    fn test_valid_signature() {
        let (doc, key) = signed_doc();
        let report = Verifier::new(RsaPublicKey::from(&key)).verify(&doc).unwrap();
        assert!(report.is_valid());
        assert_eq!(report.record.unwrap().signer.name, "Alice");
    }

    #[test]
    fn test_no_public_key() {
        let (doc, _) = signed_doc();
        let report = Verifier::empty().verify(&doc).unwrap();
        assert_eq!(report.status, VerificationStatus::NoPublicKey);
    }

    #[test]
    fn test_not_signed() {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let doc = PdfDocument::from_text_pages(&["x"]);
        let report = Verifier::new(RsaPublicKey::from(&key)).verify(&doc).unwrap();
        assert_eq!(report.status, VerificationStatus::NotSigned);
        assert_eq!(report.record, None);
    }

    #[test]
    fn test_wrong_key_is_mismatch() {
        let (doc, _) = signed_doc();
        let other = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let report = Verifier::new(RsaPublicKey::from(&other)).verify(&doc).unwrap();
        assert_eq!(report.status, VerificationStatus::Mismatch);
    }

    #[test]
    fn test_tampered_content_is_mismatch() {
        let (doc, key) = signed_doc();
        // Re-create the document with different text but the original record
        let record = envelope::extract(&doc).unwrap().unwrap();
        let mut tampered = PdfDocument::from_text_pages(&["Altered body"]);
        envelope::embed(&mut tampered, &record).unwrap();

        let report = Verifier::new(RsaPublicKey::from(&key))
            .verify(&tampered)
            .unwrap();
        assert_eq!(report.status, VerificationStatus::Mismatch);
    }

    #[test]
    fn test_malformed_record() {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let mut doc = PdfDocument::from_text_pages(&["x"]);
        doc.set_metadata(METADATA_KEY, Object::String(b"not json".to_vec()));
        let report = Verifier::new(RsaPublicKey::from(&key)).verify(&doc).unwrap();
        assert_eq!(report.status, VerificationStatus::MalformedRecord);
    }

    #[test]
    fn test_unknown_hash_algorithm() {
        let (mut doc, key) = signed_doc();
        let mut record = envelope::extract(&doc).unwrap().unwrap();
        record.hash_algorithm = "MD5".to_string();
        envelope::embed(&mut doc, &record).unwrap();

        let report = Verifier::new(RsaPublicKey::from(&key)).verify(&doc).unwrap();
        assert_eq!(report.status, VerificationStatus::MalformedRecord);
    }

    #[test]
    fn test_bad_base64_signature() {
        let (mut doc, key) = signed_doc();
        let mut record = envelope::extract(&doc).unwrap().unwrap();
        record.signature = "///not-base64///".to_string();
        envelope::embed(&mut doc, &record).unwrap();

        let report = Verifier::new(RsaPublicKey::from(&key)).verify(&doc).unwrap();
        assert_eq!(report.status, VerificationStatus::MalformedRecord);
    }

    #[test]
    fn test_metadata_edits_keep_signature_valid() {
        let (mut doc, key) = signed_doc();
        doc.set_metadata("Author", Object::String(b"Somebody Else".to_vec()));
        let report = Verifier::new(RsaPublicKey::from(&key)).verify(&doc).unwrap();
        assert!(report.is_valid());
    }

    #[test]
    fn test_sign_record_struct_eq() {
        let a = SignatureRecord::new(SignerInfo::new("X"), b"sig");
        let b = a.clone();
        assert_eq!(a, b);
    }
}
