//! Document signing.
//!
//! Signing computes the canonical page-text digest, signs it with RSA-PSS
//! (MGF1/SHA-256, maximal salt for the key size), and embeds the resulting
//! record in the document's Info dictionary. The input file is never
//! modified; the signed document is always written to a separate path.

use crate::document::PdfDocument;
use crate::envelope::{self, SignatureRecord, SignerInfo};
use crate::error::{Error, Result};
use crate::keys::KeyCustody;
use crate::{digest, pss_scheme};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use std::path::Path;

/// Signing party holding (optionally) a private key.
#[derive(Clone)]
pub struct Signer {
    private_key: Option<RsaPrivateKey>,
}

impl Signer {
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self {
            private_key: Some(private_key),
        }
    }

    /// A signer with no key; every signing attempt reports
    /// [`Error::NoKeyAvailable`].
    pub fn empty() -> Self {
        Self { private_key: None }
    }

    /// Borrow the private key out of a custody.
    pub fn from_custody(custody: &KeyCustody) -> Self {
        Self {
            private_key: custody.private_key().cloned(),
        }
    }

    /// Sign a document in memory, embedding the record.
    pub fn sign_document(
        &self,
        doc: &mut PdfDocument,
        signer: &SignerInfo,
    ) -> Result<SignatureRecord> {
        let key = self.private_key.as_ref().ok_or(Error::NoKeyAvailable)?;

        let digest = digest::compute(doc)?;
        let signature = key
            .sign_with_rng(&mut rand::thread_rng(), pss_scheme(key.size()), &digest)
            .map_err(|e| Error::KeyCustody(format!("signing failed: {}", e)))?;

        let record = SignatureRecord::new(signer.clone(), &signature);
        envelope::embed(doc, &record)?;
        log::info!("signed document as {}", signer.name);
        Ok(record)
    }

    /// Sign `input` and write the signed document to `output`.
    pub fn sign_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        signer: &SignerInfo,
    ) -> Result<SignatureRecord> {
        let input = input.as_ref();
        let output = output.as_ref();
        if input == output {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "signed output must not overwrite the input file",
            )
            .into());
        }

        let mut doc = PdfDocument::open(input)?;
        let record = self.sign_document(&mut doc, signer)?;
        doc.save(output)?;
        Ok(record)
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope;

    fn test_key() -> RsaPrivateKey {
        RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap()
    }

    #[test]
    fn test_sign_embeds_record() {
        let mut doc = PdfDocument::from_text_pages(&["Agreement text"]);
        let signer = Signer::new(test_key());
        let record = signer
            .sign_document(&mut doc, &SignerInfo::new("Alice"))
            .unwrap();

        assert_eq!(record.signer.name, "Alice");
        assert_eq!(envelope::extract(&doc).unwrap(), Some(record));
    }

    #[test]
    fn test_sign_without_key() {
        let mut doc = PdfDocument::from_text_pages(&["x"]);
        match Signer::empty().sign_document(&mut doc, &SignerInfo::new("Alice")) {
            Err(Error::NoKeyAvailable) => {},
            other => panic!("expected NoKeyAvailable, got {:?}", other.map(|_| ())),
        }
        // Nothing embedded on failure
        assert_eq!(envelope::extract(&doc).unwrap(), None);
    }

    #[test]
    fn test_resign_replaces_record() {
        let mut doc = PdfDocument::from_text_pages(&["x"]);
        let signer = Signer::new(test_key());
        signer
            .sign_document(&mut doc, &SignerInfo::new("Alice"))
            .unwrap();
        let second = signer
            .sign_document(&mut doc, &SignerInfo::new("Bob"))
            .unwrap();
        assert_eq!(envelope::extract(&doc).unwrap(), Some(second));
    }

    #[test]
    fn test_sign_file_rejects_in_place() {
        let signer = Signer::new(test_key());
        let result = signer.sign_file("a.pdf", "a.pdf", &SignerInfo::new("Alice"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
