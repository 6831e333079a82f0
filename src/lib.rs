//! # pades_lite
//!
//! A self-contained PDF signing core: RSA-4096 key custody with
//! passphrase-wrapped export, a metadata-independent content digest,
//! RSA-PSS signatures embedded as a JSON record in the document's Info
//! dictionary, and verification against the document's current text.
//!
//! The signature covers *what the document says*, not how the file is laid
//! out: the canonical digest hashes the extracted page text, so rewriting
//! the file, recompressing streams, or editing unrelated metadata leaves a
//! signature valid, while any change to the visible text invalidates it.
//!
//! ## Example
//!
//! ```no_run
//! use pades_lite::{KeyCustody, PdfDocument, Signer, SignerInfo, Verifier};
//!
//! # fn main() -> pades_lite::Result<()> {
//! let custody = KeyCustody::generate()?;
//!
//! // Wrap the private key for cold storage
//! let wrapped = custody.wrap_private_key("correct horse battery staple")?;
//! std::fs::write("private.key", wrapped.to_bytes())?;
//!
//! // Sign
//! let mut doc = PdfDocument::open("contract.pdf")?;
//! let signer = Signer::from_custody(&custody);
//! signer.sign_document(&mut doc, &SignerInfo::new("Alice"))?;
//! doc.save("contract.signed.pdf")?;
//!
//! // Verify
//! let verifier = Verifier::new(custody.public_key().unwrap().clone());
//! let report = verifier.verify_file("contract.signed.pdf")?;
//! assert!(report.is_valid());
//! # Ok(())
//! # }
//! ```

pub mod digest;
pub mod document;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod signer;
pub mod store;
pub mod verifier;
pub mod writer;

pub use document::PdfDocument;
pub use envelope::{SignatureRecord, SignerInfo};
pub use error::{Error, Result};
pub use keys::{KeyCustody, WrappedKey};
pub use object::{Dict, Object, ObjectRef};
pub use signer::Signer;
pub use store::{list_removable_volumes, read_file, write_file, RemovableVolume};
pub use verifier::{VerificationReport, VerificationStatus, Verifier};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// RSA-PSS scheme used for all signatures: MGF1 with SHA-256 and the
/// maximal salt the key size allows (`modulus_bytes - digest_len - 2`).
pub(crate) fn pss_scheme(key_size_bytes: usize) -> rsa::Pss {
    rsa::Pss::new_with_salt::<sha2::Sha256>(key_size_bytes - 32 - 2)
}
