//! RSA key custody.
//!
//! Key pairs are generated in process and the private key never leaves this
//! module unencrypted: export wraps the PKCS#8 PEM encoding with a key
//! derived from a passphrase (PBKDF2-HMAC-SHA256, 100 000 iterations) and
//! AES-256 in CBC mode with PKCS#7 padding. The wrapped container is
//! `salt(16) || iv(16) || ciphertext` with no header or version byte.
//!
//! Unwrapping deliberately collapses every failure mode into
//! [`Error::InvalidPassphrase`]: a wrong passphrase and a corrupted
//! container are indistinguishable to the caller.

use crate::error::{Error, Result};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes256;
use cbc::{Decryptor, Encryptor};
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

type Aes256CbcEnc = Encryptor<Aes256>;
type Aes256CbcDec = Decryptor<Aes256>;

/// RSA modulus size for generated keys, in bits.
pub const KEY_BITS: usize = 4096;

/// PBKDF2-HMAC-SHA256 iteration count for passphrase wrapping.
pub const WRAP_ITERATIONS: u32 = 100_000;

const SALT_LEN: usize = 16;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;
const DERIVED_KEY_LEN: usize = 32;

/// A passphrase-encrypted private key container.
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedKey {
    salt: [u8; SALT_LEN],
    iv: [u8; IV_LEN],
    ciphertext: Vec<u8>,
}

impl WrappedKey {
    /// Serialize as `salt || iv || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SALT_LEN + IV_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse a container previously produced by [`WrappedKey::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < SALT_LEN + IV_LEN + BLOCK_LEN {
            return Err(Error::KeyCustody(format!(
                "wrapped key container too short: {} bytes",
                data.len()
            )));
        }
        let ciphertext = data[SALT_LEN + IV_LEN..].to_vec();
        if !ciphertext.len().is_multiple_of(BLOCK_LEN) {
            return Err(Error::KeyCustody(
                "wrapped key ciphertext is not block-aligned".to_string(),
            ));
        }
        let mut salt = [0u8; SALT_LEN];
        let mut iv = [0u8; IV_LEN];
        salt.copy_from_slice(&data[..SALT_LEN]);
        iv.copy_from_slice(&data[SALT_LEN..SALT_LEN + IV_LEN]);
        Ok(Self { salt, iv, ciphertext })
    }
}

impl std::fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappedKey")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

/// Holder of an RSA key pair, either or both halves optional.
///
/// A signing party holds both halves; a verifying party typically holds
/// only the public key, loaded from PEM.
#[derive(Clone, Default)]
pub struct KeyCustody {
    private_key: Option<RsaPrivateKey>,
    public_key: Option<RsaPublicKey>,
}

impl KeyCustody {
    /// An empty custody with no key material.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh RSA-4096 key pair. This takes several seconds.
    pub fn generate() -> Result<Self> {
        log::info!("generating {}-bit RSA key pair", KEY_BITS);
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), KEY_BITS)
            .map_err(|e| Error::KeyCustody(format!("key generation failed: {}", e)))?;
        Ok(Self::from_private_key(private_key))
    }

    /// Generate a key pair on a background thread.
    ///
    /// Join the handle to obtain the result; generation cannot be cancelled.
    pub fn generate_in_background() -> std::thread::JoinHandle<Result<Self>> {
        std::thread::spawn(Self::generate)
    }

    /// Build a custody from an existing private key; the public half is
    /// derived from it.
    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        let public_key = RsaPublicKey::from(&private_key);
        Self {
            private_key: Some(private_key),
            public_key: Some(public_key),
        }
    }

    /// Build a verification-only custody from an SPKI PEM public key.
    pub fn from_public_key_pem(pem: &str) -> Result<Self> {
        let public_key = RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| Error::KeyCustody(format!("invalid public key PEM: {}", e)))?;
        Ok(Self {
            private_key: None,
            public_key: Some(public_key),
        })
    }

    pub fn private_key(&self) -> Option<&RsaPrivateKey> {
        self.private_key.as_ref()
    }

    pub fn public_key(&self) -> Option<&RsaPublicKey> {
        self.public_key.as_ref()
    }

    /// Export the public key as SPKI PEM.
    pub fn public_key_pem(&self) -> Result<String> {
        let public_key = self.public_key.as_ref().ok_or(Error::NoKeyAvailable)?;
        public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::KeyCustody(format!("public key encoding failed: {}", e)))
    }

    /// Encrypt the private key under a passphrase.
    pub fn wrap_private_key(&self, passphrase: &str) -> Result<WrappedKey> {
        let private_key = self.private_key.as_ref().ok_or(Error::NoKeyAvailable)?;
        if passphrase.is_empty() {
            return Err(Error::EmptyPassphrase);
        }

        let pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::KeyCustody(format!("private key encoding failed: {}", e)))?;

        let mut salt = [0u8; SALT_LEN];
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        rand::thread_rng().fill_bytes(&mut iv);

        let derived = derive_key(passphrase, &salt);

        // PKCS#7 pad, then encrypt in place
        let plaintext = pem.as_bytes();
        let padding_len = BLOCK_LEN - (plaintext.len() % BLOCK_LEN);
        let mut buffer = Zeroizing::new(plaintext.to_vec());
        buffer.extend(std::iter::repeat_n(padding_len as u8, padding_len));

        let len = buffer.len();
        let cipher = Aes256CbcEnc::new((&*derived).into(), (&iv).into());
        cipher
            .encrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buffer, len)
            .map_err(|e| Error::KeyCustody(format!("encryption failed: {}", e)))?;

        Ok(WrappedKey {
            salt,
            iv,
            ciphertext: buffer.to_vec(),
        })
    }

    /// Decrypt a wrapped private key.
    ///
    /// Any failure (wrong passphrase, truncated container, tampered
    /// ciphertext) reports as [`Error::InvalidPassphrase`].
    pub fn unwrap_private_key(wrapped: &WrappedKey, passphrase: &str) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(Error::EmptyPassphrase);
        }
        if wrapped.ciphertext.is_empty() || !wrapped.ciphertext.len().is_multiple_of(BLOCK_LEN) {
            return Err(Error::InvalidPassphrase);
        }

        let derived = derive_key(passphrase, &wrapped.salt);

        let mut buffer = Zeroizing::new(wrapped.ciphertext.clone());
        let cipher = Aes256CbcDec::new((&*derived).into(), (&wrapped.iv).into());
        let decrypted_len = cipher
            .decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buffer)
            .map_err(|_| Error::InvalidPassphrase)?
            .len();

        let padding_len = buffer[decrypted_len - 1] as usize;
        if padding_len == 0 || padding_len > BLOCK_LEN || padding_len > decrypted_len {
            return Err(Error::InvalidPassphrase);
        }

        let pem = std::str::from_utf8(&buffer[..decrypted_len - padding_len])
            .map_err(|_| Error::InvalidPassphrase)?;
        let private_key =
            RsaPrivateKey::from_pkcs8_pem(pem).map_err(|_| Error::InvalidPassphrase)?;

        Ok(Self::from_private_key(private_key))
    }
}

impl std::fmt::Debug for KeyCustody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCustody")
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("public_key", &self.public_key.as_ref().map(|_| "present"))
            .finish()
    }
}

/// Derive the AES-256 wrapping key from a passphrase and salt.
fn derive_key(passphrase: &str, salt: &[u8]) -> Zeroizing<[u8; DERIVED_KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, WRAP_ITERATIONS, &mut key[..]);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_custody() -> KeyCustody {
        // 2048 bits keeps the test fast; wrapping is size-independent
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        KeyCustody::from_private_key(key)
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let custody = test_custody();
        let wrapped = custody.wrap_private_key("correct horse").unwrap();
        let restored = KeyCustody::unwrap_private_key(&wrapped, "correct horse").unwrap();
        assert_eq!(restored.private_key(), custody.private_key());
        assert_eq!(restored.public_key(), custody.public_key());
    }

    #[test]
    fn test_wrong_passphrase() {
        let custody = test_custody();
        let wrapped = custody.wrap_private_key("right").unwrap();
        match KeyCustody::unwrap_private_key(&wrapped, "wrong") {
            Err(Error::InvalidPassphrase) => {},
            other => panic!("expected InvalidPassphrase, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let custody = test_custody();
        assert!(matches!(
            custody.wrap_private_key(""),
            Err(Error::EmptyPassphrase)
        ));
        let wrapped = custody.wrap_private_key("x").unwrap();
        assert!(matches!(
            KeyCustody::unwrap_private_key(&wrapped, ""),
            Err(Error::EmptyPassphrase)
        ));
    }

    #[test]
    fn test_wrap_without_private_key() {
        let custody = KeyCustody::new();
        assert!(matches!(
            custody.wrap_private_key("pass"),
            Err(Error::NoKeyAvailable)
        ));
    }

    #[test]
    fn test_container_bytes_roundtrip() {
        let custody = test_custody();
        let wrapped = custody.wrap_private_key("pass").unwrap();
        let bytes = wrapped.to_bytes();
        assert_eq!(&bytes[..16], &wrapped.salt);
        assert_eq!(&bytes[16..32], &wrapped.iv);
        let reparsed = WrappedKey::from_bytes(&bytes).unwrap();
        assert_eq!(reparsed, wrapped);
    }

    #[test]
    fn test_container_too_short() {
        assert!(WrappedKey::from_bytes(&[0u8; 32]).is_err());
        assert!(WrappedKey::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_container_unaligned_ciphertext() {
        assert!(WrappedKey::from_bytes(&[0u8; 49]).is_err());
    }

    #[test]
    fn test_tampered_ciphertext() {
        let custody = test_custody();
        let wrapped = custody.wrap_private_key("pass").unwrap();
        let mut bytes = wrapped.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let tampered = WrappedKey::from_bytes(&bytes).unwrap();
        assert!(matches!(
            KeyCustody::unwrap_private_key(&tampered, "pass"),
            Err(Error::InvalidPassphrase)
        ));
    }

    #[test]
    fn test_wrapping_is_salted() {
        let custody = test_custody();
        let a = custody.wrap_private_key("pass").unwrap();
        let b = custody.wrap_private_key("pass").unwrap();
        assert_ne!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn test_public_key_pem_roundtrip() {
        let custody = test_custody();
        let pem = custody.public_key_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        let verifier = KeyCustody::from_public_key_pem(&pem).unwrap();
        assert_eq!(verifier.public_key(), custody.public_key());
        assert!(verifier.private_key().is_none());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let custody = test_custody();
        let debug = format!("{:?}", custody);
        assert!(debug.contains("[REDACTED]"));
        let wrapped = custody.wrap_private_key("pass").unwrap();
        assert!(!format!("{:?}", wrapped).contains("salt"));
    }
}
