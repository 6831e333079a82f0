//! Integration tests for key custody: wrapping a private key under a
//! passphrase, storing the container on disk, and restoring it.

use pades_lite::{Error, KeyCustody, WrappedKey};
use rsa::RsaPrivateKey;

fn custody() -> KeyCustody {
    // 2048-bit keys keep the test suite fast; wrapping does not depend on
    // key size
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("keygen failed");
    KeyCustody::from_private_key(key)
}

#[test]
fn test_wrap_store_restore() {
    let custody = custody();
    let wrapped = custody.wrap_private_key("1234").expect("wrap failed");

    let dir = tempfile::tempdir().expect("tempdir failed");
    let path = pades_lite::write_file(dir.path(), "private.key", &wrapped.to_bytes())
        .expect("write failed");

    let bytes = pades_lite::read_file(&path).expect("read failed");
    let reloaded = WrappedKey::from_bytes(&bytes).expect("container parse failed");
    let restored = KeyCustody::unwrap_private_key(&reloaded, "1234").expect("unwrap failed");

    assert_eq!(restored.private_key(), custody.private_key());
    assert_eq!(
        restored.public_key_pem().unwrap(),
        custody.public_key_pem().unwrap()
    );
}

#[test]
fn test_wrong_passphrase_after_disk_roundtrip() {
    let custody = custody();
    let bytes = custody.wrap_private_key("right").unwrap().to_bytes();
    let reloaded = WrappedKey::from_bytes(&bytes).unwrap();
    assert!(matches!(
        KeyCustody::unwrap_private_key(&reloaded, "wrong"),
        Err(Error::InvalidPassphrase)
    ));
}

#[test]
fn test_truncated_container_rejected() {
    let custody = custody();
    let mut bytes = custody.wrap_private_key("pass").unwrap().to_bytes();
    bytes.truncate(40);
    assert!(WrappedKey::from_bytes(&bytes).is_err());
}

#[test]
fn test_corrupted_salt_fails_cleanly() {
    let custody = custody();
    let mut bytes = custody.wrap_private_key("pass").unwrap().to_bytes();
    bytes[0] ^= 0xFF; // salt byte
    let reloaded = WrappedKey::from_bytes(&bytes).unwrap();
    assert!(matches!(
        KeyCustody::unwrap_private_key(&reloaded, "pass"),
        Err(Error::InvalidPassphrase)
    ));
}

#[test]
fn test_public_key_travels_separately() {
    let custody = custody();
    let pem = custody.public_key_pem().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = pades_lite::write_file(dir.path(), "public.pem", pem.as_bytes()).unwrap();
    let bytes = pades_lite::read_file(&path).unwrap();
    let verifier_side =
        KeyCustody::from_public_key_pem(std::str::from_utf8(&bytes).unwrap()).unwrap();

    assert_eq!(verifier_side.public_key(), custody.public_key());
    assert!(verifier_side.private_key().is_none());
}
