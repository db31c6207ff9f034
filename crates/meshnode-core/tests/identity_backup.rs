//! Identity lifecycle tests
//!
//! Key generation, on-disk storage, address derivation and encrypted backups
//! exercised together through the public API.

use meshnode_core::backup::{
    export_encrypted_backup, import_encrypted_backup, load_encrypted_backup,
    save_encrypted_backup, MIN_BACKUP_SIZE,
};
use meshnode_core::identity::{verify, MeshAddress};
use meshnode_core::keystore::KeyStore;
use meshnode_core::{BackupError, KeyPair};
use tempfile::TempDir;

// ============================================================================
// Backup Scenario
// ============================================================================

#[test]
fn test_corrupted_backup_then_clean_reexport() {
    let keypair = KeyPair::generate().unwrap();
    let address = keypair.address();
    assert!(address.to_string().starts_with("200:"));

    let mut blob = export_encrypted_backup(&keypair, "correct-horse").unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0x01;

    let result = import_encrypted_backup(&blob, "correct-horse");
    assert!(matches!(result, Err(BackupError::DecryptionFailed)));

    let blob = export_encrypted_backup(&keypair, "correct-horse").unwrap();
    let restored = import_encrypted_backup(&blob, "correct-horse").unwrap();

    assert_eq!(restored.private_key_bytes(), keypair.private_key_bytes());
    assert_eq!(restored.address(), address);
}

#[test]
fn test_wrong_password_is_indistinguishable_from_tamper() {
    let keypair = KeyPair::generate().unwrap();
    let blob = export_encrypted_backup(&keypair, "pw").unwrap();

    let wrong = import_encrypted_backup(&blob, "not-pw").unwrap_err();

    let mut tampered = blob.clone();
    tampered[MIN_BACKUP_SIZE - 1] ^= 0xff;
    let tamper = import_encrypted_backup(&tampered, "pw").unwrap_err();

    assert_eq!(wrong.to_string(), tamper.to_string());
}

#[test]
fn test_short_blobs_rejected() {
    for len in [0, 1, 16, 40, MIN_BACKUP_SIZE - 1] {
        let blob = vec![0u8; len];
        match import_encrypted_backup(&blob, "pw") {
            Err(BackupError::TooShort { len: got, min }) => {
                assert_eq!(got, len);
                assert_eq!(min, MIN_BACKUP_SIZE);
            }
            other => panic!("expected TooShort for {} bytes, got {:?}", len, other),
        }
    }
}

#[test]
fn test_backup_file_restores_into_new_data_dir() {
    let original_dir = TempDir::new().unwrap();
    let restored_dir = TempDir::new().unwrap();
    let backup_path = original_dir.path().join("identity.backup");

    let store = KeyStore::new(original_dir.path());
    let keypair = store.generate().unwrap();

    let blob = export_encrypted_backup(&keypair, "hunter2").unwrap();
    save_encrypted_backup(&blob, &backup_path).unwrap();

    let loaded = load_encrypted_backup(&backup_path).unwrap();
    let restored = import_encrypted_backup(&loaded, "hunter2").unwrap();

    let new_store = KeyStore::new(restored_dir.path());
    new_store.save(&restored).unwrap();

    let reloaded = new_store.load().unwrap();
    assert_eq!(reloaded.public_key(), keypair.public_key());
    assert_eq!(reloaded.address(), keypair.address());
}

// ============================================================================
// Key Store + Signing
// ============================================================================

#[test]
fn test_restart_keeps_identity() {
    let dir = TempDir::new().unwrap();

    let first = KeyStore::new(dir.path()).load_or_generate().unwrap();
    let second = KeyStore::new(dir.path()).load_or_generate().unwrap();

    assert_eq!(first.public_key(), second.public_key());

    let signature = first.sign(b"hello mesh");
    assert!(verify(&second.public_key(), b"hello mesh", &signature.to_bytes()));
}

#[test]
fn test_address_text_parses_back() {
    let keypair = KeyPair::generate().unwrap();
    let text = keypair.address().to_string();

    let parsed: MeshAddress = text.parse().unwrap();
    assert_eq!(parsed, keypair.address());
    assert_eq!(text.split(':').count(), 9);
}
