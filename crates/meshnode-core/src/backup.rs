//! Password-encrypted export and import of the private key
//!
//! ## Wire Format
//!
//! ```text
//! [salt (16 bytes)] [nonce (24 bytes)] [ciphertext + tag (64 + 16 bytes)]
//! ```
//!
//! The key is `SHA-512(password || salt)[..32]`; the private key bytes are
//! sealed with XChaCha20-Poly1305. There is no magic number or version
//! byte.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha512};
use tracing::{debug, info, warn};

use crate::crypto::{random_bytes, PeerCipher, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use crate::error::BackupError;
use crate::identity::KeyPair;
use crate::keystore::write_file_with_mode;

/// Random salt size (16 bytes)
pub const SALT_SIZE: usize = 16;

/// Smallest blob that can possibly decrypt
pub const MIN_BACKUP_SIZE: usize = SALT_SIZE + NONCE_SIZE + TAG_SIZE;

/// Derive a 32-byte key from a password and salt.
///
/// A single SHA-512 pass. Fast, so weak passwords are cheap to brute-force
/// offline.
// TODO: move to Argon2id behind a format version byte once the backup
// layout carries one.
pub fn derive_key_from_password(password: &[u8], salt: &[u8]) -> [u8; KEY_SIZE] {
    let mut hasher = Sha512::new();
    hasher.update(password);
    hasher.update(salt);
    let digest = hasher.finalize();

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&digest[..KEY_SIZE]);
    key
}

/// Encrypt the private key under a password.
///
/// Fresh salt and nonce on every call, so two exports of the same key never
/// produce the same bytes.
pub fn export_encrypted_backup(keypair: &KeyPair, password: &str) -> Result<Vec<u8>, BackupError> {
    let salt: [u8; SALT_SIZE] = random_bytes()?;
    let nonce = PeerCipher::generate_nonce()?;
    let key = derive_key_from_password(password.as_bytes(), &salt);

    let ciphertext =
        PeerCipher::new(&key).encrypt_with_nonce(&keypair.private_key_bytes(), &nonce)?;

    let mut blob = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a backup and rebuild the keypair.
///
/// Length is checked before any cryptography runs. A wrong password and a
/// tampered blob both yield [`BackupError::DecryptionFailed`].
pub fn import_encrypted_backup(blob: &[u8], password: &str) -> Result<KeyPair, BackupError> {
    if blob.len() < MIN_BACKUP_SIZE {
        return Err(BackupError::TooShort {
            len: blob.len(),
            min: MIN_BACKUP_SIZE,
        });
    }

    let (salt, rest) = blob.split_at(SALT_SIZE);
    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);
    let nonce: &[u8; NONCE_SIZE] = nonce
        .try_into()
        .map_err(|_| BackupError::DecryptionFailed)?;

    let key = derive_key_from_password(password.as_bytes(), salt);
    let private_key = PeerCipher::new(&key)
        .decrypt_with_nonce(ciphertext, nonce)
        .map_err(|_| BackupError::DecryptionFailed)?;

    let keypair = KeyPair::from_private_bytes(&private_key).map_err(|e| {
        warn!(error = %e, "Backup authenticated but holds a malformed key");
        BackupError::Key(e)
    })?;
    debug!(address = %keypair.address(), "Imported encrypted backup");
    Ok(keypair)
}

/// Write a backup blob, owner read/write only
pub fn save_encrypted_backup(blob: &[u8], path: &Path) -> Result<(), BackupError> {
    let io_err = |source: std::io::Error| BackupError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    write_file_with_mode(path, blob, 0o600).map_err(io_err)?;

    info!(path = %path.display(), bytes = blob.len(), "Saved encrypted backup");
    Ok(())
}

/// Read a backup blob
pub fn load_encrypted_backup(path: &Path) -> Result<Vec<u8>, BackupError> {
    fs::read(path).map_err(|source| BackupError::Io {
        path: path.to_path_buf(),
        source,
    })
}
