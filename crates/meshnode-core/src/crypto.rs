//! Peer message protection using XChaCha20-Poly1305 AEAD
//!
//! Provides symmetric encryption of peer payloads under a 32-byte shared
//! key, and the X25519 key agreement that produces that key.
//!
//! # Wire Format
//!
//! A [`PeerEnvelope`] on the wire is `[nonce (24 bytes)] + [ciphertext + tag (16 bytes)]`.

use crate::error::CryptoError;
use crate::identity::{KeyPair, PUBLIC_KEY_SIZE};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use ed25519_dalek::VerifyingKey;
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::PublicKey as X25519PublicKey;

/// Symmetric key size (32 bytes)
pub const KEY_SIZE: usize = 32;

/// Nonce size for XChaCha20-Poly1305 (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Domain separation string for HKDF
const HKDF_INFO: &[u8] = b"meshnode-peer-key-v1";

/// Fill a buffer from the OS random source
pub(crate) fn random_bytes<const N: usize>() -> Result<[u8; N], CryptoError> {
    let mut bytes = [0u8; N];
    getrandom::getrandom(&mut bytes).map_err(|_| CryptoError::RngFailure)?;
    Ok(bytes)
}

/// Encryption utilities for peer payloads using XChaCha20-Poly1305 AEAD.
///
/// Holds a cipher initialised with one symmetric key. Every encryption draws
/// a fresh random nonce.
///
/// # Example
///
/// ```
/// use meshnode_core::crypto::PeerCipher;
///
/// let key = PeerCipher::generate_key().unwrap();
/// let cipher = PeerCipher::new(&key);
///
/// let envelope = cipher.seal(b"Hello, World!").unwrap();
/// let opened = cipher.open(&envelope).unwrap();
///
/// assert_eq!(opened, b"Hello, World!");
/// ```
pub struct PeerCipher {
    cipher: XChaCha20Poly1305,
}

impl PeerCipher {
    /// Create a cipher for the given 32-byte key
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(key.into()),
        }
    }

    /// Generate a new random 32-byte key
    pub fn generate_key() -> Result<[u8; KEY_SIZE], CryptoError> {
        random_bytes()
    }

    /// Generate a random 24-byte nonce
    pub fn generate_nonce() -> Result<[u8; NONCE_SIZE], CryptoError> {
        random_bytes()
    }

    /// Encrypt under a fresh random nonce
    pub fn seal(&self, plaintext: &[u8]) -> Result<PeerEnvelope, CryptoError> {
        let nonce = Self::generate_nonce()?;
        let ciphertext = self.encrypt_with_nonce(plaintext, &nonce)?;
        Ok(PeerEnvelope { nonce, ciphertext })
    }

    /// Decrypt and authenticate an envelope
    pub fn open(&self, envelope: &PeerEnvelope) -> Result<Vec<u8>, CryptoError> {
        self.decrypt_with_nonce(&envelope.ciphertext, &envelope.nonce)
    }

    /// Encrypt with a caller-supplied nonce.
    ///
    /// The nonce is not included in the output. It must never repeat under
    /// the same key.
    pub fn encrypt_with_nonce(
        &self,
        plaintext: &[u8],
        nonce: &[u8; NONCE_SIZE],
    ) -> Result<Vec<u8>, CryptoError> {
        self.cipher
            .encrypt(XNonce::from_slice(nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)
    }

    /// Decrypt with a separately supplied nonce.
    ///
    /// Any tag mismatch is [`CryptoError::AuthFailed`].
    pub fn decrypt_with_nonce(
        &self,
        ciphertext: &[u8],
        nonce: &[u8; NONCE_SIZE],
    ) -> Result<Vec<u8>, CryptoError> {
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::AuthFailed)
    }
}

/// An encrypted point-to-point message. Not persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerEnvelope {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

impl PeerEnvelope {
    /// `nonce || ciphertext`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Split a wire envelope.
    ///
    /// Input shorter than the nonce fails closed with
    /// [`CryptoError::AuthFailed`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < NONCE_SIZE {
            return Err(CryptoError::AuthFailed);
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let nonce: [u8; NONCE_SIZE] = nonce.try_into().map_err(|_| CryptoError::AuthFailed)?;
        Ok(Self {
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Encrypt a message for a peer under a shared key
pub fn encrypt_for_recipient(
    message: &[u8],
    shared_key: &[u8; KEY_SIZE],
) -> Result<PeerEnvelope, CryptoError> {
    PeerCipher::new(shared_key).seal(message)
}

/// Decrypt a message from a peer under a shared key
pub fn decrypt_from_sender(
    envelope: &PeerEnvelope,
    shared_key: &[u8; KEY_SIZE],
) -> Result<Vec<u8>, CryptoError> {
    PeerCipher::new(shared_key).open(envelope)
}

/// Decrypt a wire-encoded envelope (`nonce || ciphertext`)
pub fn decrypt_bytes_from_sender(
    payload: &[u8],
    shared_key: &[u8; KEY_SIZE],
) -> Result<Vec<u8>, CryptoError> {
    decrypt_from_sender(&PeerEnvelope::from_bytes(payload)?, shared_key)
}

/// Derive the symmetric key shared between our keypair and a remote peer.
///
/// X25519 over the Montgomery forms of the two Ed25519 keys, expanded with
/// HKDF-SHA256. Both public keys go into the HKDF salt in sorted order, so
/// both sides compute the same key. Depends on our private key: an observer
/// who only knows the two public keys cannot compute it.
pub fn derive_shared_key(
    local: &KeyPair,
    remote_public: &[u8; PUBLIC_KEY_SIZE],
) -> Result<[u8; KEY_SIZE], CryptoError> {
    let remote_montgomery = VerifyingKey::from_bytes(remote_public)
        .map_err(|_| CryptoError::InvalidPublicKey)?
        .to_montgomery();
    let remote_x25519 = X25519PublicKey::from(remote_montgomery.to_bytes());

    let shared = local.x25519_secret().diffie_hellman(&remote_x25519);
    if !shared.was_contributory() {
        return Err(CryptoError::WeakSharedSecret);
    }

    let local_public = local.public_key();
    let (first, second) = if local_public <= *remote_public {
        (&local_public, remote_public)
    } else {
        (remote_public, &local_public)
    };
    let mut salt = [0u8; 2 * PUBLIC_KEY_SIZE];
    salt[..PUBLIC_KEY_SIZE].copy_from_slice(first);
    salt[PUBLIC_KEY_SIZE..].copy_from_slice(second);

    let hkdf = Hkdf::<Sha256>::new(Some(&salt), shared.as_bytes());
    let mut output = [0u8; KEY_SIZE];
    hkdf.expand(HKDF_INFO, &mut output)
        .map_err(|_| CryptoError::EncryptionFailed)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_key() {
        let key1 = PeerCipher::generate_key().unwrap();
        let key2 = PeerCipher::generate_key().unwrap();
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = PeerCipher::generate_key().unwrap();
        let cipher = PeerCipher::new(&key);

        let envelope = cipher.seal(b"Hello, World!").unwrap();
        assert_eq!(cipher.open(&envelope).unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_seal_open_empty() {
        let key = PeerCipher::generate_key().unwrap();
        let cipher = PeerCipher::new(&key);

        let envelope = cipher.seal(b"").unwrap();
        assert_eq!(envelope.ciphertext.len(), TAG_SIZE);
        assert!(cipher.open(&envelope).unwrap().is_empty());
    }

    #[test]
    fn test_same_plaintext_different_ciphertext() {
        let key = PeerCipher::generate_key().unwrap();
        let cipher = PeerCipher::new(&key);

        let a = cipher.seal(b"Deterministic test").unwrap();
        let b = cipher.seal(b"Deterministic test").unwrap();

        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = PeerCipher::generate_key().unwrap();
        let key2 = PeerCipher::generate_key().unwrap();

        let envelope = encrypt_for_recipient(b"Secret", &key1).unwrap();
        assert_eq!(
            decrypt_from_sender(&envelope, &key2).unwrap_err(),
            CryptoError::AuthFailed
        );
    }

    #[test]
    fn test_tampered_data_fails() {
        let key = PeerCipher::generate_key().unwrap();
        let mut wire = encrypt_for_recipient(b"Original message", &key)
            .unwrap()
            .to_bytes();

        for index in [0, NONCE_SIZE, wire.len() - 1] {
            wire[index] ^= 0x01;
            assert_eq!(
                decrypt_bytes_from_sender(&wire, &key).unwrap_err(),
                CryptoError::AuthFailed
            );
            wire[index] ^= 0x01;
        }
        assert!(decrypt_bytes_from_sender(&wire, &key).is_ok());
    }

    #[test]
    fn test_truncated_data_fails() {
        let key = PeerCipher::generate_key().unwrap();
        let wire = encrypt_for_recipient(b"Original message", &key)
            .unwrap()
            .to_bytes();

        // Shorter than the nonce
        assert_eq!(
            decrypt_bytes_from_sender(&wire[..5], &key).unwrap_err(),
            CryptoError::AuthFailed
        );
        // Nonce only, no tag
        assert_eq!(
            decrypt_bytes_from_sender(&wire[..NONCE_SIZE], &key).unwrap_err(),
            CryptoError::AuthFailed
        );
        // Missing last byte of tag
        assert_eq!(
            decrypt_bytes_from_sender(&wire[..wire.len() - 1], &key).unwrap_err(),
            CryptoError::AuthFailed
        );
    }

    #[test]
    fn test_envelope_wire_layout() {
        let key = PeerCipher::generate_key().unwrap();
        let envelope = encrypt_for_recipient(b"Test", &key).unwrap();
        let wire = envelope.to_bytes();

        assert_eq!(wire.len(), NONCE_SIZE + 4 + TAG_SIZE);
        assert_eq!(&wire[..NONCE_SIZE], &envelope.nonce);
        assert_eq!(PeerEnvelope::from_bytes(&wire).unwrap(), envelope);
    }

    #[test]
    fn test_same_nonce_same_ciphertext() {
        let key = PeerCipher::generate_key().unwrap();
        let cipher = PeerCipher::new(&key);
        let nonce = [0x42u8; NONCE_SIZE];

        let a = cipher.encrypt_with_nonce(b"Fixed", &nonce).unwrap();
        let b = cipher.encrypt_with_nonce(b"Fixed", &nonce).unwrap();
        assert_eq!(a, b);
        assert_eq!(cipher.decrypt_with_nonce(&a, &nonce).unwrap(), b"Fixed");
    }

    #[test]
    fn test_shared_key_agrees() {
        let alice = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();

        let ab = derive_shared_key(&alice, &bob.public_key()).unwrap();
        let ba = derive_shared_key(&bob, &alice.public_key()).unwrap();
        assert_eq!(ab, ba);

        let envelope = encrypt_for_recipient(b"hi bob", &ab).unwrap();
        assert_eq!(decrypt_from_sender(&envelope, &ba).unwrap(), b"hi bob");
    }

    #[test]
    fn test_shared_key_depends_on_private_key() {
        let alice = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();
        let eve = KeyPair::generate().unwrap();

        let ab = derive_shared_key(&alice, &bob.public_key()).unwrap();
        let eb = derive_shared_key(&eve, &bob.public_key()).unwrap();
        let ae = derive_shared_key(&alice, &eve.public_key()).unwrap();

        assert_ne!(ab, eb);
        assert_ne!(ab, ae);
    }

    #[test]
    fn test_shared_key_rejects_bad_public_key() {
        let alice = KeyPair::generate().unwrap();

        // Identity point: low order, no contribution from our secret
        let mut identity = [0u8; 32];
        identity[0] = 1;
        assert_eq!(
            derive_shared_key(&alice, &identity).unwrap_err(),
            CryptoError::WeakSharedSecret
        );
    }
}
