//! Ed25519 signing keypair
//!
//! The private key is the 64-byte `seed || public` encoding; the public key
//! is always the last 32 bytes of it.

use crate::error::CryptoError;
use crate::identity::address::MeshAddress;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use x25519_dalek::StaticSecret as X25519StaticSecret;

/// Public key size in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Private key size in bytes (seed followed by public key)
pub const PRIVATE_KEY_SIZE: usize = 64;

/// Detached signature size in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// The node's signing identity.
///
/// Immutable once constructed. Share it with `Arc<KeyPair>` rather than
/// copying the secret around.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generate a new random keypair from the OS random source
    pub fn generate() -> Result<Self, CryptoError> {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed).map_err(|_| CryptoError::RngFailure)?;
        Ok(Self::from_seed(&seed))
    }

    /// Deterministic keypair from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// Rebuild a keypair from the raw 64-byte private key.
    ///
    /// Any other length is rejected outright. The embedded public half must
    /// match the one recomputed from the seed.
    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: &[u8; PRIVATE_KEY_SIZE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyFormat {
                    expected: PRIVATE_KEY_SIZE,
                    actual: bytes.len(),
                })?;
        let signing =
            SigningKey::from_keypair_bytes(raw).map_err(|_| CryptoError::KeyMismatch)?;
        Ok(Self { signing })
    }

    /// The 32-byte public key
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.signing.verifying_key().to_bytes()
    }

    /// The 64-byte private key (`seed || public`)
    pub fn private_key_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.signing.to_keypair_bytes()
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }

    /// Signed message in the attached form: `signature || message`
    pub fn sign_attached(&self, message: &[u8]) -> Vec<u8> {
        let mut signed = Vec::with_capacity(SIGNATURE_SIZE + message.len());
        signed.extend_from_slice(&self.sign(message).to_bytes());
        signed.extend_from_slice(message);
        signed
    }

    /// Hex form of the public key (the node id)
    pub fn to_hex(&self) -> String {
        to_hex(&self.public_key())
    }

    /// Overlay address derived from the public key
    pub fn address(&self) -> MeshAddress {
        MeshAddress::derive(&self.public_key())
    }

    /// X25519 secret for key agreement.
    ///
    /// Uses the clamped Ed25519 scalar, so the matching public key is the
    /// Montgomery form of our Ed25519 public key.
    pub(crate) fn x25519_secret(&self) -> X25519StaticSecret {
        X25519StaticSecret::from(self.signing.to_scalar_bytes())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.to_hex())
            .finish_non_exhaustive()
    }
}

/// Verify a detached signature.
///
/// Returns `false` for a malformed key, malformed signature, or any
/// mismatch. Never panics on untrusted input.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key_bytes) = <&[u8; PUBLIC_KEY_SIZE]>::try_from(public_key) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(key_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    verifying_key.verify_strict(message, &signature).is_ok()
}

/// Check an attached-form signed message and return the message part.
///
/// `None` if the input is shorter than a signature or does not verify.
pub fn open_attached(public_key: &[u8], signed: &[u8]) -> Option<Vec<u8>> {
    if signed.len() < SIGNATURE_SIZE {
        return None;
    }
    let (signature, message) = signed.split_at(SIGNATURE_SIZE);
    verify(public_key, message, signature).then(|| message.to_vec())
}

/// Lowercase hex of a public key
pub fn to_hex(public_key: &[u8; PUBLIC_KEY_SIZE]) -> String {
    hex::encode(public_key)
}

/// Parse a hex-encoded 32-byte public key
pub fn public_key_from_hex(text: &str) -> Result<[u8; PUBLIC_KEY_SIZE], CryptoError> {
    let bytes = hex::decode(text.trim()).map_err(|_| CryptoError::InvalidPublicKey)?;
    let key: [u8; PUBLIC_KEY_SIZE] =
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyFormat {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            })?;
    VerifyingKey::from_bytes(&key).map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(key)
}

/// Canonical address text for a public key
pub fn to_address_text(public_key: &[u8; PUBLIC_KEY_SIZE]) -> String {
    MeshAddress::derive(public_key).to_string()
}
