//! Error types for the mesh node core
//!
//! Each concern owns its own enum so callers can match on the failure class
//! they care about. [`MeshError`] folds them together for code paths that
//! cross several concerns (startup, CLI).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Bad paths or permission failures. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Filesystem access failed for a path the node depends on
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No data directory could be determined (no home directory)
    #[error("Could not determine a data directory")]
    MissingDataDir,

    /// The public key on disk does not belong to the private key on disk
    #[error("Public key file {0} does not match the private key")]
    PublicKeyMismatch(PathBuf),
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Key material and message-level cryptography failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The operating system random source could not be read
    #[error("Random number generator failure")]
    RngFailure,

    /// Key bytes have the wrong length or are internally inconsistent
    #[error("Invalid key format: expected {expected} bytes, got {actual}")]
    InvalidKeyFormat { expected: usize, actual: usize },

    /// The public half of a private key does not match its seed
    #[error("Private key halves are inconsistent")]
    KeyMismatch,

    /// Public key bytes do not encode a valid curve point
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Authenticated decryption failed (wrong key, tampered or truncated data)
    #[error("Authentication failed")]
    AuthFailed,

    /// The AEAD refused to encrypt (plaintext too large)
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Key agreement produced a non-contributory (low-order) secret
    #[error("Key agreement produced a weak shared secret")]
    WeakSharedSecret,
}

/// Encrypted backup failures.
///
/// Wrong password and tampered ciphertext are both reported as
/// [`BackupError::DecryptionFailed`].
#[derive(Error, Debug)]
pub enum BackupError {
    /// Blob is shorter than salt + nonce + tag
    #[error("Backup too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    /// Authentication tag did not verify
    #[error("Backup decryption failed")]
    DecryptionFailed,

    /// Random salt/nonce generation or key reconstruction failed
    #[error("Backup key error: {0}")]
    Key(#[from] CryptoError),

    /// Reading or writing the backup file failed
    #[error("Backup I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Overlay transport failures.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The overlay service was not detected
    #[error("Overlay service unavailable: {0}")]
    Unavailable(String),

    /// Read/write failure on a live connection
    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Dial did not complete within the configured timeout
    #[error("Dial to {address} timed out after {timeout:?}")]
    DialTimeout { address: String, timeout: Duration },

    /// Operation needs a live connection and there is none
    #[error("Not connected")]
    NotConnected,

    /// The remote end closed the connection
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// The receive handler returned an error
    #[error("Receive handler failed: {0}")]
    Handler(anyhow::Error),

    /// The overlay control executable rejected a request
    #[error("Overlay control call failed for {target}: {reason}")]
    Admission { target: String, reason: String },
}

/// Umbrella error for flows that cross several concerns
#[derive(Error, Debug)]
pub enum MeshError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type alias using MeshError
pub type MeshResult<T> = Result<T, MeshError>;
