//! On-disk custody of the node keypair
//!
//! Layout inside the data directory:
//!
//! ```text
//! <data_dir>/            0700
//! ├── private.key        0600  raw 64-byte private key
//! └── public.key         0644  raw 32-byte public key
//! ```
//!
//! The private key file is the only durable copy of the identity. There is
//! no header and no encryption at rest; use [`crate::backup`] for an
//! encrypted export.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ConfigError, CryptoError, MeshResult};
use crate::identity::{KeyPair, PUBLIC_KEY_SIZE};

/// File name of the raw private key inside the data directory
pub const PRIVATE_KEY_FILE: &str = "private.key";

/// File name of the raw public key inside the data directory
pub const PUBLIC_KEY_FILE: &str = "public.key";

/// Write the raw private key, readable and writable by the owner only.
///
/// Parent directories are created (0700) as needed. An existing file is
/// overwritten and its permissions tightened.
pub fn save_private_key(keypair: &KeyPair, path: &Path) -> Result<(), ConfigError> {
    create_private_dir(path)?;
    write_with_mode(path, &keypair.private_key_bytes(), 0o600)?;
    debug!(path = %path.display(), "Saved private key");
    Ok(())
}

/// Read a raw private key.
///
/// The file must hold exactly the private key bytes; anything else is
/// [`CryptoError::InvalidKeyFormat`].
pub fn load_private_key(path: &Path) -> MeshResult<KeyPair> {
    let bytes = fs::read(path).map_err(|e| ConfigError::io(path, e))?;
    Ok(KeyPair::from_private_bytes(&bytes)?)
}

/// Write the raw public key, world-readable
pub fn save_public_key(public_key: &[u8; PUBLIC_KEY_SIZE], path: &Path) -> Result<(), ConfigError> {
    create_private_dir(path)?;
    write_with_mode(path, public_key, 0o644)
}

/// Read a raw 32-byte public key
pub fn load_public_key(path: &Path) -> MeshResult<[u8; PUBLIC_KEY_SIZE]> {
    let bytes = fs::read(path).map_err(|e| ConfigError::io(path, e))?;
    let key: [u8; PUBLIC_KEY_SIZE] =
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyFormat {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            })?;
    Ok(key)
}

/// Key files of one node, rooted at a data directory.
#[derive(Debug, Clone)]
pub struct KeyStore {
    data_dir: PathBuf,
}

impl KeyStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.data_dir.join(PRIVATE_KEY_FILE)
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.data_dir.join(PUBLIC_KEY_FILE)
    }

    /// Whether a private key has been persisted
    pub fn exists(&self) -> bool {
        self.private_key_path().exists()
    }

    /// Generate a fresh keypair and persist both halves.
    ///
    /// Overwrites any existing identity. Irreversible.
    pub fn generate(&self) -> MeshResult<KeyPair> {
        let keypair = KeyPair::generate()?;
        self.save(&keypair)?;
        info!(address = %keypair.address(), "Generated new identity");
        Ok(keypair)
    }

    /// Persist an existing keypair (e.g. one restored from a backup)
    pub fn save(&self, keypair: &KeyPair) -> Result<(), ConfigError> {
        save_private_key(keypair, &self.private_key_path())?;
        save_public_key(&keypair.public_key(), &self.public_key_path())
    }

    /// Load the persisted keypair.
    ///
    /// A public key file that disagrees with the private key is an error. A
    /// missing public key file is rewritten from the private key.
    pub fn load(&self) -> MeshResult<KeyPair> {
        let keypair = load_private_key(&self.private_key_path())?;

        let public_path = self.public_key_path();
        if public_path.exists() {
            let public_key = load_public_key(&public_path)?;
            if public_key != keypair.public_key() {
                return Err(ConfigError::PublicKeyMismatch(public_path).into());
            }
        } else {
            warn!(path = %public_path.display(), "Public key file missing, rewriting");
            save_public_key(&keypair.public_key(), &public_path)?;
        }

        Ok(keypair)
    }

    /// Load the identity, generating and persisting one on first start
    pub fn load_or_generate(&self) -> MeshResult<KeyPair> {
        if self.exists() {
            let keypair = self.load()?;
            info!(address = %keypair.address(), "Loaded existing identity");
            Ok(keypair)
        } else {
            info!("No key found, generating new identity");
            self.generate()
        }
    }
}

/// Warning shown whenever a new private key is written
pub fn security_warning() -> &'static str {
    "\
SECURITY WARNING
Your private key is the master key to your identity in the mesh network.

NEVER:
- Share your private key with anyone
- Upload it to cloud storage unencrypted
- Transmit it over unencrypted channels
- Store it in version control

ALWAYS:
- Keep backups in secure, offline locations
- Use an encrypted backup (`meshnode backup export`)

Losing your private key = losing your identity.
Sharing your private key = giving away your identity.
"
}

fn create_private_dir(path: &Path) -> Result<(), ConfigError> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if parent.exists() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(parent)
        .map_err(|e| ConfigError::io(parent, e))
}

fn write_with_mode(path: &Path, contents: &[u8], mode: u32) -> Result<(), ConfigError> {
    write_file_with_mode(path, contents, mode).map_err(|e| ConfigError::io(path, e))
}

/// Write a file whose permissions are `mode` from the moment it exists.
///
/// An existing file is truncated and its permissions reset to `mode`.
#[cfg_attr(not(unix), allow(unused_variables))]
pub(crate) fn write_file_with_mode(path: &Path, contents: &[u8], mode: u32) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options.open(path)?;

    // `mode` only applies on creation
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode))?;
    }

    file.write_all(contents)?;
    file.sync_all()
}
