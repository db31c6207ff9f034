//! meshnode core library
//!
//! Identity and secure transport for a node on an optional overlay mesh.
//!
//! ## Overview
//!
//! - **identity**: Ed25519 keypair, signatures, overlay address derivation
//! - **keystore**: raw key files with owner-only permissions
//! - **backup**: password-encrypted export/import of the private key
//! - **crypto**: authenticated peer envelopes and X25519 shared keys
//! - **transport**: overlay client, Connected or Fallback
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use meshnode_core::{keystore::KeyStore, transport::*};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let keypair = Arc::new(KeyStore::new("~/.meshnode").load_or_generate()?);
//!     println!("Address: {}", keypair.address());
//!
//!     let config = TransportConfig::new(keypair.to_hex());
//!     let status = detect_service(find_overlay_binary(None), &config.socket_candidates);
//!     let client = TransportClient::new(config, &status, OverlayPorts::unsupported()).await?;
//!
//!     client.bootstrap(&["tcp://203.0.113.7:12345".to_string()]).await?;
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

pub mod backup;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod keystore;
pub mod transport;

// Re-exports
pub use crypto::{PeerCipher, PeerEnvelope};
pub use error::{BackupError, ConfigError, CryptoError, MeshError, MeshResult, TransportError};
pub use identity::{KeyPair, MeshAddress};
pub use keystore::KeyStore;
pub use transport::{ServiceStatus, TransportClient, TransportConfig, TransportMode};
