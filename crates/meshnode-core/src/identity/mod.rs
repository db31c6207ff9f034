//! Node identity: Ed25519 keypair and the overlay address derived from it
//!
//! ## Example
//!
//! ```rust
//! use meshnode_core::identity::{verify, KeyPair};
//!
//! let keypair = KeyPair::generate().unwrap();
//! println!("Address: {}", keypair.address());
//!
//! let message = b"Hello, mesh!";
//! let signature = keypair.sign(message);
//! assert!(verify(&keypair.public_key(), message, &signature.to_bytes()));
//! ```

mod address;
mod keypair;

pub use address::{AddressParseError, MeshAddress, ADDRESS_SIZE, NETWORK_PREFIX};
pub use ed25519_dalek::Signature;
pub use keypair::{
    open_attached, public_key_from_hex, to_address_text, to_hex, verify, KeyPair, PRIVATE_KEY_SIZE,
    PUBLIC_KEY_SIZE, SIGNATURE_SIZE,
};
