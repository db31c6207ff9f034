//! Property-based tests for identity and message crypto
//!
//! Uses proptest to check signature, address and envelope invariants over
//! random keys and messages.

use std::collections::HashSet;

use meshnode_core::backup::{export_encrypted_backup, import_encrypted_backup};
use meshnode_core::crypto::{derive_shared_key, PeerCipher, PeerEnvelope};
use meshnode_core::identity::{open_attached, verify, MeshAddress};
use meshnode_core::{BackupError, KeyPair};
use proptest::prelude::*;

// ============================================================================
// Strategy Generators
// ============================================================================

fn seed_strategy() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>())
}

fn message_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Printable passwords, including the empty one
fn password_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{0,32}").expect("valid regex")
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every signature verifies under its own key
    #[test]
    fn sign_then_verify(seed in seed_strategy(), message in message_strategy()) {
        let keypair = KeyPair::from_seed(&seed);
        let signature = keypair.sign(&message);
        prop_assert!(verify(&keypair.public_key(), &message, &signature.to_bytes()));
    }

    /// Flipping one bit of the message breaks verification
    #[test]
    fn message_bit_flip_fails(
        seed in seed_strategy(),
        message in prop::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let keypair = KeyPair::from_seed(&seed);
        let signature = keypair.sign(&message).to_bytes();

        let mut tampered = message.clone();
        let i = index.index(tampered.len());
        tampered[i] ^= 1 << bit;

        prop_assert!(!verify(&keypair.public_key(), &tampered, &signature));
    }

    /// Flipping one bit of the signature breaks verification
    #[test]
    fn signature_bit_flip_fails(
        seed in seed_strategy(),
        message in message_strategy(),
        index in 0usize..64,
        bit in 0u8..8,
    ) {
        let keypair = KeyPair::from_seed(&seed);
        let mut signature = keypair.sign(&message).to_bytes();
        signature[index] ^= 1 << bit;

        prop_assert!(!verify(&keypair.public_key(), &message, &signature));
    }

    /// Address derivation is a pure function of the public key
    #[test]
    fn address_deterministic(seed in seed_strategy()) {
        let keypair = KeyPair::from_seed(&seed);
        let a = MeshAddress::derive(&keypair.public_key());
        let b = MeshAddress::derive(&keypair.public_key());
        prop_assert_eq!(a, b);
        prop_assert_eq!(a.to_string().parse::<MeshAddress>().unwrap(), a);
    }

    /// Both sides of a pair derive the same key and can read each other
    #[test]
    fn shared_key_symmetric(
        seed_a in seed_strategy(),
        seed_b in seed_strategy(),
        message in message_strategy(),
    ) {
        let alice = KeyPair::from_seed(&seed_a);
        let bob = KeyPair::from_seed(&seed_b);

        let ab = derive_shared_key(&alice, &bob.public_key()).unwrap();
        let ba = derive_shared_key(&bob, &alice.public_key()).unwrap();
        prop_assert_eq!(ab, ba);

        let wire = PeerCipher::new(&ab).seal(&message).unwrap().to_bytes();
        let envelope = PeerEnvelope::from_bytes(&wire).unwrap();
        prop_assert_eq!(PeerCipher::new(&ba).open(&envelope).unwrap(), message);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Export then import restores the exact private key
    #[test]
    fn backup_roundtrip(seed in seed_strategy(), password in password_strategy()) {
        let keypair = KeyPair::from_seed(&seed);
        let blob = export_encrypted_backup(&keypair, &password).unwrap();
        let restored = import_encrypted_backup(&blob, &password).unwrap();
        prop_assert_eq!(restored.private_key_bytes(), keypair.private_key_bytes());
    }

    /// Any single flipped bit anywhere in the blob is rejected
    #[test]
    fn backup_bit_flip_fails(
        seed in seed_strategy(),
        password in password_strategy(),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let keypair = KeyPair::from_seed(&seed);
        let mut blob = export_encrypted_backup(&keypair, &password).unwrap();
        let i = index.index(blob.len());
        blob[i] ^= 1 << bit;

        let result = import_encrypted_backup(&blob, &password);
        prop_assert!(matches!(result, Err(BackupError::DecryptionFailed)));
    }

    /// A different password never opens the backup
    #[test]
    fn backup_wrong_password_fails(
        seed in seed_strategy(),
        password in password_strategy(),
        other in password_strategy(),
    ) {
        prop_assume!(password != other);
        let blob = export_encrypted_backup(&KeyPair::from_seed(&seed), &password).unwrap();
        let result = import_encrypted_backup(&blob, &other);
        prop_assert!(matches!(result, Err(BackupError::DecryptionFailed)));
    }

    /// Attached-form messages open only under the signer's key
    #[test]
    fn attached_signature_opens(seed in seed_strategy(), message in message_strategy()) {
        let keypair = KeyPair::from_seed(&seed);
        let signed = keypair.sign_attached(&message);
        prop_assert_eq!(open_attached(&keypair.public_key(), &signed), Some(message));
    }
}

// ============================================================================
// Collision Check
// ============================================================================

#[test]
fn no_address_collisions_across_10k_keys() {
    let mut seen = HashSet::with_capacity(10_000);
    for _ in 0..10_000 {
        let keypair = KeyPair::generate().unwrap();
        assert!(seen.insert(keypair.address()), "address collision");
    }
    assert_eq!(seen.len(), 10_000);
}
