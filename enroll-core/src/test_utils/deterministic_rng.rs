/*!
    Seeded key material for reproducible tests

    Scripted collaborators hand out the same keys on every run, so tests can
    name the kids they expect before the flow produces them.
*/

use crate::core_identity::{EncryptionKey, SigningKey};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 32 bytes drawn from a `StdRng` seeded with `seed`
pub fn deterministic_seed(seed: u64) -> [u8; 32] {
    StdRng::seed_from_u64(seed).random()
}

/// Signing key derived from `seed`; equal seeds give equal keys
pub fn deterministic_signing_key(seed: u64) -> SigningKey {
    SigningKey::from_seed(&deterministic_seed(seed)).expect("ed25519 seed")
}

/// Encryption key derived from `seed`
pub fn deterministic_encryption_key(seed: u64) -> EncryptionKey {
    EncryptionKey::from_seed(&deterministic_seed(seed)).expect("x25519 seed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_reproducible() {
        assert_eq!(deterministic_seed(7), deterministic_seed(7));
        assert_ne!(deterministic_seed(7), deterministic_seed(8));
    }

    #[test]
    fn test_deterministic_keys() {
        assert_eq!(
            deterministic_signing_key(5).kid(),
            deterministic_signing_key(5).kid()
        );
        assert_ne!(
            deterministic_signing_key(5).kid(),
            deterministic_signing_key(6).kid()
        );
        assert_eq!(
            deterministic_encryption_key(5).kid(),
            deterministic_encryption_key(5).kid()
        );
    }
}
