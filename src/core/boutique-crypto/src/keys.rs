//! Token signing key with automatic memory zeroization.
//!
//! The key is loaded once at startup and shared read-only for the lifetime
//! of the process. Its bytes are erased from memory when dropped and never
//! appear in `Debug` output.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::random::generate_key;

/// Minimum accepted length of an HMAC signing key, in bytes.
pub const MIN_KEY_SIZE: usize = 32;

/// A symmetric HMAC key used to sign and verify bearer tokens.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey {
    bytes: Vec<u8>,
}

impl SigningKey {
    /// Generates a new random 256-bit signing key.
    ///
    /// Tokens signed with a generated key do not survive a restart, so this
    /// is meant for development mode and tests.
    pub fn generate() -> Self {
        let key = generate_key();
        Self {
            bytes: key.to_vec(),
        }
    }

    /// Creates a signing key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is shorter than [`MIN_KEY_SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "expected at least {} bytes, got {}",
                MIN_KEY_SIZE,
                bytes.len()
            )));
        }

        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Returns the raw key bytes.
    ///
    /// Use with caution - the returned slice is not zeroized automatically.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_generate() {
        let key = SigningKey::generate();
        assert_eq!(key.as_bytes().len(), MIN_KEY_SIZE);
    }

    #[test]
    fn test_signing_key_from_bytes() {
        let bytes = [0x42u8; 48];
        let key = SigningKey::from_bytes(&bytes).unwrap();
        assert_eq!(key.as_bytes(), &bytes);
    }

    #[test]
    fn test_signing_key_too_short() {
        let bytes = [0u8; 16];
        let result = SigningKey::from_bytes(&bytes);
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_signing_key_debug_redacted() {
        let key = SigningKey::from_bytes(&[0x42u8; MIN_KEY_SIZE]).unwrap();
        let debug_str = format!("{:?}", key);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("66"));
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let key1 = SigningKey::generate();
        let key2 = SigningKey::generate();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }
}
