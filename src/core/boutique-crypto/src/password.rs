//! Argon2id password hashing.
//!
//! Hashes are stored in PHC string format, salt included.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::CryptoError;

/// Hashes a password with Argon2id and a freshly generated salt.
///
/// # Returns
///
/// A PHC string such as `$argon2id$v=19$m=19456,t=2,p=1$...`.
pub fn hash_password(password: &str) -> Result<String, CryptoError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| CryptoError::HashingFailed)?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash.
///
/// # Returns
///
/// * `Ok(true)` - The password matches
/// * `Ok(false)` - The password does not match
/// * `Err(CryptoError::InvalidHash)` - The stored hash cannot be parsed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, CryptoError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| CryptoError::InvalidHash)?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
