//! # Boutique Crypto
//!
//! Cryptographic building blocks shared by the Boutique server.
//!
//! This crate provides:
//! - The process-wide token signing key, zeroized on drop
//! - Argon2id password hashing and verification
//! - Secure random generation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod keys;
pub mod password;
pub mod random;

pub use error::CryptoError;
pub use keys::SigningKey;
pub use password::{hash_password, verify_password};
