//! # Boutique Storage
//!
//! Storage abstraction layer for Boutique backends.
//!
//! Records are opaque byte values addressed by slash-separated keys such as
//! `users/alice` or `products/<uuid>`. Callers own the encoding.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod memory;

pub use backend::StorageBackend;
pub use error::StorageError;
pub use memory::MemoryBackend;
