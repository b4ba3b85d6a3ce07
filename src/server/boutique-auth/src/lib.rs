//! # Boutique Auth
//!
//! Stateless request authentication and authorization for Boutique.
//!
//! ## Pipeline
//!
//! 1. [`gate::authenticate`] extracts the bearer token, validates it with the
//!    [`TokenCodec`], resolves the subject through a [`PrincipalStore`] and
//!    installs an [`Identity`] on the request.
//! 2. [`access::authorize`] looks up the route's [`RouteRequirement`] in the
//!    [`RouteTable`] and allows or denies the request.
//! 3. Any failure is turned into a JSON error by [`responder::respond`] and
//!    the request goes no further.
//!
//! Identity travels in the request's extensions; there is no process-wide
//! "current user".

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod context;
pub mod error;
pub mod gate;
pub mod principal;
pub mod responder;
pub mod token;

pub use access::{decide, PublicPath, PublicPaths, RouteRequirement, RouteTable};
pub use context::{AuthRejection, CredentialPresented, Identity};
pub use error::AuthError;
pub use gate::GateState;
pub use principal::{LookupError, MemoryPrincipalStore, Principal, PrincipalStore, Role};
pub use responder::{respond, ErrorBody};
pub use token::{IssueError, TokenClaims, TokenCodec, TokenConfig, TokenError};
