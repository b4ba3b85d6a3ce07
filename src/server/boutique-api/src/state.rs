//! Shared handler state.

use std::sync::Arc;

use boutique_auth::TokenCodec;
use boutique_storage::StorageBackend;

use crate::products::ProductRepository;
use crate::users::UserRepository;

/// Who may pick a privileged role at signup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignupPolicy {
    /// Allow MODERATOR and ADMIN to be self-assigned. Dev mode only.
    pub allow_privileged_roles: bool,
}

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Token issuer and validator.
    pub codec: Arc<TokenCodec>,
    /// User accounts. Also the principal store of the gate.
    pub users: UserRepository,
    /// Product catalogue.
    pub products: ProductRepository,
    /// Signup rules.
    pub signup: SignupPolicy,
}

impl AppState {
    /// Creates the state over one storage backend.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        codec: Arc<TokenCodec>,
        signup: SignupPolicy,
    ) -> Self {
        Self {
            codec,
            users: UserRepository::new(storage.clone()),
            products: ProductRepository::new(storage),
            signup,
        }
    }
}
