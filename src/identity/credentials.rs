//! Static credential table for the basic-auth variant.

use std::collections::BTreeMap;

use axum::http::HeaderMap;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Basic};

use super::{Identity, IdentityError};

/// Read-only `username -> password` table, injected from configuration.
#[derive(Clone, Default)]
pub struct CredentialTable {
    users: BTreeMap<String, String>,
}

impl std::fmt::Debug for CredentialTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialTable")
            .field("users", &self.users.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CredentialTable {
    pub fn new(users: BTreeMap<String, String>) -> Self {
        Self { users }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Check a username/password pair.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .is_some_and(|expected| expected == password)
    }

    /// Resolve the caller from an HTTP Basic `Authorization` header.
    pub fn authenticate_basic(&self, headers: &HeaderMap) -> Result<Identity, IdentityError> {
        let Authorization(basic) = headers
            .typed_get::<Authorization<Basic>>()
            .ok_or(IdentityError::MissingCredentials)?;

        if self.verify(basic.username(), basic.password()) {
            tracing::debug!(
                name: "identity.basic.accepted",
                username = %basic.username(),
                "Basic credentials accepted"
            );
            Ok(Identity::from_username(basic.username()))
        } else {
            tracing::info!(
                name: "identity.basic.rejected",
                username = %basic.username(),
                "Basic credentials rejected"
            );
            Err(IdentityError::InvalidCredentials)
        }
    }
}
