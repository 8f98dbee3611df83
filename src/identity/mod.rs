//! Caller identity resolution.
//!
//! An [`Identity`] is produced once per request, either from the
//! platform-injected `X-MS-CLIENT-PRINCIPAL` header ([`principal`]) or from
//! credentials checked against the configured [`CredentialTable`]
//! ([`credentials`]). Resolution always happens before any network call.

pub mod credentials;
pub mod principal;

use serde::{Deserialize, Serialize};

pub use credentials::CredentialTable;
pub use principal::CLIENT_PRINCIPAL_HEADER;

/// Claim type carrying the directory object id of the caller.
pub const OBJECT_ID_CLAIM: &str = "http://schemas.microsoft.com/identity/claims/objectidentifier";

/// Short form of the object id claim issued by some token versions.
const OBJECT_ID_CLAIM_SHORT: &str = "oid";

/// Claim types checked, in order, when no name claim type is declared.
const NAME_CLAIM_FALLBACKS: &[&str] = &[
    "name",
    "preferred_username",
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name",
];

/// Errors raised while resolving the caller identity.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Missing X-MS-CLIENT-PRINCIPAL header")]
    MissingPrincipal,

    #[error("Failed to decode user info: {0}")]
    MalformedPrincipal(String),

    #[error("User ID not found in claims")]
    MissingObjectId,

    #[error("Missing username or password")]
    MissingCredentials,

    #[error("Incorrect username or password")]
    InvalidCredentials,
}

/// A single typed claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub typ: String,
    pub val: String,
}

impl Claim {
    pub fn new(typ: impl Into<String>, val: impl Into<String>) -> Self {
        Self {
            typ: typ.into(),
            val: val.into(),
        }
    }
}

/// The authenticated caller for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// How the caller authenticated (`aad`, `basic`, ...).
    pub auth_type: Option<String>,
    /// Claim type that holds the display name, when declared by the platform.
    pub name_claim_type: Option<String>,
    /// Claims in the order they were issued. Types may repeat.
    pub claims: Vec<Claim>,
}

impl Identity {
    /// Identity for a user authenticated against the credential table.
    pub fn from_username(username: &str) -> Self {
        Self {
            auth_type: Some("basic".to_string()),
            name_claim_type: Some("name".to_string()),
            claims: vec![Claim::new("name", username)],
        }
    }

    /// First value of the given claim type.
    pub fn claim(&self, typ: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.typ == typ)
            .map(|c| c.val.as_str())
    }

    /// Display name of the caller, if any name claim is present.
    pub fn name(&self) -> Option<&str> {
        if let Some(name) = self.name_claim_type.as_deref().and_then(|t| self.claim(t)) {
            return Some(name);
        }
        NAME_CLAIM_FALLBACKS.iter().find_map(|t| self.claim(t))
    }

    /// Directory object id of the caller.
    pub fn object_id(&self) -> Option<&str> {
        self.claim(OBJECT_ID_CLAIM)
            .or_else(|| self.claim(OBJECT_ID_CLAIM_SHORT))
            .filter(|id| !id.is_empty())
    }
}
