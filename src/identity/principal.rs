//! Decoding of the `X-MS-CLIENT-PRINCIPAL` header.
//!
//! The hosting platform authenticates the caller and forwards the result as a
//! base64-encoded JSON document:
//!
//! ```json
//! {
//!   "auth_typ": "aad",
//!   "claims": [{ "typ": "name", "val": "Alice" }],
//!   "name_typ": "name",
//!   "role_typ": "roles"
//! }
//! ```

use axum::http::HeaderMap;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;

use super::{Claim, Identity, IdentityError};

/// Header injected by the platform authentication layer.
pub const CLIENT_PRINCIPAL_HEADER: &str = "x-ms-client-principal";

#[derive(Debug, Deserialize)]
struct ClientPrincipal {
    #[serde(default)]
    auth_typ: Option<String>,
    claims: Vec<Claim>,
    #[serde(default)]
    name_typ: Option<String>,
}

impl Identity {
    /// Resolve the caller from the platform client principal header.
    pub fn from_client_principal(headers: &HeaderMap) -> Result<Self, IdentityError> {
        let encoded = headers
            .get(CLIENT_PRINCIPAL_HEADER)
            .ok_or(IdentityError::MissingPrincipal)?
            .to_str()
            .map_err(|e| IdentityError::MalformedPrincipal(e.to_string()))?
            .trim();
        if encoded.is_empty() {
            return Err(IdentityError::MissingPrincipal);
        }

        let identity = decode_client_principal(encoded)?;
        tracing::debug!(
            name: "identity.principal.decoded",
            auth_type = ?identity.auth_type,
            claims = identity.claims.len(),
            "Decoded client principal"
        );
        Ok(identity)
    }
}

/// Decode a base64 client principal document into an [`Identity`].
pub fn decode_client_principal(encoded: &str) -> Result<Identity, IdentityError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| IdentityError::MalformedPrincipal(e.to_string()))?;
    let json =
        String::from_utf8(bytes).map_err(|e| IdentityError::MalformedPrincipal(e.to_string()))?;
    let principal: ClientPrincipal = serde_json::from_str(&json)
        .map_err(|e| IdentityError::MalformedPrincipal(e.to_string()))?;

    Ok(Identity {
        auth_type: principal.auth_typ,
        name_claim_type: principal.name_typ,
        claims: principal.claims,
    })
}
