//! Managed identity token source.
//!
//! Two wire protocols are supported:
//!
//! - **IMDS** (virtual machines, containers): `GET` on the instance metadata
//!   endpoint with `Metadata: true`, api-version `2018-02-01`.
//! - **App Service**: `GET` on `IDENTITY_ENDPOINT` with
//!   `X-IDENTITY-HEADER: <IDENTITY_HEADER>`, api-version `2019-08-01`.
//!
//! Both answer with a JSON document carrying `access_token`.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ManagedIdentityConfig;

use super::{AccessToken, TokenError, TokenRequest, TokenSource};

const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Clone)]
enum Protocol {
    Imds,
    AppService { identity_header: String },
}

#[derive(Clone)]
pub struct ManagedIdentitySource {
    http: reqwest::Client,
    endpoint: String,
    client_id: Option<String>,
    protocol: Protocol,
}

impl std::fmt::Debug for ManagedIdentitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let protocol = match self.protocol {
            Protocol::Imds => "imds",
            Protocol::AppService { .. } => "app_service",
        };
        f.debug_struct("ManagedIdentitySource")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .field("protocol", &protocol)
            .finish()
    }
}

impl ManagedIdentitySource {
    pub fn new(http: reqwest::Client, config: &ManagedIdentityConfig) -> Self {
        let protocol = match config
            .identity_header
            .as_deref()
            .filter(|h| !h.trim().is_empty())
        {
            Some(header) => Protocol::AppService {
                identity_header: header.to_string(),
            },
            None => Protocol::Imds,
        };
        Self {
            http,
            endpoint: config.endpoint.clone(),
            client_id: config.client_id.clone().filter(|c| !c.trim().is_empty()),
            protocol,
        }
    }
}

#[async_trait]
impl TokenSource for ManagedIdentitySource {
    async fn token(&self, request: &TokenRequest<'_>) -> Result<AccessToken, TokenError> {
        let api_version = match self.protocol {
            Protocol::Imds => IMDS_API_VERSION,
            Protocol::AppService { .. } => APP_SERVICE_API_VERSION,
        };
        let mut query = vec![("api-version", api_version), ("resource", request.resource)];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let mut rb = self.http.get(&self.endpoint).query(&query);
        rb = match &self.protocol {
            Protocol::Imds => rb.header("Metadata", "true"),
            Protocol::AppService { identity_header } => {
                rb.header("X-IDENTITY-HEADER", identity_header)
            }
        };

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TokenError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = resp.json().await?;
        parsed
            .access_token
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
            .ok_or(TokenError::MissingField("access_token"))
    }

    fn name(&self) -> &'static str {
        "managed_identity"
    }
}
