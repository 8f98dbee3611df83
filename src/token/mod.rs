//! Bearer token acquisition for the downstream directory API.
//!
//! Each way of getting a token is a [`TokenSource`]. The configured sources
//! are assembled into a [`TokenChain`] that tries them in order. Nothing is
//! cached: every request walks the chain again.

pub mod chain;
pub mod client_secret;
pub mod developer_cli;
pub mod forwarded;
pub mod managed_identity;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;

use crate::config::{TokenConfig, TokenStrategy};

pub use chain::TokenChain;
pub use client_secret::ClientSecretSource;
pub use developer_cli::DeveloperCliSource;
pub use forwarded::ForwardedTokenSource;
pub use managed_identity::ManagedIdentitySource;

/// An opaque bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw token, for use in an `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Inputs available to a token source for one request.
#[derive(Debug, Clone, Copy)]
pub struct TokenRequest<'a> {
    /// Resource the token is requested for, e.g. `https://graph.microsoft.com`.
    pub resource: &'a str,
    /// Headers of the inbound request.
    pub headers: &'a HeaderMap,
}

impl TokenRequest<'_> {
    /// `.default` scope for the resource, as used by the v2 token endpoint.
    pub fn scope(&self) -> String {
        format!("{}/.default", self.resource.trim_end_matches('/'))
    }
}

/// Errors raised while acquiring a token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// An inbound header that should carry the token is absent.
    #[error("missing {0} header")]
    Missing(String),

    /// The source is not usable with the current configuration.
    #[error("{0}")]
    Config(String),

    /// The token endpoint could not be reached or its response could not be read.
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The token endpoint answered with a non-success status.
    #[error("token endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    /// The endpoint answered but no token was in the response.
    #[error("token response did not contain {0}")]
    MissingField(&'static str),

    /// A local developer tool failed.
    #[error("{0}")]
    Tool(String),

    /// Every source in the chain failed.
    #[error("all token sources failed: {}", format_failures(.0))]
    Exhausted(Vec<(&'static str, TokenError)>),
}

fn format_failures(failures: &[(&'static str, TokenError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{name}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single way of obtaining an access token.
#[async_trait]
pub trait TokenSource: Send + Sync + std::fmt::Debug {
    /// Acquire a token for the request.
    async fn token(&self, request: &TokenRequest<'_>) -> Result<AccessToken, TokenError>;

    /// Name used in logs and chain errors.
    fn name(&self) -> &'static str;
}

/// A fixed token from configuration.
#[derive(Clone)]
pub struct StaticTokenSource {
    token: AccessToken,
}

impl std::fmt::Debug for StaticTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenSource").finish_non_exhaustive()
    }
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self, _request: &TokenRequest<'_>) -> Result<AccessToken, TokenError> {
        Ok(self.token.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Build the configured chain of token sources.
pub fn build_chain(config: &TokenConfig, http: &reqwest::Client) -> Result<TokenChain, TokenError> {
    let mut sources: Vec<Arc<dyn TokenSource>> = Vec::with_capacity(config.strategies.len());

    for strategy in &config.strategies {
        let source: Arc<dyn TokenSource> = match strategy {
            TokenStrategy::Static => {
                let token = non_empty(config.static_token.as_deref()).ok_or_else(|| {
                    TokenError::Config("static strategy requires token.static_token".to_string())
                })?;
                Arc::new(StaticTokenSource::new(token))
            }
            TokenStrategy::ManagedIdentity => Arc::new(ManagedIdentitySource::new(
                http.clone(),
                &config.managed_identity,
            )),
            TokenStrategy::ClientSecret => {
                let (Some(tenant_id), Some(client_id), Some(client_secret)) = (
                    non_empty(config.tenant_id.as_deref()),
                    non_empty(config.client_id.as_deref()),
                    non_empty(config.client_secret.as_deref()),
                ) else {
                    return Err(TokenError::Config(
                        "client_secret strategy requires tenant id, client id and client secret"
                            .to_string(),
                    ));
                };
                Arc::new(ClientSecretSource::new(
                    http.clone(),
                    &config.authority_host,
                    tenant_id,
                    client_id,
                    client_secret,
                ))
            }
            TokenStrategy::Forwarded => {
                Arc::new(ForwardedTokenSource::new(&config.forwarded_header)?)
            }
            TokenStrategy::DeveloperCli => Arc::new(DeveloperCliSource::new(&config.cli_program)),
        };
        sources.push(source);
    }

    TokenChain::new(sources)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("eyJ0eXAiOiJKV1Qi");
        assert_eq!(format!("{token:?}"), "AccessToken(***)");
        assert_eq!(token.secret(), "eyJ0eXAiOiJKV1Qi");
    }

    #[test]
    fn test_scope_from_resource() {
        let headers = HeaderMap::new();
        let request = TokenRequest {
            resource: "https://graph.microsoft.com/",
            headers: &headers,
        };
        assert_eq!(request.scope(), "https://graph.microsoft.com/.default");
    }

    #[test]
    fn test_build_chain_in_configured_order() {
        let config = TokenConfig {
            strategies: vec![
                TokenStrategy::Forwarded,
                TokenStrategy::ManagedIdentity,
                TokenStrategy::DeveloperCli,
            ],
            ..TokenConfig::default()
        };
        let chain = build_chain(&config, &reqwest::Client::new()).unwrap();
        assert_eq!(
            chain.names(),
            vec!["forwarded", "managed_identity", "developer_cli"]
        );
    }

    #[test]
    fn test_build_chain_requires_static_token() {
        let config = TokenConfig {
            strategies: vec![TokenStrategy::Static],
            static_token: Some("   ".to_string()),
            ..TokenConfig::default()
        };
        let err = build_chain(&config, &reqwest::Client::new()).unwrap_err();
        assert!(matches!(err, TokenError::Config(_)));
    }

    #[test]
    fn test_build_chain_requires_service_principal() {
        let config = TokenConfig {
            strategies: vec![TokenStrategy::ClientSecret],
            tenant_id: Some("tenant".to_string()),
            client_id: Some("client".to_string()),
            ..TokenConfig::default()
        };
        let err = build_chain(&config, &reqwest::Client::new()).unwrap_err();
        assert!(matches!(err, TokenError::Config(_)));
    }

    #[tokio::test]
    async fn test_static_source() {
        let headers = HeaderMap::new();
        let request = TokenRequest {
            resource: "https://graph.microsoft.com",
            headers: &headers,
        };
        let token = StaticTokenSource::new("fixed")
            .token(&request)
            .await
            .unwrap();
        assert_eq!(token.secret(), "fixed");
    }
}
