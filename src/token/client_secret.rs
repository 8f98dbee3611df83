//! Service principal (client credentials) token source.

use async_trait::async_trait;
use serde::Deserialize;

use super::{AccessToken, TokenError, TokenRequest, TokenSource};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Clone)]
pub struct ClientSecretSource {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl std::fmt::Debug for ClientSecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretSource")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl ClientSecretSource {
    pub fn new(
        http: reqwest::Client,
        authority_host: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Self {
        let token_url = format!(
            "{}/{tenant_id}/oauth2/v2.0/token",
            authority_host.trim_end_matches('/')
        );
        Self {
            http,
            token_url,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
    }
}

#[async_trait]
impl TokenSource for ClientSecretSource {
    async fn token(&self, request: &TokenRequest<'_>) -> Result<AccessToken, TokenError> {
        let scope = request.scope();
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];

        let resp = self.http.post(&self.token_url).form(&form).send().await?;
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
        "client_secret"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_client_credentials_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contoso-tenant/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app-id"))
            .and(body_string_contains(
                "scope=https%3A%2F%2Fgraph.microsoft.com%2F.default",
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({
                    "token_type": "Bearer",
                    "expires_in": 3599,
                    "access_token": "sp-token"
                })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let source = ClientSecretSource::new(
            reqwest::Client::new(),
            &format!("{}/", server.uri()),
            "contoso-tenant",
            "app-id",
            "app-secret",
        );
        let headers = HeaderMap::new();
        let token = source
            .token(&TokenRequest {
                resource: "https://graph.microsoft.com",
                headers: &headers,
            })
            .await
            .unwrap();
        assert_eq!(token.secret(), "sp-token");
    }

    #[tokio::test]
    async fn test_rejected_secret() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid_client"}"#),
            )
            .mount(&server)
            .await;

        let source = ClientSecretSource::new(
            reqwest::Client::new(),
            &server.uri(),
            "tenant",
            "app-id",
            "wrong",
        );
        let headers = HeaderMap::new();
        let err = source
            .token(&TokenRequest {
                resource: "https://graph.microsoft.com",
                headers: &headers,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Endpoint { status: 401, .. }));
    }

    #[test]
    fn test_debug_hides_secret() {
        let source = ClientSecretSource::new(
            reqwest::Client::new(),
            "https://login.microsoftonline.com",
            "tenant",
            "app-id",
            "app-secret",
        );
        let rendered = format!("{source:?}");
        assert!(rendered.contains("https://login.microsoftonline.com/tenant/oauth2/v2.0/token"));
        assert!(!rendered.contains("app-secret"));
    }
}
