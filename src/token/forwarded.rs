//! Token forwarded by the platform authentication layer.

use async_trait::async_trait;
use axum::http::HeaderName;

use super::{AccessToken, TokenError, TokenRequest, TokenSource};

/// Reads the caller's access token from an inbound header, typically
/// `X-MS-TOKEN-AAD-ACCESS-TOKEN`.
#[derive(Debug, Clone)]
pub struct ForwardedTokenSource {
    header: HeaderName,
}

impl ForwardedTokenSource {
    pub fn new(header: &str) -> Result<Self, TokenError> {
        let header = HeaderName::try_from(header.trim())
            .map_err(|e| TokenError::Config(format!("invalid forwarded token header: {e}")))?;
        Ok(Self { header })
    }
}

#[async_trait]
impl TokenSource for ForwardedTokenSource {
    async fn token(&self, request: &TokenRequest<'_>) -> Result<AccessToken, TokenError> {
        request
            .headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(AccessToken::new)
            .ok_or_else(|| TokenError::Missing(self.header.to_string()))
    }

    fn name(&self) -> &'static str {
        "forwarded"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[tokio::test]
    async fn test_reads_forwarded_header() {
        let source = ForwardedTokenSource::new("X-MS-TOKEN-AAD-ACCESS-TOKEN").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-ms-token-aad-access-token",
            HeaderValue::from_static("user-token"),
        );
        let token = source
            .token(&TokenRequest {
                resource: "https://graph.microsoft.com",
                headers: &headers,
            })
            .await
            .unwrap();
        assert_eq!(token.secret(), "user-token");
    }

    #[tokio::test]
    async fn test_missing_header() {
        let source = ForwardedTokenSource::new("x-ms-token-aad-access-token").unwrap();
        let headers = HeaderMap::new();
        let err = source
            .token(&TokenRequest {
                resource: "https://graph.microsoft.com",
                headers: &headers,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Missing(ref h) if h == "x-ms-token-aad-access-token"));
    }

    #[test]
    fn test_rejects_invalid_header_name() {
        assert!(matches!(
            ForwardedTokenSource::new("not a header"),
            Err(TokenError::Config(_))
        ));
    }
}
