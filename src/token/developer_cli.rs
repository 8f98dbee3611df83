//! Developer fallback: borrow the token of the locally signed-in CLI user.
//!
//! Runs `az account get-access-token --resource <resource> --output json`.
//! Only meaningful on a workstation where `az login` has been done.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::{AccessToken, TokenError, TokenRequest, TokenSource};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeveloperCliSource {
    program: String,
}

impl DeveloperCliSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl TokenSource for DeveloperCliSource {
    async fn token(&self, request: &TokenRequest<'_>) -> Result<AccessToken, TokenError> {
        let output = Command::new(&self.program)
            .args([
                "account",
                "get-access-token",
                "--resource",
                request.resource,
                "--output",
                "json",
            ])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TokenError::Tool(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TokenError::Tool(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let parsed: CliToken = serde_json::from_slice(&output.stdout)
            .map_err(|e| TokenError::Tool(format!("unreadable {} output: {e}", self.program)))?;
        parsed
            .access_token
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
            .ok_or(TokenError::MissingField("accessToken"))
    }

    fn name(&self) -> &'static str {
        "developer_cli"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[tokio::test]
    async fn test_missing_program_is_a_tool_error() {
        let source = DeveloperCliSource::new("graph-profile-portal-no-such-cli");
        let headers = HeaderMap::new();
        let err = source
            .token(&TokenRequest {
                resource: "https://graph.microsoft.com",
                headers: &headers,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Tool(_)));
    }

    #[test]
    fn test_parses_cli_output() {
        let out = br#"{"accessToken":"cli-token","expiresOn":"2024-01-01 00:00:00.000000","tokenType":"Bearer"}"#;
        let parsed: CliToken = serde_json::from_slice(out).unwrap();
        assert_eq!(parsed.access_token.as_deref(), Some("cli-token"));
    }
}
