//! Microsoft Graph profile client.

use serde_json::{Map, Value};
use url::Url;

use crate::token::AccessToken;

/// Profile document exactly as returned by Graph.
pub type Profile = Map<String, Value>;

/// Whose profile to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileTarget {
    /// The subject of the token (`/me`).
    Me,
    /// A user by object id or user principal name (`/users/{id}`).
    User(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("invalid Graph URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Graph returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GraphClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Result<Self, GraphError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            return Err(GraphError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }
        Ok(Self { http, base_url })
    }

    /// URL of the profile resource for `target`.
    pub fn profile_url(&self, target: &ProfileTarget) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            match target {
                ProfileTarget::Me => {
                    segments.push("me");
                }
                ProfileTarget::User(id) => {
                    segments.push("users").push(id);
                }
            }
        }
        url
    }

    /// Fetch a profile with one authenticated `GET`.
    pub async fn fetch_profile(
        &self,
        token: &AccessToken,
        target: &ProfileTarget,
    ) -> Result<Profile, GraphError> {
        let url = self.profile_url(target);
        let resp = self
            .http
            .get(url.clone())
            .bearer_auth(token.secret())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GraphError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let profile = match resp.json::<Value>().await? {
            Value::Object(profile) => profile,
            other => {
                return Err(GraphError::Decode(format!(
                    "expected a JSON object, got {other}"
                )));
            }
        };

        tracing::debug!(
            name: "graph.profile.fetched",
            url = %url,
            fields = profile.len(),
            "Retrieved user info from Graph API"
        );
        Ok(profile)
    }
}
