//! HTML pages.

use askama::Template;
use axum::response::{Html, IntoResponse, Response};
use serde_json::Value;

use crate::error::AppError;
use crate::graph::Profile;
use crate::identity::{Claim, Identity};

/// Wraps an askama template so handlers can return it directly.
#[derive(Debug)]
pub struct HtmlTemplate<T>(pub T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => AppError::internal(format!("Failed to render page: {err}")).into_response(),
        }
    }
}

#[derive(Template, Debug, Default)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub title: &'static str,
    pub username: String,
    pub error: Option<String>,
}

impl LoginPage {
    pub fn new() -> Self {
        Self {
            title: "Sign in",
            ..Self::default()
        }
    }

    pub fn failed(username: &str) -> Self {
        Self {
            title: "Sign in",
            username: username.to_string(),
            error: Some("Invalid username or password".to_string()),
        }
    }
}

/// Shown with a `401` on `/home` when basic credentials are missing or wrong.
#[derive(Template, Debug)]
#[template(path = "challenge.html")]
pub struct ChallengePage {
    pub title: &'static str,
    /// Name remembered from the form login cookie. Display only.
    pub username: Option<String>,
    pub message: String,
}

impl ChallengePage {
    pub fn new(username: Option<String>, message: impl Into<String>) -> Self {
        Self {
            title: "Sign in required",
            username,
            message: message.into(),
        }
    }
}

/// One row of the directory profile table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileField {
    pub key: String,
    pub value: String,
}

#[derive(Template, Debug)]
#[template(path = "profile.html")]
pub struct ProfilePage {
    pub title: &'static str,
    pub display_name: String,
    pub auth_type: String,
    pub claims: Vec<Claim>,
    pub fields: Vec<ProfileField>,
}

impl ProfilePage {
    /// Merge identity and profile into a page. Profile values are shown as
    /// returned: strings verbatim, everything else as compact JSON.
    pub fn new(identity: &Identity, profile: &Profile) -> Self {
        let display_name = identity
            .name()
            .or_else(|| profile.get("displayName").and_then(Value::as_str))
            .unwrap_or("unknown user")
            .to_string();

        let fields = profile
            .iter()
            .map(|(key, value)| ProfileField {
                key: key.clone(),
                value: match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            })
            .collect();

        Self {
            title: "Profile",
            display_name,
            auth_type: identity
                .auth_type
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            claims: identity.claims.clone(),
            fields,
        }
    }
}
