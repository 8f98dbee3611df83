//! Request-level error kinds.
//!
//! Every failure in the request pipeline collapses into one of three kinds:
//! [`AppError::Unauthorized`], [`AppError::BadRequest`] or [`AppError::Internal`].
//! Module errors convert into these with `From`, so handlers can use `?`.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::graph::GraphError;
use crate::identity::IdentityError;
use crate::token::TokenError;

/// Error returned by request handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The identity signal is missing or was rejected.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        /// Value for `WWW-Authenticate`, if the caller should be challenged.
        challenge: Option<&'static str>,
    },

    /// The identity signal was present but could not be decoded.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Token acquisition, upstream call or rendering failed.
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        upstream_status: Option<u16>,
        upstream_body: Option<String>,
    },
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            upstream_status: None,
            upstream_body: None,
        }
    }

    /// HTTP status this error is rendered with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream_body: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Internal {
                upstream_status, ..
            } => tracing::error!(
                name: "request.failed",
                status = status.as_u16(),
                upstream_status = ?upstream_status,
                error = %self,
                "Request failed"
            ),
            _ => tracing::warn!(
                name: "request.rejected",
                status = status.as_u16(),
                error = %self,
                "Request rejected"
            ),
        }

        let (upstream_status, upstream_body, challenge) = match &self {
            Self::Internal {
                upstream_status,
                upstream_body,
                ..
            } => (*upstream_status, upstream_body.as_deref(), None),
            Self::Unauthorized { challenge, .. } => (None, None, *challenge),
            Self::BadRequest(_) => (None, None, None),
        };

        let body = ErrorBody {
            detail: self.to_string(),
            upstream_status,
            upstream_body,
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(challenge) = challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }
        response
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MissingPrincipal => Self::Unauthorized {
                message: err.to_string(),
                challenge: None,
            },
            IdentityError::MissingCredentials | IdentityError::InvalidCredentials => {
                Self::Unauthorized {
                    message: err.to_string(),
                    challenge: Some("Basic"),
                }
            }
            IdentityError::MalformedPrincipal(_) | IdentityError::MissingObjectId => {
                Self::BadRequest(err.to_string())
            }
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Missing(_) => Self::Unauthorized {
                message: err.to_string(),
                challenge: None,
            },
            TokenError::Endpoint { status, ref body } => Self::Internal {
                upstream_status: Some(status),
                upstream_body: Some(body.clone()),
                message: format!("Failed to acquire access token: {err}"),
            },
            _ => Self::internal(format!("Failed to acquire access token: {err}")),
        }
    }
}

impl From<GraphError> for AppError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Status { status, ref body } => Self::Internal {
                upstream_status: Some(status),
                upstream_body: Some(body.clone()),
                message: format!("Failed to get user info from Microsoft Graph API: {err}"),
            },
            _ => Self::internal(format!(
                "Failed to get user info from Microsoft Graph API: {err}"
            )),
        }
    }
}
