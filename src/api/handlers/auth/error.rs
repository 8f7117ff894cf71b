//! Failure taxonomy for session resolution.
//!
//! Every variant except [`AuthError::NoSecret`] is recovered locally into an
//! unauthenticated result. `NoSecret` is a deployment problem and must reach
//! the caller as a 500.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no session token")]
    NoToken,
    #[error("no namespace")]
    NoNamespace,
    #[error("session secret is not configured")]
    NoSecret,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("role does not match the requested scope")]
    RoleMismatch,
    #[error("token verification failed: {0}")]
    VerifyFailure(String),
    #[error("failed to sign session token: {0}")]
    Signing(String),
}

impl AuthError {
    /// Whether the error means misconfiguration rather than an anonymous visitor.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::NoSecret)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        if self.is_config() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::UNAUTHORIZED
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.is_config() {
            error!("Auth misconfigured: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
