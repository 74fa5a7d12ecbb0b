//! Unified error type for the proxy's own locally-generated responses.
//!
//! Upstream backend responses are never converted through this type — they
//! are relayed verbatim by the streaming relay, including their status code
//! and body, regardless of what that status code is. `ProxyError` only
//! covers failures the Dispatcher itself decides before (or instead of)
//! forwarding: authentication, malformed requests, and "no backend could
//! serve this".

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// All errors the Dispatcher can produce without ever reaching a backend.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// `Authorization` header missing, malformed, or the credentials don't
    /// match a known user. Always 403 with an empty body.
    #[error("authentication failed")]
    AuthFailure,

    /// A model-based endpoint was hit without a resolvable `model` field.
    #[error("missing 'model' in request")]
    MissingModel,

    /// No backend in the current snapshot serves the requested model.
    #[error("no servers support the requested model")]
    NoModelBackend,

    /// Every live candidate was tried and all forwarding attempts failed.
    #[error("no available servers could handle the request")]
    AllCandidatesExhausted,

    /// The default backend (first in the snapshot) is not live.
    #[error("default server is not available")]
    DefaultBackendUnavailable,

    /// The default backend was live but every forward attempt failed.
    #[error("failed to forward request to default server")]
    DefaultForwardFailed,

    /// An unclassified internal error (config store failure, I/O, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    fn status(&self) -> StatusCode {
        match self {
            ProxyError::AuthFailure => StatusCode::FORBIDDEN,
            ProxyError::MissingModel => StatusCode::BAD_REQUEST,
            ProxyError::NoModelBackend
            | ProxyError::AllCandidatesExhausted
            | ProxyError::DefaultBackendUnavailable
            | ProxyError::DefaultForwardFailed => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text body, per the spec's error-response contract. Empty for
    /// auth failures.
    fn body_text(&self) -> String {
        match self {
            ProxyError::AuthFailure => String::new(),
            ProxyError::MissingModel => "Missing 'model' in request".to_owned(),
            ProxyError::NoModelBackend => "No servers support the requested model.".to_owned(),
            ProxyError::AllCandidatesExhausted => {
                "No available servers could handle the request.".to_owned()
            }
            ProxyError::DefaultBackendUnavailable => {
                "Default server is not available.".to_owned()
            }
            ProxyError::DefaultForwardFailed => {
                "Failed to forward request to default server.".to_owned()
            }
            ProxyError::Internal(_) => "Internal server error".to_owned(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.body_text()).into_response()
    }
}

impl From<anyhow::Error> for ProxyError {
    fn from(e: anyhow::Error) -> Self {
        ProxyError::Internal(e.to_string())
    }
}

impl From<sqlx::Error> for ProxyError {
    fn from(e: sqlx::Error) -> Self {
        ProxyError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failure_is_403_with_empty_body() {
        assert_eq!(ProxyError::AuthFailure.status(), StatusCode::FORBIDDEN);
        assert_eq!(ProxyError::AuthFailure.body_text(), "");
    }

    #[test]
    fn missing_model_is_400() {
        assert_eq!(ProxyError::MissingModel.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::MissingModel.body_text(), "Missing 'model' in request");
    }

    #[test]
    fn no_model_backend_is_503() {
        assert_eq!(
            ProxyError::NoModelBackend.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn default_backend_unavailable_uses_the_default_path_wording() {
        assert_eq!(
            ProxyError::DefaultBackendUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ProxyError::DefaultBackendUnavailable.body_text(),
            "Default server is not available."
        );
    }
}
