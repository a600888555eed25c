//! HTTP error responses.
//!
//! Every error is rendered as `{"detail": "<message>"}`. Internal failures
//! are logged with their cause and answered with a fixed message.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use keygate_authn::{AuthError, GateRejection};
use serde::Serialize;
use thiserror::Error;

/// Errors returned by gateway handlers and middleware.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// The challenge response was wrong, or the challenge unknown or expired.
    #[error("invalid challenge response")]
    InvalidChallengeResponse,

    /// The request body is not the expected JSON document.
    #[error("{detail}")]
    InvalidBody {
        /// 400, 415 or 422, as chosen by the extractor.
        status: StatusCode,
        /// Extractor message.
        detail: String,
    },

    /// A protected request carried no token.
    #[error("missing x-token header")]
    MissingToken,

    /// A protected request carried a token that did not verify.
    #[error("invalid token")]
    InvalidToken,

    /// The gateway could not complete the request.
    #[error("internal server error")]
    Internal(#[source] AuthError),
}

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable reason.
    pub detail: String,
}

impl ApiError {
    /// Status code the error is answered with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidChallengeResponse => StatusCode::UNAUTHORIZED,
            Self::InvalidBody { status, .. } => *status,
            Self::MissingToken | Self::InvalidToken => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Internal(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody { status: rejection.status(), detail: rejection.body_text() }
    }
}

impl From<GateRejection> for ApiError {
    fn from(rejection: GateRejection) -> Self {
        match rejection {
            GateRejection::MissingToken => Self::MissingToken,
            GateRejection::Unavailable(e) => Self::Internal(e),
            _ => Self::InvalidToken,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, kind = e.kind(), "Request failed");
        }
        (self.status(), Json(ErrorResponse { detail: self.to_string() })).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use keygate_storage::StorageError;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::challenge(ApiError::InvalidChallengeResponse, StatusCode::UNAUTHORIZED, "invalid challenge response")]
    #[case::missing(ApiError::MissingToken, StatusCode::FORBIDDEN, "missing x-token header")]
    #[case::invalid(ApiError::InvalidToken, StatusCode::FORBIDDEN, "invalid token")]
    #[case::internal(
        ApiError::Internal(AuthError::from(StorageError::internal("disk on fire"))),
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error"
    )]
    fn test_status_and_detail(
        #[case] err: ApiError,
        #[case] status: StatusCode,
        #[case] detail: &str,
    ) {
        assert_eq!(err.status(), status);
        assert_eq!(err.to_string(), detail);
    }

    #[test]
    fn test_body_rejection_keeps_extractor_status() {
        let err = ApiError::InvalidBody {
            status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
            detail: "Expected request with `Content-Type: application/json`".to_owned(),
        };
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(err.to_string().contains("Content-Type"));
    }

    #[test]
    fn test_gate_rejection_mapping() {
        assert!(matches!(ApiError::from(GateRejection::MissingToken), ApiError::MissingToken));
        assert!(matches!(ApiError::from(GateRejection::InvalidToken), ApiError::InvalidToken));
        assert!(matches!(
            ApiError::from(GateRejection::Unavailable(AuthError::StoreUnavailable)),
            ApiError::Internal(AuthError::StoreUnavailable)
        ));
    }
}
