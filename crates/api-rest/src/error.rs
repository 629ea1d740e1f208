//! API errors with structured JSON bodies.
//!
//! Every failure renders as `{"error": {"kind": ..., "message": ...}}`. Domain failures carry
//! the core error kind; storage and atomicity failures are logged and reported without detail.

use api_shared::AuthError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{BoxError, Json};
use pathlab_core::{ErrorKind, LabError};
use serde::Serialize;
use tower::timeout::error::Elapsed;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable kind, e.g. `NotFound` or `AlreadyConverted`.
    #[schema(value_type = String)]
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Lab(#[from] LabError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid request body: {0}")]
    BadRequest(String),
    #[error("request timed out")]
    Timeout,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Lab(err) => {
                let kind = err.kind();
                match kind {
                    ErrorKind::ValidationError | ErrorKind::InvalidLineItem => {
                        (StatusCode::BAD_REQUEST, kind.as_str(), err.to_string())
                    }
                    ErrorKind::NotFound => (StatusCode::NOT_FOUND, kind.as_str(), err.to_string()),
                    ErrorKind::AlreadyConverted
                    | ErrorKind::InvalidTransition
                    | ErrorKind::Conflict => (StatusCode::CONFLICT, kind.as_str(), err.to_string()),
                    ErrorKind::AtomicityFailure => {
                        tracing::error!(error = %err, "change rolled back");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            kind.as_str(),
                            "The change could not be saved and was rolled back".to_string(),
                        )
                    }
                    ErrorKind::Internal => {
                        tracing::error!(error = %err, "store error");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            kind.as_str(),
                            "An internal error occurred".to_string(),
                        )
                    }
                }
            }
            ApiError::Auth(err) => match err {
                AuthError::InvalidApiKey => (StatusCode::FORBIDDEN, "Forbidden", err.to_string()),
                _ => (StatusCode::UNAUTHORIZED, "Unauthorized", err.to_string()),
            },
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                ErrorKind::ValidationError.as_str(),
                detail.clone(),
            ),
            ApiError::Timeout => (
                StatusCode::REQUEST_TIMEOUT,
                "Timeout",
                "The request took too long and was abandoned".to_string(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorKind::Internal.as_str(),
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

/// Error handler for the middleware stack. An elapsed request timeout becomes [`ApiError::Timeout`].
pub async fn middleware_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        tracing::warn!("request timed out");
        ApiError::Timeout
    } else {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = self.parts();
        let body = ErrorBody {
            error: ErrorDetail { kind, message },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use pathlab_core::RecordId;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn already_converted_is_409() {
        let (status, json) = body_json(LabError::AlreadyConverted(RecordId::new()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["kind"], "AlreadyConverted");
    }

    #[tokio::test]
    async fn invalid_line_item_names_the_test() {
        let id = RecordId::new();
        let err = LabError::InvalidLineItem {
            test_id: id,
            problem: pathlab_core::LineItemProblem::Missing,
        };
        let (status, json) = body_json(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["kind"], "InvalidLineItem");
        assert_eq!(
            json["error"]["message"],
            format!("Test {id} not found or inactive")
        );
    }

    #[tokio::test]
    async fn storage_details_are_hidden() {
        let err = LabError::FileRead(std::io::Error::other("/srv/lab_data/secret"));
        let (status, json) = body_json(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["kind"], "Internal");
        assert!(!json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("secret"));
    }

    #[tokio::test]
    async fn atomicity_failure_keeps_its_kind() {
        let inner = LabError::FileWrite(std::io::Error::other("disk full"));
        let (status, json) = body_json(LabError::CommitRolledBack(Box::new(inner)).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["kind"], "AtomicityFailure");
    }

    #[tokio::test]
    async fn elapsed_timeout_is_a_json_408() {
        let err = middleware_error(Box::new(Elapsed::new())).await;
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(json["error"]["kind"], "Timeout");
    }

    #[tokio::test]
    async fn other_middleware_errors_are_internal() {
        let err = middleware_error("boom".into()).await;
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["kind"], "Internal");
    }

    #[tokio::test]
    async fn auth_errors_are_401_or_403() {
        let (status, _) = body_json(AuthError::MissingUserId.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, json) = body_json(AuthError::InvalidApiKey.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"]["kind"], "Forbidden");
    }
}
