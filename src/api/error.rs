use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::collaborators::{AuthError, StorageError, StoreError};
use crate::services::PublishError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Auth(err) => auth_status(err),
            AppError::Store(err) => match err {
                StoreError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
                StoreError::Conflict(msg) => (StatusCode::CONFLICT, msg),
                StoreError::Request(msg) => {
                    tracing::error!("Datastore error: {}", msg);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal Server Error".to_string(),
                    )
                }
            },
            AppError::Storage(err) => match err {
                StorageError::NotFound(path) => {
                    (StatusCode::NOT_FOUND, format!("object not found: {}", path))
                }
                other => {
                    tracing::error!("Storage error: {}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal Server Error".to_string(),
                    )
                }
            },
            AppError::Publish(err) => publish_status(err),
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

fn auth_status(err: AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidCredentials
        | AuthError::EmailNotConfirmed
        | AuthError::LinkExpired
        | AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, err.to_string()),
        AuthError::AlreadyRegistered => (StatusCode::CONFLICT, err.to_string()),
        AuthError::Request(msg) => {
            tracing::error!("Identity provider error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            )
        }
    }
}

fn publish_status(err: PublishError) -> (StatusCode, String) {
    match err {
        PublishError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        PublishError::NotAnImage | PublishError::NothingToShare => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        PublishError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
        PublishError::ProjectNotFound | PublishError::NotFound => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        PublishError::Store(StoreError::Conflict(msg)) => (StatusCode::CONFLICT, msg),
        other => {
            tracing::error!("Publish error: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            )
        }
    }
}
