use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::fetch::FetchError;
use crate::outreach::extractor::ExtractionError;
use crate::outreach::pipeline::error_chain;
use crate::outreach::portfolio::CatalogError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Page fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Portfolio catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Fetch(e) => {
                tracing::warn!("Page fetch error: {}", error_chain(e));
                let status = match e {
                    FetchError::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
                    FetchError::Http { .. } | FetchError::Status { .. } => StatusCode::BAD_GATEWAY,
                };
                (status, "FETCH_ERROR", error_chain(e))
            }
            AppError::Catalog(e) => {
                tracing::error!("Portfolio catalog error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CATALOG_ERROR",
                    "The portfolio catalog could not be loaded".to_string(),
                )
            }
            AppError::Extraction(e) => {
                tracing::error!("Extraction error: {}", error_chain(e));
                match e {
                    ExtractionError::Format { .. } => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "EXTRACTION_FORMAT_ERROR",
                        error_chain(e),
                    ),
                    ExtractionError::Transport(_) => (
                        StatusCode::BAD_GATEWAY,
                        "EXTRACTION_TRANSPORT_ERROR",
                        error_chain(e),
                    ),
                }
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
