//! Browser error types.
//!
//! Every variant maps to an HTTP status and a short `{ "error": ... }`
//! body.  The enum implements [`axum::response::IntoResponse`] so handlers
//! can simply return `Err(BrowseError::Validation { .. })`.
//!
//! Backend failures carry their cause for the server log only; the client
//! sees a generic per-operation message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes)
}

/// JSON error body returned for every failure.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub error: String,
}

/// Errors surfaced by the browse API.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// A required field is missing, empty, or malformed.
    #[error("{message}")]
    Validation { message: String },

    /// A listing or key prefix is neither empty nor `/`-terminated.
    #[error("Invalid prefix '{prefix}': must be empty or end with '/'")]
    InvalidPrefix { prefix: String },

    /// The request body exceeds `server.max_upload_size`.
    #[error("File too large")]
    PayloadTooLarge,

    /// The object store call failed.  `message` is what the client sees.
    #[error("{message}")]
    Backend {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Rename copied the object but could not remove the original, so
    /// both keys now exist.
    #[error("Rename incomplete: '{new_key}' was created but '{old_key}' could not be removed")]
    PartialRename {
        old_key: String,
        new_key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl BrowseError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        BrowseError::Validation {
            message: message.into(),
        }
    }

    /// Build a closure mapping a store error to [`BrowseError::Backend`].
    pub fn backend(message: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| BrowseError::Backend { message, source }
    }

    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BrowseError::Validation { .. } => StatusCode::BAD_REQUEST,
            BrowseError::InvalidPrefix { .. } => StatusCode::BAD_REQUEST,
            BrowseError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            BrowseError::Backend { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            BrowseError::PartialRename { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BrowseError {
    fn into_response(self) -> Response {
        match &self {
            BrowseError::Backend { message, source } => {
                error!("{message}: {source:#}");
            }
            BrowseError::PartialRename {
                old_key,
                new_key,
                source,
            } => {
                warn!("Rename left duplicate: old_key={old_key} new_key={new_key}: {source:#}");
            }
            _ => {}
        }

        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
