//! HTTP handlers for the browse API.
//!
//! Handlers stay thin: extract and validate the request, call
//! [`crate::browse::BrowseService`], shape the JSON response.

pub mod browse;
pub mod portfolio;

use axum::extract::{FromRequest, Request};
use axum::Json;
use garde::Validate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::errors::BrowseError;

/// `{ "success": true }`
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

/// A JSON request body with a fixed client-facing message for every
/// parse or validation failure.
pub trait RequestBody: DeserializeOwned + Validate<Context = ()> {
    const INVALID: &'static str;
}

/// JSON extractor that runs `garde` validation and maps every rejection to
/// [`BrowseError::Validation`] with `T::INVALID` as the message.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: RequestBody,
{
    type Rejection = BrowseError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            debug!("Rejected request body: {}", rejection.body_text());
            BrowseError::validation(T::INVALID)
        })?;
        value.validate().map_err(|report| {
            debug!("Request body failed validation: {report}");
            BrowseError::validation(T::INVALID)
        })?;
        Ok(Self(value))
    }
}
