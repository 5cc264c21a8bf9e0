//! Portfolio and opportunity handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use garde::Validate;
use serde::Deserialize;
use utoipa::ToSchema;

use super::{RequestBody, SuccessResponse, ValidatedJson};
use crate::errors::{BrowseError, ErrorBody};
use crate::metrics::record_operation;
use crate::AppState;

/// Body of `POST /portfolios/{portfolio}/opportunities/create`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOpportunityRequest {
    #[garde(length(min = 1))]
    pub name: String,
}

impl RequestBody for CreateOpportunityRequest {
    const INVALID: &'static str = "Missing name or portfolio";
}

/// `GET /portfolios` -- Names of the top-level folders.
#[utoipa::path(
    get,
    path = "/portfolios",
    tag = "Portfolios",
    operation_id = "ListPortfolios",
    responses(
        (status = 200, description = "Portfolio names", body = Vec<String>),
        (status = 500, description = "Backend failure", body = ErrorBody)
    )
)]
pub async fn list_portfolios(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, BrowseError> {
    let result = state.browse.list_portfolios().await;
    record_operation("list_portfolios", result.is_ok());
    Ok(Json(result?))
}

/// `GET /portfolios/{portfolio}/opportunities` -- Opportunity names of a portfolio.
#[utoipa::path(
    get,
    path = "/portfolios/{portfolio}/opportunities",
    tag = "Portfolios",
    operation_id = "ListOpportunities",
    params(("portfolio" = String, Path, description = "Portfolio name")),
    responses(
        (status = 200, description = "Opportunity names", body = Vec<String>),
        (status = 400, description = "Invalid portfolio", body = ErrorBody),
        (status = 500, description = "Backend failure", body = ErrorBody)
    )
)]
pub async fn list_opportunities(
    State(state): State<Arc<AppState>>,
    Path(portfolio): Path<String>,
) -> Result<Json<Vec<String>>, BrowseError> {
    let result = state.browse.list_opportunities(&portfolio).await;
    record_operation("list_opportunities", result.is_ok());
    Ok(Json(result?))
}

/// `POST /portfolios/{portfolio}/opportunities/create` -- Create an opportunity folder.
#[utoipa::path(
    post,
    path = "/portfolios/{portfolio}/opportunities/create",
    tag = "Portfolios",
    operation_id = "CreateOpportunity",
    params(("portfolio" = String, Path, description = "Portfolio name")),
    request_body = CreateOpportunityRequest,
    responses(
        (status = 200, description = "Opportunity created", body = SuccessResponse),
        (status = 400, description = "Missing name or portfolio", body = ErrorBody),
        (status = 500, description = "Backend failure", body = ErrorBody)
    )
)]
pub async fn create_opportunity(
    State(state): State<Arc<AppState>>,
    Path(portfolio): Path<String>,
    ValidatedJson(req): ValidatedJson<CreateOpportunityRequest>,
) -> Result<Json<SuccessResponse>, BrowseError> {
    let result = state.browse.create_opportunity(&portfolio, &req.name).await;
    record_operation("create_opportunity", result.is_ok());
    result?;
    Ok(SuccessResponse::ok())
}
