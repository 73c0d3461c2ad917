//! LLM-led package ranking, its comparison with the weighted search, and a connectivity check.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use tracing::info;

use cm_common::api::{
    ComparisonResponse, OracleCheckResponse, PackageMatchRequest, PackageRankingResponse,
};

use crate::SharedState;
use crate::auth::{AuthUser, Requester};
use crate::error::ApiError;

pub async fn find_caregivers(
    State(state): State<SharedState>,
    _auth: AuthUser,
    payload: Result<Json<PackageMatchRequest>, JsonRejection>,
) -> Result<Json<PackageRankingResponse>, ApiError> {
    let Json(body) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let package_id = body.package_id()?;
    let max_results = body.max_results()?;

    let ranking = state.engine.rank_for_package(package_id, max_results).await?;
    Ok(Json(PackageRankingResponse::from(ranking)))
}

pub async fn compare(
    State(state): State<SharedState>,
    _auth: AuthUser,
    requester: Requester,
    payload: Result<Json<PackageMatchRequest>, JsonRejection>,
) -> Result<Json<ComparisonResponse>, ApiError> {
    let Json(body) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let package_id = body.package_id()?;

    let comparison = state
        .engine
        .compare_for_package(package_id, requester.id)
        .await?;
    info!(
        oracle_ms = comparison.oracle.elapsed_ms,
        rule_based_ms = comparison.rule_based_ms,
        "ranking comparison completed"
    );
    Ok(Json(ComparisonResponse::from(comparison)))
}

pub async fn check_connection(
    State(state): State<SharedState>,
    _auth: AuthUser,
) -> Result<Json<OracleCheckResponse>, ApiError> {
    let check = state.engine.check_oracle().await?;
    Ok(Json(OracleCheckResponse::from(check)))
}
