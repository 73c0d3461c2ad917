use axum::{
    Json,
    extract::rejection::JsonRejection,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use cm_common::api::responses::RECOMMENDATIONS_MESSAGE;
use cm_common::api::{
    FindCaregiversRequest, FindResponse, MatchListResponse, SimilarityReport, SimilarityRequest,
    StatsResponse,
};
use cm_common::matching::SearchRequest;

use crate::SharedState;
use crate::auth::{AuthUser, Requester};
use crate::error::ApiError;

const QUICK_MATCH_TOP_N: usize = 5;
const DEFAULT_RECOMMENDATIONS: usize = 10;

pub async fn find_caregivers(
    State(state): State<SharedState>,
    _auth: AuthUser,
    requester: Requester,
    payload: Result<Json<FindCaregiversRequest>, JsonRejection>,
) -> Result<Json<FindResponse>, ApiError> {
    let Json(body) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let request = body.into_search_request(requester.id)?;

    let outcome = state.engine.find_caregivers(&request).await?;
    Ok(Json(FindResponse::new(&request, outcome)))
}

pub async fn quick_match(
    State(state): State<SharedState>,
    _auth: AuthUser,
    requester: Requester,
) -> Result<Json<MatchListResponse>, ApiError> {
    let request = SearchRequest::unfiltered(requester.id, QUICK_MATCH_TOP_N);
    let outcome = state.engine.find_caregivers(&request).await?;
    Ok(Json(MatchListResponse::new(outcome.matches)))
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationsQuery {
    pub limit: Option<usize>,
}

pub async fn recommendations(
    State(state): State<SharedState>,
    _auth: AuthUser,
    requester: Requester,
    Query(query): Query<RecommendationsQuery>,
) -> Result<Json<MatchListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_RECOMMENDATIONS);
    let request = SearchRequest::unfiltered(requester.id, limit);
    let outcome = state.engine.find_caregivers(&request).await?;
    Ok(Json(
        MatchListResponse::new(outcome.matches).with_message(RECOMMENDATIONS_MESSAGE),
    ))
}

pub async fn stats(
    State(state): State<SharedState>,
    _auth: AuthUser,
) -> Result<Json<StatsResponse>, ApiError> {
    let counts = state.engine.stats().await?;
    Ok(Json(StatsResponse::from(counts)))
}

#[derive(Debug, Serialize)]
pub struct SimilarityResponse {
    pub success: bool,
    pub data: SimilarityReport,
}

pub async fn test_similarity(
    State(state): State<SharedState>,
    _auth: AuthUser,
    payload: Result<Json<SimilarityRequest>, JsonRejection>,
) -> Result<Json<SimilarityResponse>, ApiError> {
    let Json(body) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let (skill1, skill2) = body.labels()?;
    let similarity = state.engine.similarity().similarity(skill1, skill2);

    Ok(Json(SimilarityResponse {
        success: true,
        data: SimilarityReport::new(skill1, skill2, similarity),
    }))
}

#[derive(Debug, Serialize)]
pub struct CacheClearResponse {
    pub success: bool,
    pub message: String,
    pub cleared: usize,
}

pub async fn clear_cache(
    State(state): State<SharedState>,
    _auth: AuthUser,
) -> Json<CacheClearResponse> {
    let cleared = state.engine.similarity().clear_cache();
    info!(cleared, "similarity cache cleared");

    Json(CacheClearResponse {
        success: true,
        message: format!("Cleared {cleared} cached similarity scores"),
        cleared,
    })
}
