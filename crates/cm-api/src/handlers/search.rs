use axum::{Json, extract::State, extract::rejection::JsonRejection};
use tracing::info;

use cm_common::api::{CaregiverSearchRequest, GeoSearchResponse};

use crate::SharedState;
use crate::auth::AuthUser;
use crate::error::ApiError;

/// Geography-first search over the 145-point strategy.
pub async fn search_caregivers(
    State(state): State<SharedState>,
    _auth: AuthUser,
    payload: Result<Json<CaregiverSearchRequest>, JsonRejection>,
) -> Result<Json<GeoSearchResponse>, ApiError> {
    let Json(body) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let request = body.into_geo_request()?;

    let outcome = state.engine.search_caregivers(&request).await?;
    info!(
        total = outcome.total,
        returned = outcome.matches.len(),
        "caregiver search completed"
    );
    Ok(Json(GeoSearchResponse::from(outcome)))
}
