use std::sync::atomic::Ordering;

use axum::{Json, extract::State};
use cm_common::db::PgPool;
use serde::Serialize;
use tokio::time::{Duration, timeout};

use crate::SharedState;
use crate::error::ApiError;

const CHECK_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<&'static str>,
}

pub async fn livez() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        database: None,
        application: None,
    })
}

/// Check out a connection and run `SELECT 1`, each step bounded by [`CHECK_TIMEOUT`].
async fn ping(pool: &PgPool) -> Result<(), String> {
    let client = match timeout(CHECK_TIMEOUT, pool.get()).await {
        Err(_) => return Err("db_pool_timeout".into()),
        Ok(Err(err)) => return Err(format!("pool checkout failed: {err}")),
        Ok(Ok(client)) => client,
    };

    match timeout(CHECK_TIMEOUT, client.simple_query("SELECT 1")).await {
        Err(_) => Err("db_ping_timeout".into()),
        Ok(Err(err)) => Err(format!("ping failed: {err}")),
        Ok(Ok(_)) => Ok(()),
    }
}

pub async fn readyz(State(state): State<SharedState>) -> Result<Json<HealthStatus>, ApiError> {
    if !state.readiness.load(Ordering::SeqCst) {
        return Err(ApiError::ServiceUnavailable("shutting_down".into()));
    }

    ping(&state.pool).await.map_err(ApiError::ServiceUnavailable)?;

    Ok(Json(HealthStatus {
        status: "ok",
        database: Some("ok"),
        application: Some(env!("CARGO_PKG_NAME")),
    }))
}
