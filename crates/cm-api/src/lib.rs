use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, FromRef},
    http::{
        Method, Request,
        header::{CONTENT_TYPE, HeaderName, HeaderValue},
    },
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
};
use clap::Parser;
use cm_common::db::{
    InMemoryCandidateRepository, PgCandidateRepository, PgPool, create_pool_from_url,
    run_migrations,
};
use cm_common::geocode::{DisabledGeocoder, Geocoder, GeocoderConfig, NominatimGeocoder};
use cm_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use cm_common::matching::{MatchingConfig, MatchingEngine};
use cm_common::oracle::{DisabledOracle, GroqRerankOracle, OracleConfig, RerankOracle};
use cm_common::similarity::{CacheSettings, SimilarityEngine};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod rate_limit;

pub use config::{AppConfig, Cli};
pub use rate_limit::{ClientRateLimiter, RateLimitConfig};

use auth::AuthConfig;
use error::ApiError;
use handlers::{groq, health, matching, search};

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_BODY_BYTES: usize = 256 * 1024;
const DRAIN_GRACE: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: AppConfig,
    pub engine: Arc<MatchingEngine>,
    pub rate_limiter: ClientRateLimiter,
    /// Flipped to false once shutdown starts.
    pub readiness: Arc<AtomicBool>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, engine: MatchingEngine) -> Self {
        Self {
            pool,
            config,
            engine: Arc::new(engine),
            rate_limiter: ClientRateLimiter::from_env(),
            readiness: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl FromRef<SharedState> for AuthConfig {
    fn from_ref(state: &SharedState) -> Self {
        state.config.auth.clone()
    }
}

fn header_text<'a>(req: &'a Request<Body>, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|value| value.to_str().ok())
}

async fn scope_request_id(req: Request<Body>, next: Next) -> Response {
    let request_id = header_text(&req, REQUEST_ID_HEADER).map(str::to_owned);
    error::with_request_id(request_id, next.run(req)).await
}

fn cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(auth::API_KEY_HEADER),
            HeaderName::from_static(auth::REQUESTER_HEADER),
        ])
        .allow_credentials(true)
}

fn api_routes() -> Router<SharedState> {
    let matching_routes = Router::new()
        .route("/find-caregivers", post(matching::find_caregivers))
        .route("/quick-match", get(matching::quick_match))
        .route("/recommendations", get(matching::recommendations))
        .route("/stats", get(matching::stats))
        .route("/test-similarity", post(matching::test_similarity))
        .route("/cache", delete(matching::clear_cache));

    let groq_routes = Router::new()
        .route("/find-caregivers", post(groq::find_caregivers))
        .route("/compare", post(groq::compare))
        .route("/test", get(groq::check_connection));

    Router::new()
        .nest("/matching", matching_routes)
        .nest("/groq-matching", groq_routes)
        .route("/caregivers/search", post(search::search_caregivers))
}

pub fn create_router(state: SharedState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        tracing::info_span!(
            "request",
            method = %req.method(),
            uri = %req.uri(),
            request_id = header_text(req, REQUEST_ID_HEADER).unwrap_or("-"),
        )
    });

    Router::new()
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .route("/health", get(health::readyz))
        .nest("/api", api_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_by_client,
        ))
        .layer(middleware::from_fn(scope_request_id))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(trace)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(cors(&state.config.cors_origins))
        .with_state(state)
}

/// State over a lazily-connecting pool and the given engine; nothing touches the network.
pub fn test_state_with_engine(api_key: &str, engine: MatchingEngine) -> SharedState {
    let pool = create_pool_from_url(config::TEST_DATABASE_URL)
        .expect("lazy pool builds without a server");
    Arc::new(AppState::new(pool, AppConfig::for_tests(api_key), engine))
}

/// State backed by an empty in-memory repository.
pub fn test_state(api_key: &str) -> SharedState {
    let repo = Arc::new(InMemoryCandidateRepository::new());
    let engine = MatchingEngine::new(repo, MatchingConfig::default())
        .with_similarity(SimilarityEngine::uncached());
    test_state_with_engine(api_key, engine)
}

fn build_oracle() -> Arc<dyn RerankOracle> {
    let config = OracleConfig::from_env();
    if !config.is_usable() {
        info!("rerank oracle disabled, base scores are final");
        return Arc::new(DisabledOracle);
    }
    GroqRerankOracle::new(config)
        .map(|oracle| Arc::new(oracle) as Arc<dyn RerankOracle>)
        .unwrap_or_else(|err| {
            warn!(error = %err, "rerank client unavailable, oracle disabled");
            Arc::new(DisabledOracle)
        })
}

fn build_geocoder() -> Arc<dyn Geocoder> {
    let config = GeocoderConfig::from_env();
    if !config.enabled {
        return Arc::new(DisabledGeocoder);
    }
    NominatimGeocoder::new(&config)
        .map(|geocoder| Arc::new(geocoder) as Arc<dyn Geocoder>)
        .unwrap_or_else(|err| {
            warn!(error = %err, "geocoder unavailable, addresses stay unresolved");
            Arc::new(DisabledGeocoder)
        })
}

async fn build_state(config: AppConfig) -> Result<SharedState, ApiError> {
    let pool = create_pool_from_url(&config.database_url)
        .map_err(|err| ApiError::Database(format!("pool setup: {err}")))?;

    if config.run_migrations {
        run_migrations(&pool)
            .await
            .map_err(|err| ApiError::Database(format!("migrations: {err}")))?;
    }

    let engine = MatchingEngine::new(
        Arc::new(PgCandidateRepository::new(pool.clone())),
        MatchingConfig::from_env(),
    )
    .with_similarity(SimilarityEngine::from_settings(CacheSettings::from_env()))
    .with_oracle(build_oracle())
    .with_geocoder(build_geocoder());

    Ok(Arc::new(AppState::new(pool, config, engine)))
}

pub async fn run() -> Result<(), ApiError> {
    dotenvy::dotenv().ok();
    let app_name = env!("CARGO_PKG_NAME");
    init_tracing_subscriber(app_name);
    install_tracing_panic_hook(app_name);

    let config = AppConfig::from_cli(Cli::parse())?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = build_state(config).await?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| ApiError::Internal(format!("bind {addr}: {err}")))?;
    info!(%addr, "listening");

    let app = create_router(state.clone()).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(drain_on_signal(state.readiness.clone()))
        .await
        .map_err(|err| ApiError::Internal(format!("server: {err}")))
}

#[cfg(unix)]
async fn terminated() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(err) => {
            warn!(error = %err, "SIGTERM handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminated() {
    std::future::pending::<()>().await;
}

async fn drain_on_signal(readiness: Arc<AtomicBool>) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminated() => {}
    }
    info!("shutdown requested");
    readiness.store(false, Ordering::SeqCst);
    // Keep serving /readyz 503s briefly so balancers stop routing here.
    tokio::time::sleep(DRAIN_GRACE).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn generated_request_id_is_echoed() {
        let app = create_router(test_state("test-key"));

        let response = app
            .oneshot(Request::get("/livez").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn caller_request_id_is_kept() {
        let app = create_router(test_state("test-key"));

        let response = app
            .oneshot(
                Request::get("/livez")
                    .header(REQUEST_ID_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc-123");
    }
}
