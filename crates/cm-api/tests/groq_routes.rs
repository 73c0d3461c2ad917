use std::sync::Arc;

use axum::{Router, body::Body, http::Request, http::StatusCode};
use cm_common::db::InMemoryCandidateRepository;
use cm_common::matching::{MatchingConfig, MatchingEngine};
use cm_common::oracle::{DEFAULT_RERANK_MODEL, GroqRerankOracle, OracleConfig};
use cm_common::similarity::SimilarityEngine;
use cm_common::{
    BookingStats, CandidateProfile, CarePackage, EducationLevel, Gender, ProfileStatus, Skill,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-key";
const COMPLETIONS_PATH: &str = "/openai/v1/chat/completions";

fn caregiver(id: &str, years: u32, skills: &[&str]) -> CandidateProfile {
    CandidateProfile {
        id: id.into(),
        name: format!("Caregiver {id}"),
        status: ProfileStatus::Approved,
        gender: Some(Gender::Female),
        education: Some(EducationLevel::Bachelor),
        years_of_experience: years,
        skills: skills
            .iter()
            .map(|name| Skill {
                name: (*name).into(),
                description: None,
            })
            .collect(),
        review_ratings: vec![5, 4],
        booking_stats: BookingStats::from_counts(10, 9, 0),
        ..CandidateProfile::default()
    }
}

fn repository(caregivers: Vec<CandidateProfile>) -> Arc<InMemoryCandidateRepository> {
    let repo = Arc::new(InMemoryCandidateRepository::with_candidates(caregivers));
    repo.insert_care_package(CarePackage {
        id: "pkg-basic".into(),
        name: "Gói cơ bản".into(),
        package_type: Some("basic".into()),
        price: Some(350_000.0),
        duration_hours: Some(4.0),
        required_skills: vec!["cho ăn".into()],
        ..CarePackage::default()
    });
    repo
}

fn default_caregivers() -> Vec<CandidateProfile> {
    vec![
        caregiver("lan", 8, &["tắm rửa", "cho ăn"]),
        caregiver("minh", 2, &["tắm rửa"]),
    ]
}

fn groq_oracle(server: &MockServer) -> GroqRerankOracle {
    GroqRerankOracle::new(OracleConfig {
        enabled: true,
        api_key: "gsk-test".into(),
        endpoint: format!("{}{COMPLETIONS_PATH}", server.uri()),
        timeout_secs: 5,
        max_retries: 0,
        retry_backoff_ms: 1,
        ..OracleConfig::default()
    })
    .unwrap()
}

fn app(repo: Arc<InMemoryCandidateRepository>, server: Option<&MockServer>) -> Router {
    let mut engine = MatchingEngine::new(repo, MatchingConfig::default())
        .with_similarity(SimilarityEngine::uncached());
    if let Some(server) = server {
        engine = engine.with_oracle(Arc::new(groq_oracle(server)));
    }
    cm_api::create_router(cm_api::test_state_with_engine(API_KEY, engine))
}

async fn answer_with(server: &MockServer, matches: Value) {
    let content = json!({ "matches": matches }).to_string();
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })))
        .mount(server)
        .await;
}

async fn fail_with(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_string("upstream down"))
        .mount(server)
        .await;
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", API_KEY)
        .header("x-careseeker-id", "seeker-1");
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn llm_ranking_orders_by_model_scores() {
    let server = MockServer::start().await;
    answer_with(
        &server,
        json!([
            { "caregiverId": "minh", "finalScore": 97, "reasoning": "ở gần",
              "strengths": ["đúng giờ"], "concerns": null },
            { "caregiverId": "lan", "finalScore": 60 }
        ]),
    )
    .await;
    let app = app(repository(default_caregivers()), Some(&server));

    let (status, body) = send(
        &app,
        "POST",
        "/api/groq-matching/find-caregivers",
        Some(json!({ "packageId": "pkg-basic", "maxResults": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["totalCaregivers"], json!(2));
    assert_eq!(body["data"]["matches"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["matches"][0]["caregiverId"], json!("minh"));
    assert_eq!(body["data"]["matches"][0]["finalScore"], json!(97.0));
    assert_eq!(body["data"]["matches"][0]["rerank"]["concerns"], json!([]));
    assert_eq!(body["data"]["packageInfo"]["name"], json!("Gói cơ bản"));
    assert_eq!(body["data"]["packageInfo"]["price"], json!(350_000.0));
    assert_eq!(
        body["meta"]["aiProvider"],
        json!(format!("Groq ({DEFAULT_RERANK_MODEL})"))
    );
    assert_eq!(body["meta"]["fallback"], json!(false));
}

#[tokio::test]
async fn llm_failure_keeps_base_score_order() {
    let server = MockServer::start().await;
    fail_with(&server, 500).await;
    let app = app(repository(default_caregivers()), Some(&server));

    let (status, body) = send(
        &app,
        "POST",
        "/api/groq-matching/find-caregivers",
        Some(json!({ "packageId": "pkg-basic" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["fallback"], json!(true));
    assert_eq!(body["data"]["matches"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["matches"][0]["caregiverId"], json!("lan"));
}

#[tokio::test]
async fn package_id_is_validated_and_resolved() {
    let app = app(repository(default_caregivers()), None);

    let (status, body) = send(&app, "POST", "/api/groq-matching/find-caregivers", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Package ID is required"));

    let (status, body) = send(
        &app,
        "POST",
        "/api/groq-matching/compare",
        Some(json!({ "packageId": "pkg-missing" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("not_found"));
    assert_eq!(body["message"], json!("Package not found"));

    let empty = app_for_empty_pool();
    let (status, body) = send(
        &empty,
        "POST",
        "/api/groq-matching/find-caregivers",
        Some(json!({ "packageId": "pkg-basic" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("No caregivers available"));
}

fn app_for_empty_pool() -> Router {
    app(repository(Vec::new()), None)
}

#[tokio::test]
async fn comparison_reports_both_rankings() {
    let server = MockServer::start().await;
    answer_with(&server, json!([{ "caregiverId": "minh", "finalScore": 91 }])).await;
    let app = app(repository(default_caregivers()), Some(&server));

    let (status, body) = send(
        &app,
        "POST",
        "/api/groq-matching/compare",
        Some(json!({ "packageId": "pkg-basic" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Comparison complete"));
    assert_eq!(body["data"]["groq"]["matches"][0]["caregiverId"], json!("minh"));
    assert!(body["data"]["groq"]["responseTime"].is_u64());
    // only lan offers the package's service
    let rule_based = body["data"]["ruleBased"]["matches"].as_array().unwrap();
    assert_eq!(rule_based.len(), 1);
    assert_eq!(rule_based[0]["caregiverId"], json!("lan"));
    assert_eq!(body["data"]["ruleBased"]["provider"], json!("Rule-based Algorithm"));
}

#[tokio::test]
async fn connection_check_reports_oracle_state() {
    let unconfigured = app(repository(default_caregivers()), None);
    let (status, body) = send(&unconfigured, "GET", "/api/groq-matching/test", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], json!(false));

    let server = MockServer::start().await;
    answer_with(&server, json!([{ "caregiverId": "lan", "finalScore": 80 }])).await;
    let healthy = app(repository(default_caregivers()), Some(&server));
    let (status, body) = send(&healthy, "GET", "/api/groq-matching/test", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["caregiverId"], json!("lan"));
    assert_eq!(body["data"]["verdicts"], json!(1));
    assert!(body["data"]["timestamp"].is_string());

    let broken_server = MockServer::start().await;
    fail_with(&broken_server, 500).await;
    let broken = app(repository(default_caregivers()), Some(&broken_server));
    let (status, body) = send(&broken, "GET", "/api/groq-matching/test", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], json!("upstream_error"));
}
