use std::sync::Arc;

use axum::{Router, body::Body, http::Request, http::StatusCode};
use cm_common::db::InMemoryCandidateRepository;
use cm_common::matching::rerank::ORACLE_FAILED_REASONING;
use cm_common::matching::{MatchingConfig, MatchingEngine};
use cm_common::similarity::SimilarityEngine;
use cm_common::{CandidateProfile, Coordinates, EducationLevel, Gender, ProfileStatus, Skill};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const API_KEY: &str = "test-key";
const HCM: Coordinates = Coordinates {
    lat: 10.7769,
    lon: 106.7009,
};
const KM_PER_DEGREE_LAT: f64 = 111.19492664455874;

fn caregiver(id: &str, gender: Gender, km_north: f64) -> CandidateProfile {
    CandidateProfile {
        id: id.into(),
        name: format!("Caregiver {id}"),
        status: ProfileStatus::Approved,
        gender: Some(gender),
        education: Some(EducationLevel::UpperSecondary),
        years_of_experience: 4,
        coordinates: Some(Coordinates::new(HCM.lat + km_north / KM_PER_DEGREE_LAT, HCM.lon)),
        address: Some("Quận 1, TP.HCM".into()),
        skills: vec![Skill {
            name: "tắm rửa".into(),
            description: None,
        }],
        ..CandidateProfile::default()
    }
}

fn app() -> (Router, Arc<InMemoryCandidateRepository>) {
    let repo = Arc::new(InMemoryCandidateRepository::with_candidates([
        caregiver("near", Gender::Female, 1.0),
        caregiver("far", Gender::Female, 20.0),
        caregiver("male", Gender::Male, 0.5),
    ]));
    let engine = MatchingEngine::new(repo.clone(), MatchingConfig::default())
        .with_similarity(SimilarityEngine::uncached());
    let app = cm_api::create_router(cm_api::test_state_with_engine(API_KEY, engine));
    (app, repo)
}

async fn search(app: &Router, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/caregivers/search")
                .header("x-api-key", API_KEY)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn blank_address_is_rejected_before_any_lookup() {
    let (app, repo) = app();

    for body in [
        json!({}),
        json!({ "location": { "address": "  " } }),
        json!({ "location": { "address": "Quận 1" }, "maxDistance": 0 }),
    ] {
        let (status, response) = search(&app, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["success"], json!(false));
    }

    assert_eq!(repo.calls(), 0);
}

#[tokio::test]
async fn search_keeps_nearby_caregivers_of_the_preferred_gender() {
    let (app, _repo) = app();

    let (status, body) = search(
        &app,
        json!({
            "location": { "address": "Quận 1, TP.HCM", "coordinates": [HCM.lat, HCM.lon] },
            "skills": ["tắm rửa"],
            "preferredGender": "female"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(body["data"]["returned"], json!(1));

    let first = &body["data"]["matches"][0];
    assert_eq!(first["caregiverId"], json!("near"));
    assert_eq!(first["location"]["distanceText"], json!("1.0 km"));
    assert_eq!(first["match"]["reasoning"], json!(ORACLE_FAILED_REASONING));
    assert_eq!(body["data"]["suggestions"]["relaxDistance"], json!(true));
    assert_eq!(body["data"]["suggestions"]["removeFilters"], json!(["skills"]));
}

#[tokio::test]
async fn unknown_skill_returns_empty_result_with_suggestions() {
    let (app, _repo) = app();

    let (status, body) = search(
        &app,
        json!({
            "location": { "address": "Quận 1", "coordinates": [HCM.lat, HCM.lon] },
            "skills": ["vật lý trị liệu"]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], json!(0));
    assert_eq!(body["data"]["matches"], json!([]));
    assert!(body["data"]["suggestions"]["message"].is_string());
}
