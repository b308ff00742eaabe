//! Handler-level tests over the axum router.

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use nutricache::{app, config::AppConfig, state::AppState};

async fn test_app() -> Router {
    let pool = common::test_pool().await;
    let config = Arc::new(AppConfig {
        database_url: String::new(),
        db_max_connections: 5,
    });
    app::build_app(AppState::from_parts(pool, config))
}

async fn send(app: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
#[ignore = "requires database"]
async fn health_is_ok() {
    let app = test_app().await;
    let (status, _) = send(&app, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires database"]
async fn ingest_then_search_roundtrip() {
    let app = test_app().await;

    let body = json!({"common": [common::common_payload(77, "Chicken Breast", 165.0)]});
    let (status, resp) = send(&app, "POST", "/api/v1/foods/common", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["upserted"], 1);

    let (status, hits) = send(&app, "GET", "/api/v1/foods/common/search?q=chick", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits[0]["tag_id"], 77);
    assert_eq!(hits[0]["tag_name"], "Chicken Breast");
}

#[tokio::test]
#[ignore = "requires database"]
async fn common_item_without_tag_id_is_rejected() {
    let app = test_app().await;

    let body = json!({"common": [{"tag_name": "eggs"}]});
    let (status, resp) = send(&app, "POST", "/api/v1/foods/common", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(resp["error"].as_str().unwrap().contains("tag_id"));
}

#[tokio::test]
#[ignore = "requires database"]
async fn nutrient_ingest_returns_stable_ids() {
    let app = test_app().await;

    let body = json!({"foods": [common::nutrient_payload("espresso")]});
    let (status, first) = send(&app, "POST", "/api/v1/foods/nutrients", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = send(&app, "POST", "/api/v1/foods/nutrients", Some(body)).await;
    assert_eq!(first["ids"], second["ids"]);

    let id = first["ids"][0].as_i64().unwrap();
    let (status, details) =
        send(&app, "GET", &format!("/api/v1/foods/nutrients/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["food_name"], "espresso");
    assert_eq!(details["alt_measures"].as_array().unwrap().len(), 3);
}

#[tokio::test]
#[ignore = "requires database"]
async fn unknown_nutrient_food_is_404() {
    let app = test_app().await;

    let (status, _) = send(&app, "GET", "/api/v1/foods/nutrients/999999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/api/v1/foods/nutrients/999999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires database"]
async fn linking_unknown_parent_is_a_client_error() {
    let app = test_app().await;

    let body = json!({"tag_id": 123456, "nutrient_food_id": 654321});
    let (status, _) = send(&app, "POST", "/api/v1/foods/links", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires database"]
async fn nutrient_search_endpoint_returns_ranked_hits() {
    let app = test_app().await;

    let body = json!({"foods": [common::nutrient_payload("Greek Yogurt")]});
    let (status, _) = send(&app, "POST", "/api/v1/foods/nutrients", Some(body)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, hits) = send(&app, "GET", "/api/v1/foods/nutrients/search?q=yogu", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits[0]["food_name"], "Greek Yogurt");
    assert!(hits[0]["rank"].as_f64().unwrap() > 0.0);
}
