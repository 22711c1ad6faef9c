//! Integration tests for textsense-ta API endpoints
//!
//! Tests cover:
//! - Health endpoint (no auth required)
//! - Bearer-token authentication on /text routes
//! - Full analysis with per-category degradation
//! - Single-category analysis gated on readiness
//! - Model status and service info reporting

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Notify;
use tower::util::ServiceExt; // for `oneshot` method

use common::*;
use textsense_ta::registry::SlotStatus;
use textsense_ta::types::Category;

/// Test helper: sentiment and entities Ready, emotion fails to load,
/// intent Ready but broken at invocation time
async fn mixed_app() -> axum::Router {
    let registry = bootstrapped_registry(
        ScriptedLoader::default()
            .with(Category::Sentiment, Outcome::Ready(sentiment_pipeline()))
            .with(Category::Entities, Outcome::Ready(entity_pipeline()))
            .with(Category::Emotion, Outcome::Fail("model download refused"))
            .with(Category::Intent, Outcome::Ready(Arc::new(BrokenPipeline))),
    )
    .await;
    app_with(registry, token_authenticator())
}

/// Test helper: authenticated JSON request
fn authed(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", TEST_TOKEN));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health and Authentication
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let app = mixed_app().await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "textsense-ta");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_text_routes_require_bearer_token() {
    let app = mixed_app().await;

    let request = Request::builder()
        .uri("/text/models/status")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_wrong_token_rejected() {
    let app = mixed_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/text/analyze")
        .header(header::AUTHORIZATION, "Bearer not-the-token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"text": "hello"}).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_bearer_scheme_rejected() {
    let app = mixed_app().await;

    let request = Request::builder()
        .uri("/text/service/info")
        .header(header::AUTHORIZATION, format!("Basic {}", TEST_TOKEN))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_disabled_auth_accepts_requests_without_header() {
    let registry = bootstrapped_registry(
        ScriptedLoader::default().with(Category::Sentiment, Outcome::Ready(sentiment_pipeline())),
    )
    .await;
    let app = app_with(registry, open_authenticator());

    let request = Request::builder()
        .uri("/text/models/status")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// POST /text/analyze
// =============================================================================

#[tokio::test]
async fn test_analyze_degrades_per_category() {
    let app = mixed_app().await;

    let response = app
        .oneshot(authed(
            "POST",
            "/text/analyze",
            Some(json!({"text": "Acme ships great products"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["text"], "Acme ships great products");
    assert!(body["timestamp"].is_string());

    let analysis = body["analysis"].as_object().unwrap();
    assert_eq!(analysis.len(), 4);

    assert_eq!(analysis["sentiment"], json!({"label": "POSITIVE", "score": 0.95}));
    assert_eq!(
        analysis["entities"],
        json!([{"entity": "ORG", "word": "Acme", "start": 0, "end": 4, "score": 1.0}])
    );
    assert_eq!(analysis["emotion"]["reason"], "not_loaded");
    assert!(analysis["emotion"]["message"]
        .as_str()
        .unwrap()
        .contains("model download refused"));
    assert_eq!(analysis["intent"]["reason"], "execution_failed");
}

#[tokio::test]
async fn test_analyze_restricted_to_requested_categories() {
    let app = mixed_app().await;

    let response = app
        .oneshot(authed(
            "POST",
            "/text/analyze",
            Some(json!({"text": "short", "categories": ["sentiment", "ner"]})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let keys: Vec<&String> = body["analysis"].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["entities", "sentiment"]);
}

#[tokio::test]
async fn test_analyze_rejects_empty_and_oversized_text() {
    let app = mixed_app().await;
    let too_long = "a".repeat(5001);

    for text in ["", "   ", too_long.as_str()] {
        let response = app
            .clone()
            .oneshot(authed("POST", "/text/analyze", Some(json!({ "text": text }))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "text len {}", text.len());
        let body = extract_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }
}

#[tokio::test]
async fn test_analyze_accepts_text_at_limit() {
    let app = mixed_app().await;

    let response = app
        .oneshot(authed(
            "POST",
            "/text/analyze",
            Some(json!({"text": "a".repeat(5000), "categories": ["sentiment"]})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_analyze_rejects_malformed_body() {
    let app = mixed_app().await;

    for body in [json!({"txt": "typo"}), json!({"text": "ok", "extra": true}), json!({"text": 42})] {
        let response = app
            .clone()
            .oneshot(authed("POST", "/text/analyze", Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_analyze_unavailable_when_nothing_ready() {
    let registry = bootstrapped_registry(ScriptedLoader::default()).await;
    let app = app_with(registry, token_authenticator());

    let response = app
        .oneshot(authed("POST", "/text/analyze", Some(json!({"text": "hello"}))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
}

// =============================================================================
// POST /text/analyze/:category
// =============================================================================

#[tokio::test]
async fn test_single_category_success() {
    let app = mixed_app().await;

    let response = app
        .oneshot(authed(
            "POST",
            "/text/analyze/sentiment",
            Some(json!({"text": "great"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body, json!({"label": "POSITIVE", "score": 0.95}));
}

#[tokio::test]
async fn test_single_category_failed_slot_is_unavailable() {
    let app = mixed_app().await;

    let response = app
        .oneshot(authed("POST", "/text/analyze/emotion", Some(json!({"text": "hi"}))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_single_category_execution_error_is_500() {
    let app = mixed_app().await;

    let response = app
        .oneshot(authed("POST", "/text/analyze/intent", Some(json!({"text": "hi"}))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "EXECUTION_FAILED");
}

#[tokio::test]
async fn test_unknown_category_is_404() {
    let app = mixed_app().await;

    let response = app
        .oneshot(authed("POST", "/text/analyze/toxicity", Some(json!({"text": "hi"}))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_requests_rejected_while_bootstrap_in_progress() {
    let registry = Arc::new(
        textsense_ta::registry::ModelRegistry::new(
            Category::ALL
                .iter()
                .map(|&c| textsense_ta::types::PipelineSpec::new(c, format!("test/{}", c)))
                .collect(),
        )
        .unwrap(),
    );
    let release = Arc::new(Notify::new());
    let loader = ScriptedLoader::default()
        .with(Category::Sentiment, Outcome::Ready(sentiment_pipeline()))
        .with(Category::Entities, Outcome::Held(release.clone(), entity_pipeline()))
        .with(Category::Emotion, Outcome::Fail("no"))
        .with(Category::Intent, Outcome::Fail("no"));
    let bootstrap =
        textsense_ta::bootstrap::Bootstrapper::new(Arc::clone(&registry), Arc::new(loader)).spawn();

    // Wait until sentiment is Ready while entities is still held
    let entities_loading = || {
        registry
            .get(Category::Entities)
            .map(|slot| slot.state.status() == SlotStatus::Loading)
            .unwrap_or(false)
    };
    while registry.ready_pipeline(Category::Sentiment).is_none() || !entities_loading() {
        tokio::task::yield_now().await;
    }
    let app = app_with(Arc::clone(&registry), token_authenticator());

    let response = app
        .clone()
        .oneshot(authed("POST", "/text/analyze/sentiment", Some(json!({"text": "hi"}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"]["message"].as_str().unwrap().contains("still loading"));

    let status = app
        .clone()
        .oneshot(authed("GET", "/text/models/status", None))
        .await
        .unwrap();
    let status = extract_json(status.into_body()).await;
    assert_eq!(status["models_loaded"], false);
    assert_eq!(status["models"]["entities"]["state"], "loading");
    assert!(status["loaded_at"].is_null());

    release.notify_one();
    let report = bootstrap.await.unwrap();
    assert_eq!(report.ready.len(), 2);

    let response = app
        .oneshot(authed("POST", "/text/analyze/sentiment", Some(json!({"text": "hi"}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Status and Info
// =============================================================================

#[tokio::test]
async fn test_models_status_reports_every_slot() {
    let app = mixed_app().await;

    let response = app
        .oneshot(authed("GET", "/text/models/status", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["models_loaded"], true);
    assert!(body["loaded_at"].is_string());
    assert_eq!(body["models"]["sentiment"]["state"], "ready");
    assert_eq!(body["models"]["sentiment"]["model"], "test/sentiment");
    assert_eq!(body["models"]["sentiment"]["task"], "sentiment-analysis");
    assert!(body["models"]["sentiment"].get("error").is_none());
    assert_eq!(body["models"]["emotion"]["state"], "failed");
    assert!(body["models"]["emotion"]["error"]
        .as_str()
        .unwrap()
        .contains("model download refused"));
}

#[tokio::test]
async fn test_service_info_lists_available_models() {
    let app = mixed_app().await;

    let response = app
        .oneshot(authed("GET", "/text/service/info", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["module"], "textsense-ta");
    assert_eq!(body["available_models"], json!(["sentiment", "entities", "intent"]));
    assert_eq!(body["unavailable_models"], json!(["emotion"]));
    assert_eq!(body["model_details"]["entities"], "test/entities");
    assert_eq!(body["max_text_length"], 5000);
    assert_eq!(body["request_timeout_ms"], 30000);
    assert_eq!(body["status"]["models_loaded"], true);
}
