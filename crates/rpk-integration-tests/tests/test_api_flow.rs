//! # API Flow with Role Tokens
//!
//! A bundle checked by the CLI is pushed through the HTTP API by a
//! compliance admin, while a viewer can read everything and change nothing.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use rpk_api::state::{AppConfig, AppState};
use rpk_cli::bundle::{parse_bundle, BundleFormat};
use rpk_core::checksum_of;
use rpk_registry::{BlockingEvaluator, InMemorySnapshotRepository, RegistryConfig, RulepackRegistry};

const SECRET: &str = "s3cret";
const ADMIN: &str = "compliance_admin:alice:s3cret";
const VIEWER: &str = "viewer:bob:s3cret";

fn app() -> Router {
    let registry = RulepackRegistry::new(
        Arc::new(InMemorySnapshotRepository::new()),
        Arc::new(BlockingEvaluator::new(|rules: &Value, input: &Value| {
            let rate = rules["vat_rate"].as_f64().unwrap_or(0.0);
            let net = input["net"].as_f64().unwrap_or(0.0);
            Ok(json!({"vat": net * rate}))
        })),
        RegistryConfig::default(),
    );
    let config = AppConfig {
        auth_token: Some(SECRET.into()),
        ..AppConfig::default()
    };
    rpk_api::app(AppState::with_registry(registry, config))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: &str,
) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"));
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

const IE_VAT: &str = r#"{
  "jurisdiction": "ie",
  "version": "3.0.0",
  "rule_data": {"vat_rate": 0.23},
  "regression_tests": [
    {"id": "standard", "input": {"net": 100}, "expected_output": {"vat": 23.0}}
  ]
}"#;

#[tokio::test]
async fn admin_releases_and_viewer_observes() {
    let app = app();
    let bundle = parse_bundle(IE_VAT, BundleFormat::Json).unwrap();
    let checksum = checksum_of(&bundle.rule_data).unwrap();
    let body: Value = serde_json::from_str(IE_VAT).unwrap();

    let (status, _) = call(&app, Method::POST, "/v1/rulepacks", Some(body.clone()), VIEWER).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, pack) = call(&app, Method::POST, "/v1/rulepacks", Some(body), ADMIN).await;
    assert_eq!(status, StatusCode::CREATED, "{pack}");
    assert_eq!(pack["checksum"], json!(checksum));
    assert_eq!(pack["jurisdiction_code"], "IE");
    assert_eq!(pack["created_by"], "alice");
    let id = pack["id"].as_str().unwrap().to_string();

    let (status, run) = call(
        &app,
        Method::POST,
        &format!("/v1/rulepacks/{id}/regression"),
        Some(json!({"run_type": "pre_activation", "wait": true})),
        ADMIN,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{run}");
    assert_eq!(run["status"], "passed");
    assert_eq!(run["executed_by"], "alice");

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/v1/rulepacks/{id}/activate"),
        Some(json!({})),
        VIEWER,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, active) = call(
        &app,
        Method::POST,
        &format!("/v1/rulepacks/{id}/activate"),
        Some(json!({})),
        ADMIN,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{active}");
    assert_eq!(active["approved_by"], "alice");

    let (status, live) = call(&app, Method::GET, "/v1/jurisdictions/IE/active", None, VIEWER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(live["id"], json!(id));

    let (status, latest) = call(
        &app,
        Method::GET,
        &format!("/v1/rulepacks/{id}/regression/latest"),
        None,
        VIEWER,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["id"], run["id"]);

    let (status, overview) = call(&app, Method::GET, "/v1/dashboard", None, VIEWER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["active_rulepacks"], 1);
    assert_eq!(overview["recent_pass_rate"], 1.0);

    let (status, _) = call(&app, Method::GET, "/v1/dashboard", None, "viewer:bob:wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
