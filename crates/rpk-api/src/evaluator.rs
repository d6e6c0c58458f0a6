//! # HTTP Tax Rule Evaluator
//!
//! Calls an external evaluation service for each regression vector:
//! `POST {EVALUATOR_URL}` with `{"rule_data": ..., "input": ...}`; the
//! response body is the actual output. A 4xx is the evaluator rejecting the
//! vector; transport errors and 5xx mean the evaluator is unavailable.

use std::sync::Arc;
use std::time::Duration;

use rpk_registry::{EvalFuture, EvaluationError, TaxRuleEvaluator};
use serde::Serialize;
use serde_json::Value;
use url::Url;

#[derive(Serialize)]
struct EvaluateRequest<'a> {
    rule_data: &'a Value,
    input: &'a Value,
}

/// [`TaxRuleEvaluator`] backed by a remote HTTP service.
#[derive(Debug, Clone)]
pub struct HttpEvaluator {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpEvaluator {
    /// Build a client for `endpoint`. `timeout` bounds the whole request;
    /// the registry applies its own per-vector bound on top.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint })
    }

    /// Endpoint this evaluator posts to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl TaxRuleEvaluator for HttpEvaluator {
    fn evaluate(&self, rule_data: Arc<Value>, input: Value) -> EvalFuture {
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        Box::pin(async move {
            let response = http
                .post(endpoint.clone())
                .json(&EvaluateRequest {
                    rule_data: &rule_data,
                    input: &input,
                })
                .send()
                .await
                .map_err(|e| EvaluationError::Unavailable(format!("{endpoint}: {e}")))?;

            let status = response.status();
            if status.is_client_error() {
                let detail = response.text().await.unwrap_or_default();
                return Err(EvaluationError::Failed(format!(
                    "evaluator rejected input ({status}): {detail}"
                )));
            }
            if !status.is_success() {
                return Err(EvaluationError::Unavailable(format!(
                    "evaluator returned {status}"
                )));
            }
            response
                .json::<Value>()
                .await
                .map_err(|e| EvaluationError::Unavailable(format!("malformed evaluator response: {e}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/evaluate")).unwrap()
    }

    fn doubling_service() -> Router {
        Router::new().route(
            "/evaluate",
            post(|Json(body): Json<Value>| async move {
                let rate = body["rule_data"]["rate"].as_f64().unwrap_or(0.0);
                let income = body["input"]["income"].as_f64().unwrap_or(0.0);
                if income < 0.0 {
                    return Err((StatusCode::UNPROCESSABLE_ENTITY, "negative income"));
                }
                Ok(Json(json!({"tax": income * rate})))
            }),
        )
    }

    #[tokio::test]
    async fn posts_rule_data_and_input() {
        let url = serve(doubling_service()).await;
        let evaluator = HttpEvaluator::new(url, Duration::from_secs(5)).unwrap();
        let out = evaluator
            .evaluate(Arc::new(json!({"rate": 0.2})), json!({"income": 1000}))
            .await
            .unwrap();
        assert_eq!(out, json!({"tax": 200.0}));
    }

    #[tokio::test]
    async fn client_error_is_a_failed_evaluation() {
        let url = serve(doubling_service()).await;
        let evaluator = HttpEvaluator::new(url, Duration::from_secs(5)).unwrap();
        let err = evaluator
            .evaluate(Arc::new(json!({"rate": 0.2})), json!({"income": -1}))
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Failed(msg) if msg.contains("negative income")));
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let url = serve(Router::new().route(
            "/evaluate",
            post(|| async { StatusCode::BAD_GATEWAY }),
        ))
        .await;
        let evaluator = HttpEvaluator::new(url, Duration::from_secs(5)).unwrap();
        let err = evaluator
            .evaluate(Arc::new(json!({})), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Unavailable(_)));
    }
}
