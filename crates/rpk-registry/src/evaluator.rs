//! # Tax Rule Evaluator Contract
//!
//! The registry never interprets rule data. Regression vectors are checked
//! by handing `(rule_data, input)` to a [`TaxRuleEvaluator`] and comparing
//! what comes back with the expected output.
//!
//! The trait returns a boxed `Send` future so that awaitable evaluators
//! (an HTTP service) and synchronous ones ([`BlockingEvaluator`], run on the
//! blocking pool) fit the same seam.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// Failure of a single evaluation. Recorded against one test vector.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvaluationError {
    /// The evaluator rejected or could not process the input.
    #[error("evaluation failed: {0}")]
    Failed(String),

    /// The evaluator could not be reached or returned garbage.
    #[error("evaluator unavailable: {0}")]
    Unavailable(String),
}

/// Future returned by [`TaxRuleEvaluator::evaluate`].
pub type EvalFuture = Pin<Box<dyn Future<Output = Result<Value, EvaluationError>> + Send>>;

/// External collaborator that executes rule data against one input.
pub trait TaxRuleEvaluator: Send + Sync {
    /// Evaluate `rule_data` against `input`.
    fn evaluate(&self, rule_data: Arc<Value>, input: Value) -> EvalFuture;
}

/// Adapts a synchronous evaluation function onto tokio's blocking pool.
pub struct BlockingEvaluator<F> {
    func: Arc<F>,
}

impl<F> BlockingEvaluator<F>
where
    F: Fn(&Value, &Value) -> Result<Value, EvaluationError> + Send + Sync + 'static,
{
    /// Wrap `func`.
    pub fn new(func: F) -> Self {
        Self {
            func: Arc::new(func),
        }
    }
}

impl<F> TaxRuleEvaluator for BlockingEvaluator<F>
where
    F: Fn(&Value, &Value) -> Result<Value, EvaluationError> + Send + Sync + 'static,
{
    fn evaluate(&self, rule_data: Arc<Value>, input: Value) -> EvalFuture {
        let func = Arc::clone(&self.func);
        Box::pin(async move {
            tokio::task::spawn_blocking(move || func(&rule_data, &input))
                .await
                .map_err(|e| EvaluationError::Failed(format!("evaluator task aborted: {e}")))?
        })
    }
}

/// Evaluator used when no evaluator endpoint is configured. Every vector fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredEvaluator;

impl TaxRuleEvaluator for UnconfiguredEvaluator {
    fn evaluate(&self, _rule_data: Arc<Value>, _input: Value) -> EvalFuture {
        Box::pin(async {
            Err(EvaluationError::Unavailable(
                "no tax rule evaluator configured".to_string(),
            ))
        })
    }
}

/// Deep structural equality in which numbers compare by value (`1 == 1.0`).
pub fn outputs_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (a.as_u64(), b.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            },
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| outputs_match(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, x)| b.get(k).is_some_and(|y| outputs_match(x, y)))
        }
        (a, b) => a == b,
    }
}
