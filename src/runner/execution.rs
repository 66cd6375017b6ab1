//! Runs one test definition to completion: template resolution, invocation,
//! timeout/retry handling, assertion evaluation, and extraction.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value as JsonValue;
use tokio::time::{sleep, timeout, Instant};

use crate::query::query_path;
use crate::response::normalize_response;
use crate::session::ToolInvoker;
use crate::template::{resolve_templates, VariableStore};
use crate::{
    AssertionDefinition, AssertionKind, AssertionResult, EngineDefaults, ExpressionEvaluator,
    RateLimit, TestDefinition, TestResult,
};

use super::assertions::{evaluate_assertion, expectation_to_assertion, AssertionContext};
use super::result::{completed_result, error_result};

/// Executes test definitions against a connected tool invoker.
///
/// Each executor owns one [`VariableStore`]; extractions from earlier tests
/// feed `{{name}}` substitution in later inputs for as long as the executor
/// lives. The scheduler decides whether a store spans a whole run or a single
/// test.
pub struct TestExecutor {
    defaults: EngineDefaults,
    variables: VariableStore,
    rate_limiter: Option<Arc<dyn RateLimit>>,
    expression: Option<ExpressionEvaluator>,
}

/// Outcome of one completed (non-thrown) attempt.
struct AttemptReport {
    assertions: Vec<AssertionResult>,
    variables: Option<BTreeMap<String, JsonValue>>,
}

impl TestExecutor {
    /// Creates an executor with an empty variable store.
    pub fn new(defaults: EngineDefaults) -> Self {
        Self {
            defaults,
            variables: VariableStore::new(),
            rate_limiter: None,
            expression: None,
        }
    }

    /// Seeds the variable store.
    pub fn with_variables(mut self, variables: BTreeMap<String, JsonValue>) -> Self {
        self.variables = VariableStore::from_map(variables);
        self
    }

    /// Routes invocations through a shared rate limiter.
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimit>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Installs the evaluator backing `expression` assertions.
    pub fn with_expression_evaluator(mut self, evaluator: ExpressionEvaluator) -> Self {
        self.expression = Some(evaluator);
        self
    }

    /// Snapshot of the current variable store, for callers that need to
    /// inspect or persist captured values after a run.
    pub fn variables(&self) -> BTreeMap<String, JsonValue> {
        self.variables.snapshot()
    }

    /// Runs `test` to a terminal [`TestResult`]; never panics or escapes an
    /// error.
    ///
    /// Only thrown invocation failures and timeouts consume the retry
    /// budget; assertion failures are results, not system failures, and are
    /// never retried. A timeout stops waiting on the invocation — it cannot
    /// abort the call on the server.
    pub async fn execute(&mut self, test: &TestDefinition, invoker: &dyn ToolInvoker) -> TestResult {
        let started = Instant::now();
        if test.tool.trim().is_empty() {
            return error_result(
                test,
                format!("test '{}' has no resolvable tool name", test.name),
                0,
            );
        }

        let timeout_ms = test.timeout_ms.unwrap_or(self.defaults.timeout_ms);
        let retries = test.retries.unwrap_or(self.defaults.retries);
        let mut last_error = String::new();

        for attempt in 0..=retries {
            if attempt > 0 {
                let delay = self.defaults.backoff.delay_ms(attempt - 1);
                debug!(
                    "retrying test '{}' (attempt {}/{}) after {delay}ms: {last_error}",
                    test.name,
                    attempt + 1,
                    retries + 1,
                );
                sleep(Duration::from_millis(delay)).await;
            }
            match timeout(
                Duration::from_millis(timeout_ms),
                self.run_attempt(test, invoker),
            )
            .await
            {
                Ok(Ok(report)) => {
                    return completed_result(
                        test,
                        report.assertions,
                        report.variables,
                        started.elapsed().as_millis() as u64,
                    );
                }
                Ok(Err(message)) => last_error = message,
                Err(_) => {
                    last_error = format!("test '{}' timed out after {timeout_ms}ms", test.name);
                }
            }
        }

        error_result(test, last_error, started.elapsed().as_millis() as u64)
    }

    /// One attempt: resolve input, invoke, then assert and extract.
    /// `Err` means a thrown failure eligible for retry.
    async fn run_attempt(
        &mut self,
        test: &TestDefinition,
        invoker: &dyn ToolInvoker,
    ) -> Result<AttemptReport, String> {
        let resolved_input = resolve_templates(&test.input, &self.variables);
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }

        let invoke_started = Instant::now();
        let outcome = invoker.call_tool(&test.tool, resolved_input).await;
        let elapsed_ms = invoke_started.elapsed().as_millis() as u64;

        let raw = match outcome {
            Ok(raw) => raw,
            Err(error) if test.expect_error => {
                return Ok(AttemptReport {
                    assertions: vec![AssertionResult::new(
                        AssertionKind::ExpectError,
                        true,
                        format!("tool invocation failed as expected: {error}"),
                    )],
                    variables: None,
                });
            }
            Err(error) => {
                return Err(format!("tool '{}' invocation failed: {error}", test.tool));
            }
        };

        if test.expect_error {
            // A clean success despite expect_error is a verdict, not a
            // system failure, so it must not consume the retry budget.
            let assertion = if raw.is_error.unwrap_or(false) {
                AssertionResult::new(
                    AssertionKind::ExpectError,
                    true,
                    "tool reported an error response as expected",
                )
            } else {
                AssertionResult::new(
                    AssertionKind::ExpectError,
                    false,
                    format!("expected an error response, but tool '{}' succeeded", test.tool),
                )
            };
            return Ok(AttemptReport {
                assertions: vec![assertion],
                variables: None,
            });
        }

        let response = normalize_response(&raw);
        let context = AssertionContext {
            response: &response,
            raw: &raw,
            elapsed_ms,
            expression: self.expression.as_ref(),
        };

        let mut assertions = Vec::new();
        for definition in &test.assertions {
            assertions.push(evaluate_assertion(definition, &context));
        }
        for expectation in &test.expect {
            assertions.push(evaluate_assertion(
                &expectation_to_assertion(expectation),
                &context,
            ));
        }
        if assertions.is_empty() {
            // No declared checks: the implicit contract is "got any
            // structured response".
            assertions.push(evaluate_assertion(&AssertionDefinition::Schema, &context));
        }

        let variables = if test.extract.is_empty() {
            None
        } else {
            let mut extracted = BTreeMap::new();
            for extraction in &test.extract {
                let value = match query_path(&response, &extraction.path) {
                    Ok(Some(value)) => value.clone(),
                    Ok(None) => {
                        warn!(
                            "extraction '{}' in test '{}': path '{}' did not resolve, storing null",
                            extraction.name, test.name, extraction.path
                        );
                        JsonValue::Null
                    }
                    Err(error) => {
                        warn!(
                            "extraction '{}' in test '{}': {error}, storing null",
                            extraction.name, test.name
                        );
                        JsonValue::Null
                    }
                };
                debug!(
                    "test '{}' extracted '{}' from '{}'",
                    test.name, extraction.name, extraction.path
                );
                self.variables.set(extraction.name.clone(), value.clone());
                extracted.insert(extraction.name.clone(), value);
            }
            Some(extracted)
        };

        Ok(AttemptReport {
            assertions,
            variables,
        })
    }
}
