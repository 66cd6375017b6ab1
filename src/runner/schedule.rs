//! Filters, orders, and drives tests sequentially or with bounded
//! parallelism.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::warn;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::session::ToolInvoker;
use crate::{
    EngineDefaults, ExpressionEvaluator, RateLimit, RunObserver, ScheduleOptions, TestDefinition,
    TestResult,
};

use super::execution::TestExecutor;
use super::result::{error_result, skipped_result};

/// Schedules a list of test definitions against one tool invoker.
///
/// The returned results always match the input list in length and order,
/// with skipped entries interleaved at their original positions — never
/// completion order.
///
/// Sequential runs (`parallelism <= 1`) share a single executor and variable
/// store, so extractions feed forward into later tests. Parallel runs give
/// every test its own executor and store seeded only from the run's initial
/// variables: cross-test extraction sharing is deliberately unavailable when
/// tests race, trading threading for isolation.
pub struct TestScheduler {
    defaults: EngineDefaults,
    rate_limiter: Option<Arc<dyn RateLimit>>,
    expression: Option<ExpressionEvaluator>,
    observer: Option<Arc<dyn RunObserver>>,
}

impl TestScheduler {
    /// Creates a scheduler with no optional collaborators.
    pub fn new(defaults: EngineDefaults) -> Self {
        Self {
            defaults,
            rate_limiter: None,
            expression: None,
            observer: None,
        }
    }

    /// Routes every invocation through a shared rate limiter.
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimit>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Installs the evaluator backing `expression` assertions.
    pub fn with_expression_evaluator(mut self, evaluator: ExpressionEvaluator) -> Self {
        self.expression = Some(evaluator);
        self
    }

    /// Registers a per-test progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Runs `tests`, returning one result per definition in input order.
    /// Never lets a single test's failure prevent the others from running.
    pub async fn schedule(
        &self,
        tests: &[TestDefinition],
        invoker: Arc<dyn ToolInvoker>,
        options: &ScheduleOptions,
    ) -> Vec<TestResult> {
        if options.parallelism > 1 {
            self.schedule_parallel(tests, invoker, options).await
        } else {
            self.schedule_sequential(tests, invoker, options).await
        }
    }

    async fn schedule_sequential(
        &self,
        tests: &[TestDefinition],
        invoker: Arc<dyn ToolInvoker>,
        options: &ScheduleOptions,
    ) -> Vec<TestResult> {
        let filter = normalize_tags(&options.tags);
        let mut executor = self.build_executor(options);
        let mut results = Vec::with_capacity(tests.len());
        for test in tests {
            if let Some(observer) = &self.observer {
                observer.on_test_started(test);
            }
            let result = if matches_filter(test, &filter) {
                executor.execute(test, invoker.as_ref()).await
            } else {
                skipped_result(test)
            };
            if let Some(observer) = &self.observer {
                observer.on_test_finished(&result);
            }
            results.push(result);
        }
        results
    }

    async fn schedule_parallel(
        &self,
        tests: &[TestDefinition],
        invoker: Arc<dyn ToolInvoker>,
        options: &ScheduleOptions,
    ) -> Vec<TestResult> {
        let filter = normalize_tags(&options.tags);
        // Counting admission gate; tokio's semaphore serves waiters in
        // arrival order.
        let gate = Arc::new(Semaphore::new(options.parallelism));

        enum Slot {
            Done(TestResult),
            Running(JoinHandle<TestResult>),
        }

        let mut slots = Vec::with_capacity(tests.len());
        for test in tests {
            if !matches_filter(test, &filter) {
                if let Some(observer) = &self.observer {
                    observer.on_test_started(test);
                }
                let result = skipped_result(test);
                if let Some(observer) = &self.observer {
                    observer.on_test_finished(&result);
                }
                slots.push(Slot::Done(result));
                continue;
            }

            let gate = Arc::clone(&gate);
            let invoker = Arc::clone(&invoker);
            let observer = self.observer.clone();
            let defaults = self.defaults.clone();
            let rate_limiter = self.rate_limiter.clone();
            let expression = self.expression.clone();
            let seed = options.initial_variables.clone();
            let test = test.clone();
            slots.push(Slot::Running(tokio::spawn(async move {
                let _permit = match gate.acquire_owned().await {
                    Ok(permit) => permit,
                    // The gate is never closed while tasks are in flight.
                    Err(_) => return error_result(&test, "admission gate closed".to_string(), 0),
                };
                if let Some(observer) = &observer {
                    observer.on_test_started(&test);
                }
                // Per-task executor: an isolated store seeded from the run's
                // initial variables only.
                let mut executor = TestExecutor::new(defaults).with_variables(seed);
                if let Some(limiter) = rate_limiter {
                    executor = executor.with_rate_limiter(limiter);
                }
                if let Some(evaluator) = expression {
                    executor = executor.with_expression_evaluator(evaluator);
                }
                let result = executor.execute(&test, invoker.as_ref()).await;
                if let Some(observer) = &observer {
                    observer.on_test_finished(&result);
                }
                result
            })));
        }

        let mut results = Vec::with_capacity(tests.len());
        for (test, slot) in tests.iter().zip(slots) {
            let result = match slot {
                Slot::Done(result) => result,
                Slot::Running(handle) => match handle.await {
                    Ok(result) => result,
                    Err(join_error) => {
                        warn!("test task for '{}' aborted: {join_error}", test.name);
                        let result =
                            error_result(test, format!("test task aborted: {join_error}"), 0);
                        if let Some(observer) = &self.observer {
                            observer.on_test_finished(&result);
                        }
                        result
                    }
                },
            };
            results.push(result);
        }
        results
    }

    fn build_executor(&self, options: &ScheduleOptions) -> TestExecutor {
        let mut executor = TestExecutor::new(self.defaults.clone())
            .with_variables(options.initial_variables.clone());
        if let Some(limiter) = &self.rate_limiter {
            executor = executor.with_rate_limiter(Arc::clone(limiter));
        }
        if let Some(evaluator) = &self.expression {
            executor = executor.with_expression_evaluator(Arc::clone(evaluator));
        }
        executor
    }
}

/// Strips an optional `@` prefix and lowercases, so `@Smoke` and `smoke`
/// compare equal.
fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('@').to_ascii_lowercase()
}

fn normalize_tags(tags: &[String]) -> BTreeSet<String> {
    tags.iter().map(|tag| normalize_tag(tag)).collect()
}

fn matches_filter(test: &TestDefinition, filter: &BTreeSet<String>) -> bool {
    if filter.is_empty() {
        return true;
    }
    test.tags
        .iter()
        .any(|tag| filter.contains(&normalize_tag(tag)))
}
