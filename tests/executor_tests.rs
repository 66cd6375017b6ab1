//! End-to-end executor behavior against a scripted invoker.

mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use toolcase::{
    AssertionDefinition, AssertionKind, BackoffConfig, EngineDefaults, Expectation,
    ExtractionDefinition, InvokeError, IntervalRateLimiter, LengthOperator, TestDefinition,
    TestExecutor, TestStatus,
};

use support::{json_text_result, ScriptedInvoker};

fn fast_defaults() -> EngineDefaults {
    EngineDefaults::default()
        .with_timeout_ms(2_000)
        .with_backoff(BackoffConfig::new(1, 1.0, 1))
}

#[tokio::test]
async fn passing_and_failing_assertions_set_the_status() {
    let invoker = ScriptedInvoker::new().script(
        "search",
        vec![
            Ok(json_text_result(json!({"items": [1, 2, 3], "status": "ok"}))),
            Ok(json_text_result(json!({"items": [], "status": "empty"}))),
        ],
    );
    let mut test = TestDefinition::new("search returns items", "search");
    test.assertions = vec![
        AssertionDefinition::Equals {
            path: "$.status".into(),
            value: json!("ok"),
        },
        AssertionDefinition::Length {
            path: "$.items".into(),
            value: 2,
            operator: LengthOperator::Gte,
        },
    ];

    let mut executor = TestExecutor::new(fast_defaults());
    let first = executor.execute(&test, &invoker).await;
    assert_eq!(first.status, TestStatus::Passed);
    assert_eq!(first.assertions.len(), 2);
    assert!(first.assertions.iter().all(|assertion| assertion.passed));

    let second = executor.execute(&test, &invoker).await;
    assert_eq!(second.status, TestStatus::Failed);
    assert!(!second.assertions[0].passed);
    assert!(second.assertions[0].message.contains("expected"));
}

#[tokio::test]
async fn retry_budget_counts_invocations_exactly() {
    let invoker = ScriptedInvoker::new().script(
        "flaky",
        vec![
            Err(InvokeError::new("reset")),
            Err(InvokeError::new("reset")),
            Err(InvokeError::new("reset")),
        ],
    );
    let mut test = TestDefinition::new("always down", "flaky");
    test.retries = Some(2);
    let mut executor = TestExecutor::new(fast_defaults());
    let result = executor.execute(&test, &invoker).await;
    assert_eq!(result.status, TestStatus::Error);
    assert_eq!(invoker.call_count(), 3);

    let invoker = ScriptedInvoker::new().script(
        "flaky",
        vec![
            Err(InvokeError::new("reset")),
            Ok(json_text_result(json!({"ok": true}))),
        ],
    );
    let mut executor = TestExecutor::new(fast_defaults());
    let result = executor.execute(&test, &invoker).await;
    assert_eq!(result.status, TestStatus::Passed);
    assert_eq!(invoker.call_count(), 2);
}

#[tokio::test]
async fn shorthand_expectations_behave_like_assertions() {
    let invoker = ScriptedInvoker::new().script(
        "profile",
        vec![Ok(json_text_result(
            json!({"user": {"name": "ada", "roles": ["admin", "dev"]}}),
        ))],
    );
    let mut test = TestDefinition::new("profile shape", "profile");
    test.expect = vec![
        Expectation::Exists {
            path: Some("$.user.name".into()),
        },
        Expectation::Matches {
            path: Some("$.user.name".into()),
            pattern: "^a".into(),
        },
        Expectation::Contains {
            path: Some("$.user.roles".into()),
            value: json!("admin"),
        },
        Expectation::Equals {
            path: Some("$.user.roles[1]".into()),
            value: json!("dev"),
        },
    ];
    let mut executor = TestExecutor::new(fast_defaults());
    let result = executor.execute(&test, &invoker).await;
    assert_eq!(result.status, TestStatus::Passed);
    assert_eq!(result.assertions.len(), 4);
}

#[tokio::test]
async fn plain_text_responses_stay_queryable() {
    let invoker = ScriptedInvoker::new().script(
        "banner",
        vec![Ok(rmcp::model::CallToolResult::success(vec![
            rmcp::model::Content::text("service ready"),
        ]))],
    );
    let mut test = TestDefinition::new("banner text", "banner");
    test.assertions = vec![
        AssertionDefinition::Contains {
            path: "$.text".into(),
            value: json!("ready"),
        },
        AssertionDefinition::Equals {
            path: "$.content".into(),
            value: json!("service ready"),
        },
    ];
    let mut executor = TestExecutor::new(fast_defaults());
    let result = executor.execute(&test, &invoker).await;
    assert_eq!(result.status, TestStatus::Passed);
}

#[tokio::test]
async fn unresolved_tokens_are_sent_literally() {
    let invoker = ScriptedInvoker::new();
    let mut test = TestDefinition::new("uses unknown variable", "echo");
    test.input = json!({"ref": "{{never_set}}"});
    let mut executor = TestExecutor::new(fast_defaults());
    let result = executor.execute(&test, &invoker).await;
    assert_eq!(result.status, TestStatus::Passed);
    assert_eq!(invoker.calls()[0].1, json!({"ref": "{{never_set}}"}));
}

#[tokio::test]
async fn extraction_then_substitution_across_executes() {
    let invoker = ScriptedInvoker::new().script(
        "create_user",
        vec![Ok(json_text_result(json!({"user": {"id": "u-77"}})))],
    );
    let mut create = TestDefinition::new("create", "create_user");
    create.extract = vec![ExtractionDefinition {
        name: "user_id".into(),
        path: "$.user.id".into(),
    }];
    let mut fetch = TestDefinition::new("fetch", "get_user");
    fetch.input = json!({"id": "{{user_id}}"});

    let mut executor = TestExecutor::new(fast_defaults());
    let created = executor.execute(&create, &invoker).await;
    assert_eq!(created.status, TestStatus::Passed);
    assert_eq!(created.variables.expect("variables")["user_id"], json!("u-77"));

    let fetched = executor.execute(&fetch, &invoker).await;
    assert_eq!(fetched.status, TestStatus::Passed);
    assert_eq!(invoker.calls()[1].1, json!({"id": "u-77"}));
    assert_eq!(executor.variables()["user_id"], json!("u-77"));
}

#[tokio::test]
async fn expect_error_distinguishes_thrown_from_reported() {
    let invoker = ScriptedInvoker::new()
        .script("locked", vec![Err(InvokeError::new("permission denied"))])
        .script(
            "softfail",
            vec![Ok(rmcp::model::CallToolResult::error(vec![
                rmcp::model::Content::text("bad input"),
            ]))],
        )
        .script("open", vec![Ok(json_text_result(json!({"ok": true})))]);

    let mut thrown = TestDefinition::new("thrown", "locked");
    thrown.expect_error = true;
    let mut reported = TestDefinition::new("reported", "softfail");
    reported.expect_error = true;
    let mut clean = TestDefinition::new("clean", "open");
    clean.expect_error = true;

    let mut executor = TestExecutor::new(fast_defaults());
    let thrown_result = executor.execute(&thrown, &invoker).await;
    assert_eq!(thrown_result.status, TestStatus::Passed);
    assert_eq!(thrown_result.assertions[0].kind, AssertionKind::ExpectError);

    let reported_result = executor.execute(&reported, &invoker).await;
    assert_eq!(reported_result.status, TestStatus::Passed);

    let clean_result = executor.execute(&clean, &invoker).await;
    assert_eq!(clean_result.status, TestStatus::Failed);
    assert_eq!(clean_result.assertions.len(), 1);
    assert!(!clean_result.assertions[0].passed);
}

#[tokio::test]
async fn timeout_message_names_test_and_limit() {
    let invoker = ScriptedInvoker::new().with_delay("slow", Duration::from_secs(30));
    let mut test = TestDefinition::new("slow lookup", "slow");
    test.timeout_ms = Some(50);
    let mut executor = TestExecutor::new(fast_defaults());
    let result = executor.execute(&test, &invoker).await;
    assert_eq!(result.status, TestStatus::Error);
    let message = result.error.expect("error message");
    assert!(message.contains("slow lookup"));
    assert!(message.contains("50ms"));
}

#[tokio::test]
async fn latency_assertion_measures_the_invocation() {
    let invoker = ScriptedInvoker::new().with_delay("sluggish", Duration::from_millis(60));
    let mut test = TestDefinition::new("latency budget", "sluggish");
    test.assertions = vec![AssertionDefinition::Latency { max_ms: Some(20) }];
    let mut executor = TestExecutor::new(fast_defaults());
    let result = executor.execute(&test, &invoker).await;
    assert_eq!(result.status, TestStatus::Failed);
    assert!(result.assertions[0].message.contains("20ms"));
}

#[tokio::test]
async fn rate_limited_invocations_still_complete() {
    let limiter = Arc::new(IntervalRateLimiter::new(Duration::from_millis(5)));
    let invoker = ScriptedInvoker::new();
    let mut executor = TestExecutor::new(fast_defaults()).with_rate_limiter(limiter);
    for name in ["one", "two", "three"] {
        let result = executor
            .execute(&TestDefinition::new(name, "echo"), &invoker)
            .await;
        assert_eq!(result.status, TestStatus::Passed);
    }
    assert_eq!(invoker.call_count(), 3);
}
