//! Result constructors and run summarization.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::{AssertionResult, RunSummary, TestDefinition, TestResult, TestStatus};

/// Result for a test excluded by tag filtering.
pub(super) fn skipped_result(test: &TestDefinition) -> TestResult {
    TestResult {
        test_id: test.effective_id().to_string(),
        test_name: test.name.clone(),
        status: TestStatus::Skipped,
        duration_ms: 0,
        assertions: Vec::new(),
        error: None,
        variables: None,
    }
}

/// Result for a test the system could not complete.
pub(super) fn error_result(
    test: &TestDefinition,
    message: impl Into<String>,
    duration_ms: u64,
) -> TestResult {
    TestResult {
        test_id: test.effective_id().to_string(),
        test_name: test.name.clone(),
        status: TestStatus::Error,
        duration_ms,
        assertions: Vec::new(),
        error: Some(message.into()),
        variables: None,
    }
}

/// Result for a test whose attempt completed; status follows the verdicts.
pub(super) fn completed_result(
    test: &TestDefinition,
    assertions: Vec<AssertionResult>,
    variables: Option<BTreeMap<String, JsonValue>>,
    duration_ms: u64,
) -> TestResult {
    let status = if assertions.iter().all(|assertion| assertion.passed) {
        TestStatus::Passed
    } else {
        TestStatus::Failed
    };
    TestResult {
        test_id: test.effective_id().to_string(),
        test_name: test.name.clone(),
        status,
        duration_ms,
        assertions,
        error: None,
        variables,
    }
}

/// Computes counts by status and total duration for a finished run.
pub fn summarize(results: &[TestResult]) -> RunSummary {
    let mut summary = RunSummary {
        total: results.len(),
        ..RunSummary::default()
    };
    for result in results {
        match result.status {
            TestStatus::Passed => summary.passed += 1,
            TestStatus::Failed => summary.failed += 1,
            TestStatus::Error => summary.errors += 1,
            TestStatus::Skipped => summary.skipped += 1,
        }
        summary.duration_ms += result.duration_ms;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AssertionKind;

    fn definition() -> TestDefinition {
        TestDefinition::new("sample", "echo")
    }

    #[test]
    fn skipped_results_have_zero_duration_and_no_assertions() {
        let result = skipped_result(&definition());
        assert_eq!(result.status, TestStatus::Skipped);
        assert_eq!(result.duration_ms, 0);
        assert!(result.assertions.is_empty());
        assert!(result.error.is_none());
    }

    #[test]
    fn error_results_carry_the_message() {
        let result = error_result(&definition(), "wire down", 12);
        assert_eq!(result.status, TestStatus::Error);
        assert_eq!(result.error.as_deref(), Some("wire down"));
        assert_eq!(result.duration_ms, 12);
    }

    #[test]
    fn completed_status_follows_the_verdicts() {
        let passing = AssertionResult::new(AssertionKind::Schema, true, "ok");
        let failing = AssertionResult::new(AssertionKind::Exists, false, "missing");
        let passed = completed_result(&definition(), vec![passing.clone()], None, 1);
        assert_eq!(passed.status, TestStatus::Passed);
        let failed = completed_result(&definition(), vec![passing, failing], None, 1);
        assert_eq!(failed.status, TestStatus::Failed);
        assert!(failed.error.is_none());
    }

    #[test]
    fn summarize_counts_by_status() {
        let results = vec![
            completed_result(
                &definition(),
                vec![AssertionResult::new(AssertionKind::Schema, true, "ok")],
                None,
                10,
            ),
            completed_result(
                &definition(),
                vec![AssertionResult::new(AssertionKind::Exists, false, "no")],
                None,
                20,
            ),
            error_result(&definition(), "boom", 5),
            skipped_result(&definition()),
        ];
        let summary = summarize(&results);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.duration_ms, 35);
    }
}
