//! One pure evaluator per assertion kind, each yielding a verdict with a
//! specific message on both pass and fail.

use regex::Regex;
use rmcp::model::{CallToolResult, RawContent, ResourceContents};
use serde_json::Value as JsonValue;

use crate::query::query_path;
use crate::{
    AssertionDefinition, AssertionKind, AssertionResult, Expectation, ExpressionEvaluator,
    LengthOperator, ValueKind,
};

/// Everything an evaluator may inspect for one invocation.
pub(super) struct AssertionContext<'a> {
    /// The normalized response produced by `response::normalize_response`.
    pub(super) response: &'a JsonValue,
    /// The raw tool result, for content-part level checks.
    pub(super) raw: &'a CallToolResult,
    /// Wall time of the invocation in milliseconds.
    pub(super) elapsed_ms: u64,
    /// Injected evaluator backing the `expression` kind.
    pub(super) expression: Option<&'a ExpressionEvaluator>,
}

/// Dispatches a single assertion definition to its evaluator.
pub(super) fn evaluate_assertion(
    definition: &AssertionDefinition,
    ctx: &AssertionContext<'_>,
) -> AssertionResult {
    match definition {
        AssertionDefinition::Schema => evaluate_schema(ctx.response),
        AssertionDefinition::Equals { path, value } => evaluate_equals(ctx.response, path, value),
        AssertionDefinition::Contains { path, value } => {
            evaluate_contains(ctx.response, path, value)
        }
        AssertionDefinition::Exists { path } => evaluate_exists(ctx.response, path),
        AssertionDefinition::Matches { path, pattern } => {
            evaluate_matches(ctx.response, path, pattern)
        }
        AssertionDefinition::Type { path, expected } => {
            evaluate_type(ctx.response, path, *expected)
        }
        AssertionDefinition::Length {
            path,
            value,
            operator,
        } => evaluate_length(ctx.response, path, *value, *operator),
        AssertionDefinition::Latency { max_ms } => evaluate_latency(ctx.elapsed_ms, *max_ms),
        AssertionDefinition::MimeType { expected } => evaluate_mime_type(ctx.raw, expected),
        AssertionDefinition::Expression { expression } => {
            evaluate_expression(ctx.response, expression, ctx.expression)
        }
    }
}

/// Desugars an expectation into the assertion it stands for. An omitted path
/// targets the response root.
pub(super) fn expectation_to_assertion(expectation: &Expectation) -> AssertionDefinition {
    let default_path = || "$".to_string();
    match expectation {
        Expectation::Exists { path } => AssertionDefinition::Exists {
            path: path.clone().unwrap_or_else(default_path),
        },
        Expectation::Equals { path, value } => AssertionDefinition::Equals {
            path: path.clone().unwrap_or_else(default_path),
            value: value.clone(),
        },
        Expectation::Contains { path, value } => AssertionDefinition::Contains {
            path: path.clone().unwrap_or_else(default_path),
            value: value.clone(),
        },
        Expectation::Matches { path, pattern } => AssertionDefinition::Matches {
            path: path.clone().unwrap_or_else(default_path),
            pattern: pattern.clone(),
        },
    }
}

enum Located<'a> {
    Found(&'a JsonValue),
    Missing,
    BadPath(String),
}

fn locate<'a>(response: &'a JsonValue, path: &str) -> Located<'a> {
    match query_path(response, path) {
        Ok(Some(value)) => Located::Found(value),
        Ok(None) => Located::Missing,
        Err(error) => Located::BadPath(error.to_string()),
    }
}

fn fail(kind: AssertionKind, message: String) -> AssertionResult {
    AssertionResult::new(kind, false, message)
}

fn pass(kind: AssertionKind, message: String) -> AssertionResult {
    AssertionResult::new(kind, true, message)
}

pub(super) fn evaluate_schema(response: &JsonValue) -> AssertionResult {
    let kind = ValueKind::of(response);
    match kind {
        ValueKind::Object | ValueKind::Array => pass(
            AssertionKind::Schema,
            format!("response is a structured value ({kind})"),
        ),
        other => fail(
            AssertionKind::Schema,
            format!("expected a structured response, got {other}"),
        ),
    }
}

fn evaluate_equals(response: &JsonValue, path: &str, expected: &JsonValue) -> AssertionResult {
    match locate(response, path) {
        Located::BadPath(reason) => fail(AssertionKind::Equals, reason),
        Located::Missing => fail(
            AssertionKind::Equals,
            format!("path '{path}' does not resolve"),
        )
        .with_expected(expected.clone()),
        Located::Found(actual) if actual == expected => pass(
            AssertionKind::Equals,
            format!("value at '{path}' equals the expected value"),
        )
        .with_expected(expected.clone())
        .with_actual(actual.clone()),
        Located::Found(actual) => fail(
            AssertionKind::Equals,
            format!("value at '{path}' differs: expected {expected}, got {actual}"),
        )
        .with_expected(expected.clone())
        .with_actual(actual.clone()),
    }
}

fn evaluate_contains(response: &JsonValue, path: &str, expected: &JsonValue) -> AssertionResult {
    let actual = match locate(response, path) {
        Located::BadPath(reason) => return fail(AssertionKind::Contains, reason),
        Located::Missing => {
            return fail(
                AssertionKind::Contains,
                format!("path '{path}' does not resolve"),
            )
        }
        Located::Found(actual) => actual,
    };
    match actual {
        JsonValue::Array(items) => {
            if items.iter().any(|item| item == expected) {
                pass(
                    AssertionKind::Contains,
                    format!("array at '{path}' contains the expected member"),
                )
            } else {
                fail(
                    AssertionKind::Contains,
                    format!("array at '{path}' does not contain {expected}"),
                )
                .with_expected(expected.clone())
                .with_actual(actual.clone())
            }
        }
        JsonValue::String(text) => match expected.as_str() {
            Some(needle) if text.contains(needle) => pass(
                AssertionKind::Contains,
                format!("string at '{path}' contains '{needle}'"),
            ),
            Some(needle) => fail(
                AssertionKind::Contains,
                format!("string at '{path}' does not contain '{needle}'"),
            )
            .with_expected(expected.clone())
            .with_actual(actual.clone()),
            None => fail(
                AssertionKind::Contains,
                format!("contains on the string at '{path}' requires a string expected value"),
            ),
        },
        JsonValue::Object(fields) => match expected {
            JsonValue::String(key) => {
                if fields.contains_key(key) {
                    pass(
                        AssertionKind::Contains,
                        format!("object at '{path}' has key '{key}'"),
                    )
                } else {
                    fail(
                        AssertionKind::Contains,
                        format!("object at '{path}' is missing key '{key}'"),
                    )
                }
            }
            JsonValue::Object(wanted) => {
                let all_present = wanted
                    .iter()
                    .all(|(key, value)| fields.get(key) == Some(value));
                if all_present {
                    pass(
                        AssertionKind::Contains,
                        format!("object at '{path}' contains every expected entry"),
                    )
                } else {
                    fail(
                        AssertionKind::Contains,
                        format!("object at '{path}' does not contain {expected}"),
                    )
                    .with_expected(expected.clone())
                    .with_actual(actual.clone())
                }
            }
            other => fail(
                AssertionKind::Contains,
                format!(
                    "contains on the object at '{path}' requires a string key or object, got {}",
                    ValueKind::of(other)
                ),
            ),
        },
        other => fail(
            AssertionKind::Contains,
            format!(
                "value at '{path}' is a {}; contains applies to arrays, strings, and objects",
                ValueKind::of(other)
            ),
        ),
    }
}

fn evaluate_exists(response: &JsonValue, path: &str) -> AssertionResult {
    match locate(response, path) {
        Located::BadPath(reason) => fail(AssertionKind::Exists, reason),
        Located::Missing => fail(
            AssertionKind::Exists,
            format!("path '{path}' does not resolve"),
        ),
        Located::Found(actual) => pass(
            AssertionKind::Exists,
            format!("path '{path}' resolves to a {}", ValueKind::of(actual)),
        ),
    }
}

fn evaluate_matches(response: &JsonValue, path: &str, pattern: &str) -> AssertionResult {
    let actual = match locate(response, path) {
        Located::BadPath(reason) => return fail(AssertionKind::Matches, reason),
        Located::Missing => {
            return fail(
                AssertionKind::Matches,
                format!("path '{path}' does not resolve"),
            )
        }
        Located::Found(actual) => actual,
    };
    let Some(text) = actual.as_str() else {
        return fail(
            AssertionKind::Matches,
            format!(
                "value at '{path}' is a {}; matches applies to strings",
                ValueKind::of(actual)
            ),
        );
    };
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(error) => {
            return fail(
                AssertionKind::Matches,
                format!("invalid pattern '{pattern}': {error}"),
            )
        }
    };
    if regex.is_match(text) {
        pass(
            AssertionKind::Matches,
            format!("string at '{path}' matches /{pattern}/"),
        )
    } else {
        fail(
            AssertionKind::Matches,
            format!("string at '{path}' does not match /{pattern}/"),
        )
        .with_actual(actual.clone())
    }
}

fn evaluate_type(response: &JsonValue, path: &str, expected: ValueKind) -> AssertionResult {
    match locate(response, path) {
        Located::BadPath(reason) => fail(AssertionKind::Type, reason),
        Located::Missing => fail(
            AssertionKind::Type,
            format!("path '{path}' does not resolve"),
        ),
        Located::Found(actual) => {
            let actual_kind = ValueKind::of(actual);
            if actual_kind == expected {
                pass(
                    AssertionKind::Type,
                    format!("value at '{path}' is a {expected}"),
                )
            } else {
                fail(
                    AssertionKind::Type,
                    format!("value at '{path}' is a {actual_kind}, expected {expected}"),
                )
            }
        }
    }
}

fn evaluate_length(
    response: &JsonValue,
    path: &str,
    expected: u64,
    operator: LengthOperator,
) -> AssertionResult {
    let actual = match locate(response, path) {
        Located::BadPath(reason) => return fail(AssertionKind::Length, reason),
        Located::Missing => {
            return fail(
                AssertionKind::Length,
                format!("path '{path}' does not resolve"),
            )
        }
        Located::Found(actual) => actual,
    };
    let length = match actual {
        JsonValue::Array(items) => items.len() as u64,
        JsonValue::String(text) => text.chars().count() as u64,
        other => {
            return fail(
                AssertionKind::Length,
                format!(
                    "value at '{path}' is a {}; length applies to arrays and strings",
                    ValueKind::of(other)
                ),
            )
        }
    };
    if operator.compare(length, expected) {
        pass(
            AssertionKind::Length,
            format!("length of '{path}' is {length} ({operator} {expected})"),
        )
    } else {
        fail(
            AssertionKind::Length,
            format!("length of '{path}' is {length}, expected {operator} {expected}"),
        )
        .with_expected(JsonValue::from(expected))
        .with_actual(JsonValue::from(length))
    }
}

fn evaluate_latency(elapsed_ms: u64, max_ms: Option<u64>) -> AssertionResult {
    let max_ms = max_ms.unwrap_or(1_000);
    if elapsed_ms <= max_ms {
        pass(
            AssertionKind::Latency,
            format!("invocation took {elapsed_ms}ms (max {max_ms}ms)"),
        )
    } else {
        fail(
            AssertionKind::Latency,
            format!("invocation took {elapsed_ms}ms, exceeding the {max_ms}ms limit"),
        )
        .with_expected(JsonValue::from(max_ms))
        .with_actual(JsonValue::from(elapsed_ms))
    }
}

fn content_mime_types(result: &CallToolResult) -> Vec<String> {
    result
        .content
        .iter()
        .filter_map(|content| match &content.raw {
            RawContent::Image(image) => Some(image.mime_type.clone()),
            RawContent::Audio(audio) => Some(audio.mime_type.clone()),
            RawContent::Resource(embedded) => match &embedded.resource {
                ResourceContents::TextResourceContents { mime_type, .. }
                | ResourceContents::BlobResourceContents { mime_type, .. } => mime_type.clone(),
            },
            _ => None,
        })
        .collect()
}

fn mime_matches(found: &str, expected: &str) -> bool {
    if expected.contains('/') {
        found == expected
    } else {
        found.split('/').next() == Some(expected)
    }
}

fn evaluate_mime_type(raw: &CallToolResult, expected: &str) -> AssertionResult {
    let mimes = content_mime_types(raw);
    if let Some(found) = mimes.iter().find(|mime| mime_matches(mime, expected)) {
        pass(
            AssertionKind::MimeType,
            format!("content part with mime type '{found}' matches '{expected}'"),
        )
    } else if mimes.is_empty() {
        fail(
            AssertionKind::MimeType,
            format!("no binary content parts carry a mime type (expected '{expected}')"),
        )
    } else {
        fail(
            AssertionKind::MimeType,
            format!(
                "no content part matches mime type '{expected}' (found: {})",
                mimes.join(", ")
            ),
        )
    }
}

fn evaluate_expression(
    response: &JsonValue,
    expression: &str,
    evaluator: Option<&ExpressionEvaluator>,
) -> AssertionResult {
    let Some(evaluator) = evaluator else {
        return fail(
            AssertionKind::Expression,
            "no expression evaluator is configured for this run".to_string(),
        );
    };
    match evaluator(expression, response) {
        Ok(true) => pass(
            AssertionKind::Expression,
            format!("expression '{expression}' evaluated to true"),
        ),
        Ok(false) => fail(
            AssertionKind::Expression,
            format!("expression '{expression}' evaluated to false"),
        ),
        Err(error) => fail(
            AssertionKind::Expression,
            format!("expression '{expression}' failed to evaluate: {error}"),
        ),
    }
}
