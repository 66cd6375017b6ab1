//! Public API types for defining and reporting toolcase runs.
//!
//! A toolcase run takes a list of declarative [`TestDefinition`]s and a
//! connected [`ToolInvoker`] and produces one [`TestResult`] per definition,
//! in definition order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub mod backoff;
pub mod limiter;
pub mod query;
pub mod response;
pub mod runner;
pub mod session;
pub mod template;

pub use backoff::BackoffConfig;
pub use limiter::{IntervalRateLimiter, RateLimit};
pub use runner::{summarize, TestExecutor, TestScheduler};
pub use session::{InvokeError, ToolInvoker};
pub use template::VariableStore;

/// Callback used to evaluate the free-form `expression` assertion against a
/// normalized response. The expression grammar is owned by the caller; the
/// engine only consumes the boolean verdict.
pub type ExpressionEvaluator = Arc<dyn Fn(&str, &JsonValue) -> Result<bool, String> + Send + Sync>;

/// Observer invoked by the scheduler per test start and per test completion.
///
/// Reporters live outside this crate; they receive results through this
/// contract. In parallel mode callbacks may interleave across tests.
pub trait RunObserver: Send + Sync {
    /// Called when a test is admitted for execution (or found skipped).
    fn on_test_started(&self, test: &TestDefinition);
    /// Called with the finished result for a test.
    fn on_test_finished(&self, result: &TestResult);
}

/// A single declarative test case, authored externally.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestDefinition {
    /// Stable identifier; falls back to `name` when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Display name, also the identity fallback.
    pub name: String,
    /// Tags used for run filtering.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Per-test timeout override in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Per-test retry budget override (extra attempts after the first).
    #[serde(default)]
    pub retries: Option<u32>,
    /// Name of the MCP tool to invoke.
    pub tool: String,
    /// Input object sent to the tool, after template resolution.
    #[serde(default = "empty_object")]
    pub input: JsonValue,
    /// Declarative assertions evaluated against the normalized response.
    #[serde(default)]
    pub assertions: Vec<AssertionDefinition>,
    /// Shorthand expectations; sugar over the corresponding assertions.
    #[serde(default)]
    pub expect: Vec<Expectation>,
    /// When set, the invocation is expected to fail or report an error.
    #[serde(default)]
    pub expect_error: bool,
    /// Values captured from the response into the variable store.
    #[serde(default)]
    pub extract: Vec<ExtractionDefinition>,
}

fn empty_object() -> JsonValue {
    JsonValue::Object(serde_json::Map::new())
}

impl TestDefinition {
    /// Creates a minimal definition invoking `tool` under `name`.
    pub fn new(name: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            tags: Vec::new(),
            timeout_ms: None,
            retries: None,
            tool: tool.into(),
            input: empty_object(),
            assertions: Vec::new(),
            expect: Vec::new(),
            expect_error: false,
            extract: Vec::new(),
        }
    }

    /// Returns the effective identity: the explicit id, or the name.
    pub fn effective_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// The closed set of assertion kinds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssertionDefinition {
    /// The response is a non-null structured value (object or array).
    Schema,
    /// Deep equality between the value at `path` and `value`.
    Equals { path: String, value: JsonValue },
    /// Membership: `value` is found inside the array/string/object at `path`.
    Contains { path: String, value: JsonValue },
    /// The path resolves to some value.
    Exists { path: String },
    /// The string at `path` matches the regular expression `pattern`.
    Matches { path: String, pattern: String },
    /// The runtime kind of the value at `path` equals `expected`.
    Type { path: String, expected: ValueKind },
    /// Compare the length of the array/string at `path` against `value`.
    Length {
        path: String,
        value: u64,
        #[serde(default)]
        operator: LengthOperator,
    },
    /// The invocation completed within `max_ms` milliseconds.
    Latency {
        #[serde(default)]
        max_ms: Option<u64>,
    },
    /// A binary/resource content part carries the expected mime type.
    MimeType { expected: String },
    /// A caller-supplied boolean expression evaluates to true.
    Expression { expression: String },
}

/// Runtime kinds distinguished by the `type` assertion.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    /// Classifies a JSON value.
    pub fn of(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => ValueKind::Null,
            JsonValue::Bool(_) => ValueKind::Boolean,
            JsonValue::Number(_) => ValueKind::Number,
            JsonValue::String(_) => ValueKind::String,
            JsonValue::Array(_) => ValueKind::Array,
            JsonValue::Object(_) => ValueKind::Object,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// Comparison operators accepted by the `length` assertion.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthOperator {
    #[default]
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl LengthOperator {
    /// Applies the operator to `actual` against `expected`.
    pub fn compare(self, actual: u64, expected: u64) -> bool {
        match self {
            LengthOperator::Eq => actual == expected,
            LengthOperator::Gt => actual > expected,
            LengthOperator::Gte => actual >= expected,
            LengthOperator::Lt => actual < expected,
            LengthOperator::Lte => actual <= expected,
        }
    }
}

impl fmt::Display for LengthOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            LengthOperator::Eq => "==",
            LengthOperator::Gt => ">",
            LengthOperator::Gte => ">=",
            LengthOperator::Lt => "<",
            LengthOperator::Lte => "<=",
        };
        f.write_str(symbol)
    }
}

/// Authoring sugar over the four most common assertions.
///
/// Each shape maps 1:1 onto the corresponding [`AssertionDefinition`]; an
/// omitted path defaults to the response root.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Expectation {
    Exists {
        #[serde(default)]
        path: Option<String>,
    },
    Equals {
        #[serde(default)]
        path: Option<String>,
        value: JsonValue,
    },
    Contains {
        #[serde(default)]
        path: Option<String>,
        value: JsonValue,
    },
    Matches {
        #[serde(default)]
        path: Option<String>,
        pattern: String,
    },
}

/// Captures the value at `path` into the variable store under `name`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionDefinition {
    pub name: String,
    pub path: String,
}

/// Identifies which evaluator produced an [`AssertionResult`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    Schema,
    Equals,
    Contains,
    Exists,
    Matches,
    Type,
    Length,
    Latency,
    MimeType,
    Expression,
    /// Synthetic verdicts produced by `expect_error` handling.
    ExpectError,
}

/// Verdict of a single assertion, with a human-readable explanation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssertionResult {
    pub kind: AssertionKind,
    pub passed: bool,
    /// Always present, on pass and fail alike.
    pub message: String,
    /// Expected value echo for diagnostics, when meaningful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<JsonValue>,
    /// Actual value echo for diagnostics, when meaningful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<JsonValue>,
}

impl AssertionResult {
    /// Creates a verdict with no expected/actual echo.
    pub fn new(kind: AssertionKind, passed: bool, message: impl Into<String>) -> Self {
        Self {
            kind,
            passed,
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    /// Attaches the expected-value echo.
    pub fn with_expected(mut self, expected: JsonValue) -> Self {
        self.expected = Some(expected);
        self
    }

    /// Attaches the actual-value echo.
    pub fn with_actual(mut self, actual: JsonValue) -> Self {
        self.actual = Some(actual);
        self
    }
}

/// Terminal status of one test.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Every assertion passed.
    Passed,
    /// At least one assertion failed; never retried.
    Failed,
    /// The system could not complete the invocation after all retries.
    Error,
    /// Excluded by tag filtering; never executed.
    Skipped,
}

/// Outcome of one test definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: String,
    pub test_name: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    pub assertions: Vec<AssertionResult>,
    /// Set only for `status == Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Variables extracted during this test, when extractions were declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, JsonValue>>,
}

/// Counts by status plus total wall time for a finished run.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

/// Engine-level fallbacks applied when a test omits its own settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineDefaults {
    /// Effective timeout for tests without `timeout_ms`.
    pub timeout_ms: u64,
    /// Retry budget for tests without `retries`.
    pub retries: u32,
    /// Delay schedule applied between retry attempts.
    pub backoff: BackoffConfig,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            retries: 0,
            backoff: BackoffConfig::default(),
        }
    }
}

impl EngineDefaults {
    /// Sets the default timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the default retry budget.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the backoff schedule.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Per-run scheduling options.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScheduleOptions {
    /// Maximum tests in flight; `0` and `1` both mean sequential.
    #[serde(default)]
    pub parallelism: usize,
    /// Tag filter; empty means run everything.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Variables seeding each run's store before any extraction.
    #[serde(default)]
    pub initial_variables: BTreeMap<String, JsonValue>,
}

impl ScheduleOptions {
    /// Sets the admission limit.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Sets the tag filter.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Seeds the initial variables.
    pub fn with_initial_variables(mut self, variables: BTreeMap<String, JsonValue>) -> Self {
        self.initial_variables = variables;
        self
    }
}
