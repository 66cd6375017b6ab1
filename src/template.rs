//! Variable store and `{{name}}` template resolution for test inputs.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value as JsonValue;

/// Mutable name-to-value mapping used to pass data between tests.
///
/// Owned by the executor that created it; lifetime policy (run-wide versus
/// per-test) is decided by the scheduler.
#[derive(Clone, Debug, Default)]
pub struct VariableStore {
    values: BTreeMap<String, JsonValue>,
}

impl VariableStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded from `values`.
    pub fn from_map(values: BTreeMap<String, JsonValue>) -> Self {
        Self { values }
    }

    /// Looks up a variable by name.
    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.values.get(name)
    }

    /// Writes a variable, overwriting any previous value under the name.
    pub fn set(&mut self, name: impl Into<String>, value: JsonValue) {
        self.values.insert(name.into(), value);
    }

    /// Returns a snapshot of the current contents.
    pub fn snapshot(&self) -> BTreeMap<String, JsonValue> {
        self.values.clone()
    }

    /// Number of stored variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the store holds no variables.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("token pattern")
    })
}

fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Resolves every `{{name}}` token inside string leaves of `input` against
/// the store, recursing through objects and arrays. Non-string leaves pass
/// through unchanged; tokens naming an absent variable are left literal.
/// Neither the input nor the store is mutated.
pub fn resolve_templates(input: &JsonValue, variables: &VariableStore) -> JsonValue {
    match input {
        JsonValue::String(text) => JsonValue::String(resolve_string(text, variables)),
        JsonValue::Array(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| resolve_templates(item, variables))
                .collect(),
        ),
        JsonValue::Object(fields) => JsonValue::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), resolve_templates(value, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_string(text: &str, variables: &VariableStore) -> String {
    token_pattern()
        .replace_all(text, |captures: &regex::Captures<'_>| {
            let name = &captures[1];
            match variables.get(name) {
                Some(value) => stringify(value),
                // Unknown names stay literal so the authoring mistake is
                // visible in the eventual assertion failure.
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}
