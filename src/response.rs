//! Normalizes a raw tool-call result into a single queryable JSON value.

use rmcp::model::CallToolResult;
use serde_json::{Map, Value as JsonValue};

/// Converts the ordered content parts of a tool result into one structured
/// value that assertions and extraction can query.
///
/// A single textual part that parses as JSON becomes the normalized response
/// directly. A single textual part that does not parse is exposed under both
/// the `content` and `text` keys for backward-compatible path lookups. Zero
/// parts normalize to an empty object; any other shape is wrapped under a
/// single `content` key holding the serialized part list.
pub fn normalize_response(result: &CallToolResult) -> JsonValue {
    if result.content.len() == 1 {
        if let Some(text) = result.content[0].as_text() {
            return match serde_json::from_str::<JsonValue>(&text.text) {
                Ok(parsed) => parsed,
                Err(_) => {
                    let mut wrapper = Map::new();
                    wrapper.insert("content".to_string(), JsonValue::String(text.text.clone()));
                    wrapper.insert("text".to_string(), JsonValue::String(text.text.clone()));
                    JsonValue::Object(wrapper)
                }
            };
        }
    }

    if result.content.is_empty() {
        return JsonValue::Object(Map::new());
    }

    let parts = serde_json::to_value(&result.content).unwrap_or(JsonValue::Null);
    let mut wrapper = Map::new();
    wrapper.insert("content".to_string(), parts);
    JsonValue::Object(wrapper)
}
