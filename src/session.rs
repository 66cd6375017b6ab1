//! The consumed collaborator seam: invoking a named tool on a live session.
//!
//! Connection lifecycle, framing, and reconnects live outside this crate; the
//! engine only needs "given a connected client, call a tool and get back
//! content-or-error".

use std::fmt;

use async_trait::async_trait;
use rmcp::model::CallToolResult;
use serde_json::Value as JsonValue;

/// Failure raised by the invocation collaborator.
///
/// Carries only a human-readable message; the engine treats every thrown
/// invocation failure the same way (retryable, subject to the test's budget)
/// regardless of its transport-level cause.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvokeError {
    /// Human-readable error description.
    pub message: String,
}

impl InvokeError {
    /// Creates a new invocation error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for InvokeError {}

/// Capability to invoke a named tool with structured arguments.
///
/// A successful invocation returns the protocol-native [`CallToolResult`]
/// (ordered content parts plus an error flag); transport or protocol problems
/// surface as [`InvokeError`]. Implementations shared across concurrently
/// executing tests must be safe under concurrent callers.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Invokes `tool` with `arguments` on the connected session.
    async fn call_tool(
        &self,
        tool: &str,
        arguments: JsonValue,
    ) -> Result<CallToolResult, InvokeError>;
}
