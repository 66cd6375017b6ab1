//! Shared test doubles for the integration suites.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ctor::ctor;
use rmcp::model::{CallToolResult, Content};
use serde_json::{json, Value as JsonValue};
use toolcase::{InvokeError, ToolInvoker};

#[ctor]
fn init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .is_test(true)
        .try_init();
}

/// Builds a success result whose single text part is the given JSON value.
pub fn json_text_result(value: JsonValue) -> CallToolResult {
    CallToolResult::success(vec![Content::text(value.to_string())])
}

/// Scripted in-memory invoker: per-tool outcome queues, optional per-tool
/// latency, and a record of every call. Tools without a script echo their
/// arguments back as a structured response.
pub struct ScriptedInvoker {
    scripts: Mutex<HashMap<String, VecDeque<Result<CallToolResult, InvokeError>>>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<(String, JsonValue)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queues outcomes replayed in order for `tool`.
    pub fn script(
        mut self,
        tool: &str,
        outcomes: Vec<Result<CallToolResult, InvokeError>>,
    ) -> Self {
        self.scripts
            .get_mut()
            .expect("scripts")
            .insert(tool.to_string(), VecDeque::from(outcomes));
        self
    }

    /// Adds artificial latency to every call of `tool`.
    pub fn with_delay(mut self, tool: &str, delay: Duration) -> Self {
        self.delays.insert(tool.to_string(), delay);
        self
    }

    /// Every `(tool, arguments)` pair seen so far, in call order.
    pub fn calls(&self) -> Vec<(String, JsonValue)> {
        self.calls.lock().expect("calls").clone()
    }

    /// Number of calls seen so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls").len()
    }

    /// High-water mark of concurrent in-flight calls.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolInvoker for ScriptedInvoker {
    async fn call_tool(
        &self,
        tool: &str,
        arguments: JsonValue,
    ) -> Result<CallToolResult, InvokeError> {
        self.calls
            .lock()
            .expect("calls")
            .push((tool.to_string(), arguments.clone()));

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(tool) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self
            .scripts
            .lock()
            .expect("scripts")
            .get_mut(tool)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(outcome) => outcome,
            None => Ok(json_text_result(json!({ "tool": tool, "echo": arguments }))),
        }
    }
}
