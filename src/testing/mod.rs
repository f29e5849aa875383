//! Testing utilities for docunote
//!
//! Provides an in-memory MCP transport with scripted responses, call
//! recording, and injectable open delays and failures.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::mcp::{JsonObject, RawToolResult, SessionTransport, ToolInfo, ToolKind, ToolSession};

/// Scripted reply to one tool call.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    /// Return this JSON as the raw result.
    Value(Value),
    /// Fail at the transport level.
    Fail(String),
    /// Never answer.
    Hang,
}

/// A recorded tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub tool: String,
    pub arguments: JsonObject,
}

struct FakeState {
    opens: AtomicUsize,
    closes: AtomicUsize,
    failing_opens: AtomicUsize,
    fail_close: bool,
    open_delay: Duration,
    tools: Vec<ToolInfo>,
    responses: Mutex<HashMap<String, VecDeque<FakeResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

/// In-memory transport. Clones share state.
#[derive(Clone)]
pub struct FakeTransport {
    state: Arc<FakeState>,
}

impl FakeTransport {
    /// Transport whose server lists the DocuNote tools and has no scripted replies.
    pub fn new() -> Self {
        let tools = [
            ToolKind::Upload,
            ToolKind::AskQuestion,
            ToolKind::ExtractText,
            ToolKind::FindPrecedents,
        ]
        .iter()
        .map(|kind| ToolInfo {
            name: kind.name().to_string(),
            description: format!("fake {}", kind.name()),
        })
        .collect();

        Self {
            state: Arc::new(FakeState {
                opens: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                failing_opens: AtomicUsize::new(0),
                fail_close: false,
                open_delay: Duration::ZERO,
                tools,
                responses: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    fn configure(mut self, f: impl FnOnce(&mut FakeState)) -> Self {
        let state = Arc::get_mut(&mut self.state).expect("configure before cloning");
        f(state);
        self
    }

    /// Delay every `open` by `delay`.
    pub fn with_open_delay(self, delay: Duration) -> Self {
        self.configure(|s| s.open_delay = delay)
    }

    /// Fail the next `count` opens.
    pub fn failing_opens(self, count: usize) -> Self {
        self.configure(|s| s.failing_opens = AtomicUsize::new(count))
    }

    /// Make every `close` return an error.
    pub fn failing_close(self) -> Self {
        self.configure(|s| s.fail_close = true)
    }

    /// Replace the advertised tool list.
    pub fn with_tools(self, names: &[&str]) -> Self {
        let tools = names
            .iter()
            .map(|name| ToolInfo {
                name: name.to_string(),
                description: String::new(),
            })
            .collect();
        self.configure(|s| s.tools = tools)
    }

    /// Queue a reply for `tool`. The last queued reply repeats.
    pub fn respond(self, tool: &str, response: FakeResponse) -> Self {
        self.push_response(tool, response);
        self
    }

    /// Queue a reply on a shared transport.
    pub fn push_response(&self, tool: &str, response: FakeResponse) {
        let mut responses = self.state.responses.lock().unwrap_or_else(|p| p.into_inner());
        responses.entry(tool.to_string()).or_default().push_back(response);
    }

    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeState {
    fn next_response(&self, tool: &str) -> Option<FakeResponse> {
        let mut responses = self.responses.lock().unwrap_or_else(|p| p.into_inner());
        let queue = responses.get_mut(tool)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl SessionTransport for FakeTransport {
    async fn open(&self, _endpoint: &str) -> Result<Arc<dyn ToolSession>> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        if !self.state.open_delay.is_zero() {
            tokio::time::sleep(self.state.open_delay).await;
        }

        let fail = self
            .state
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(anyhow!("connection refused"));
        }

        Ok(Arc::new(FakeSession {
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    state: Arc<FakeState>,
}

#[async_trait]
impl ToolSession for FakeSession {
    async fn call_tool(&self, name: &str, arguments: JsonObject) -> Result<RawToolResult> {
        self.state
            .calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(RecordedCall {
                tool: name.to_string(),
                arguments,
            });

        match self.state.next_response(name) {
            Some(FakeResponse::Value(value)) => Ok(RawToolResult::from_value(value)),
            Some(FakeResponse::Fail(message)) => Err(anyhow!(message)),
            Some(FakeResponse::Hang) => std::future::pending().await,
            None => Err(anyhow!("no scripted response for {}", name)),
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        match self.state.next_response(ToolKind::HealthCheck.name()) {
            Some(FakeResponse::Fail(message)) => Err(anyhow!(message)),
            Some(FakeResponse::Hang) => std::future::pending().await,
            _ => Ok(self.state.tools.clone()),
        }
    }

    async fn close(&self) -> Result<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_close {
            return Err(anyhow!("close failed"));
        }
        Ok(())
    }
}
