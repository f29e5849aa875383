//! MCP connection manager.
//!
//! Owns the single session for one endpoint:
//! - Lazy connect on first use, coalesced so concurrent callers share one attempt
//! - Failed sessions are downgraded to `Error` and reopened on next use
//! - Events broadcast on every status transition

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::error::ConnectionError;
use super::events::{McpEvent, McpEventReceiver, McpEventSender};
use super::normalize::{JsonObject, RawToolResult};
use super::tools::ToolInfo;
use super::transport::{SessionTransport, ToolSession};

/// Connection status as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    /// Get the status name as a string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live session with the remote server.
pub struct Session {
    id: Uuid,
    endpoint: String,
    created_at: DateTime<Utc>,
    handle: Arc<dyn ToolSession>,
}

impl Session {
    fn new(endpoint: &str, handle: Arc<dyn ToolSession>) -> Self {
        Self {
            id: Uuid::now_v7(),
            endpoint: endpoint.to_string(),
            created_at: Utc::now(),
            handle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub async fn call_tool(&self, name: &str, arguments: JsonObject) -> Result<RawToolResult> {
        self.handle.call_tool(name, arguments).await
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        self.handle.list_tools().await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("created_at", &self.created_at)
            .finish()
    }
}

type ConnectOutcome = std::result::Result<Arc<Session>, ConnectionError>;
type PendingAttempt = Shared<BoxFuture<'static, ConnectOutcome>>;

#[derive(Default)]
struct State {
    status: ConnectionStatus,
    session: Option<Arc<Session>>,
    /// In-flight connect attempt, shared by every waiter.
    pending: Option<PendingAttempt>,
    /// Bumped by `disconnect`; attempts from an older generation are discarded.
    generation: u64,
}

/// Manages the one session to an MCP endpoint.
///
/// All status mutations go through this type. The state lock is never held
/// across an await, so the check-then-install of a connect attempt is atomic.
pub struct ConnectionManager {
    endpoint: String,
    connect_timeout: Duration,
    transport: Arc<dyn SessionTransport>,
    state: Arc<Mutex<State>>,
    events: McpEventSender,
}

impl ConnectionManager {
    pub fn new(endpoint: &str, connect_timeout: Duration, transport: Arc<dyn SessionTransport>) -> Self {
        Self::with_events(endpoint, connect_timeout, transport, McpEventSender::default())
    }

    /// Create a manager with an external event sender.
    pub fn with_events(
        endpoint: &str,
        connect_timeout: Duration,
        transport: Arc<dyn SessionTransport>,
        events: McpEventSender,
    ) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            connect_timeout,
            transport,
            state: Arc::new(Mutex::new(State::default())),
            events,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Subscribe to connection events.
    pub fn subscribe(&self) -> McpEventReceiver {
        self.events.subscribe()
    }

    pub(crate) fn events(&self) -> &McpEventSender {
        &self.events
    }

    /// Current status. Never blocks on I/O.
    pub fn status(&self) -> ConnectionStatus {
        lock(&self.state).status
    }

    /// Current session, if connected.
    pub fn session(&self) -> Option<Arc<Session>> {
        let state = lock(&self.state);
        match state.status {
            ConnectionStatus::Connected => state.session.clone(),
            _ => None,
        }
    }

    /// Return the live session, connecting first if needed.
    ///
    /// Callers arriving while an attempt is in flight wait on that attempt
    /// instead of starting their own.
    pub async fn ensure_connected(&self) -> ConnectOutcome {
        let attempt = {
            let mut state = lock(&self.state);
            if let (ConnectionStatus::Connected, Some(session)) = (state.status, &state.session) {
                return Ok(session.clone());
            }
            match state.pending.clone() {
                Some(pending) => {
                    debug!("joining in-flight connect attempt");
                    pending
                }
                None => self.start_attempt(&mut state),
            }
        };
        attempt.await
    }

    /// Install a new connect attempt. Caller holds the state lock.
    fn start_attempt(&self, state: &mut State) -> PendingAttempt {
        if let Some(stale) = state.session.take() {
            spawn_close(stale);
        }
        state.status = ConnectionStatus::Connecting;
        self.events.send(McpEvent::Connecting {
            endpoint: self.endpoint.clone(),
        });

        let task = tokio::spawn(connect_attempt(
            self.endpoint.clone(),
            self.connect_timeout,
            self.transport.clone(),
            self.state.clone(),
            self.events.clone(),
            state.generation,
        ));

        let attempt: PendingAttempt = async move {
            task.await
                .unwrap_or_else(|e| Err(ConnectionError::Open(format!("connect task failed: {e}"))))
        }
        .boxed()
        .shared();

        state.pending = Some(attempt.clone());
        attempt
    }

    /// Downgrade `session` to `Error` after a failed call.
    ///
    /// Ignored when `session` has already been replaced. The session is
    /// closed in the background and the next `ensure_connected` reconnects.
    pub fn mark_failed(&self, session: &Session, error: &str) {
        let stale = {
            let mut state = lock(&self.state);
            let current = state.session.as_ref().map(|s| s.id);
            if current != Some(session.id) {
                debug!(session = %session.id, "ignoring failure of replaced session");
                return;
            }
            state.status = ConnectionStatus::Error;
            state.session.take()
        };

        warn!(session = %session.id, error = %error, "session failed");
        self.events.send(McpEvent::SessionFailed {
            endpoint: self.endpoint.clone(),
            error: error.to_string(),
        });

        if let Some(stale) = stale {
            spawn_close(stale);
        }
    }

    /// Close the session and force status to `Disconnected`.
    ///
    /// Close failures are logged, never returned. Calling this while already
    /// disconnected is a no-op.
    pub async fn disconnect(&self) {
        let (previous, session) = {
            let mut state = lock(&self.state);
            let previous = state.status;
            state.generation += 1;
            state.pending = None;
            state.status = ConnectionStatus::Disconnected;
            (previous, state.session.take())
        };

        if let Some(session) = session {
            match tokio::time::timeout(self.connect_timeout, session.handle.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "error closing MCP session"),
                Err(_) => warn!("timed out closing MCP session"),
            }
        }

        if previous != ConnectionStatus::Disconnected {
            info!(endpoint = %self.endpoint, "disconnected from MCP server");
            self.events.send(McpEvent::Disconnected {
                endpoint: self.endpoint.clone(),
            });
        }
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn spawn_close(session: Arc<Session>) {
    tokio::spawn(async move {
        if let Err(e) = session.handle.close().await {
            debug!(session = %session.id, error = %e, "error closing stale session");
        }
    });
}

/// One connect attempt, run as its own task so it completes even if every
/// waiter goes away.
#[instrument(
    name = "mcp.connect",
    skip_all,
    fields(mcp.endpoint = %endpoint, generation = generation)
)]
async fn connect_attempt(
    endpoint: String,
    connect_timeout: Duration,
    transport: Arc<dyn SessionTransport>,
    state: Arc<Mutex<State>>,
    events: McpEventSender,
    generation: u64,
) -> ConnectOutcome {
    info!("attempting connection");

    let outcome = match tokio::time::timeout(connect_timeout, transport.open(&endpoint)).await {
        Ok(Ok(handle)) => Ok(Arc::new(Session::new(&endpoint, handle))),
        Ok(Err(e)) => Err(ConnectionError::Open(format!("{e:#}"))),
        Err(_) => Err(ConnectionError::Timeout(connect_timeout)),
    };

    let mut guard = lock(&state);
    if guard.generation != generation {
        drop(guard);
        info!("connect attempt abandoned by disconnect");
        if let Ok(session) = outcome {
            spawn_close(session);
        }
        return Err(ConnectionError::Aborted);
    }

    guard.pending = None;
    match &outcome {
        Ok(session) => {
            guard.status = ConnectionStatus::Connected;
            guard.session = Some(session.clone());
            drop(guard);
            info!(session = %session.id, "connection established");
            events.send(McpEvent::Connected {
                endpoint,
                session_id: session.id.to_string(),
            });
        }
        Err(e) => {
            guard.status = ConnectionStatus::Error;
            guard.session = None;
            drop(guard);
            warn!(error = %e, "connection failed");
            events.send(McpEvent::ConnectFailed {
                endpoint,
                error: e.to_string(),
            });
        }
    }
    outcome
}
