//! Connection events for status broadcasting.
//!
//! Uses `tokio::sync::broadcast` so any number of observers (status bars,
//! logs, the CLI `watch` command) can follow the connection lifecycle.

use tokio::sync::broadcast;

/// Connection lifecycle event.
///
/// Emitted by `ConnectionManager` on status transitions and by the health
/// monitor after each probe.
#[derive(Debug, Clone)]
pub enum McpEvent {
    /// Connect attempt started.
    Connecting {
        /// Endpoint URL
        endpoint: String,
    },

    /// Session established.
    Connected {
        /// Endpoint URL
        endpoint: String,
        /// Session identifier
        session_id: String,
    },

    /// Connect attempt failed.
    ConnectFailed {
        /// Endpoint URL
        endpoint: String,
        /// Error message from the attempt
        error: String,
    },

    /// A live session failed mid-call and was dropped.
    SessionFailed {
        /// Endpoint URL
        endpoint: String,
        /// Error message from the failed call
        error: String,
    },

    /// Explicit disconnect.
    Disconnected {
        /// Endpoint URL
        endpoint: String,
    },

    /// Health probe finished.
    Health {
        /// Endpoint URL
        endpoint: String,
        /// Whether the probe succeeded with a non-empty tool list
        healthy: bool,
        /// Number of tools the server listed
        tool_count: usize,
    },
}

impl McpEvent {
    /// Get the endpoint from any event variant.
    pub fn endpoint(&self) -> &str {
        match self {
            McpEvent::Connecting { endpoint } => endpoint,
            McpEvent::Connected { endpoint, .. } => endpoint,
            McpEvent::ConnectFailed { endpoint, .. } => endpoint,
            McpEvent::SessionFailed { endpoint, .. } => endpoint,
            McpEvent::Disconnected { endpoint } => endpoint,
            McpEvent::Health { endpoint, .. } => endpoint,
        }
    }

    /// Returns true for failure events.
    pub fn is_error(&self) -> bool {
        match self {
            McpEvent::ConnectFailed { .. } | McpEvent::SessionFailed { .. } => true,
            McpEvent::Health { healthy, .. } => !healthy,
            _ => false,
        }
    }

    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            McpEvent::Connecting { .. } => "connecting",
            McpEvent::Connected { .. } => "connected",
            McpEvent::ConnectFailed { .. } => "connect_failed",
            McpEvent::SessionFailed { .. } => "session_failed",
            McpEvent::Disconnected { .. } => "disconnected",
            McpEvent::Health { .. } => "health",
        }
    }
}

/// Broadcast sender for MCP events.
///
/// Clone this to share between components that emit events.
/// Sending to zero receivers silently succeeds.
#[derive(Clone)]
pub struct McpEventSender {
    tx: broadcast::Sender<McpEvent>,
}

impl McpEventSender {
    /// Create a new event sender with the specified buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Send an event to all subscribers.
    ///
    /// Silently ignores errors (no receivers, or lagged receivers).
    pub fn send(&self, event: McpEvent) {
        let _ = self.tx.send(event);
    }

    /// Create a new subscriber to receive events.
    pub fn subscribe(&self) -> McpEventReceiver {
        McpEventReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for McpEventSender {
    fn default() -> Self {
        Self::new(16)
    }
}

/// Receiver for MCP events.
///
/// A receiver that falls behind skips the missed events instead of blocking
/// the sender.
pub struct McpEventReceiver {
    rx: broadcast::Receiver<McpEvent>,
}

impl McpEventReceiver {
    /// Receive the next event, waiting asynchronously.
    ///
    /// Returns `None` once the sender is dropped.
    pub async fn recv(&mut self) -> Option<McpEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive an event without waiting.
    pub fn try_recv(&mut self) -> Option<McpEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_endpoint() {
        let events = [
            McpEvent::Connecting {
                endpoint: "http://a/mcp".into(),
            },
            McpEvent::Connected {
                endpoint: "http://a/mcp".into(),
                session_id: "s1".into(),
            },
            McpEvent::Disconnected {
                endpoint: "http://a/mcp".into(),
            },
            McpEvent::Health {
                endpoint: "http://a/mcp".into(),
                healthy: true,
                tool_count: 4,
            },
        ];
        for event in &events {
            assert_eq!(event.endpoint(), "http://a/mcp");
        }
    }

    #[test]
    fn test_is_error() {
        assert!(!McpEvent::Connecting {
            endpoint: "x".into()
        }
        .is_error());

        assert!(McpEvent::ConnectFailed {
            endpoint: "x".into(),
            error: "refused".into()
        }
        .is_error());

        assert!(McpEvent::SessionFailed {
            endpoint: "x".into(),
            error: "reset".into()
        }
        .is_error());

        assert!(McpEvent::Health {
            endpoint: "x".into(),
            healthy: false,
            tool_count: 0
        }
        .is_error());

        assert!(!McpEvent::Health {
            endpoint: "x".into(),
            healthy: true,
            tool_count: 3
        }
        .is_error());
    }

    #[test]
    fn test_sender_no_receivers() {
        let sender = McpEventSender::new(16);
        sender.send(McpEvent::Disconnected {
            endpoint: "http://localhost".to_string(),
        });
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let sender = McpEventSender::new(16);
        let mut rx1 = sender.subscribe();
        let mut rx2 = sender.subscribe();

        sender.send(McpEvent::Connected {
            endpoint: "http://localhost".to_string(),
            session_id: "abc".to_string(),
        });

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1.kind(), "connected");
        assert_eq!(e2.kind(), "connected");
    }

    #[test]
    fn test_try_recv_empty() {
        let sender = McpEventSender::default();
        let mut receiver = sender.subscribe();
        assert!(receiver.try_recv().is_none());

        sender.send(McpEvent::Connecting {
            endpoint: "http://localhost".to_string(),
        });
        assert_eq!(receiver.try_recv().unwrap().kind(), "connecting");
        assert!(receiver.try_recv().is_none());
    }
}
