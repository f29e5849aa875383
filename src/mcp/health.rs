//! Periodic health probing.
//!
//! A background task probes the backend until stopped, waiting a full
//! interval after each probe finishes. Each probe reconnects when needed and
//! lists tools; results land on a watch channel and as `McpEvent::Health` on
//! the connection's event stream.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::service::{HealthReport, McpService};

/// Last known health of the backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HealthState {
    /// No probe has finished yet.
    #[default]
    Idle,
    Healthy { tool_count: usize },
    Unhealthy { error: String },
}

impl HealthState {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthState::Healthy { .. })
    }
}

impl From<HealthReport> for HealthState {
    fn from(report: HealthReport) -> Self {
        if report.healthy {
            HealthState::Healthy {
                tool_count: report.tool_count,
            }
        } else {
            HealthState::Unhealthy {
                error: report.error.unwrap_or_else(|| "unhealthy".to_string()),
            }
        }
    }
}

/// Starts health monitoring for a service.
pub struct HealthMonitor;

impl HealthMonitor {
    /// Spawn the probe loop. The first probe runs immediately.
    pub fn spawn(service: Arc<McpService>, interval: Duration) -> HealthMonitorHandle {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(HealthState::Idle);
        let task = tokio::spawn(monitor_loop(service, interval, tx, cancel.clone()));
        HealthMonitorHandle {
            cancel,
            task: Some(task),
            rx,
        }
    }
}

/// Handle to a running monitor. Dropping it stops the monitor.
pub struct HealthMonitorHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    rx: watch::Receiver<HealthState>,
}

impl HealthMonitorHandle {
    /// Latest probe result.
    pub fn state(&self) -> HealthState {
        self.rx.borrow().clone()
    }

    /// Receiver that sees every new probe result.
    pub fn watch(&self) -> watch::Receiver<HealthState> {
        self.rx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop probing and wait for the task to exit. Idempotent.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "health monitor task failed");
            }
        }
    }
}

impl Drop for HealthMonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[instrument(name = "mcp.health_monitor", skip_all, fields(interval_ms = interval.as_millis() as u64))]
async fn monitor_loop(
    service: Arc<McpService>,
    interval: Duration,
    tx: watch::Sender<HealthState>,
    cancel: CancellationToken,
) {
    info!("health monitor started");

    loop {
        let report = tokio::select! {
            _ = cancel.cancelled() => break,
            report = service.probe_health() => report,
        };

        if report.healthy {
            debug!(tool_count = report.tool_count, "health probe ok");
        } else {
            warn!(error = ?report.error, status = %service.status(), "health probe failed");
        }
        tx.send_replace(report.into());

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("health monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::mcp::{ConnectionStatus, McpEvent};
    use crate::testing::{FakeResponse, FakeTransport};

    fn service(transport: &FakeTransport) -> Arc<McpService> {
        let config = ClientConfig {
            request_timeout: Duration::from_millis(100),
            connect_timeout: Duration::from_millis(100),
            ..ClientConfig::default()
        };
        Arc::new(McpService::with_transport(config, Arc::new(transport.clone())))
    }

    async fn next_state(rx: &mut watch::Receiver<HealthState>) -> HealthState {
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("no probe result in time")
            .expect("monitor dropped");
        rx.borrow_and_update().clone()
    }

    #[test]
    fn test_state_from_report() {
        let healthy = HealthState::from(HealthReport {
            healthy: true,
            tool_count: 4,
            error: None,
        });
        assert_eq!(healthy, HealthState::Healthy { tool_count: 4 });
        assert!(healthy.is_healthy());

        let unhealthy = HealthState::from(HealthReport {
            healthy: false,
            tool_count: 0,
            error: None,
        });
        assert!(!unhealthy.is_healthy());
    }

    #[tokio::test]
    async fn test_monitor_connects_and_reports_healthy() {
        let transport = FakeTransport::new();
        let service = service(&transport);
        let mut events = service.subscribe();

        let mut handle = HealthMonitor::spawn(service.clone(), Duration::from_millis(50));
        let mut rx = handle.watch();

        assert_eq!(next_state(&mut rx).await, HealthState::Healthy { tool_count: 4 });
        assert_eq!(service.status(), ConnectionStatus::Connected);

        let mut saw_health = false;
        while let Some(event) = events.try_recv() {
            if let McpEvent::Health { healthy, .. } = event {
                assert!(healthy);
                saw_health = true;
            }
        }
        assert!(saw_health);

        handle.stop().await;
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_health_timeout_marks_error() {
        let transport = FakeTransport::new().respond("list_tools", FakeResponse::Hang);
        let service = service(&transport);
        let mut events = service.subscribe();

        let mut handle = HealthMonitor::spawn(service.clone(), Duration::from_millis(300));
        let mut rx = handle.watch();

        let state = next_state(&mut rx).await;
        assert!(matches!(state, HealthState::Unhealthy { .. }));
        assert_eq!(service.status(), ConnectionStatus::Error);

        let mut saw_session_failed = false;
        while let Some(event) = events.try_recv() {
            saw_session_failed |= matches!(event, McpEvent::SessionFailed { .. });
        }
        assert!(saw_session_failed);

        // The next check waits a full interval after the timed-out one.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(service.status(), ConnectionStatus::Error);
        assert_eq!(transport.open_count(), 1);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_empty_tool_list_is_unhealthy() {
        let transport = FakeTransport::new().with_tools(&[]);
        let service = service(&transport);

        let mut handle = HealthMonitor::spawn(service.clone(), Duration::from_millis(50));
        let mut rx = handle.watch();

        assert!(!next_state(&mut rx).await.is_healthy());
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_cancels_hung_probe() {
        let transport = FakeTransport::new().with_open_delay(Duration::from_secs(60));
        let config = ClientConfig {
            connect_timeout: Duration::from_secs(120),
            ..ClientConfig::default()
        };
        let service = Arc::new(McpService::with_transport(config, Arc::new(transport.clone())));

        let mut handle = HealthMonitor::spawn(service, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(30)).await;

        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop should not wait for the probe");
        assert!(!handle.is_running());
        assert_eq!(handle.state(), HealthState::Idle);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_monitor_recovers_after_outage() {
        let transport = FakeTransport::new().failing_opens(1);
        let service = service(&transport);

        let mut handle = HealthMonitor::spawn(service.clone(), Duration::from_millis(30));
        let mut rx = handle.watch();

        assert!(!next_state(&mut rx).await.is_healthy());
        assert!(next_state(&mut rx).await.is_healthy());
        assert_eq!(transport.open_count(), 2);

        handle.stop().await;
    }
}
