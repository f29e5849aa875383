//! Typed DocuNote operations over the managed connection.
//!
//! Each operation validates its input, makes sure a session exists, issues
//! exactly one remote call under the request timeout, and normalizes the
//! result. Nothing is retried or deduplicated here.

use base64::Engine as _;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::connection::{ConnectionManager, ConnectionStatus, Session};
use super::error::{ServiceError, ServiceResult};
use super::events::{McpEvent, McpEventReceiver};
use super::normalize::{
    normalize_extracted_text, normalize_text, ExtractedText, JsonObject, RawToolResult,
    ANSWER_FIELDS, PRECEDENT_FIELDS, URI_FIELDS,
};
use super::tools::{ToolInfo, ToolKind};
use super::transport::{SessionTransport, StreamableHttpTransport};
use crate::config::ClientConfig;
use crate::precedents::Precedents;

/// Outcome of a health probe.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub tool_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Caller-facing `{success, <key>?, error?}` record.
///
/// The payload key is `data` unless built with [`Outcome::uri`] or
/// [`Outcome::answer`], which serialize it as `uri` and `answer`.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    key: &'static str,
}

impl<T> Outcome<T> {
    fn keyed(key: &'static str, result: ServiceResult<T>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
                key,
            },
            Err(e) => Self {
                success: false,
                data: None,
                error: Some(e.to_string()),
                key,
            },
        }
    }

    /// Record with the payload under `data`.
    pub fn new(result: ServiceResult<T>) -> Self {
        Self::keyed("data", result)
    }

    /// Name the payload is serialized under.
    pub fn key(&self) -> &'static str {
        self.key
    }
}

impl Outcome<String> {
    /// Upload record: `{success, uri?, error?}`.
    pub fn uri(result: ServiceResult<String>) -> Self {
        Self::keyed("uri", result)
    }

    /// Question record: `{success, answer?, error?}`.
    pub fn answer(result: ServiceResult<String>) -> Self {
        Self::keyed("answer", result)
    }
}

impl<T> From<ServiceResult<T>> for Outcome<T> {
    fn from(result: ServiceResult<T>) -> Self {
        Self::new(result)
    }
}

impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 1 + usize::from(self.data.is_some()) + usize::from(self.error.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("success", &self.success)?;
        if let Some(data) = &self.data {
            map.serialize_entry(self.key, data)?;
        }
        if let Some(error) = &self.error {
            map.serialize_entry("error", error)?;
        }
        map.end()
    }
}

/// The DocuNote MCP client.
///
/// Construct one per application and share it (`Arc`) with whatever needs
/// backend access.
pub struct McpService {
    config: ClientConfig,
    connection: Arc<ConnectionManager>,
}

impl McpService {
    /// Client using the streamable HTTP transport.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(StreamableHttpTransport))
    }

    /// Client using a caller-supplied transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn SessionTransport>) -> Self {
        let connection = Arc::new(ConnectionManager::new(
            &config.server_url,
            config.connect_timeout,
            transport,
        ));
        Self { config, connection }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Subscribe to connection events.
    pub fn subscribe(&self) -> McpEventReceiver {
        self.connection.subscribe()
    }

    /// Connect if needed; true when a session is live.
    pub async fn connect(&self) -> bool {
        match self.connection.ensure_connected().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "MCP connect failed");
                false
            }
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await
    }

    /// Upload a PDF; returns its storage URI.
    pub async fn upload_document(&self, filename: &str, bytes: &[u8]) -> ServiceResult<String> {
        require("filename", filename)?;
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(ServiceError::InvalidInput(format!(
                "'{}' is not a PDF file",
                filename
            )));
        }
        if bytes.is_empty() {
            return Err(ServiceError::InvalidInput("file is empty".to_string()));
        }

        let mut args = JsonObject::new();
        args.insert("filename".into(), Value::String(filename.to_string()));
        args.insert(
            "file_data".into(),
            Value::String(base64::engine::general_purpose::STANDARD.encode(bytes)),
        );

        let raw = self.invoke(ToolKind::Upload, args).await?;
        let uri = normalize_text(ToolKind::Upload, &raw, URI_FIELDS)?;
        info!(filename, uri = %uri, "document uploaded");
        Ok(uri)
    }

    /// Read a PDF from disk and upload it.
    pub async fn upload_path(&self, path: impl AsRef<Path>) -> ServiceResult<String> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!("no file name in {}", path.display()))
            })?;
        let bytes = tokio::fs::read(path).await?;
        self.upload_document(filename, &bytes).await
    }

    /// Ask a question about an uploaded document.
    pub async fn ask_question(&self, question: &str, document: &str) -> ServiceResult<String> {
        require("question", question)?;
        require("document handle", document)?;

        let mut args = JsonObject::new();
        args.insert("question".into(), Value::String(question.to_string()));
        args.insert("gs_uri".into(), Value::String(document.to_string()));

        let raw = self.invoke(ToolKind::AskQuestion, args).await?;
        normalize_text(ToolKind::AskQuestion, &raw, ANSWER_FIELDS)
    }

    /// OCR an uploaded document.
    pub async fn extract_text(&self, document: &str) -> ServiceResult<ExtractedText> {
        require("document handle", document)?;

        let mut args = JsonObject::new();
        args.insert("gs_uri".into(), Value::String(document.to_string()));

        let raw = self.invoke(ToolKind::ExtractText, args).await?;
        normalize_extracted_text(&raw)
    }

    /// Search precedents for a clause.
    pub async fn find_precedents(&self, clause: &str, jurisdiction: &str) -> ServiceResult<Precedents> {
        require("clause", clause)?;
        require("jurisdiction", jurisdiction)?;

        let mut args = JsonObject::new();
        args.insert("clause".into(), Value::String(clause.to_string()));
        args.insert("jurisdiction".into(), Value::String(jurisdiction.to_string()));

        let raw = self.invoke(ToolKind::FindPrecedents, args).await?;
        let text = normalize_text(ToolKind::FindPrecedents, &raw, PRECEDENT_FIELDS)?;
        Ok(Precedents::parse(text))
    }

    /// Remote tool catalog.
    pub async fn list_tools(&self) -> ServiceResult<Vec<ToolInfo>> {
        let session = self.connection.ensure_connected().await?;
        self.bounded(&session, ToolKind::HealthCheck, session.list_tools())
            .await
    }

    /// True iff the server lists at least one tool.
    pub async fn check_health(&self) -> bool {
        self.probe_health().await.healthy
    }

    /// One health probe.
    ///
    /// Connects first when not connected; lists tools either way. A failed
    /// connect or listing leaves the connection `Error` and comes back in the
    /// report. A connect aborted by `disconnect` leaves it `Disconnected`.
    pub async fn probe_health(&self) -> HealthReport {
        let mut connect_error = None;
        if self.connection.status() != ConnectionStatus::Connected {
            if let Err(e) = self.connection.ensure_connected().await {
                debug!(error = %e, "health probe could not connect");
                connect_error = Some(ServiceError::from(e));
            }
        }

        let result = match self.connection.session() {
            Some(session) => {
                self.bounded(&session, ToolKind::HealthCheck, session.list_tools())
                    .await
            }
            None => Err(connect_error
                .unwrap_or_else(|| ServiceError::Transport("no live session".to_string()))),
        };

        let report = match result {
            Ok(tools) if !tools.is_empty() => HealthReport {
                healthy: true,
                tool_count: tools.len(),
                error: None,
            },
            Ok(_) => HealthReport {
                healthy: false,
                tool_count: 0,
                error: Some("server lists no tools".to_string()),
            },
            Err(e) => HealthReport {
                healthy: false,
                tool_count: 0,
                error: Some(e.to_string()),
            },
        };

        self.connection
            .events()
            .send(McpEvent::Health {
                endpoint: self.config.server_url.clone(),
                healthy: report.healthy,
                tool_count: report.tool_count,
            });
        report
    }

    /// Issue one tool call on a live session.
    #[instrument(name = "mcp.call_tool", skip(self, args), fields(tool.name = %tool))]
    async fn invoke(&self, tool: ToolKind, args: JsonObject) -> ServiceResult<RawToolResult> {
        let session = self.connection.ensure_connected().await?;
        debug!(session = %session.id(), "calling tool");
        self.bounded(&session, tool, session.call_tool(tool.name(), args))
            .await
    }

    /// Run a remote call under the request timeout; transport failures and
    /// timeouts downgrade the session.
    async fn bounded<T>(
        &self,
        session: &Session,
        tool: ToolKind,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> ServiceResult<T> {
        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                let message = format!("{e:#}");
                warn!(tool = %tool, error = %message, "tool call failed");
                self.connection.mark_failed(session, &message);
                Err(ServiceError::Transport(message))
            }
            Err(_) => {
                warn!(tool = %tool, ?timeout, "tool call timed out");
                self.connection
                    .mark_failed(session, &format!("{} timed out", tool));
                Err(ServiceError::Timeout(timeout))
            }
        }
    }
}

fn require(what: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        Err(ServiceError::InvalidInput(format!("{} must not be empty", what)))
    } else {
        Ok(())
    }
}
