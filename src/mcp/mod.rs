//! MCP client for the DocuNote backend
//!
//! Uses rmcp (official Rust MCP SDK) with streamable HTTP transport.

mod connection;
mod error;
mod events;
mod health;
mod normalize;
mod service;
mod tools;
mod transport;

pub use connection::{ConnectionManager, ConnectionStatus, Session};
pub use error::{ConnectionError, ServiceError, ServiceResult};
pub use events::{McpEvent, McpEventReceiver, McpEventSender};
pub use health::{HealthMonitor, HealthMonitorHandle, HealthState};
pub use normalize::{
    normalize_extracted_text, normalize_text, ContentItem, ExtractedText, FieldSpec, JsonObject,
    PageText, RawToolResult, ResultSource, ANSWER_FIELDS, PRECEDENT_FIELDS, URI_FIELDS,
};
pub use service::{HealthReport, McpService, Outcome};
pub use tools::{ToolInfo, ToolKind};
pub use transport::{SessionTransport, StreamableHttpTransport, ToolSession};
