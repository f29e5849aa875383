//! Typed failures for the MCP client.
//!
//! Transport adapters speak `anyhow`; everything above them converts into
//! these enums so callers can tell an unavailable backend from a bad answer.

use std::time::Duration;
use thiserror::Error;

use super::tools::ToolKind;

/// Opening a session failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The transport could not be opened.
    #[error("failed to connect: {0}")]
    Open(String),

    /// The handshake did not finish in time.
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// The attempt was abandoned by an explicit disconnect.
    #[error("connection attempt aborted by disconnect")]
    Aborted,
}

/// Failure of a facade operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Rejected before any network call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No session could be established.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// An established session failed mid-call.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote call did not answer in time. Handled like a transport error.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The call succeeded but carried none of the expected fields.
    #[error("malformed response from {tool}: {reason}")]
    MalformedResponse { tool: ToolKind, reason: String },

    /// The remote tool ran and reported its own failure.
    #[error("{tool} failed: {message}")]
    ToolError { tool: ToolKind, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_converts() {
        let err: ServiceError = ConnectionError::Aborted.into();
        assert!(matches!(err, ServiceError::Connection(ConnectionError::Aborted)));
        assert_eq!(err.to_string(), "connection attempt aborted by disconnect");
    }

    #[test]
    fn test_display_names_tool() {
        let err = ServiceError::MalformedResponse {
            tool: ToolKind::AskQuestion,
            reason: "no answer".into(),
        };
        assert_eq!(err.to_string(), "malformed response from pdf_qa: no answer");
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(
            ServiceError::Timeout(Duration::from_secs(1)).to_string(),
            "request timed out after 1s"
        );
    }
}
