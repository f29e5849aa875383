//! docunote - MCP client for the DocuNote document analysis backend
//!
//! This library provides the managed connection and typed tool calls.
//! The CLI is in `main.rs`.

pub mod config;
pub mod mcp;
pub mod paths;
pub mod precedents;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
