//! Remote tool catalog: the operations the DocuNote backend exposes.

use serde::Serialize;
use std::fmt;

/// Logical remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Store a PDF and get back its storage URI.
    Upload,
    /// Answer a question about an uploaded document.
    AskQuestion,
    /// OCR a stored document.
    ExtractText,
    /// Search case law related to a clause.
    FindPrecedents,
    /// List the remote tools (health probe).
    HealthCheck,
}

impl ToolKind {
    /// Wire name of the tool.
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Upload => "upload_pdf",
            ToolKind::AskQuestion => "pdf_qa",
            ToolKind::ExtractText => "extract_text_from_pdf",
            ToolKind::FindPrecedents => "find_legal_precedents",
            ToolKind::HealthCheck => "list_tools",
        }
    }

    pub fn all() -> [ToolKind; 5] {
        [
            ToolKind::Upload,
            ToolKind::AskQuestion,
            ToolKind::ExtractText,
            ToolKind::FindPrecedents,
            ToolKind::HealthCheck,
        ]
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tool metadata as advertised by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}
