//! Response normalization for tool results.
//!
//! A tool result can carry its payload in three places: flat fields on the
//! result, an ordered content list, or a nested structured object. Lookups
//! always walk them in [`ResultSource::PRIORITY`] order and the first match
//! wins. When nothing matches the operation fails; an empty value is never
//! handed back as if it were an answer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use super::error::{ServiceError, ServiceResult};
use super::tools::ToolKind;

/// JSON object as used for tool arguments and result parts.
pub type JsonObject = Map<String, Value>;

/// One entry of a result's content list.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    /// Plain text; used directly as the payload.
    Text(String),
    /// Object searched for named fields.
    Object(JsonObject),
}

impl ContentItem {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(ContentItem::Text(text)),
            Value::Object(map) => Some(Self::from_object(map)),
            _ => None,
        }
    }

    /// MCP text blocks become `Text`, unless the text is itself a JSON object
    /// (servers serialize dict returns that way), in which case it is unpacked.
    fn from_object(map: JsonObject) -> Self {
        let text = match (map.get("type").and_then(Value::as_str), map.get("text")) {
            (Some("text"), Some(Value::String(text))) => Some(text.clone()),
            _ => None,
        };

        match text {
            Some(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(inner)) => ContentItem::Object(inner),
                _ => ContentItem::Text(text),
            },
            None => ContentItem::Object(map),
        }
    }
}

/// Where a payload was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    TopLevel,
    Content,
    Structured,
}

impl ResultSource {
    /// Lookup order, highest priority first.
    pub const PRIORITY: [ResultSource; 3] = [
        ResultSource::TopLevel,
        ResultSource::Content,
        ResultSource::Structured,
    ];
}

/// Field names an operation accepts for its payload.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub names: &'static [&'static str],
    /// Also accept generic `text` / `content` fields on content objects.
    pub text_fallback: bool,
}

pub const URI_FIELDS: FieldSpec = FieldSpec {
    names: &["gcs_uri", "uri", "url"],
    text_fallback: false,
};

pub const ANSWER_FIELDS: FieldSpec = FieldSpec {
    names: &["answer", "response"],
    text_fallback: true,
};

pub const PRECEDENT_FIELDS: FieldSpec = FieldSpec {
    names: &["precedents", "precedents_text"],
    text_fallback: true,
};

const GENERIC_TEXT: &[&str] = &["text", "content"];
const ERROR_FIELDS: &[&str] = &["error"];

/// Shape-tolerant view of a raw tool result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawToolResult {
    /// Top-level fields other than content, structured payload and flags.
    pub fields: JsonObject,
    pub content: Vec<ContentItem>,
    pub structured: Option<JsonObject>,
    /// The server flagged the call as failed.
    pub is_error: bool,
}

impl RawToolResult {
    /// Build from any JSON value a server (or fake) might return.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_object(map),
            Value::Array(items) => Self {
                content: items.into_iter().filter_map(ContentItem::from_value).collect(),
                ..Default::default()
            },
            Value::String(text) => Self {
                content: vec![ContentItem::Text(text)],
                ..Default::default()
            },
            _ => Self::default(),
        }
    }

    fn from_object(mut map: JsonObject) -> Self {
        let content = match map.remove("content") {
            Some(Value::Array(items)) => items.into_iter().filter_map(ContentItem::from_value).collect(),
            Some(other) => ContentItem::from_value(other).into_iter().collect(),
            None => Vec::new(),
        };

        let structured = ["structuredContent", "structured_content"]
            .iter()
            .find_map(|key| map.remove(*key))
            .and_then(|value| match value {
                Value::Object(obj) => Some(obj),
                _ => None,
            });

        let is_error = ["isError", "is_error"]
            .iter()
            .filter_map(|key| map.remove(*key))
            .any(|value| value.as_bool() == Some(true));

        map.remove("_meta");

        Self {
            fields: map,
            content,
            structured,
            is_error,
        }
    }

    /// First string payload matching `spec`, walking sources in priority order.
    pub fn find_text(&self, spec: FieldSpec) -> Option<(ResultSource, String)> {
        ResultSource::PRIORITY.into_iter().find_map(|source| {
            let found = match source {
                ResultSource::TopLevel => string_field(&self.fields, spec.names),
                ResultSource::Content => self.content.iter().find_map(|item| match item {
                    ContentItem::Text(text) => non_empty(text),
                    ContentItem::Object(obj) => string_field(obj, spec.names).or_else(|| {
                        if spec.text_fallback {
                            string_field(obj, GENERIC_TEXT)
                        } else {
                            None
                        }
                    }),
                }),
                ResultSource::Structured => self
                    .structured
                    .as_ref()
                    .and_then(|obj| string_field(obj, spec.names)),
            };
            found.map(|value| (source, value))
        })
    }

    /// First object carrying `key`, walking sources in priority order.
    pub fn find_object(&self, key: &str) -> Option<(ResultSource, JsonObject)> {
        ResultSource::PRIORITY.into_iter().find_map(|source| {
            let found = match source {
                ResultSource::TopLevel => self.fields.contains_key(key).then(|| self.fields.clone()),
                ResultSource::Content => self.content.iter().find_map(|item| match item {
                    ContentItem::Object(obj) if obj.contains_key(key) => Some(obj.clone()),
                    _ => None,
                }),
                ResultSource::Structured => self
                    .structured
                    .as_ref()
                    .filter(|obj| obj.contains_key(key))
                    .cloned(),
            };
            found.map(|obj| (source, obj))
        })
    }

    /// An explicit `error` field anywhere in the result.
    pub fn error_message(&self) -> Option<String> {
        ResultSource::PRIORITY.into_iter().find_map(|source| match source {
            ResultSource::TopLevel => string_field(&self.fields, ERROR_FIELDS),
            ResultSource::Content => self.content.iter().find_map(|item| match item {
                ContentItem::Object(obj) => string_field(obj, ERROR_FIELDS),
                ContentItem::Text(_) => None,
            }),
            ResultSource::Structured => self
                .structured
                .as_ref()
                .and_then(|obj| string_field(obj, ERROR_FIELDS)),
        })
    }

    fn joined_text(&self) -> Option<String> {
        let text = self
            .content
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text(text) => Some(text.as_str()),
                ContentItem::Object(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        non_empty(&text)
    }
}

fn non_empty(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn string_field(obj: &JsonObject, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match obj.get(*name) {
        Some(Value::String(value)) => non_empty(value),
        _ => None,
    })
}

/// OCR output of `extract_text_from_pdf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub full_text: String,
    #[serde(default)]
    pub pages: Vec<PageText>,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Filled from `pages` when the server omits it.
    #[serde(default)]
    pub page_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
}

fn check_remote_error(tool: ToolKind, raw: &RawToolResult) -> ServiceResult<()> {
    if !raw.is_error {
        return Ok(());
    }
    let message = raw
        .error_message()
        .or_else(|| raw.joined_text())
        .unwrap_or_else(|| "remote tool reported an error".to_string());
    Err(ServiceError::ToolError { tool, message })
}

fn missing(tool: ToolKind, raw: &RawToolResult, reason: String) -> ServiceError {
    match raw.error_message() {
        Some(message) => ServiceError::ToolError { tool, message },
        None => ServiceError::MalformedResponse { tool, reason },
    }
}

/// Extract a string payload (URI, answer, precedents text).
pub fn normalize_text(tool: ToolKind, raw: &RawToolResult, spec: FieldSpec) -> ServiceResult<String> {
    check_remote_error(tool, raw)?;
    match raw.find_text(spec) {
        Some((source, value)) => {
            trace!(tool = %tool, ?source, "normalized response");
            Ok(value)
        }
        None => Err(missing(
            tool,
            raw,
            format!("none of {:?} present", spec.names),
        )),
    }
}

/// Extract the structured OCR payload.
pub fn normalize_extracted_text(raw: &RawToolResult) -> ServiceResult<ExtractedText> {
    let tool = ToolKind::ExtractText;
    check_remote_error(tool, raw)?;

    let (source, obj) = raw
        .find_object("full_text")
        .ok_or_else(|| missing(tool, raw, "no object carrying full_text".to_string()))?;
    trace!(tool = %tool, ?source, "normalized response");

    let mut extracted: ExtractedText = serde_json::from_value(Value::Object(obj))
        .map_err(|e| ServiceError::MalformedResponse {
            tool,
            reason: e.to_string(),
        })?;
    if extracted.page_count == 0 {
        extracted.page_count = extracted.pages.len();
    }
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawToolResult {
        RawToolResult::from_value(value)
    }

    #[test]
    fn test_answer_from_content_text_field() {
        let result = raw(json!({
            "content": [{"text": "The agreement terminates on 30 days notice."}]
        }));
        let answer = normalize_text(ToolKind::AskQuestion, &result, ANSWER_FIELDS).unwrap();
        assert_eq!(answer, "The agreement terminates on 30 days notice.");
    }

    #[test]
    fn test_uri_from_structured_content() {
        let result = raw(json!({"structuredContent": {"gcs_uri": "gs://bucket/doc.pdf"}}));
        let uri = normalize_text(ToolKind::Upload, &result, URI_FIELDS).unwrap();
        assert_eq!(uri, "gs://bucket/doc.pdf");
    }

    #[test]
    fn test_top_level_wins_over_content() {
        let result = raw(json!({
            "answer": "top level",
            "content": [{"answer": "from content"}],
            "structuredContent": {"answer": "from structured"}
        }));
        assert_eq!(
            result.find_text(ANSWER_FIELDS),
            Some((ResultSource::TopLevel, "top level".to_string()))
        );
    }

    #[test]
    fn test_content_wins_over_structured() {
        let result = raw(json!({
            "content": [{"type": "text", "text": "gs://content/doc.pdf"}],
            "structuredContent": {"uri": "gs://structured/doc.pdf"}
        }));
        assert_eq!(
            result.find_text(URI_FIELDS),
            Some((ResultSource::Content, "gs://content/doc.pdf".to_string()))
        );
    }

    #[test]
    fn test_content_scanned_in_order() {
        let result = raw(json!({
            "content": [
                {"type": "image", "data": "abc"},
                {"answer": "second"},
                "third"
            ]
        }));
        let answer = normalize_text(ToolKind::AskQuestion, &result, ANSWER_FIELDS).unwrap();
        assert_eq!(answer, "second");
    }

    #[test]
    fn test_uri_ignores_generic_text_field_on_objects() {
        let result = raw(json!({"content": [{"text": "not a uri field"}]}));
        let err = normalize_text(ToolKind::Upload, &result, URI_FIELDS).unwrap_err();
        assert!(matches!(err, ServiceError::MalformedResponse { tool: ToolKind::Upload, .. }));
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let result = raw(json!({
            "message": "ok",
            "content": [{"kind": "note"}],
            "structuredContent": {"status": "done"}
        }));
        let err = normalize_text(ToolKind::AskQuestion, &result, ANSWER_FIELDS).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::MalformedResponse { tool: ToolKind::AskQuestion, .. }
        ));
    }

    #[test]
    fn test_empty_strings_do_not_match() {
        let result = raw(json!({"answer": "", "content": ["   "]}));
        assert!(result.find_text(ANSWER_FIELDS).is_none());
    }

    #[test]
    fn test_json_text_block_is_unpacked() {
        let result = raw(json!({
            "content": [{"type": "text", "text": "{\"message\": \"File uploaded\", \"gcs_uri\": \"gs://b/x.pdf\"}"}]
        }));
        let uri = normalize_text(ToolKind::Upload, &result, URI_FIELDS).unwrap();
        assert_eq!(uri, "gs://b/x.pdf");
    }

    #[test]
    fn test_error_field_reported_as_tool_error() {
        let result = raw(json!({
            "content": [{"type": "text", "text": "{\"error\": \"Invalid file type\"}"}]
        }));
        let err = normalize_text(ToolKind::Upload, &result, URI_FIELDS).unwrap_err();
        match err {
            ServiceError::ToolError { tool, message } => {
                assert_eq!(tool, ToolKind::Upload);
                assert_eq!(message, "Invalid file type");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_error_flag_short_circuits() {
        let result = raw(json!({
            "isError": true,
            "content": [{"type": "text", "text": "bucket not found"}]
        }));
        let err = normalize_text(ToolKind::AskQuestion, &result, ANSWER_FIELDS).unwrap_err();
        assert!(
            matches!(err, ServiceError::ToolError { ref message, .. } if message == "bucket not found")
        );
    }

    #[test]
    fn test_plain_string_result() {
        let result = raw(json!("gs://bucket/plain.pdf"));
        let uri = normalize_text(ToolKind::Upload, &result, URI_FIELDS).unwrap();
        assert_eq!(uri, "gs://bucket/plain.pdf");
    }

    #[test]
    fn test_extracted_text_fills_page_count() {
        let result = raw(json!({
            "structuredContent": {
                "full_text": "Page one\nPage two",
                "pages": [
                    {"page_number": 1, "text": "Page one"},
                    {"page_number": 2, "text": "Page two"}
                ],
                "confidence": 0.97
            }
        }));
        let extracted = normalize_extracted_text(&result).unwrap();
        assert_eq!(extracted.page_count, 2);
        assert_eq!(extracted.pages[1].text, "Page two");
        assert_eq!(extracted.confidence, Some(0.97));
    }

    #[test]
    fn test_extracted_text_bad_shape() {
        let result = raw(json!({"full_text": 42}));
        let err = normalize_extracted_text(&result).unwrap_err();
        assert!(matches!(err, ServiceError::MalformedResponse { .. }));
    }

    #[test]
    fn test_extracted_text_missing() {
        let result = raw(json!({"content": ["just words"]}));
        assert!(normalize_extracted_text(&result).is_err());
    }
}
