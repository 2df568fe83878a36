use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const QUERY_ROUTE: &str = "/query";
pub const SCHEMA_ROUTE: &str = "/schema";
pub const HEALTH_ROUTE: &str = "/health";

pub const MISSING_QUERY_MESSAGE: &str = "Query string is required.";
pub const INTERNAL_FAULT_MESSAGE: &str = "Internal server error.";

/// Stable error kinds exposed to clients. The variant name is the wire value.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingQuery,
    InvalidExpression,
    SynthesisTimeout,
    SynthesisFailed,
    EvaluationError,
    ResultTooLarge,
    InternalFault,
}

impl ErrorKind {
    pub const fn status_code(self) -> u16 {
        match self {
            Self::MissingQuery => 400,
            Self::EvaluationError | Self::ResultTooLarge => 422,
            Self::InvalidExpression | Self::SynthesisTimeout | Self::SynthesisFailed => 502,
            Self::InternalFault => 500,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingQuery => "MissingQuery",
            Self::InvalidExpression => "InvalidExpression",
            Self::SynthesisTimeout => "SynthesisTimeout",
            Self::SynthesisFailed => "SynthesisFailed",
            Self::EvaluationError => "EvaluationError",
            Self::ResultTooLarge => "ResultTooLarge",
            Self::InternalFault => "InternalFault",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /query`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
}

impl QueryRequest {
    /// Parses a raw request body. Bodies that are not a JSON object with a
    /// string `query` yield `None`; callers treat that the same as a missing
    /// question.
    pub fn from_slice(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// The question as sent, if it has any non-whitespace content.
    pub fn question(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.trim().is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QueryResponse {
    pub query: String,
    pub result: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub error: String,
    pub kind: ErrorKind,
}

impl ErrorEnvelope {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            kind,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
}

/// Body of `GET /schema`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SchemaResponse {
    pub rows: usize,
    pub columns: Vec<ColumnInfo>,
    pub preview: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn question_requires_non_blank_string() {
        let parsed = QueryRequest::from_slice(br#"{"query":"how many rows?"}"#).unwrap();
        assert_eq!(parsed.question(), Some("how many rows?"));

        let blank = QueryRequest::from_slice(br#"{"query":"   "}"#).unwrap();
        assert_eq!(blank.question(), None);

        let missing = QueryRequest::from_slice(b"{}").unwrap();
        assert_eq!(missing.question(), None);

        assert!(QueryRequest::from_slice(br#"{"query": 5}"#).is_none());
        assert!(QueryRequest::from_slice(b"not json").is_none());
    }

    #[test]
    fn error_envelope_uses_kind_names_on_the_wire() {
        let envelope = ErrorEnvelope::new(ErrorKind::MissingQuery, MISSING_QUERY_MESSAGE);
        let raw = serialize_json(&envelope).unwrap();
        assert_eq!(
            raw,
            r#"{"error":"Query string is required.","kind":"MissingQuery"}"#
        );
    }

    #[test]
    fn status_codes_follow_error_taxonomy() {
        assert_eq!(ErrorKind::MissingQuery.status_code(), 400);
        assert_eq!(ErrorKind::EvaluationError.status_code(), 422);
        assert_eq!(ErrorKind::ResultTooLarge.status_code(), 422);
        assert_eq!(ErrorKind::InvalidExpression.status_code(), 502);
        assert_eq!(ErrorKind::SynthesisTimeout.status_code(), 502);
        assert_eq!(ErrorKind::InternalFault.status_code(), 500);
    }
}
