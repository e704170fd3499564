use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use crate::execute::{ExecutionResult, ResultRow};

/// Where a question failed along the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Ingestion,
    Translation,
    Execution,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingestion => "ingestion",
            Self::Translation => "translation",
            Self::Execution => "execution",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuerySuccess {
    pub generated_query: String,

    /// `null` when the statement declares no output columns.
    #[schemars(with = "Option<Vec<BTreeMap<String, Value>>>")]
    pub rows: Option<Vec<ResultRow>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryFailure {
    pub error_kind: ErrorKind,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_query: Option<String>,
}

/// The answer to one question, success or classified failure.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QueryResponse {
    Success(QuerySuccess),
    Error(QueryFailure),
}

impl QueryResponse {
    #[must_use]
    pub fn from_execution(generated_query: String, result: ExecutionResult) -> Self {
        let success = match result {
            ExecutionResult::Rows {
                rows, truncated, ..
            } => QuerySuccess {
                generated_query,
                rows: Some(rows),
                affected_rows: None,
                truncated,
            },
            ExecutionResult::NoResults { affected_rows } => QuerySuccess {
                generated_query,
                rows: None,
                affected_rows: Some(affected_rows),
                truncated: false,
            },
        };
        Self::Success(success)
    }

    #[must_use]
    pub fn error(error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error(QueryFailure {
            error_kind,
            message: message.into(),
            generated_query: None,
        })
    }

    #[must_use]
    pub fn with_generated_query(mut self, statement: impl Into<String>) -> Self {
        match &mut self {
            Self::Success(success) => success.generated_query = statement.into(),
            Self::Error(failure) => failure.generated_query = Some(statement.into()),
        }
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Error(failure) => Some(failure.error_kind),
        }
    }

    #[must_use]
    pub fn generated_query(&self) -> Option<&str> {
        match self {
            Self::Success(success) => Some(success.generated_query.as_str()),
            Self::Error(failure) => failure.generated_query.as_deref(),
        }
    }
}

pub fn json_schema() -> serde_json::Result<Value> {
    let schema = schemars::schema_for!(QueryResponse);
    serde_json::to_value(schema)
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, QueryResponse, json_schema};
    use crate::execute::ExecutionResult;
    use serde_json::json;

    #[test]
    fn no_result_statements_serialize_null_rows() {
        let response = QueryResponse::from_execution(
            "DELETE FROM cameras".to_string(),
            ExecutionResult::NoResults { affected_rows: 4 },
        );
        assert_eq!(
            serde_json::to_value(&response).expect("response should encode"),
            json!({
                "status": "success",
                "generatedQuery": "DELETE FROM cameras",
                "rows": null,
                "affectedRows": 4
            })
        );
    }

    #[test]
    fn failures_carry_kind_message_and_optional_statement() {
        let response = QueryResponse::error(ErrorKind::Execution, "no such table: nope")
            .with_generated_query("SELECT * FROM nope");
        insta::assert_snapshot!(
            serde_json::to_string(&response).expect("response should encode"),
            @r#"{"status":"error","errorKind":"execution","message":"no such table: nope","generatedQuery":"SELECT * FROM nope"}"#
        );

        let bare = QueryResponse::error(ErrorKind::Translation, "service down");
        let encoded = serde_json::to_value(&bare).expect("response should encode");
        assert!(encoded.get("generatedQuery").is_none());
        assert_eq!(bare.error_kind(), Some(ErrorKind::Translation));
    }

    #[test]
    fn schema_describes_both_outcomes() {
        let schema = json_schema().expect("schema should encode");
        let encoded = schema.to_string();
        for field in ["generatedQuery", "errorKind", "affectedRows", "ingestion", "execution"] {
            assert!(encoded.contains(field), "schema should mention {field}");
        }
    }
}
