use std::collections::HashSet;

use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Value, json};
use thiserror::Error;

use crate::config::ExecutionConfig;

#[derive(Debug, Error)]
#[error("failed to execute statement")]
pub struct ExecutionError {
    pub statement: String,
    #[source]
    pub source: rusqlite::Error,
}

/// One result row as (column, value) pairs in the statement's column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow(Vec<(String, Value)>);

impl ResultRow {
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in &self.0 {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Rows {
        columns: Vec<String>,
        rows: Vec<ResultRow>,
        truncated: bool,
    },
    /// The statement declares no output columns.
    NoResults { affected_rows: u64 },
}

impl ExecutionResult {
    #[must_use]
    pub fn row_count(&self) -> usize {
        match self {
            Self::Rows { rows, .. } => rows.len(),
            Self::NoResults { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Executor {
    row_cap: Option<usize>,
}

impl Executor {
    #[must_use]
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            row_cap: config.row_cap,
        }
    }

    /// Runs `statement` once, unchanged. Text holding more than one statement
    /// is rejected by the engine before anything runs.
    pub fn execute(
        &self,
        connection: &Connection,
        statement: &str,
    ) -> Result<ExecutionResult, ExecutionError> {
        let fail = |source| ExecutionError {
            statement: statement.to_string(),
            source,
        };

        let mut prepared = connection.prepare(statement).map_err(fail)?;
        if prepared.column_count() == 0 {
            let affected = prepared.execute([]).map_err(fail)?;
            return Ok(ExecutionResult::NoResults {
                affected_rows: affected as u64,
            });
        }

        let columns = disambiguate_columns(
            prepared
                .column_names()
                .iter()
                .map(ToString::to_string)
                .collect(),
        );

        let mut rows = prepared.query([]).map_err(fail)?;
        let mut result_rows = Vec::new();
        let mut truncated = false;
        while let Some(row) = rows.next().map_err(fail)? {
            if self.row_cap.is_some_and(|cap| result_rows.len() >= cap) {
                truncated = true;
                break;
            }

            let mut record = Vec::with_capacity(columns.len());
            for (index, column) in columns.iter().enumerate() {
                let value = row.get::<usize, SqlValue>(index).map_err(fail)?;
                record.push((column.clone(), json_value_from_sql(value)));
            }
            result_rows.push(ResultRow(record));
        }

        Ok(ExecutionResult::Rows {
            columns,
            rows: result_rows,
            truncated,
        })
    }
}

/// Repeated output names get `_2`, `_3`, ... so every row is a true mapping.
#[must_use]
pub fn disambiguate_columns(names: Vec<String>) -> Vec<String> {
    let mut used = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut suffix = 1usize;
            while used.contains(&candidate) {
                suffix += 1;
                candidate = format!("{name}_{suffix}");
            }
            used.insert(candidate.clone());
            candidate
        })
        .collect()
}

pub(crate) fn json_value_from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(value) => json!(value),
        SqlValue::Real(value) => json!(value),
        SqlValue::Text(value) => json!(value),
        SqlValue::Blob(value) => json!(encode_blob_hex(&value)),
    }
}

fn encode_blob_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[(byte >> 4) as usize] as char);
        output.push(HEX[(byte & 0x0f) as usize] as char);
    }
    output
}
