pub mod ask;
pub mod contract;
pub mod ingest;
pub mod inspect;
pub mod restore;
pub mod schema;
pub mod sql;

use anyhow::Error;
use serde::Serialize;
use serde_json::json;

use crate::models::{QueryEnvelope, QueryEnvelopeCommandFailure};

/// Envelope error codes that mean the workbook could not be ingested.
pub const INGESTION_FAILURE_CODES: &[&str] = &[
    "ingest_source_not_found",
    "ingest_source_unreadable",
    "ingest_schema_invalid",
    "ingest_load_failed",
    "ingest_backup_failed",
    "ingest_store_failed",
    "store_missing",
];

/// Envelope error codes that mean a statement was rejected by the store.
pub const QUERY_FAILURE_CODES: &[&str] = &["sql_execution_failed"];

pub(crate) fn command_failure(envelope: QueryEnvelope) -> Error {
    Error::new(QueryEnvelopeCommandFailure::new(envelope))
}

/// Encodes `data` and prints the ok envelope as one JSON line.
pub(crate) fn print_ok_envelope(
    command: &str,
    data: &impl Serialize,
    decorate: impl FnOnce(QueryEnvelope) -> QueryEnvelope,
) -> anyhow::Result<()> {
    let data = serde_json::to_value(data).map_err(|error| {
        command_failure(
            QueryEnvelope::error(command, "response_encode_failed", "failed to encode response")
                .with_error_details(json!({ "cause": error.to_string() })),
        )
    })?;
    println!("{}", decorate(QueryEnvelope::ok(command, data)).to_line());
    Ok(())
}
