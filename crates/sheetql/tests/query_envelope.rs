use serde_json::json;
use sheetql::identifier::{IdentifierScope, SchemaError};
use sheetql::materialize::{IngestionError, MaterializeError};
use sheetql::models::{QUERY_ENVELOPE_SCHEMA_VERSION, QueryEnvelope, QueryEnvelopeCommandFailure};

#[test]
fn ok_envelope_tracks_contract_fields() {
    let envelope = QueryEnvelope::ok(
        "sql",
        json!({
            "columns": ["name"],
            "rows": [{"name": "Camp East Gate"}]
        }),
    )
    .with_meta("row_count", json!(1))
    .with_warning("result_truncated", "truncated to row_cap")
    .with_warning_details(json!({"row_cap": 1}));

    assert!(envelope.ok);
    assert_eq!(envelope.command, "sql");
    assert!(envelope.generated_at_utc.ends_with('Z'));
    assert!(envelope.data.is_some());
    assert_eq!(
        envelope.meta.get("schema_version"),
        Some(&json!(QUERY_ENVELOPE_SCHEMA_VERSION))
    );
    assert_eq!(envelope.meta.get("row_count"), Some(&json!(1)));
    assert_eq!(envelope.warnings.len(), 1);
    assert_eq!(envelope.warnings[0].code, "result_truncated");
    assert_eq!(
        envelope.warnings[0].details.as_ref(),
        Some(&json!({"row_cap": 1}))
    );
    assert!(envelope.error.is_none());
}

#[test]
fn ok_envelope_serializes_required_top_level_fields() {
    let envelope = QueryEnvelope::ok("schema", json!({"tables": []}));
    let encoded = serde_json::to_value(&envelope).expect("envelope should serialize");

    let object = encoded
        .as_object()
        .expect("query envelope JSON should be object");
    assert_eq!(object.get("ok"), Some(&json!(true)));
    assert_eq!(object.get("command"), Some(&json!("schema")));
    assert!(object.contains_key("generated_at_utc"));
    assert!(object.contains_key("data"));
    assert!(object.contains_key("meta"));
    assert!(object.contains_key("warnings"));
    assert!(!object.contains_key("error"));
}

#[test]
fn error_envelope_sets_status_and_error_payload() {
    let envelope = QueryEnvelope::error("sql", "store_missing", "no store found");
    assert!(!envelope.ok);
    assert!(envelope.data.is_none());
    assert!(envelope.warnings.is_empty());

    let error = envelope.error.expect("error payload should be present");
    assert_eq!(error.code, "store_missing");
    assert_eq!(error.message, "no store found");
    assert!(error.details.is_none());
}

#[test]
fn failure_envelope_carries_the_cause_chain() {
    let error = IngestionError::Materialize(MaterializeError::Schema {
        sheet: "???".to_string(),
        source: SchemaError::EmptyIdentifier {
            scope: IdentifierScope::Table,
            raw: "???".to_string(),
        },
    });
    let envelope = QueryEnvelope::failure(
        "ingest",
        "ingest_schema_invalid",
        "workbook ingestion failed",
        &error,
    );

    let encoded = serde_json::to_value(&envelope).expect("envelope should serialize");
    assert_eq!(
        encoded.pointer("/error/details/cause").and_then(|value| value.as_str()),
        Some(
            "sheet `???` cannot be mapped to a table: sheet name `???` normalizes to an empty identifier"
        )
    );
}

#[test]
fn command_failure_display_is_json_envelope_with_code() {
    let envelope = QueryEnvelope::error("restore", "restore_backup_missing", "no backup");
    let failure = QueryEnvelopeCommandFailure::new(envelope);
    assert_eq!(failure.code(), Some("restore_backup_missing"));

    let parsed: serde_json::Value =
        serde_json::from_str(&failure.to_string()).expect("display output should be JSON envelope");
    assert_eq!(parsed.get("ok").and_then(|value| value.as_bool()), Some(false));
    assert_eq!(
        parsed.pointer("/error/code").and_then(|value| value.as_str()),
        Some("restore_backup_missing")
    );
}

#[test]
fn ok_envelope_has_no_failure_code() {
    let failure = QueryEnvelopeCommandFailure::new(QueryEnvelope::ok("schema", json!({})));
    assert_eq!(failure.code(), None);
}
