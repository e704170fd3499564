use std::time::Instant;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{command_failure, print_ok_envelope};
use crate::config::{AppConfig, DEFAULT_SQL_ROW_CAP, ExecutionConfig};
use crate::execute::{ExecutionResult, Executor};
use crate::models::QueryEnvelope;
use crate::store::open_store;
use crate::utils::time::elapsed_ms;

const COMMAND: &str = "sql";

#[derive(Debug, Clone, Args)]
pub struct SqlArgs {
    #[arg(value_name = "SQL")]
    pub sql: String,

    #[arg(long, default_value_t = DEFAULT_SQL_ROW_CAP)]
    pub row_cap: usize,
}

pub fn run(args: &SqlArgs, config: &AppConfig) -> Result<()> {
    if args.row_cap == 0 {
        return Err(command_failure(
            QueryEnvelope::error(COMMAND, "sql_row_cap_invalid", "row_cap must be greater than zero")
                .with_error_details(json!({ "row_cap": args.row_cap })),
        ));
    }

    let database = &config.store.database;
    if !database.exists() {
        return Err(command_failure(
            QueryEnvelope::error(COMMAND, "store_missing", "no store found; run `sheetql ingest` first")
                .with_meta("store_path", json!(database.display().to_string())),
        ));
    }
    let connection = open_store(database, config.store.busy_timeout).map_err(|error| {
        command_failure(
            QueryEnvelope::failure(COMMAND, "store_unavailable", "unable to open store", &error)
                .with_meta("store_path", json!(database.display().to_string())),
        )
    })?;

    let executor = Executor::new(ExecutionConfig {
        row_cap: Some(args.row_cap),
    });
    let started = Instant::now();
    let result = executor.execute(&connection, &args.sql).map_err(|error| {
        command_failure(
            QueryEnvelope::failure(COMMAND, "sql_execution_failed", "statement execution failed", &error)
                .with_meta("statement", json!(error.statement))
                .with_meta("duration_ms", json!(elapsed_ms(started))),
        )
    })?;
    let duration_ms = elapsed_ms(started);

    match result {
        ExecutionResult::Rows {
            columns,
            rows,
            truncated,
        } => {
            let row_count = rows.len();
            print_ok_envelope(COMMAND, &json!({ "columns": columns, "rows": rows }), |envelope| {
                let envelope = envelope
                    .with_meta("row_count", json!(row_count))
                    .with_meta("truncated", json!(truncated))
                    .with_meta("row_cap", json!(args.row_cap))
                    .with_meta("duration_ms", json!(duration_ms));
                if truncated {
                    envelope
                        .with_warning("result_truncated", "truncated to row_cap")
                        .with_warning_details(json!({ "row_cap": args.row_cap }))
                } else {
                    envelope
                }
            })
        }
        ExecutionResult::NoResults { affected_rows } => print_ok_envelope(
            COMMAND,
            &json!({ "rows": null, "affected_rows": affected_rows }),
            |envelope| envelope.with_meta("duration_ms", json!(duration_ms)),
        ),
    }
}
