use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{command_failure, print_ok_envelope};
use crate::config::AppConfig;
use crate::introspect::{Introspector, is_internal_table};
use crate::models::QueryEnvelope;
use crate::store::{latest_ingest_run, open_store};

const COMMAND: &str = "schema";

#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {
    /// Also list `sqlite_*` and bookkeeping tables.
    #[arg(long, default_value_t = false)]
    pub include_internal: bool,
}

pub fn run(args: &SchemaArgs, config: &AppConfig) -> Result<()> {
    let database = &config.store.database;
    if !database.exists() {
        return Err(command_failure(
            QueryEnvelope::error(COMMAND, "store_missing", "no store found; run `sheetql ingest` first")
                .with_meta("store_path", json!(database.display().to_string())),
        ));
    }

    let failure = |error: &(dyn std::error::Error + 'static)| {
        command_failure(
            QueryEnvelope::failure(COMMAND, "schema_read_failed", "failed to read store schema", error)
                .with_meta("store_path", json!(database.display().to_string())),
        )
    };

    let mut connection =
        open_store(database, config.store.busy_timeout).map_err(|error| failure(&error))?;
    let introspector = Introspector::new(config.introspection);
    let snapshot = if args.include_internal {
        introspector.snapshot(&mut connection, |_| false)
    } else {
        introspector.snapshot(&mut connection, is_internal_table)
    }
    .map_err(|error| failure(&error))?;

    let last_run = latest_ingest_run(&connection).map_err(|error| failure(&error))?;

    println!(
        "schema: tables={} store={}",
        snapshot.tables.len(),
        database.display()
    );
    print_ok_envelope(COMMAND, &snapshot, |envelope| {
        envelope
            .with_meta("store_path", json!(database.display().to_string()))
            .with_meta("include_internal", json!(args.include_internal))
            .with_meta("table_count", json!(snapshot.tables.len()))
            .with_meta("last_ingest_run", json!(last_run))
    })
}
