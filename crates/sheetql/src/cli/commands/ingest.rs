use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{command_failure, print_ok_envelope};
use crate::config::{AppConfig, resolve_input_path};
use crate::materialize::{IngestionError, MaterializeError, Materializer, write_report_artifact};
use crate::models::QueryEnvelope;
use crate::workbook::{SourceError, open_workbook};

const COMMAND: &str = "ingest";

#[derive(Debug, Clone, Args)]
pub struct IngestArgs {
    #[arg(value_name = "WORKBOOK")]
    pub workbook: PathBuf,

    /// Rows per INSERT statement.
    #[arg(long, value_name = "ROWS")]
    pub batch_size: Option<usize>,
}

pub fn run(args: &IngestArgs, config: &AppConfig) -> Result<()> {
    let workbook_path = resolve_input_path(&args.workbook, &config.paths)?;
    let mut ingest_config = config.ingest.clone();
    if let Some(batch_size) = args.batch_size {
        ingest_config.batch_size = batch_size;
    }
    println!(
        "ingest: start workbook={} store={} batch_size={}",
        workbook_path.display(),
        config.store.database.display(),
        ingest_config.batch_size
    );

    println!("ingest: stage read_workbook");
    let workbook = open_workbook(&workbook_path)
        .map_err(|error| ingestion_failure(IngestionError::from(error), config))?;
    println!(
        "ingest: checkpoint workbook_read sheets={} rows={}",
        workbook.sheets.len(),
        workbook.sheets.iter().map(|sheet| sheet.row_count()).sum::<usize>()
    );

    println!("ingest: stage materialize");
    let report = Materializer::new(config.store.clone(), &ingest_config)
        .materialize(&workbook)
        .map_err(|error| ingestion_failure(IngestionError::from(error), config))?;
    for table in &report.tables {
        println!(
            "ingest: table sheet={:?} table={} columns={} rows={}",
            table.sheet_name,
            table.table_name,
            table.columns.len(),
            table.rows_loaded
        );
    }
    for warning in &report.warnings {
        println!("ingest: warning {warning}");
    }
    println!(
        "ingest: complete run={} tables={} rows={} duration_ms={}",
        report.ingest_run_id,
        report.tables.len(),
        report.rows_written,
        report.duration_ms
    );

    println!("ingest: stage write_report");
    let artifact_path = &ingest_config.report_path;
    if let Err(error) = write_report_artifact(artifact_path, &report) {
        return Err(command_failure(
            QueryEnvelope::error(
                COMMAND,
                "ingest_report_write_failed",
                "failed to write ingest report artifact",
            )
            .with_meta("artifact_path", json!(artifact_path.display().to_string()))
            .with_error_details(json!({ "cause": format!("{error:#}") })),
        ));
    }
    println!(
        "ingest: artifacts report={} backup={}",
        artifact_path.display(),
        report.backup_path.as_deref().unwrap_or("<none>")
    );
    println!("ingest: next `sheetql ask \"<question>\"`");

    print_ok_envelope(COMMAND, &report, |envelope| {
        let envelope = envelope
            .with_meta("artifact_path", json!(artifact_path.display().to_string()))
            .with_meta("store_path", json!(config.store.database.display().to_string()));
        report.warnings.iter().fold(envelope, |envelope, warning| {
            envelope.with_warning("sheet_skipped", warning.clone())
        })
    })
}

/// Stable envelope code for an ingestion failure.
#[must_use]
pub fn ingestion_error_code(error: &IngestionError) -> &'static str {
    match error {
        IngestionError::Source(SourceError::NotFound { .. }) => "ingest_source_not_found",
        IngestionError::Source(_) => "ingest_source_unreadable",
        IngestionError::Materialize(error) => match error.primary() {
            MaterializeError::Schema { .. } => "ingest_schema_invalid",
            MaterializeError::LoadVerificationFailed { .. } | MaterializeError::Load { .. } => {
                "ingest_load_failed"
            }
            MaterializeError::Backup(_) => "ingest_backup_failed",
            MaterializeError::Store(_) | MaterializeError::RunNotRecorded { .. } => {
                "ingest_store_failed"
            }
        },
    }
}

fn ingestion_failure(error: IngestionError, config: &AppConfig) -> anyhow::Error {
    command_failure(
        QueryEnvelope::failure(
            COMMAND,
            ingestion_error_code(&error),
            "workbook ingestion failed",
            &error,
        )
        .with_meta("store_path", json!(config.store.database.display().to_string())),
    )
}
