//! Workbook sheets loaded into store tables with replace semantics.
//!
//! A run plans every sheet (identifiers, collisions, column types) before the
//! store is touched, backs the store up, then drops, recreates and reloads all
//! tables inside one immediate transaction. Any failure rolls every sheet
//! back; the run's bookkeeping row records the outcome, and a failure to
//! record it is returned alongside the load error.

mod infer;

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Transaction, TransactionBehavior, params_from_iter};
use serde::Serialize;
use thiserror::Error;

use crate::config::{AppConfig, IngestConfig, StoreConfig};
use crate::identifier::{IdentifierScope, IdentifierSet, SchemaError, normalize_columns};
use crate::store::{
    IngestRunStatus, SqliteResultExt, StoreError, backup_store, ensure_bookkeeping,
    finalize_ingest_run, insert_ingest_run_started, open_store, quote_identifier,
};
use crate::utils::error_chain;
use crate::utils::time::{elapsed_ms, now_utc_rfc3339, unix_timestamp_nanos};
use crate::workbook::{Sheet, SourceError, Workbook, open_workbook};

pub use infer::{ColumnType, infer_column_type};

pub const INGEST_REPORT_SCHEMA_VERSION: &str = "sheetql.ingest-report.v1";
const SQLITE_MAX_VARIABLES: usize = 32_766;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("sheet `{sheet}` cannot be mapped to a table")]
    Schema {
        sheet: String,
        #[source]
        source: SchemaError,
    },

    #[error(
        "sheet `{sheet}` loaded {actual} rows into table `{table}`, expected {expected}"
    )]
    LoadVerificationFailed {
        sheet: String,
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("failed to back up the store before loading")]
    Backup(#[source] StoreError),

    #[error("failed to load sheet `{sheet}` into table `{table}`")]
    Load {
        sheet: String,
        table: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{failure}; recording failed run `{ingest_run_id}` also failed")]
    RunNotRecorded {
        ingest_run_id: String,
        failure: Box<MaterializeError>,
        #[source]
        bookkeeping: StoreError,
    },
}

impl MaterializeError {
    /// The failure that stopped the run, past any bookkeeping error.
    #[must_use]
    pub fn primary(&self) -> &Self {
        match self {
            Self::RunNotRecorded { failure, .. } => failure.primary(),
            other => other,
        }
    }
}

/// Failure anywhere between opening the workbook and committing its tables.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnPlan {
    pub raw_name: String,
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePlan {
    pub sheet_name: String,
    pub table_name: String,
    pub columns: Vec<ColumnPlan>,
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkbookPlan {
    pub tables: Vec<TablePlan>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub sheet_name: String,
    pub table_name: String,
    pub columns: Vec<ColumnPlan>,
    pub rows_loaded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializeReport {
    pub schema_version: String,
    pub ingest_run_id: String,
    pub workbook_path: String,
    pub store_path: String,
    pub backup_path: Option<String>,
    pub status: IngestRunStatus,
    pub started_at_utc: String,
    pub finished_at_utc: String,
    pub duration_ms: u64,
    pub tables: Vec<TableReport>,
    pub rows_written: usize,
    pub warnings: Vec<String>,
}

/// Plans one sheet's table. `None` for a sheet without a header row.
pub fn plan_sheet(sheet: &Sheet, tables: &mut IdentifierSet) -> Result<Option<TablePlan>, SchemaError> {
    if !sheet.has_header() {
        return Ok(None);
    }

    let table_name = tables.insert(&sheet.name)?;
    let names = normalize_columns(&sheet.columns)?;
    let columns = sheet
        .columns
        .iter()
        .zip(names)
        .enumerate()
        .map(|(index, (raw_name, name))| ColumnPlan {
            raw_name: raw_name.clone(),
            name,
            column_type: infer_column_type(sheet.column_values(index)),
        })
        .collect();

    Ok(Some(TablePlan {
        sheet_name: sheet.name.clone(),
        table_name,
        columns,
        row_count: sheet.row_count(),
    }))
}

/// Plans every sheet, failing on the first identifier problem.
pub fn plan_workbook(workbook: &Workbook) -> Result<WorkbookPlan, MaterializeError> {
    let mut tables = IdentifierSet::new(IdentifierScope::Table);
    let mut plan = WorkbookPlan {
        tables: Vec::new(),
        warnings: Vec::new(),
    };

    for sheet in &workbook.sheets {
        match plan_sheet(sheet, &mut tables) {
            Ok(Some(table)) => plan.tables.push(table),
            Ok(None) => plan
                .warnings
                .push(format!("sheet `{}` has no header row; skipped", sheet.name)),
            Err(source) => {
                return Err(MaterializeError::Schema {
                    sheet: sheet.name.clone(),
                    source,
                });
            }
        }
    }

    Ok(plan)
}

#[derive(Debug, Clone)]
pub struct Materializer {
    store: StoreConfig,
    batch_size: usize,
}

impl Materializer {
    #[must_use]
    pub fn new(store: StoreConfig, ingest: &IngestConfig) -> Self {
        Self {
            store,
            batch_size: ingest.batch_size.max(1),
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.store.clone(), &config.ingest)
    }

    pub fn materialize(&self, workbook: &Workbook) -> Result<MaterializeReport, MaterializeError> {
        let started = Instant::now();
        let started_at_utc = now_utc_rfc3339().map_err(StoreError::from)?;
        let ingest_run_id = build_ingest_run_id();
        let workbook_path = workbook.path.display().to_string();

        let plan = plan_workbook(workbook)?;

        let backed_up = backup_store(&self.store.database, &self.store.backup, self.store.busy_timeout)
            .map_err(MaterializeError::Backup)?;

        let mut connection = open_store(&self.store.database, self.store.busy_timeout)?;
        ensure_bookkeeping(&connection)?;
        insert_ingest_run_started(&connection, &ingest_run_id, &workbook_path, &started_at_utc)?;

        let loaded = self.load_all(&mut connection, workbook, &plan);
        let finished_at_utc = now_utc_rfc3339().map_err(StoreError::from)?;
        let tables = match loaded {
            Ok(tables) => tables,
            Err(error) => {
                let summary = error_chain(&error);
                let recorded = finalize_ingest_run(
                    &connection,
                    &ingest_run_id,
                    IngestRunStatus::Failed,
                    &finished_at_utc,
                    0,
                    0,
                    Some(&summary),
                );
                return Err(match recorded {
                    Ok(()) => error,
                    Err(bookkeeping) => MaterializeError::RunNotRecorded {
                        ingest_run_id,
                        failure: Box::new(error),
                        bookkeeping,
                    },
                });
            }
        };

        let rows_written = tables.iter().map(|table| table.rows_loaded).sum();
        finalize_ingest_run(
            &connection,
            &ingest_run_id,
            IngestRunStatus::Success,
            &finished_at_utc,
            tables.len(),
            rows_written,
            None,
        )?;

        Ok(MaterializeReport {
            schema_version: INGEST_REPORT_SCHEMA_VERSION.to_string(),
            ingest_run_id,
            workbook_path,
            store_path: self.store.database.display().to_string(),
            backup_path: backed_up.then(|| self.store.backup.display().to_string()),
            status: IngestRunStatus::Success,
            started_at_utc,
            finished_at_utc,
            duration_ms: elapsed_ms(started),
            tables,
            rows_written,
            warnings: plan.warnings,
        })
    }

    fn load_all(
        &self,
        connection: &mut rusqlite::Connection,
        workbook: &Workbook,
        plan: &WorkbookPlan,
    ) -> Result<Vec<TableReport>, MaterializeError> {
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .store_context("failed to open materialization transaction")?;

        let mut reports = Vec::with_capacity(plan.tables.len());
        for table in &plan.tables {
            let Some(sheet) = workbook.sheet(&table.sheet_name) else {
                continue;
            };
            let rows_loaded = self.load_table(&tx, table, sheet).map_err(|source| {
                MaterializeError::Load {
                    sheet: table.sheet_name.clone(),
                    table: table.table_name.clone(),
                    source,
                }
            })?;
            if rows_loaded != table.row_count {
                return Err(MaterializeError::LoadVerificationFailed {
                    sheet: table.sheet_name.clone(),
                    table: table.table_name.clone(),
                    expected: table.row_count,
                    actual: rows_loaded,
                });
            }
            reports.push(TableReport {
                sheet_name: table.sheet_name.clone(),
                table_name: table.table_name.clone(),
                columns: table.columns.clone(),
                rows_loaded,
            });
        }

        tx.commit()
            .store_context("failed to commit materialization transaction")?;
        Ok(reports)
    }

    /// Replaces one table and returns its row count as read back after loading.
    fn load_table(&self, tx: &Transaction<'_>, table: &TablePlan, sheet: &Sheet) -> Result<usize, StoreError> {
        let quoted_table = quote_identifier(&table.table_name);
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {quoted_table};\n{}",
            create_table_sql(table)
        ))
        .store_context(format!("failed to recreate table {}", table.table_name))?;

        let column_count = table.columns.len();
        let rows_per_statement = self
            .batch_size
            .min(SQLITE_MAX_VARIABLES / column_count.max(1))
            .max(1);

        for chunk in sheet.rows.chunks(rows_per_statement) {
            let insert_sql = build_insert_sql(&quoted_table, table, chunk.len());
            let mut statement = tx
                .prepare_cached(&insert_sql)
                .store_context(format!("failed to prepare insert into {}", table.table_name))?;
            let values = chunk.iter().flat_map(|row| {
                table
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(index, column)| match row.get(index) {
                        Some(cell) => column.column_type.to_sql_value(cell),
                        None => SqlValue::Null,
                    })
            });
            statement
                .execute(params_from_iter(values))
                .store_context(format!("failed to insert rows into {}", table.table_name))?;
        }

        let count = tx
            .query_row(&format!("SELECT COUNT(*) FROM {quoted_table}"), [], |row| {
                row.get::<usize, i64>(0)
            })
            .store_context(format!("failed to count rows of {}", table.table_name))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

/// Reads the workbook at `path` and materializes it into the configured store.
pub fn ingest_workbook(path: &Path, config: &AppConfig) -> Result<MaterializeReport, IngestionError> {
    let workbook = open_workbook(path)?;
    Ok(Materializer::from_config(config).materialize(&workbook)?)
}

#[must_use]
pub fn create_table_sql(table: &TablePlan) -> String {
    let columns = table
        .columns
        .iter()
        .map(|column| format!("{} {}", quote_identifier(&column.name), column.column_type.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({columns});", quote_identifier(&table.table_name))
}

fn build_insert_sql(quoted_table: &str, table: &TablePlan, rows: usize) -> String {
    let columns = table
        .columns
        .iter()
        .map(|column| quote_identifier(&column.name))
        .collect::<Vec<_>>()
        .join(", ");
    let row_placeholders = format!("({})", vec!["?"; table.columns.len()].join(", "));
    let values = vec![row_placeholders.as_str(); rows].join(", ");
    format!("INSERT INTO {quoted_table} ({columns}) VALUES {values}")
}

fn build_ingest_run_id() -> String {
    format!("ingest-{:016x}", unix_timestamp_nanos())
}

pub fn write_report_artifact(path: &Path, report: &MaterializeReport) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create ingest report artifact directory: {}",
                parent.display()
            )
        })?;
    }
    let encoded =
        serde_json::to_vec_pretty(report).context("failed to encode ingest report artifact")?;
    std::fs::write(path, encoded)
        .with_context(|| format!("failed to write ingest report artifact: {}", path.display()))
}
