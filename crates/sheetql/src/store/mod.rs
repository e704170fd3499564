use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::backup::Progress;
use rusqlite::{Connection, MAIN_DB, OptionalExtension, params};
use serde::Serialize;
use thiserror::Error;

pub const STORE_SCHEMA_VERSION: &str = "sheetql.store.v1";
pub const INGEST_RUNS_TABLE: &str = "sheetql_ingest_runs";
pub const SCHEMA_META_TABLE: &str = "sheetql_schema_meta";
pub const BOOKKEEPING_TABLES: &[&str] = &[INGEST_RUNS_TABLE, SCHEMA_META_TABLE];
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_INGEST_RUNS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sheetql_ingest_runs (
    ingest_run_id TEXT NOT NULL PRIMARY KEY,
    workbook_path TEXT NOT NULL,
    started_at_utc TEXT NOT NULL,
    finished_at_utc TEXT,
    status TEXT NOT NULL,
    tables_written INTEGER NOT NULL DEFAULT 0,
    rows_written INTEGER NOT NULL DEFAULT 0,
    error_summary TEXT,
    CHECK (status IN ('running', 'success', 'failed')),
    CHECK (tables_written >= 0),
    CHECK (rows_written >= 0)
);
"#;

const CREATE_META_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sheetql_schema_meta (
    schema_version TEXT NOT NULL,
    applied_at_utc TEXT NOT NULL
);
"#;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create store directory: {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open store: {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{action}")]
    Sqlite {
        action: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("no backup found at {}", path.display())]
    MissingBackup { path: PathBuf },

    #[error("{field} exceeds sqlite INTEGER range")]
    IntegerRange { field: &'static str },

    #[error("failed to format store timestamp")]
    Timestamp(#[from] time::error::Format),
}

pub(crate) trait SqliteResultExt<T> {
    fn store_context(self, action: impl Into<String>) -> Result<T, StoreError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn store_context(self, action: impl Into<String>) -> Result<T, StoreError> {
        self.map_err(|source| StoreError::Sqlite {
            action: action.into(),
            source,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestRunStatus {
    Running,
    Success,
    Failed,
}

impl IngestRunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "success" => Self::Success,
            "failed" => Self::Failed,
            _ => Self::Running,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestRunRecord {
    pub ingest_run_id: String,
    pub workbook_path: String,
    pub started_at_utc: String,
    pub finished_at_utc: Option<String>,
    pub status: IngestRunStatus,
    pub tables_written: u64,
    pub rows_written: u64,
    pub error_summary: Option<String>,
}

/// Opens the store in WAL mode, creating its parent directory first.
pub fn open_store(path: &Path, busy_timeout: Duration) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let connection = Connection::open(path).map_err(|source| StoreError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    configure_connection(&connection, busy_timeout)?;
    Ok(connection)
}

fn configure_connection(
    connection: &Connection,
    busy_timeout: Duration,
) -> Result<(), StoreError> {
    connection
        .busy_timeout(busy_timeout)
        .store_context("failed to set store busy timeout")?;
    connection
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<usize, String>(0))
        .store_context("failed to enable WAL journal mode")?;
    Ok(())
}

pub fn ensure_bookkeeping(connection: &Connection) -> Result<(), StoreError> {
    connection
        .execute_batch(&format!("{CREATE_INGEST_RUNS_TABLE_SQL}\n{CREATE_META_TABLE_SQL}"))
        .store_context("failed to create store bookkeeping tables")?;

    if schema_meta_has_version(connection, STORE_SCHEMA_VERSION)? {
        return Ok(());
    }

    let applied_at_utc = crate::utils::time::now_utc_rfc3339()?;
    connection
        .execute(
            &format!(
                "INSERT INTO {SCHEMA_META_TABLE} (schema_version, applied_at_utc) VALUES (?1, ?2)"
            ),
            params![STORE_SCHEMA_VERSION, applied_at_utc],
        )
        .store_context("failed to write store schema meta row")?;

    Ok(())
}

fn schema_meta_has_version(connection: &Connection, schema_version: &str) -> Result<bool, StoreError> {
    let query = format!(
        "SELECT EXISTS(SELECT 1 FROM {SCHEMA_META_TABLE} WHERE schema_version = ?1 LIMIT 1)"
    );
    let exists = connection
        .query_row(&query, [schema_version], |row| row.get::<usize, i64>(0))
        .store_context("failed to query store schema version metadata")?;
    Ok(exists != 0)
}

pub fn insert_ingest_run_started(
    connection: &Connection,
    ingest_run_id: &str,
    workbook_path: &str,
    started_at_utc: &str,
) -> Result<(), StoreError> {
    connection
        .execute(
            &format!(
                "INSERT INTO {INGEST_RUNS_TABLE} (ingest_run_id, workbook_path, started_at_utc, status)
                 VALUES (?1, ?2, ?3, 'running')"
            ),
            params![ingest_run_id, workbook_path, started_at_utc],
        )
        .store_context(format!("failed to insert ingest run start row: {ingest_run_id}"))?;
    Ok(())
}

pub fn finalize_ingest_run(
    connection: &Connection,
    ingest_run_id: &str,
    status: IngestRunStatus,
    finished_at_utc: &str,
    tables_written: usize,
    rows_written: usize,
    error_summary: Option<&str>,
) -> Result<(), StoreError> {
    connection
        .execute(
            &format!(
                "UPDATE {INGEST_RUNS_TABLE}
                 SET status = ?2, finished_at_utc = ?3, tables_written = ?4, rows_written = ?5, error_summary = ?6
                 WHERE ingest_run_id = ?1"
            ),
            params![
                ingest_run_id,
                status.as_str(),
                finished_at_utc,
                to_i64(tables_written, "tables_written")?,
                to_i64(rows_written, "rows_written")?,
                error_summary,
            ],
        )
        .store_context(format!("failed to finalize ingest run row: {ingest_run_id}"))?;
    Ok(())
}

pub fn latest_ingest_run(connection: &Connection) -> Result<Option<IngestRunRecord>, StoreError> {
    if !table_exists(connection, INGEST_RUNS_TABLE)? {
        return Ok(None);
    }

    connection
        .query_row(
            &format!(
                "SELECT ingest_run_id, workbook_path, started_at_utc, finished_at_utc, status,
                        tables_written, rows_written, error_summary
                 FROM {INGEST_RUNS_TABLE}
                 ORDER BY started_at_utc DESC, rowid DESC
                 LIMIT 1"
            ),
            [],
            |row| {
                Ok(IngestRunRecord {
                    ingest_run_id: row.get(0)?,
                    workbook_path: row.get(1)?,
                    started_at_utc: row.get(2)?,
                    finished_at_utc: row.get(3)?,
                    status: IngestRunStatus::parse(&row.get::<usize, String>(4)?),
                    tables_written: row.get::<usize, i64>(5)?.max(0) as u64,
                    rows_written: row.get::<usize, i64>(6)?.max(0) as u64,
                    error_summary: row.get(7)?,
                })
            },
        )
        .optional()
        .store_context("failed to read latest ingest run")
}

pub fn table_exists(connection: &Connection, table_name: &str) -> Result<bool, StoreError> {
    let exists = connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_schema WHERE type = 'table' AND name = ?1)",
            [table_name],
            |row| row.get::<usize, i64>(0),
        )
        .store_context(format!("failed to look up table {table_name}"))?;
    Ok(exists != 0)
}

/// Writes a full copy of the store at `store_path` to `backup_path`,
/// replacing any earlier backup. Returns `false` when there is no store yet.
pub fn backup_store(
    store_path: &Path,
    backup_path: &Path,
    busy_timeout: Duration,
) -> Result<bool, StoreError> {
    if !store_path.exists() {
        return Ok(false);
    }

    let connection = open_store(store_path, busy_timeout)?;
    connection
        .backup(MAIN_DB, backup_path, None::<fn(Progress)>)
        .store_context(format!("failed to write store backup: {}", backup_path.display()))?;
    Ok(true)
}

/// Copies the backup artifact back over the store.
pub fn restore_store(
    store_path: &Path,
    backup_path: &Path,
    busy_timeout: Duration,
) -> Result<(), StoreError> {
    if !backup_path.is_file() {
        return Err(StoreError::MissingBackup {
            path: backup_path.to_path_buf(),
        });
    }

    let mut connection = open_store(store_path, busy_timeout)?;
    connection
        .restore(MAIN_DB, backup_path, None::<fn(Progress)>)
        .store_context(format!(
            "failed to restore store from backup: {}",
            backup_path.display()
        ))?;
    Ok(())
}

/// Double-quoted SQL identifier.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[must_use]
pub fn sqlite_single_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn to_i64(value: usize, field: &'static str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::IntegerRange { field })
}
