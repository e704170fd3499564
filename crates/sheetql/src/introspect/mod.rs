use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use serde_json::Value;

use crate::config::IntrospectionConfig;
use crate::execute::json_value_from_sql;
use crate::identifier::is_reserved_table_name;
use crate::store::{SqliteResultExt, StoreError, quote_identifier, sqlite_single_quoted};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSnapshot {
    pub name: String,
    pub declared_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSnapshot {
    pub name: String,
    pub columns: Vec<ColumnSnapshot>,
    pub row_count: u64,
    /// Up to the configured number of rows, values aligned with `columns`.
    pub samples: Vec<Vec<Value>>,
}

impl TableSnapshot {
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableSnapshot>,
}

impl SchemaSnapshot {
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.iter().find(|table| table.name == name)
    }

    #[must_use]
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|table| table.name.as_str()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Excludes engine tables (`sqlite_*`) and the store's bookkeeping tables.
#[must_use]
pub fn is_internal_table(name: &str) -> bool {
    is_reserved_table_name(name)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Introspector {
    config: IntrospectionConfig,
}

impl Introspector {
    #[must_use]
    pub fn new(config: IntrospectionConfig) -> Self {
        Self { config }
    }

    /// Tables, columns, counts and samples, all read from one store state.
    pub fn snapshot(
        &self,
        connection: &mut Connection,
        excluding: impl Fn(&str) -> bool,
    ) -> Result<SchemaSnapshot, StoreError> {
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .store_context("failed to open introspection read transaction")?;

        let mut tables = Vec::new();
        for (name, create_sql) in list_tables(&tx)? {
            if excluding(&name) {
                continue;
            }
            let without_rowid = create_sql
                .as_deref()
                .is_some_and(|sql| sql.to_ascii_uppercase().contains("WITHOUT ROWID"));
            let columns = load_columns(&tx, &name)?;
            let row_count = count_rows(&tx, &name)?;
            let samples = load_samples(&tx, &name, columns.len(), without_rowid, self.config.sample_rows)?;
            tables.push(TableSnapshot {
                name,
                columns,
                row_count,
                samples,
            });
        }

        tx.commit()
            .store_context("failed to close introspection read transaction")?;
        Ok(SchemaSnapshot { tables })
    }
}

fn list_tables(connection: &Connection) -> Result<Vec<(String, Option<String>)>, StoreError> {
    let mut statement = connection
        .prepare(
            "SELECT name, sql
             FROM sqlite_schema
             WHERE type = 'table'
             ORDER BY name ASC",
        )
        .store_context("failed to prepare sqlite_schema introspection query")?;

    let rows = statement
        .query_map([], |row| {
            Ok((row.get::<usize, String>(0)?, row.get::<usize, Option<String>>(1)?))
        })
        .store_context("failed to execute sqlite_schema introspection query")?;

    rows.map(|row| row.store_context("failed to decode sqlite_schema row"))
        .collect()
}

fn load_columns(connection: &Connection, table: &str) -> Result<Vec<ColumnSnapshot>, StoreError> {
    let pragma_sql = format!("PRAGMA table_info({})", sqlite_single_quoted(table));
    let mut statement = connection
        .prepare(&pragma_sql)
        .store_context(format!("failed to prepare column introspection for `{table}`"))?;

    let rows = statement
        .query_map([], |row| {
            Ok(ColumnSnapshot {
                name: row.get::<usize, String>(1)?,
                declared_type: row
                    .get::<usize, Option<String>>(2)?
                    .filter(|declared| !declared.is_empty()),
            })
        })
        .store_context(format!("failed to execute column introspection for `{table}`"))?;

    rows.map(|row| row.store_context("failed to decode schema column row"))
        .collect()
}

fn count_rows(connection: &Connection, table: &str) -> Result<u64, StoreError> {
    let count = connection
        .query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_identifier(table)),
            [],
            |row| row.get::<usize, i64>(0),
        )
        .store_context(format!("failed to count rows of `{table}`"))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

fn load_samples(
    connection: &Connection,
    table: &str,
    column_count: usize,
    without_rowid: bool,
    limit: usize,
) -> Result<Vec<Vec<Value>>, StoreError> {
    if limit == 0 || column_count == 0 {
        return Ok(Vec::new());
    }

    let order = if without_rowid {
        (1..=column_count)
            .map(|position| position.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        "rowid".to_string()
    };
    let sql = format!(
        "SELECT * FROM {} ORDER BY {order} LIMIT {limit}",
        quote_identifier(table)
    );
    let mut statement = connection
        .prepare(&sql)
        .store_context(format!("failed to prepare sample query for `{table}`"))?;
    let rows = statement
        .query_map([], |row| {
            (0..column_count)
                .map(|index| row.get::<usize, SqlValue>(index).map(json_value_from_sql))
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .store_context(format!("failed to execute sample query for `{table}`"))?;

    rows.map(|row| row.store_context(format!("failed to decode sample row of `{table}`")))
        .collect()
}
