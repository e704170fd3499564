use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{
    ask::AskArgs, contract::ContractArgs, ingest::IngestArgs, inspect::InspectArgs,
    restore::RestoreArgs, schema::SchemaArgs, sql::SqlArgs,
};

#[derive(Debug, Parser)]
#[command(
    name = "sheetql",
    version,
    about = "Spreadsheet ingestion and natural-language SQL over a local store"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub out_dir: Option<PathBuf>,

    /// Store file; defaults to `<out-dir>/sheetql.sqlite`.
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Environment variable holding the completion API key.
    #[arg(long, global = true, value_name = "NAME")]
    pub api_key_env: Option<String>,

    #[arg(long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Chat-completions URL of an OpenAI-compatible service.
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Sample rows per table shown to the model.
    #[arg(long, global = true, value_name = "ROWS")]
    pub sample_rows: Option<usize>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load every sheet of a workbook into the store, replacing its tables.
    Ingest(IngestArgs),
    /// Show how a workbook would be mapped to tables, without touching the store.
    Inspect(InspectArgs),
    /// Print the tables, columns, row counts and samples of the store.
    Schema(SchemaArgs),
    /// Answer a natural-language question with generated SQL.
    Ask(AskArgs),
    /// Run one SQL statement against the store.
    Sql(SqlArgs),
    /// Copy the backup taken before the last ingestion back over the store.
    Restore(RestoreArgs),
    /// Print the JSON schema of the `ask` response.
    Contract(ContractArgs),
}
