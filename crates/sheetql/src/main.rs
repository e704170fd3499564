#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::Parser;
use clap::error::ErrorKind;
use sheetql::cli::app::{Cli, Command, RuntimeArgs};
use sheetql::cli::commands::{self, INGESTION_FAILURE_CODES, QUERY_FAILURE_CODES};
use sheetql::config::{AppConfig, ConfigOverrides, DEFAULT_API_KEY_ENV, RuntimePaths};
use sheetql::models::{ErrorKind as QueryErrorKind, QueryEnvelopeCommandFailure};

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_INGESTION_FAILURE: i32 = 2;
const EXIT_QUERY_FAILURE: i32 = 3;
const EXIT_USAGE_ERROR: i32 = 64;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    let command_name = command_name(&cli.command);
    println!("sheetql: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            println!("sheetql: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            eprintln!("sheetql: failed `{command_name}` (exit_code={exit_code})");
            eprintln!("{error:#}");
            exit_code
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Contract(args) => commands::contract::run(&args),
        Command::Ingest(args) => commands::ingest::run(&args, &resolve_config(&cli.runtime)?),
        Command::Inspect(args) => commands::inspect::run(&args, &resolve_config(&cli.runtime)?),
        Command::Schema(args) => commands::schema::run(&args, &resolve_config(&cli.runtime)?),
        Command::Ask(args) => commands::ask::run(&args, &resolve_config(&cli.runtime)?),
        Command::Sql(args) => commands::sql::run(&args, &resolve_config(&cli.runtime)?),
        Command::Restore(args) => commands::restore::run(&args, &resolve_config(&cli.runtime)?),
    }
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    if let Some(failure) = error.downcast_ref::<commands::ask::AskCommandFailure>() {
        return match failure.kind {
            QueryErrorKind::Ingestion => EXIT_INGESTION_FAILURE,
            QueryErrorKind::Translation | QueryErrorKind::Execution => EXIT_QUERY_FAILURE,
            QueryErrorKind::Unknown => EXIT_RUNTIME_FAILURE,
        };
    }

    match error
        .downcast_ref::<QueryEnvelopeCommandFailure>()
        .and_then(QueryEnvelopeCommandFailure::code)
    {
        Some(code) if INGESTION_FAILURE_CODES.contains(&code) => EXIT_INGESTION_FAILURE,
        Some(code) if QUERY_FAILURE_CODES.contains(&code) => EXIT_QUERY_FAILURE,
        _ => EXIT_RUNTIME_FAILURE,
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Ingest(_) => "ingest",
        Command::Inspect(_) => "inspect",
        Command::Schema(_) => "schema",
        Command::Ask(_) => "ask",
        Command::Sql(_) => "sql",
        Command::Restore(_) => "restore",
        Command::Contract(_) => "contract",
    }
}

fn resolve_config(args: &RuntimeArgs) -> Result<AppConfig> {
    let paths = resolve_runtime_paths(args)?;
    let overrides = ConfigOverrides {
        database: args.database.clone(),
        sample_rows: args.sample_rows,
        endpoint: args.endpoint.clone(),
        model: args.model.clone(),
        api_key_env: args.api_key_env.clone(),
        timeout: args.timeout_secs.map(Duration::from_secs),
    };
    let api_key_env = args.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV);
    let api_key = std::env::var(api_key_env).ok();
    sheetql::config::resolve_app_config(paths, &overrides, api_key)
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    sheetql::config::resolve_runtime_paths(&home_dir, &cwd, args.out_dir.as_deref())
}
