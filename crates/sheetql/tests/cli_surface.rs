use std::path::Path;

use clap::Parser;
use sheetql::cli::app::{Cli, Command};

#[test]
fn parses_global_runtime_flags_for_ingest() {
    let cli = Cli::parse_from([
        "sheetql",
        "--home-dir",
        "/home/tester",
        "--cwd",
        "/work/site",
        "--out-dir",
        "/tmp/sheetql-out",
        "--database",
        "/tmp/sheetql-out/hardware.sqlite",
        "ingest",
        "hardware.xlsx",
        "--batch-size",
        "50",
    ]);

    assert_eq!(
        cli.runtime.home_dir.as_deref(),
        Some(Path::new("/home/tester"))
    );
    assert_eq!(cli.runtime.cwd.as_deref(), Some(Path::new("/work/site")));
    assert_eq!(
        cli.runtime.out_dir.as_deref(),
        Some(Path::new("/tmp/sheetql-out"))
    );
    assert_eq!(
        cli.runtime.database.as_deref(),
        Some(Path::new("/tmp/sheetql-out/hardware.sqlite"))
    );

    match cli.command {
        Command::Ingest(args) => {
            assert_eq!(args.workbook, Path::new("hardware.xlsx"));
            assert_eq!(args.batch_size, Some(50));
        }
        other => panic!("expected ingest command, got {other:?}"),
    }
}

#[test]
fn parses_ask_with_completion_flags_after_the_subcommand() {
    let cli = Cli::parse_from([
        "sheetql",
        "ask",
        "How many cameras are in Camp East?",
        "--ingest",
        "hardware.xlsx",
        "--model",
        "gpt-4o-mini",
        "--api-key-env",
        "SITE_LLM_KEY",
        "--timeout-secs",
        "5",
        "--sample-rows",
        "2",
    ]);

    assert_eq!(cli.runtime.model.as_deref(), Some("gpt-4o-mini"));
    assert_eq!(cli.runtime.api_key_env.as_deref(), Some("SITE_LLM_KEY"));
    assert_eq!(cli.runtime.timeout_secs, Some(5));
    assert_eq!(cli.runtime.sample_rows, Some(2));

    match cli.command {
        Command::Ask(args) => {
            assert_eq!(args.question, "How many cameras are in Camp East?");
            assert_eq!(args.ingest.as_deref(), Some(Path::new("hardware.xlsx")));
        }
        other => panic!("expected ask command, got {other:?}"),
    }
}

#[test]
fn sql_row_cap_has_a_default() {
    let cli = Cli::parse_from(["sheetql", "sql", "SELECT 1"]);

    match cli.command {
        Command::Sql(args) => {
            assert_eq!(args.sql, "SELECT 1");
            assert_eq!(args.row_cap, sheetql::config::DEFAULT_SQL_ROW_CAP);
        }
        other => panic!("expected sql command, got {other:?}"),
    }
}

#[test]
fn parses_inspect_json_and_schema_internal_flags() {
    let cli = Cli::parse_from(["sheetql", "inspect", "hardware.xlsx", "--json"]);
    match cli.command {
        Command::Inspect(args) => {
            assert!(args.json);
            assert_eq!(args.workbook, Path::new("hardware.xlsx"));
        }
        other => panic!("expected inspect command, got {other:?}"),
    }

    let cli = Cli::parse_from(["sheetql", "schema", "--include-internal"]);
    match cli.command {
        Command::Schema(args) => assert!(args.include_internal),
        other => panic!("expected schema command, got {other:?}"),
    }
}

#[test]
fn restore_and_contract_take_no_positional_arguments() {
    assert!(matches!(
        Cli::parse_from(["sheetql", "restore"]).command,
        Command::Restore(_)
    ));
    match Cli::parse_from(["sheetql", "contract", "--pretty"]).command {
        Command::Contract(args) => assert!(args.pretty),
        other => panic!("expected contract command, got {other:?}"),
    }
    assert!(Cli::try_parse_from(["sheetql", "restore", "backup.sqlite"]).is_err());
}

#[test]
fn ask_requires_a_question() {
    assert!(Cli::try_parse_from(["sheetql", "ask"]).is_err());
}
