use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::completion::OpenAiCompletionService;
use crate::config::{AppConfig, resolve_input_path};
use crate::models::{ErrorKind, QueryResponse};
use crate::pipeline::{PipelineStage, QueryPipeline};

#[derive(Debug, Clone, Args)]
pub struct AskArgs {
    #[arg(value_name = "QUESTION")]
    pub question: String,

    /// Materialize this workbook before answering.
    #[arg(long, value_name = "WORKBOOK")]
    pub ingest: Option<PathBuf>,
}

/// The question was answered with an error response, already printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AskCommandFailure {
    pub kind: ErrorKind,
}

impl Display for AskCommandFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "question could not be answered (error_kind={})", self.kind)
    }
}

impl std::error::Error for AskCommandFailure {}

pub fn run(args: &AskArgs, config: &AppConfig) -> Result<()> {
    let ingest_first = args
        .ingest
        .as_deref()
        .map(|path| resolve_input_path(path, &config.paths))
        .transpose()?;
    println!(
        "ask: start store={} model={} ingest_first={}",
        config.store.database.display(),
        config.completion.model,
        ingest_first.is_some()
    );

    let service = OpenAiCompletionService::new(config.completion.clone())
        .context("failed to build completion client")?;
    let pipeline = QueryPipeline::new(config.clone(), service);
    let response = pipeline.answer_observed(&args.question, ingest_first.as_deref(), print_stage);

    let encoded =
        serde_json::to_string(&response).context("failed to encode query response")?;
    println!("{encoded}");

    match response {
        QueryResponse::Success(success) => {
            println!(
                "ask: complete rows={}",
                success
                    .rows
                    .as_ref()
                    .map_or_else(|| "null".to_string(), |rows| rows.len().to_string())
            );
            Ok(())
        }
        QueryResponse::Error(failure) => Err(AskCommandFailure {
            kind: failure.error_kind,
        }
        .into()),
    }
}

fn print_stage(stage: PipelineStage<'_>) {
    match stage {
        PipelineStage::Ingest { workbook } => {
            println!("ask: stage ingest workbook={}", workbook.display());
        }
        PipelineStage::Ingested { tables, rows } => {
            println!("ask: checkpoint ingested tables={tables} rows={rows}");
        }
        PipelineStage::Introspect => println!("ask: stage introspect"),
        PipelineStage::Translate { tables } => println!("ask: stage translate tables={tables}"),
        PipelineStage::Execute { statement } => {
            println!("ask: stage execute sql={}", statement.replace('\n', " "));
        }
    }
}
