//! One question in, one [`QueryResponse`] out.
//!
//! The pipeline opens its own store connection per question, takes a fresh
//! schema snapshot, translates, executes once and classifies any failure by
//! the stage it came from. It never returns an error to the caller.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use thiserror::Error;

use crate::completion::CompletionService;
use crate::config::AppConfig;
use crate::execute::{ExecutionError, Executor};
use crate::introspect::{Introspector, SchemaSnapshot, is_internal_table};
use crate::materialize::{IngestionError, MaterializeReport, ingest_workbook};
use crate::models::{ErrorKind, QueryResponse};
use crate::store::{StoreError, open_store};
use crate::translate::{TranslationError, Translator};
use crate::utils::error_chain;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to ingest workbook before answering")]
    Ingestion(#[source] IngestionError),

    #[error("no store at {}; run `sheetql ingest <workbook>` first", path.display())]
    StoreMissing { path: PathBuf },

    #[error("failed to read the store schema")]
    Store(#[source] StoreError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl PipelineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Ingestion(_) | Self::StoreMissing { .. } => ErrorKind::Ingestion,
            Self::Translation(_) => ErrorKind::Translation,
            Self::Execution(_) => ErrorKind::Execution,
            Self::Store(_) => ErrorKind::Unknown,
        }
    }

    #[must_use]
    pub fn into_response(self) -> QueryResponse {
        let response = QueryResponse::error(self.kind(), error_chain(&self));
        match self {
            Self::Execution(error) => response.with_generated_query(error.statement),
            _ => response,
        }
    }
}

/// Progress notifications for callers that report stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage<'a> {
    Ingest { workbook: &'a Path },
    Ingested { tables: usize, rows: usize },
    Introspect,
    Translate { tables: usize },
    Execute { statement: &'a str },
}

pub struct QueryPipeline<S> {
    config: AppConfig,
    introspector: Introspector,
    translator: Translator<S>,
    executor: Executor,
}

impl<S: CompletionService> QueryPipeline<S> {
    #[must_use]
    pub fn new(config: AppConfig, service: S) -> Self {
        Self {
            introspector: Introspector::new(config.introspection),
            translator: Translator::new(service),
            executor: Executor::new(config.execution),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn answer(&self, question: &str) -> QueryResponse {
        self.answer_observed(question, None, |_| {})
    }

    /// Materializes `workbook` first; an ingestion failure is the answer.
    #[must_use]
    pub fn ingest_and_answer(&self, workbook: &Path, question: &str) -> QueryResponse {
        self.answer_observed(question, Some(workbook), |_| {})
    }

    pub fn answer_observed(
        &self,
        question: &str,
        ingest_first: Option<&Path>,
        mut observe: impl FnMut(PipelineStage<'_>),
    ) -> QueryResponse {
        self.run(question, ingest_first, &mut observe)
            .unwrap_or_else(PipelineError::into_response)
    }

    /// Snapshot of the user tables in the configured store.
    pub fn snapshot(&self) -> Result<SchemaSnapshot, PipelineError> {
        let mut connection = self.connect()?;
        self.introspector
            .snapshot(&mut connection, is_internal_table)
            .map_err(PipelineError::Store)
    }

    fn connect(&self) -> Result<Connection, PipelineError> {
        let database = &self.config.store.database;
        if !database.exists() {
            return Err(PipelineError::StoreMissing {
                path: database.clone(),
            });
        }
        open_store(database, self.config.store.busy_timeout).map_err(PipelineError::Store)
    }

    fn run(
        &self,
        question: &str,
        ingest_first: Option<&Path>,
        observe: &mut dyn FnMut(PipelineStage<'_>),
    ) -> Result<QueryResponse, PipelineError> {
        if let Some(workbook) = ingest_first {
            observe(PipelineStage::Ingest { workbook });
            let report = self.ingest(workbook)?;
            observe(PipelineStage::Ingested {
                tables: report.tables.len(),
                rows: report.rows_written,
            });
        }

        observe(PipelineStage::Introspect);
        let mut connection = self.connect()?;
        let snapshot = self
            .introspector
            .snapshot(&mut connection, is_internal_table)
            .map_err(PipelineError::Store)?;

        observe(PipelineStage::Translate {
            tables: snapshot.tables.len(),
        });
        let statement = self.translator.translate(question, &snapshot)?;

        observe(PipelineStage::Execute {
            statement: &statement,
        });
        let result = self.executor.execute(&connection, &statement)?;
        Ok(QueryResponse::from_execution(statement, result))
    }

    fn ingest(&self, workbook: &Path) -> Result<MaterializeReport, PipelineError> {
        ingest_workbook(workbook, &self.config).map_err(PipelineError::Ingestion)
    }
}
