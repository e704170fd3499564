//! Natural-language question to one candidate SQL statement.
//!
//! The translator builds a prompt from a live [`SchemaSnapshot`], calls the
//! completion service exactly once and keeps the reply as a single statement.
//! Leading prose and statement splitting are not handled; only one wrapping
//! markdown code fence is removed.

mod prompt;

use thiserror::Error;

use crate::completion::{CompletionError, CompletionService};
use crate::introspect::SchemaSnapshot;

pub use prompt::{SYSTEM_INSTRUCTION, build_instruction, build_prompt, schema_context};

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("completion service call failed")]
    ServiceFailure(#[source] CompletionError),

    #[error("completion service returned no SQL text")]
    EmptyResponse,
}

#[derive(Debug, Clone)]
pub struct Translator<S> {
    service: S,
}

impl<S: CompletionService> Translator<S> {
    #[must_use]
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn translate(
        &self,
        question: &str,
        snapshot: &SchemaSnapshot,
    ) -> Result<String, TranslationError> {
        let prompt = build_prompt(question, snapshot);
        let reply = self
            .service
            .complete(&prompt)
            .map_err(TranslationError::ServiceFailure)?;
        extract_statement(&reply).ok_or(TranslationError::EmptyResponse)
    }
}

/// Trims the reply and unwraps one surrounding code fence (```sql ... ```).
#[must_use]
pub fn extract_statement(reply: &str) -> Option<String> {
    let trimmed = reply.trim();
    let unfenced = strip_code_fence(trimmed).unwrap_or(trimmed).trim();
    if unfenced.is_empty() {
        None
    } else {
        Some(unfenced.to_string())
    }
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let body = text.strip_prefix("```")?.strip_suffix("```")?;
    // Only an empty or SQL info string is dropped; anything else is statement text.
    match body.split_once('\n') {
        Some((info, rest)) if is_sql_info_string(info) => Some(rest),
        _ => Some(body),
    }
}

fn is_sql_info_string(info: &str) -> bool {
    let info = info.trim();
    info.is_empty() || info.eq_ignore_ascii_case("sql") || info.eq_ignore_ascii_case("sqlite")
}
