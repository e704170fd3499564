//! Sheet and column names mapped onto safe relational identifiers.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::store::BOOKKEEPING_TABLES;

const ENGINE_RESERVED_PREFIX: &str = "sqlite_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierScope {
    Table,
    Column,
}

impl Display for IdentifierScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Table => "sheet",
            Self::Column => "column",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{scope} name `{raw}` normalizes to an empty identifier")]
    EmptyIdentifier { scope: IdentifierScope, raw: String },

    #[error("{scope} names `{first}` and `{second}` both normalize to `{normalized}`")]
    DuplicateIdentifier {
        scope: IdentifierScope,
        first: String,
        second: String,
        normalized: String,
    },

    #[error("sheet name `{raw}` normalizes to reserved table name `{normalized}`")]
    ReservedIdentifier { raw: String, normalized: String },
}

/// Trims, lower-cases, collapses every run of characters outside `[a-z0-9]`
/// into one underscore and strips leading/trailing underscores.
#[must_use]
pub fn normalize_identifier(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    non_identifier_regex()
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

#[must_use]
pub fn is_reserved_table_name(name: &str) -> bool {
    name.starts_with(ENGINE_RESERVED_PREFIX) || BOOKKEEPING_TABLES.contains(&name)
}

/// Normalized identifiers of one scope (the sheets of a workbook, or the
/// columns of a sheet), rejecting collisions as they are inserted.
#[derive(Debug, Clone)]
pub struct IdentifierSet {
    scope: IdentifierScope,
    seen: HashMap<String, String>,
}

impl IdentifierSet {
    #[must_use]
    pub fn new(scope: IdentifierScope) -> Self {
        Self {
            scope,
            seen: HashMap::new(),
        }
    }

    pub fn insert(&mut self, raw: &str) -> Result<String, SchemaError> {
        let normalized = normalize_identifier(raw);
        if normalized.is_empty() {
            return Err(SchemaError::EmptyIdentifier {
                scope: self.scope,
                raw: raw.to_string(),
            });
        }
        if self.scope == IdentifierScope::Table && is_reserved_table_name(&normalized) {
            return Err(SchemaError::ReservedIdentifier {
                raw: raw.to_string(),
                normalized,
            });
        }
        if let Some(first) = self.seen.get(&normalized) {
            return Err(SchemaError::DuplicateIdentifier {
                scope: self.scope,
                first: first.clone(),
                second: raw.to_string(),
                normalized,
            });
        }

        self.seen.insert(normalized.clone(), raw.to_string());
        Ok(normalized)
    }
}

/// Normalizes one sheet's header names, failing on the first collision.
pub fn normalize_columns<S: AsRef<str>>(raw_columns: &[S]) -> Result<Vec<String>, SchemaError> {
    let mut set = IdentifierSet::new(IdentifierScope::Column);
    raw_columns
        .iter()
        .map(|raw| set.insert(raw.as_ref()))
        .collect()
}

fn non_identifier_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new("[^a-z0-9]+").expect("identifier regex should compile"))
}
