//! Table definition loading.
//!
//! Table definitions are JSON documents (the shape the table service
//! exposes). An optional side list names foreign tables known to be gone.
//!
//! # Example
//!
//! ```rust,ignore
//! use fieldsql::model::loader::load_table;
//! use std::path::Path;
//!
//! let table = load_table(Path::new("tasks.json"))?;
//! ```

use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use super::field::TableId;
use super::table::Table;
use crate::error::DomainError;

/// Errors that can occur when loading a table definition.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// IO error reading file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON document
    #[error("Invalid table definition in {file}: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    /// Definition parsed but breaks a structural invariant
    #[error("Table validation failed: {0}")]
    Validation(#[from] DomainError),
}

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Parse a table definition from JSON text.
pub fn parse_table(json: &str, origin: &str) -> LoadResult<Table> {
    let table: Table = serde_json::from_str(json).map_err(|source| LoadError::Json {
        file: origin.to_string(),
        source,
    })?;
    table.validate()?;
    debug!(table = %table.id, fields = table.fields.len(), "loaded table definition");
    Ok(table)
}

/// Load a table definition from a JSON file.
pub fn load_table(path: &Path) -> LoadResult<Table> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_table(&content, &path.display().to_string())
}

/// Build the missing-foreign-table set from a list of table ids.
pub fn missing_tables<I, S>(ids: I) -> HashSet<TableId>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ids.into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .map(TableId::new)
        .collect()
}
