//! SQL-level data types used as cast targets.
//!
//! Computed values are normalized to one of a handful of PostgreSQL
//! storage types before they are projected or persisted.

use std::fmt;

/// SQL-level data type for casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type.
    Bool,

    /// 64-bit floating point (DOUBLE PRECISION).
    Float64,

    /// Variable-length text.
    Text,

    /// Timestamp with time zone.
    TimestampTz,

    /// Binary JSON document.
    Jsonb,
}

impl DataType {
    /// PostgreSQL spelling of the type.
    pub fn sql_name(&self) -> &'static str {
        match self {
            DataType::Bool => "boolean",
            DataType::Float64 => "double precision",
            DataType::Text => "text",
            DataType::TimestampTz => "timestamptz",
            DataType::Jsonb => "jsonb",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}
