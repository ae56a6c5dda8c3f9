//! Shared helper functions for SQL dialect implementations.

// =============================================================================
// Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote string with single quotes (standard SQL).
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Format boolean as literal true/false.
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

// =============================================================================
// Function Remapping
// =============================================================================

/// Function remapping for PostgreSQL.
///
/// Formula translators occasionally emit spreadsheet-style null helpers;
/// these map onto the native spelling.
pub fn remap_function_postgres(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "NVL" | "IFNULL" => Some("COALESCE"),
        "LEN" => Some("LENGTH"),
        _ => None,
    }
}
