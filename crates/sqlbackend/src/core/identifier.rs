//! Identifier validation, quoting and column-list parsing.
//!
//! SQL identifiers (table names, column names, index names) cannot be bound
//! as parameters, so every SQL-text builder in this crate quotes them with
//! the dialect's quote character through [`quote_with`].

use crate::error::{BackendError, Result};

/// Maximum identifier length (conservative limit across databases).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Characters stripped from identifiers by [`strip_quotes`].
const QUOTE_CHARS: &[char] = &['`', '"', '[', ']'];

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers exceeding the maximum length.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BackendError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(BackendError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(BackendError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Wrap `name` in `quote`, doubling any embedded quote sequence.
///
/// ```
/// use sqlbackend::core::identifier::quote_with;
///
/// assert_eq!(quote_with("\"", "orders"), "\"orders\"");
/// assert_eq!(quote_with("`", "we`ird"), "`we``ird`");
/// ```
pub fn quote_with(quote: &str, name: &str) -> String {
    if quote.is_empty() {
        return name.to_string();
    }
    format!("{quote}{}{quote}", escape_with(quote, name))
}

/// Double every embedded `quote` in `name` without wrapping it.
///
/// Templates that already surround a placeholder with the quote character
/// take their identifiers through this.
pub fn escape_with(quote: &str, name: &str) -> String {
    if quote.is_empty() {
        return name.to_string();
    }
    name.replace(quote, &format!("{quote}{quote}"))
}

/// Quote each name and join with `", "`.
pub fn quote_list<S: AsRef<str>>(quote: &str, names: &[S]) -> String {
    names
        .iter()
        .map(|n| quote_with(quote, n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Trim whitespace and surrounding quote characters from an identifier.
pub fn strip_quotes(name: &str) -> &str {
    name.trim().trim_matches(QUOTE_CHARS).trim()
}

/// Split a comma-separated, possibly quoted column list into bare names.
///
/// Catalogs that aggregate index or key members return them this way
/// (e.g. `` `tenant_id`,`external_id` ``).
pub fn fetch_columns(list: &str) -> Vec<String> {
    list.split(',')
        .map(strip_quotes)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
