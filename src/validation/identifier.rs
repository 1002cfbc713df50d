//! Identifier checks for column and source references.
//!
//! Values are always bound as parameters, but column and source names are
//! spliced into the statement text. Anything that reaches the SQL text
//! must be a plain or qualified identifier, or a simple aggregate over one.

use std::sync::LazyLock;

use regex::Regex;

use super::{ValidationError, ValidationResult};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap());

static AGGREGATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(count|sum|avg|min|max)\(\s*(\*|[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?)\s*\)$",
    )
    .unwrap()
});

/// Whether `s` may be spliced into SQL text as a column reference.
pub fn is_safe_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s) || AGGREGATE.is_match(s)
}

/// Fail with [`ValidationError::InvalidIdentifier`] unless `s` is safe.
pub fn check_identifier(s: &str, context: &str) -> ValidationResult<()> {
    if is_safe_identifier(s) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdentifier {
            context: context.to_string(),
            identifier: s.to_string(),
        })
    }
}
