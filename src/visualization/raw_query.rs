//! Raw-query data sources.
//!
//! A stored query text uses `$name` tokens for runtime values. Each
//! distinct name becomes a positional placeholder in order of first
//! occurrence; repeated names reuse their placeholder. Only the values are
//! parameterized: the query text itself is operator-authored, so this is a
//! reduced-trust path and is gated by `[raw_query]` settings.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::model::ParameterValues;
use crate::sql::parse_single_query;
use crate::validation::{ValidationError, ValidationResult};
use crate::value::is_absent;

static NAME_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());

static POSITIONAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$[0-9]").unwrap());

/// A raw query rewritten to positional placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRawQuery {
    pub sql: String,
    pub params: Vec<Value>,
    /// Parameter name bound to each placeholder, in placeholder order.
    pub names: Vec<String>,
}

/// Rewrite `$name` tokens to `$1..$n` without resolving values.
pub fn substitute_named(query: &str) -> (String, Vec<String>) {
    let mut names: Vec<String> = Vec::new();
    let mut indexes: HashMap<String, usize> = HashMap::new();

    let sql = NAME_TOKEN
        .replace_all(query, |caps: &Captures| {
            let name = &caps[1];
            let index = *indexes.entry(name.to_string()).or_insert_with(|| {
                names.push(name.to_string());
                names.len()
            });
            format!("${}", index)
        })
        .into_owned();

    (sql, names)
}

/// Rewrite, syntax-check and bind a raw query.
///
/// The rewritten text must parse as exactly one SELECT/WITH statement, and
/// every referenced name must have a value.
pub fn prepare_raw_query(
    query: &str,
    values: &ParameterValues,
) -> ValidationResult<PreparedRawQuery> {
    if POSITIONAL.is_match(query) {
        return Err(ValidationError::InvalidRawQuery(
            "positional placeholders are not allowed; use $name tokens".into(),
        ));
    }

    let (sql, names) = substitute_named(query);
    parse_single_query(&sql).map_err(ValidationError::InvalidRawQuery)?;

    let params = names
        .iter()
        .map(|name| match values.get(name) {
            value if is_absent(value) => Err(ValidationError::MissingQueryParameter {
                name: name.clone(),
            }),
            value => Ok(value.cloned().unwrap_or(Value::Null)),
        })
        .collect::<ValidationResult<Vec<_>>>()?;

    Ok(PreparedRawQuery { sql, params, names })
}
