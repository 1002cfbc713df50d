//! Condition tree compiler.
//!
//! Turns a [`ConditionGroup`] plus runtime parameter values into a boolean
//! SQL fragment with `$n` placeholders and the ordered values that bind
//! to them. Values never appear in the fragment text.
//!
//! Conditions whose value resolves to nothing are dropped rather than
//! emitted with a NULL comparison:
//!
//! | operator              | dropped when                          |
//! |-----------------------|---------------------------------------|
//! | `is null`/`is not null` | never (no value consumed)           |
//! | `in` / `not in`       | value is not an array, or is empty    |
//! | `between`             | `from` or `to` missing                |
//! | everything else       | value missing or null                 |
//!
//! Dropped conditions consume no placeholder index.

use serde_json::Value;

use crate::model::{Condition, ConditionGroup, ConditionNode, Operator, ParameterValues};
use crate::value::as_label;

/// A compiled boolean fragment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    /// SQL text; empty when every condition was dropped.
    pub sql: String,
    /// Values bound to the fragment's placeholders, in placeholder order.
    pub params: Vec<Value>,
    /// First placeholder index not used by this fragment.
    pub next_index: usize,
}

impl Fragment {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Compile a condition group starting at placeholder `$next_index`.
pub fn compile_conditions(
    group: &ConditionGroup,
    values: &ParameterValues,
    next_index: usize,
) -> Fragment {
    let (sql, params, next_index) = compile_group(group, values, Vec::new(), next_index);
    Fragment {
        sql,
        params,
        next_index,
    }
}

fn compile_group(
    group: &ConditionGroup,
    values: &ParameterValues,
    mut params: Vec<Value>,
    mut next_index: usize,
) -> (String, Vec<Value>, usize) {
    let mut clauses = Vec::new();

    for node in &group.conditions {
        let (clause, p, n) = match node {
            ConditionNode::Condition(condition) => {
                compile_condition(condition, values, params, next_index)
            }
            ConditionNode::Group(nested) => {
                let (sql, p, n) = compile_group(nested, values, params, next_index);
                let wrapped = if sql.is_empty() {
                    sql
                } else {
                    format!("({})", sql)
                };
                (wrapped, p, n)
            }
        };
        params = p;
        next_index = n;
        if !clause.is_empty() {
            clauses.push(clause);
        }
    }

    let joiner = format!(" {} ", group.logic.keyword());
    (clauses.join(&joiner), params, next_index)
}

fn compile_condition(
    condition: &Condition,
    values: &ParameterValues,
    mut params: Vec<Value>,
    next_index: usize,
) -> (String, Vec<Value>, usize) {
    let column = &condition.column;
    let op = condition.operator;

    if op.is_nullary() {
        return (format!("{} {}", column, op.as_sql()), params, next_index);
    }

    let Some(value) = resolve_value(condition, values) else {
        return (String::new(), params, next_index);
    };

    match op {
        Operator::In | Operator::NotIn => {
            let items = match value.as_array() {
                Some(items) if !items.is_empty() => items,
                _ => return (String::new(), params, next_index),
            };
            let placeholders: Vec<String> = (0..items.len())
                .map(|i| format!("${}", next_index + i))
                .collect();
            params.extend(items.iter().cloned());
            (
                format!("{} {} ({})", column, op.as_sql(), placeholders.join(", ")),
                params,
                next_index + items.len(),
            )
        }
        Operator::Between => {
            let bound = |key: &str| value.get(key).filter(|v| !v.is_null()).cloned();
            let (Some(from), Some(to)) = (bound("from"), bound("to")) else {
                return (String::new(), params, next_index);
            };
            params.push(from);
            params.push(to);
            (
                format!(
                    "{} BETWEEN ${} AND ${}",
                    column,
                    next_index,
                    next_index + 1
                ),
                params,
                next_index + 2,
            )
        }
        Operator::Like | Operator::NotLike => {
            params.push(Value::String(format!("%{}%", as_label(value))));
            (
                format!("{} {} ${}", column, op.as_sql(), next_index),
                params,
                next_index + 1,
            )
        }
        _ => {
            params.push(value.clone());
            (
                format!("{} {} ${}", column, op.as_sql(), next_index),
                params,
                next_index + 1,
            )
        }
    }
}

/// The condition's value: the referenced parameter when `parameter_ref` is
/// set, otherwise the literal. JSON null counts as absent.
fn resolve_value<'a>(condition: &'a Condition, values: &'a ParameterValues) -> Option<&'a Value> {
    let value = match &condition.parameter_ref {
        Some(name) => values.get(name),
        None => condition.value.as_ref(),
    };
    value.filter(|v| !v.is_null())
}
