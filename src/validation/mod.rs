//! Validation of report templates and runtime parameter values.
//!
//! Everything here is local: no storage access, no side effects. The
//! executor runs these checks before any statement is generated.

mod identifier;
pub mod parameters;

pub use identifier::{check_identifier, is_safe_identifier};
pub use parameters::{apply_defaults, validate_parameters};

use std::collections::HashSet;

use crate::model::{ConditionGroup, ReportTemplate};

/// Result type for validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A definition or parameter problem, reported before any storage call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Template '{template}' declares no columns")]
    EmptyColumns { template: String },

    #[error("Template '{template}' declares no data sources")]
    NoDataSource { template: String },

    #[error("Duplicate column name: '{name}'")]
    DuplicateColumn { name: String },

    #[error("Duplicate parameter name: '{name}'")]
    DuplicateParameter { name: String },

    #[error("{context} references undeclared data source '{source_ref}'")]
    UnknownSource { context: String, source_ref: String },

    #[error("Condition on '{column}' references undeclared parameter '{parameter}'")]
    UnknownParameter { column: String, parameter: String },

    #[error("Invalid identifier in {context}: '{identifier}'")]
    InvalidIdentifier { context: String, identifier: String },

    #[error("Unknown column: '{column}'")]
    UnknownColumn { column: String },

    #[error("Column '{column}' is not sortable")]
    NotSortable { column: String },

    #[error("Column '{column}' is not filterable")]
    NotFilterable { column: String },

    #[error("Required parameter missing: '{name}'")]
    RequiredParameterMissing { name: String },

    #[error("Invalid value for parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    #[error("Saved query '{saved_query}' does not belong to template '{template}'")]
    SavedQueryMismatch {
        saved_query: String,
        template: String,
    },

    #[error("Invalid raw query: {0}")]
    InvalidRawQuery(String),

    #[error("Raw query references missing parameter '{name}'")]
    MissingQueryParameter { name: String },
}

impl ValidationError {
    pub(crate) fn invalid_parameter(name: &str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Name of the parameter or column the error is about, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::DuplicateColumn { name }
            | ValidationError::DuplicateParameter { name }
            | ValidationError::RequiredParameterMissing { name }
            | ValidationError::InvalidParameter { name, .. }
            | ValidationError::MissingQueryParameter { name } => Some(name),
            ValidationError::UnknownColumn { column }
            | ValidationError::NotSortable { column }
            | ValidationError::NotFilterable { column }
            | ValidationError::UnknownParameter { column, .. } => Some(column),
            ValidationError::InvalidIdentifier { identifier, .. } => Some(identifier),
            ValidationError::UnknownSource { source_ref, .. } => Some(source_ref),
            _ => None,
        }
    }
}

/// Validate a template definition.
///
/// Collects every problem found; the caller decides whether to report
/// the first or all of them.
pub fn validate_template(template: &ReportTemplate) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_sources(template, &mut errors);
    validate_columns(template, &mut errors);
    validate_joins(template, &mut errors);
    validate_parameters_declared(template, &mut errors);
    validate_config_identifiers(template, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_sources(template: &ReportTemplate, errors: &mut Vec<ValidationError>) {
    if template.data_sources.is_empty() {
        errors.push(ValidationError::NoDataSource {
            template: template.id.clone(),
        });
    }

    for source in &template.data_sources {
        if let Err(e) = check_identifier(&source.name, "data source") {
            errors.push(e);
        }
        if let Some(alias) = &source.alias {
            if let Err(e) = check_identifier(alias, "data source alias") {
                errors.push(e);
            }
        }
    }
}

fn validate_columns(template: &ReportTemplate, errors: &mut Vec<ValidationError>) {
    if template.config.columns.is_empty() {
        errors.push(ValidationError::EmptyColumns {
            template: template.id.clone(),
        });
    }

    let mut seen = HashSet::new();
    for column in &template.config.columns {
        if !seen.insert(column.name.as_str()) {
            errors.push(ValidationError::DuplicateColumn {
                name: column.name.clone(),
            });
        }

        if let Err(e) = check_identifier(&column.name, "column name") {
            errors.push(e);
        }

        // Expressions are authored SQL and skip source resolution.
        if column.expression.is_some() {
            continue;
        }

        if let Some(source) = &column.source {
            if template.find_source(source).is_none() {
                errors.push(ValidationError::UnknownSource {
                    context: format!("Column '{}'", column.name),
                    source_ref: source.clone(),
                });
            }
        }
        if let Some(storage) = &column.column {
            if let Err(e) = check_identifier(storage, "storage column") {
                errors.push(e);
            }
        }
    }

    for aggregation in &template.config.aggregations {
        if !seen.insert(aggregation.alias.as_str()) {
            errors.push(ValidationError::DuplicateColumn {
                name: aggregation.alias.clone(),
            });
        }
        if let Err(e) = check_identifier(&aggregation.alias, "aggregation alias") {
            errors.push(e);
        }
        if aggregation.column != "*" {
            if let Err(e) = check_identifier(&aggregation.column, "aggregation column") {
                errors.push(e);
            }
        }
    }
}

fn validate_joins(template: &ReportTemplate, errors: &mut Vec<ValidationError>) {
    for (i, join) in template.config.joins.iter().enumerate() {
        for (side, source, column) in [
            ("left", &join.left_source, &join.left_column),
            ("right", &join.right_source, &join.right_column),
        ] {
            if template.find_source(source).is_none() {
                errors.push(ValidationError::UnknownSource {
                    context: format!("Join #{} ({} side)", i + 1, side),
                    source_ref: source.clone(),
                });
            }
            if let Err(e) = check_identifier(column, "join column") {
                errors.push(e);
            }
        }
    }
}

fn validate_parameters_declared(template: &ReportTemplate, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for parameter in &template.parameters {
        if !seen.insert(parameter.name.as_str()) {
            errors.push(ValidationError::DuplicateParameter {
                name: parameter.name.clone(),
            });
        }
    }

    let groups = [&template.config.filters, &template.config.having];
    for group in groups.into_iter().flatten() {
        check_parameter_refs(template, group, errors);
    }
}

fn check_parameter_refs(
    template: &ReportTemplate,
    group: &ConditionGroup,
    errors: &mut Vec<ValidationError>,
) {
    for condition in group.leaves() {
        if let Some(parameter) = &condition.parameter_ref {
            if template.find_parameter(parameter).is_none() {
                errors.push(ValidationError::UnknownParameter {
                    column: condition.column.clone(),
                    parameter: parameter.clone(),
                });
            }
        }
    }
}

fn validate_config_identifiers(template: &ReportTemplate, errors: &mut Vec<ValidationError>) {
    for column in &template.config.group_by {
        if let Err(e) = check_identifier(column, "GROUP BY") {
            errors.push(e);
        }
    }
    for sort in &template.config.order_by {
        if let Err(e) = check_identifier(&sort.column, "ORDER BY") {
            errors.push(e);
        }
    }

    let groups = [
        ("WHERE", &template.config.filters),
        ("HAVING", &template.config.having),
    ];
    for (context, group) in groups {
        if let Some(group) = group {
            if let Err(e) = check_condition_columns(group, context) {
                errors.push(e);
            }
        }
    }
}

/// Check every condition column in a tree is a safe identifier.
pub fn check_condition_columns(group: &ConditionGroup, context: &str) -> ValidationResult<()> {
    for condition in group.leaves() {
        check_identifier(&condition.column, context)?;
    }
    Ok(())
}
